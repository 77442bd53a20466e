pub mod cells;
pub mod error;
pub mod establishment;
pub mod session;

pub use error::AppError;
pub use establishment::Establishment;
pub use session::{Role, Session};
