pub mod establishments;
pub mod specialties;
pub mod users;

pub use establishments::EstablishmentService;
pub use specialties::SpecialtyService;
pub use users::UserService;
