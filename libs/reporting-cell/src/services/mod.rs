pub mod summary;

pub use summary::ReportingService;
