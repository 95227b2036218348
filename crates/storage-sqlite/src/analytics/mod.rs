//! Read-only analytics queries over the backup tables.

mod repository;

pub use repository::AnalyticsRepository;
