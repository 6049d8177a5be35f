pub mod config;
pub mod database;
pub mod measurement_repository;
pub mod url_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use measurement_repository::MeasurementRepository;
pub use url_repository::UrlRepository;
