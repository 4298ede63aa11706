//! SQLite persistence adapters built on sqlx.

pub mod connection;
pub mod experiment_repo;
pub mod run_repo;

pub use connection::DatabaseConnection;
pub use experiment_repo::SqliteExperimentStore;
pub use run_repo::SqliteRunStore;
