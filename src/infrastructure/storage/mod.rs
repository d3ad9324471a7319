//! Storage infrastructure - backing store implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{Repositories, StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryDatabase;
pub use migrations::{run_storage_migrations, Migration, Migrator, PostgresMigrator};
pub use postgres::{connect_pool, PostgresConfig, PostgresDatabase};

pub(crate) use postgres::map_db_error;
