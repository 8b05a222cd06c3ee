//! Stored key persistence backends

mod in_memory;
mod migrations;
mod postgres;

pub use in_memory::InMemoryKeyStore;
pub use migrations::{
    byok_migrations, revert_byok_migrations, run_byok_migrations, Migration, PostgresMigrator,
};
pub use postgres::{PostgresConfig, PostgresKeyStore};
