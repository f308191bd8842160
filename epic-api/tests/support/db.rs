use epic_api::db::{DbConfig, PgStore};

pub fn test_pg_store() -> PgStore {
    let config = DbConfig::from_env();
    PgStore::from_config(&config).expect("Failed to create PostgreSQL store")
}
