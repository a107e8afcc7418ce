use propmedia::Config;
use propmedia::db::{Db, migrate};
use propmedia::error::PropmediaError;
use propmedia::storage_server::StorageServer;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.log_level())
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve-storage" => {
            run_storage_server(&config).await?;
        }
        "verify" => {
            run_schema_verification(&config).await?;
        }
        other => {
            log::warn!("Unknown command '{}', running verify", other);
            run_schema_verification(&config).await?;
        }
    }

    Ok(())
}

/// Open the database and bring the schema up to date
async fn open_database(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;
    log::info!("Database initialized at {}", config.db_path().display());
    Ok(db)
}

/// Run the local storage endpoint
async fn run_storage_server(config: &Config) -> Result<()> {
    log::info!("Starting propmedia storage endpoint v{}", env!("CARGO_PKG_VERSION"));

    let server = StorageServer::from_config(config);
    log::info!("Public base URL: {}", config.storage_server.public_base_url);

    server.run(config.storage_server.port).await?;
    Ok(())
}

/// Run database schema verification
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting propmedia v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Storage function: {}", config.storage.function_url);
    log::info!("Upload batch size: {}", config.upload.batch_size);

    let db = open_database(config).await?;
    verify_database_schema(&db).await?;

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["media_uploads", "properties", "schema_migrations"];
        let mut all_tables_exist = true;

        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(PropmediaError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < migrate::known_migrations() {
            return Err(PropmediaError::Config(format!(
                "Expected {} migrations, found {}",
                migrate::known_migrations(),
                applied.len()
            )));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(PropmediaError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(PropmediaError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(PropmediaError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
