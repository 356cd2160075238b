use std::path::PathBuf;

use {clap::Subcommand, crossover_config::CrossoverConfig};

#[derive(Subcommand)]
pub enum DbAction {
    /// Delete the database file completely.
    Reset,
    /// Clear all rooms, connections, and message mappings but keep the schema.
    Clear,
    /// Run all pending database migrations.
    Migrate,
}

/// Tables in deletion order (children first).
const TABLES: &[&str] = &["message_mappings", "connections", "rooms"];

pub async fn handle_db(action: DbAction, config: &CrossoverConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Reset => reset_database(config),
        DbAction::Clear => clear_database(config).await,
        DbAction::Migrate => run_migrations(config).await,
    }
}

/// File behind a `sqlite:` URL. `None` for in-memory databases.
fn db_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" || path == "memory" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

fn reset_database(config: &CrossoverConfig) -> anyhow::Result<()> {
    let url = config.database.resolved_url();
    let Some(db) = db_file(&url) else {
        println!("Database {url} is not file backed; nothing to delete.");
        return Ok(());
    };

    let mut deleted = false;
    // Also delete WAL and SHM files that SQLite may have created.
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db.clone().into_os_string();
        name.push(suffix);
        let path = PathBuf::from(name);
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database deleted. Run `crossover db migrate` to recreate it.");
    } else {
        println!("No database file found at {}.", db.display());
    }
    Ok(())
}

async fn clear_database(config: &CrossoverConfig) -> anyhow::Result<()> {
    let store = crate::open_store(config).await?;
    for table in TABLES {
        let query = format!("DELETE FROM {table}");
        let done = sqlx::query(&query).execute(store.pool()).await?;
        println!("Cleared table: {table} ({} rows)", done.rows_affected());
    }
    store.close().await;
    println!("Database cleared.");
    Ok(())
}

async fn run_migrations(config: &CrossoverConfig) -> anyhow::Result<()> {
    println!("Running migrations for {}...", config.database.resolved_url());
    let store = crate::open_store(config).await?;
    store.close().await;
    println!("Migrations complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_from_url() {
        assert_eq!(
            db_file("sqlite:/var/lib/crossover/crossover.db?mode=rwc"),
            Some(PathBuf::from("/var/lib/crossover/crossover.db"))
        );
        assert_eq!(
            db_file("sqlite://relay.db"),
            Some(PathBuf::from("relay.db"))
        );
        assert_eq!(db_file("sqlite::memory:"), None);
        assert_eq!(db_file("postgres://db/relay"), None);
    }
}
