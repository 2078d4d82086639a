use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};

use crate::core::config;
use crate::core::error::{AppError, AppResult};

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies pending embedded migrations.
///
/// Serialized per process; refinery wraps each migration in its own
/// transaction, and the busy timeout covers a second process migrating
/// the same file.
pub fn run_migrations(conn: &mut Connection) -> AppResult<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(config::storage::busy_timeout())?;

    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| AppError::Anyhow(anyhow::anyhow!("apply migrations: {}", e)))?;

    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}
