use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a pool of up to `config::storage::POOL_MAX_SIZE` connections
/// (WAL journal, busy timeout) and brings the schema up to date.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use taskycore::storage::db;
///
/// let pool = db::create_pool("tasky.sqlite")?;
/// # Ok::<(), taskycore::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(config::storage::busy_timeout())?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    let pool = Pool::builder().max_size(config::storage::POOL_MAX_SIZE).build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;
    log::debug!("Database pool ready at {}", database_path);

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> AppResult<DbConnection> {
    Ok(pool.get()?)
}
