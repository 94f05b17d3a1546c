use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::{Connection, SqliteConnection};
use std::path::Path;

use crate::error::{DbError, Result};

pub type InnerConnType = SqliteConnection;
pub type ConnType = PooledConnection<ConnectionManager<InnerConnType>>;
pub type PoolType = Pool<ConnectionManager<InnerConnType>>;

const CONNECTION_INIT: &str = "PRAGMA busy_timeout = 15000; PRAGMA synchronous = NORMAL; \
                               PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;";

#[derive(Debug)]
struct ConnectionInit;

impl CustomizeConnection<InnerConnType, diesel::r2d2::Error> for ConnectionInit {
    fn on_acquire(&self, conn: &mut InnerConnType) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(CONNECTION_INIT)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct DbExecutor {
    pub pool: PoolType,
}

pub trait AsDao<'a> {
    fn as_dao(pool: &'a PoolType) -> Self;
}

impl DbExecutor {
    pub fn new<S: Into<String>>(database_url: S) -> Result<Self> {
        let database_url = database_url.into();
        log::debug!("Opening database {}", database_url);
        let manager = ConnectionManager::new(database_url);
        let pool = Pool::builder()
            .connection_customizer(Box::new(ConnectionInit))
            .build(manager)?;
        Ok(DbExecutor { pool })
    }

    /// Opens (or creates) `<name>.db` inside `data_dir`.
    pub fn from_data_dir(data_dir: &Path, name: &str) -> Result<Self> {
        let db = data_dir.join(format!("{}.db", name));
        Self::new(db.to_string_lossy())
    }

    pub fn conn(&self) -> Result<ConnType> {
        Ok(self.pool.get()?)
    }

    pub fn apply_migration(&self) -> Result<()> {
        let conn = self.conn()?;
        crate::embedded_migrations::run(&conn)?;
        Ok(())
    }

    pub fn as_dao<'a, T: AsDao<'a>>(&'a self) -> T {
        AsDao::as_dao(&self.pool)
    }
}

/// Runs `f` inside a transaction on the blocking thread pool.
pub async fn do_with_transaction<R, F>(pool: &PoolType, label: &'static str, f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce(&ConnType) -> Result<R> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        log::trace!("Starting db transaction [{}].", label);
        let conn = pool.get()?;
        conn.transaction(|| f(&conn))
    })
    .await
    .map_err(DbError::from)?
}

/// Same as [`do_with_transaction`], for queries without side effects.
pub async fn readonly_transaction<R, F>(pool: &PoolType, label: &'static str, f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce(&ConnType) -> Result<R> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        log::trace!("Starting readonly db query [{}].", label);
        let conn = pool.get()?;
        f(&conn)
    })
    .await
    .map_err(DbError::from)?
}
