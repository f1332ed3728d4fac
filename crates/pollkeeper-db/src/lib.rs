pub mod context;
pub mod error;
pub mod lookup;
pub mod polls;
pub mod unit_of_work;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::Connection;
use std::str::FromStr;
use std::time::Duration;

pub use context::RequestContext;
pub use error::{DbError, ErrorKind, ValidationError};
pub use lookup::PollLookup;
pub use unit_of_work::UnitOfWork;

pub type DbPool = sqlx::SqlitePool;

/// How long [`Database::close`] waits for checked-out connections.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Ignored for in-memory URLs, which always get a single connection.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .foreign_keys(true);

    // Each in-memory connection is its own empty database.
    let max_connections = if is_memory_url(database_url) {
        1
    } else {
        max_connections.max(1)
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations: applied successfully");
    Ok(())
}

/// Process-wide connectivity, constructed once and passed to whoever needs it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Builds the pool and probes it once; an unreachable store fails here.
    pub async fn open(ctx: &RequestContext, config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = ctx
            .run(async {
                create_pool(&config.url, config.max_connections)
                    .await
                    .map_err(DbError::Unreachable)
            })
            .await?;

        let db = Self { pool };
        if let Err(err) = db.ping(ctx).await {
            db.close().await;
            return Err(err);
        }

        tracing::info!(max_connections = config.max_connections, "database: connected");
        Ok(db)
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn ping(&self, ctx: &RequestContext) -> Result<(), DbError> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
        .map_err(|err| match err {
            DbError::Sqlx(source) => DbError::Unreachable(source),
            other => other,
        })
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.pool).await?;
        Ok(())
    }

    /// Closes the pool. Repeated or slow closes are logged, never fatal.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            tracing::warn!("database: close called on an already closed pool");
            return;
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, self.pool.close())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = CLOSE_TIMEOUT.as_secs(),
                "database: connections still busy after close timeout"
            );
            return;
        }
        tracing::info!("database: closed");
    }
}
