use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::{DbError, DbPool, RequestContext};

/// A transaction bound to the request that opened it.
///
/// [`UnitOfWork::finish`] commits only when the work succeeded and the
/// request is still live; every other exit rolls back. Dropping an
/// unfinished unit of work also rolls back.
///
/// Once the commit is sent it runs to completion, so the caller never
/// hears `Cancelled` for work that was stored.
pub struct UnitOfWork {
    ctx: RequestContext,
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub async fn begin(pool: &DbPool, ctx: &RequestContext) -> Result<Self, DbError> {
        let tx = ctx.run(pool.begin()).await?;
        Ok(Self {
            ctx: ctx.clone(),
            tx,
        })
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn finish<T>(self, result: Result<T, DbError>) -> Result<T, DbError> {
        let result = result.and_then(|value| self.ctx.check().map(|()| value));
        match result {
            Ok(value) => {
                self.tx.commit().await?;
                Ok(value)
            }
            Err(primary) => match self.tx.rollback().await {
                Ok(()) => Err(primary),
                Err(rollback) => Err(DbError::Rollback {
                    primary: Box::new(primary),
                    rollback,
                }),
            },
        }
    }
}
