use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::DbError;

/// Cancellation and deadline carried by one caller request.
///
/// Every database round trip in this crate goes through [`RequestContext::run`],
/// so a cancelled or expired request stops at the next statement instead of
/// finishing stale work.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// No deadline, cancellable only through [`RequestContext::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails when the request already ended.
    pub fn check(&self) -> Result<(), DbError> {
        if self.cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` until it completes or the request ends, whichever is first.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<DbError>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DbError::Cancelled),
            _ = deadline => Err(DbError::DeadlineExceeded),
            res = fut => res.map_err(Into::into),
        }
    }
}
