use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database: missing required poll id or title argument")]
    MissingKey,
    #[error("not found")]
    NotFound,
    #[error("database: {0}")]
    Validation(#[from] ValidationError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("database unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{primary}; rollback failed: {rollback}")]
    Rollback {
        primary: Box<DbError>,
        rollback: sqlx::Error,
    },
    #[error("{}", join_messages(.0))]
    Joined(Vec<DbError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("poll scope is empty")]
    EmptyScope,
    #[error("poll question is empty")]
    EmptyQuestion,
    #[error("poll duration must be positive, got {0}")]
    NonPositiveDuration(i16),
    #[error("poll has no answers")]
    NoAnswers,
    #[error("answer {position} is empty string")]
    EmptyAnswer { position: usize },
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingKey,
    NotFound,
    Validation,
    Cancelled,
    DeadlineExceeded,
    Connectivity,
}

impl DbError {
    /// Kind of the primary fault. Joined errors classify by their first member.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::MissingKey => ErrorKind::MissingKey,
            DbError::NotFound => ErrorKind::NotFound,
            DbError::Validation(_) => ErrorKind::Validation,
            DbError::Cancelled => ErrorKind::Cancelled,
            DbError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            DbError::Unreachable(_) | DbError::Sqlx(_) => ErrorKind::Connectivity,
            DbError::Rollback { primary, .. } => primary.kind(),
            DbError::Joined(errors) => errors
                .first()
                .map(DbError::kind)
                .unwrap_or(ErrorKind::Connectivity),
        }
    }

    /// Every leaf error, primary first. Rollback failures are exposed by
    /// [`DbError::rollback_error`].
    pub fn constituents(&self) -> Vec<&DbError> {
        match self {
            DbError::Rollback { primary, .. } => primary.constituents(),
            DbError::Joined(errors) => errors.iter().flat_map(DbError::constituents).collect(),
            other => vec![other],
        }
    }

    pub fn rollback_error(&self) -> Option<&sqlx::Error> {
        match self {
            DbError::Rollback { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Cancelled | ErrorKind::DeadlineExceeded
        )
    }

    /// Combines independent failures, flattening a single one.
    pub fn join(mut errors: Vec<DbError>) -> Option<DbError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(DbError::Joined(errors)),
        }
    }
}

fn join_messages(errors: &[DbError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
