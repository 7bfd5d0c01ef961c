use thiserror::Error;

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("book {book_id} is not available for issue")]
    Unavailable { book_id: i64 },

    #[error("{0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl LibraryError {
    pub fn book_not_found(id: i64) -> Self {
        Self::NotFound { entity: "book", id }
    }

    pub fn issue_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "issue record",
            id,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Stable machine-readable code used on the IPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Unavailable { .. } => "unavailable",
            Self::InvalidState(_) => "invalid_state",
            Self::Storage(_) | Self::Sqlite(_) => "storage",
        }
    }
}
