use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timestamp '{raw}' on ticket {ticket_id}: {reason}")]
    InvalidTimestamp {
        ticket_id: String,
        raw: String,
        reason: String,
    },

    #[error("Invalid incident window: {minutes} minutes")]
    InvalidWindow { minutes: i64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type OpsResult<T> = Result<T, OpsError>;
