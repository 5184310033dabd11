//! Error types for ats-client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{method} {url} failed with status {status}: {body}")]
    RemoteRequest {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no workqueue is bound to this session")]
    NoWorkqueue,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status of a failed server call, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteRequest { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
