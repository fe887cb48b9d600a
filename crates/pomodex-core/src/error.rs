//! Closed error taxonomy shared by both binaries.
//!
//! Business logic returns a `PomodexError`; only the HTTP adapter
//! (project-service) and the WebSocket close-code mapper (terminal-proxy)
//! translate variants into status codes or close codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PomodexError {
    /// Unknown credentials, bad/expired token, wrong project ownership.
    /// Maps to 401 / WebSocket close 4401. Never discloses which factor failed.
    #[error("authentication failed")]
    Auth,

    /// Absent or unowned resource. Maps to 404. Indistinguishable from
    /// "exists but not yours" by design.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate email, or an external-layer name collision. Maps to 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Status-machine precondition violated (e.g. stopping a stopped
    /// project). Maps to 409 with a short reason.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Docker/cloud/registry failure. Maps to 500; the saga that produced
    /// it sets the project to `error` and runs compensation.
    #[error("backend error: {0}")]
    Backend(String),

    /// Timeout or connection-refused on an external dependency. User-facing
    /// callers map this to 503; the sweeper logs and retries next tick.
    #[error("transient error: {0}")]
    Transient(String),
}

pub type Result<T> = std::result::Result<T, PomodexError>;

impl From<bollard::errors::Error> for PomodexError {
    fn from(e: bollard::errors::Error) -> Self {
        match &e {
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                PomodexError::NotFound(e.to_string())
            }
            bollard::errors::Error::DockerResponseServerError { status_code: 409, .. } => {
                PomodexError::Conflict(e.to_string())
            }
            _ => PomodexError::Backend(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for PomodexError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => PomodexError::NotFound("row not found".into()),
            other => PomodexError::Backend(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for PomodexError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            PomodexError::Transient(e.to_string())
        } else {
            PomodexError::Backend(e.to_string())
        }
    }
}
