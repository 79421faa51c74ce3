use thiserror::Error;

/// Every failure the engine can surface to a caller.
///
/// Indicator shortfalls are not represented here: the indicator engine
/// returns `Option` for those.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Rate limited by {0}")]
    UpstreamRateLimited(String),

    #[error("Credentials rejected by {0}")]
    UpstreamAuthRejected(String),

    #[error("Not found: {0}")]
    UpstreamNotFound(String),

    #[error("Upstream server error ({code}): {message}")]
    UpstreamServerError { code: u16, message: String },

    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless discriminant of [`MarketError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredential,
    InvalidRequest,
    UpstreamUnavailable,
    UpstreamRateLimited,
    UpstreamAuthRejected,
    UpstreamNotFound,
    UpstreamServerError,
    MalformedUpstreamResponse,
    Storage,
    Internal,
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::MissingCredential(_) => ErrorKind::MissingCredential,
            MarketError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            MarketError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            MarketError::UpstreamRateLimited(_) => ErrorKind::UpstreamRateLimited,
            MarketError::UpstreamAuthRejected(_) => ErrorKind::UpstreamAuthRejected,
            MarketError::UpstreamNotFound(_) => ErrorKind::UpstreamNotFound,
            MarketError::UpstreamServerError { .. } => ErrorKind::UpstreamServerError,
            MarketError::MalformedUpstreamResponse(_) => ErrorKind::MalformedUpstreamResponse,
            MarketError::Storage(_) => ErrorKind::Storage,
            MarketError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::MalformedUpstreamResponse(err.to_string())
    }
}
