use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Network, DNS or timeout failure. Retryable on the next cycle.
    Transport(reqwest::Error),
    HttpStatus { code: u16, message: String },
    RateLimited,
    Auth(String),
    TwoFactorRequired,
    /// The vendor envelope reported `success: false`.
    Api(String),
    Json(serde_json::Error),
    Io(std::io::Error),
    DeviceNotFound(u64),
    ReadOnlyProgram(String),
    Pairing(String),
    InvalidSettings(String),
}

impl Error {
    /// Errors that should skip the current poll cycle and be retried on the next one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::RateLimited)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) if e.is_timeout() => write!(f, "request timed out"),
            Error::Transport(e) => write!(f, "transport error: {e}"),
            Error::HttpStatus { code, message } => write!(f, "HTTP {code}: {message}"),
            Error::RateLimited => write!(f, "rate limited by vendor API"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::TwoFactorRequired => write!(f, "account requires two factor authentication"),
            Error::Api(msg) => write!(f, "API error: {msg}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::DeviceNotFound(id) => write!(f, "device {id} not found"),
            Error::ReadOnlyProgram(p) => write!(f, "program {p} cannot be set remotely"),
            Error::Pairing(msg) => write!(f, "pairing error: {msg}"),
            Error::InvalidSettings(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
