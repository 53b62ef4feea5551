use thiserror::Error;

pub type Result<T> = std::result::Result<T, AvatarError>;

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Rate limited by {url}")]
    RateLimited { url: String },
    #[error("Upstream error from {url}: HTTP {status}")]
    Upstream { url: String, status: u16 },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Validation(String),
    #[error("The backend refused to set the avatar")]
    SubmissionRejected,
    #[error("No session user is stored")]
    NoSessionUser,
    #[error("Operation is not allowed while {0}")]
    InvalidState(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parsing error")]
    Parse,
    #[error("Storage error: {0} {1}")]
    Storage(String, String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AvatarError {
    /// Only a 429 from upstream is worth another attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AvatarError::RateLimited { .. })
    }
}

impl From<serde_json::Error> for AvatarError {
    fn from(_: serde_json::Error) -> Self {
        Self::Parse
    }
}

impl From<toml::de::Error> for AvatarError {
    fn from(_: toml::de::Error) -> Self {
        Self::Parse
    }
}

impl From<url::ParseError> for AvatarError {
    fn from(_: url::ParseError) -> Self {
        Self::Parse
    }
}

impl From<base64::DecodeError> for AvatarError {
    fn from(_: base64::DecodeError) -> Self {
        Self::Parse
    }
}
