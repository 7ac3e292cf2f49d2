use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Send error: {0}")]
    Send(String),
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Producer is not connected")]
    NotConnected,
    #[error("Other error: {0}")]
    Other(String),
}

impl SimError {
    /// HTTP status carried by the error, if the remote side answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SimError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Validation(err.to_string())
    }
}

impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        SimError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
