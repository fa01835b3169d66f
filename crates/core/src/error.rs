//! Error types for Armory

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArmoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("OAuth state mismatch")]
    InvalidState,

    #[error("Callback is missing code or state")]
    MissingCallbackParams,

    #[error("Identity provider reported: {0}")]
    Provider(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Achievement chain loops back to achievement {0}")]
    ChainCycle(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ArmoryError {
    /// Short reason code attached to the landing route after a failed login
    pub fn reason(&self) -> String {
        match self {
            ArmoryError::InvalidState => "invalid_state".to_string(),
            ArmoryError::MissingCallbackParams => "missing_params".to_string(),
            ArmoryError::Provider(code) => code.clone(),
            ArmoryError::Auth(code) => code.clone(),
            ArmoryError::NotAuthenticated => "not_authenticated".to_string(),
            ArmoryError::Timeout(_) => "timeout".to_string(),
            ArmoryError::Api { .. } | ArmoryError::Network(_) => "network_error".to_string(),
            _ => "unknown_error".to_string(),
        }
    }
}

impl From<serde_json::Error> for ArmoryError {
    fn from(e: serde_json::Error) -> Self {
        ArmoryError::InvalidData(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArmoryError>;
