//! Auth message types exchanged with the backend

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/callback`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
}

/// Response to a code exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    #[serde(default)]
    pub is_authenticated: bool,
    /// Whether the server issued a long-lived session
    #[serde(default)]
    pub is_persistent: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response to `GET /auth/validate`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(default)]
    pub is_authenticated: bool,
}

/// Error body returned by the auth endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Query parameters delivered to the OAuth callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Error code reported by the identity provider
    pub error: Option<String>,
}
