//! Session state and the backend seam used by the auth flow

use crate::storage::StorageScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "async")]
use crate::error::Result;
#[cfg(feature = "async")]
use crate::messages::{CallbackRequest, CallbackResponse, ValidateResponse};

/// A live session, as recorded in the storage scope that holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub is_persistent: bool,
    pub initialized_at: DateTime<Utc>,
}

impl Session {
    pub fn scope(&self) -> StorageScope {
        StorageScope::from_persistent(self.is_persistent)
    }
}

/// Authentication state machine:
/// `Uninitialized -> Checking -> Authenticated | Unauthenticated`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Uninitialized,
    Checking,
    Authenticated(Session),
    Unauthenticated,
}

impl AuthState {
    /// True once a check has finished and the value can be trusted
    pub fn is_settled(&self) -> bool {
        matches!(self, AuthState::Authenticated(_) | AuthState::Unauthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "uninitialized",
            AuthState::Checking => "checking",
            AuthState::Authenticated(s) if s.is_persistent => "authenticated (persistent)",
            AuthState::Authenticated(_) => "authenticated (session)",
            AuthState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Backend endpoints the auth flow depends on
#[cfg(feature = "async")]
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// `GET /auth/validate`
    async fn validate(&self, session_id: &str) -> Result<ValidateResponse>;

    /// `POST /auth/callback`
    async fn exchange_code(&self, request: &CallbackRequest) -> Result<CallbackResponse>;

    /// `POST /auth/logout`
    async fn logout(&self, session_id: &str) -> Result<()>;
}
