//! Authentication and session state
//!
//! `AuthService` owns the auth state machine and the session markers in both
//! storage scopes:
//! 1. At startup (and on explicit re-validation) it looks for markers in the
//!    ephemeral scope, then the durable one, and asks the backend whether the
//!    session is still live.
//! 2. `login` stores a random state token in the scope the user consented to
//!    and returns the provider URL.
//! 3. `handle_callback` checks the returned state, exchanges the code and
//!    writes the new session into the scope the server reports.
//!
//! Every failure resets to `Unauthenticated` with local markers cleared.

use armory_core::{
    keys, ArmoryError, AuthBackend, AuthState, CallbackParams, CallbackRequest, KeyValueStore,
    Result, Session, StorageScope,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Hex-encoded 32 random bytes
pub fn generate_state_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct AuthService<B: AuthBackend> {
    backend: Arc<B>,
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    state: watch::Sender<AuthState>,
    api_url: String,
    callback_url: String,
}

impl<B: AuthBackend> AuthService<B> {
    pub fn new(
        backend: Arc<B>,
        durable: Arc<dyn KeyValueStore>,
        ephemeral: Arc<dyn KeyValueStore>,
        api_url: &str,
        callback_url: &str,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Uninitialized);
        Self {
            backend,
            durable,
            ephemeral,
            state,
            api_url: api_url.trim_end_matches('/').to_string(),
            callback_url: callback_url.to_string(),
        }
    }

    fn store(&self, scope: StorageScope) -> &dyn KeyValueStore {
        match scope {
            StorageScope::Durable => self.durable.as_ref(),
            StorageScope::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    fn set_state(&self, next: AuthState) {
        tracing::debug!("Auth state -> {}", next.label());
        self.state.send_replace(next);
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_settled()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Wait for the running auth check to settle and return whether the user
    /// is authenticated. Fails with a timeout instead of guessing.
    pub async fn wait_until_initialized(&self, timeout: Duration) -> Result<bool> {
        if self.is_initialized() {
            return Ok(self.is_authenticated());
        }

        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(timeout, rx.wait_for(|s| s.is_settled()))
            .await
            .map_err(|_| ArmoryError::Timeout("waiting for auth initialization".to_string()))?
            .map_err(|_| ArmoryError::NotAuthenticated)?;
        Ok(settled.is_authenticated())
    }

    // ========================================================================
    // Startup check / re-validation
    // ========================================================================

    /// Look for a stored session and confirm it with the backend
    pub async fn check_auth_status(&self) -> AuthState {
        self.set_state(AuthState::Checking);

        let next = match self.find_session() {
            None => {
                tracing::info!("No stored session");
                AuthState::Unauthenticated
            }
            Some(session) => match self.backend.validate(&session.session_id).await {
                Ok(response) if response.is_authenticated => {
                    tracing::info!(persistent = session.is_persistent, "Session validated");
                    AuthState::Authenticated(session)
                }
                Ok(_) => {
                    tracing::info!("Stored session is no longer valid");
                    self.clear_session_markers();
                    AuthState::Unauthenticated
                }
                Err(e) => {
                    tracing::warn!("Session validation failed: {}", e);
                    self.clear_session_markers();
                    AuthState::Unauthenticated
                }
            },
        };

        self.set_state(next.clone());
        next
    }

    fn find_session(&self) -> Option<Session> {
        for scope in [StorageScope::Ephemeral, StorageScope::Durable] {
            match read_session(self.store(scope)) {
                Ok(Some(session)) => return Some(session),
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not read {:?} session markers: {}", scope, e),
            }
        }
        None
    }

    // ========================================================================
    // Login / callback
    // ========================================================================

    /// Store a fresh state token and return the provider authorization URL.
    /// `consent` selects durable storage.
    pub fn login(&self, consent: bool) -> Result<String> {
        let scope = StorageScope::from_persistent(consent);
        let state = generate_state_token();

        self.store(scope).set(keys::OAUTH_STATE, &state)?;
        self.store(scope.other()).remove(keys::OAUTH_STATE)?;

        tracing::info!("Starting login with {:?} storage", scope);
        Ok(format!(
            "{}/auth/bnet?callback={}&consent={}&state={}",
            self.api_url,
            urlencoding::encode(&self.callback_url),
            consent,
            state
        ))
    }

    /// Give up on a login whose redirect never arrived
    pub fn abandon_login(&self, reason: &ArmoryError) {
        tracing::warn!("Login abandoned: {}", reason);
        self.clear_all_markers();
        self.set_state(AuthState::Unauthenticated);
    }

    /// Complete a login from the provider redirect
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<Session> {
        match self.complete_callback(params).await {
            Ok(session) => {
                tracing::info!(persistent = session.is_persistent, "Login complete");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                self.clear_all_markers();
                self.set_state(AuthState::Unauthenticated);
                Err(e)
            }
        }
    }

    async fn complete_callback(&self, params: CallbackParams) -> Result<Session> {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            return Err(ArmoryError::Provider(error));
        }

        let (code, state) = match (
            params.code.filter(|c| !c.is_empty()),
            params.state.filter(|s| !s.is_empty()),
        ) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(ArmoryError::MissingCallbackParams),
        };

        if !self.state_matches(&state)? {
            return Err(ArmoryError::InvalidState);
        }

        let response = self
            .backend
            .exchange_code(&CallbackRequest { code, state })
            .await?;

        if !response.is_authenticated {
            if let Some(message) = &response.message {
                tracing::warn!("Backend refused login: {}", message);
            }
            return Err(ArmoryError::Auth("authentication_failed".to_string()));
        }

        let session_id = response
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ArmoryError::Auth("missing_session".to_string()))?;

        let session = Session {
            session_id,
            is_persistent: response.is_persistent,
            initialized_at: Utc::now(),
        };

        self.write_session(&session)?;
        self.ephemeral.remove(keys::OAUTH_STATE)?;
        self.durable.remove(keys::OAUTH_STATE)?;

        self.set_state(AuthState::Authenticated(session.clone()));
        Ok(session)
    }

    fn state_matches(&self, state: &str) -> Result<bool> {
        for scope in [StorageScope::Ephemeral, StorageScope::Durable] {
            if self.store(scope).get(keys::OAUTH_STATE)?.as_deref() == Some(state) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn write_session(&self, session: &Session) -> Result<()> {
        let scope = session.scope();
        self.store(scope.other()).remove_all(&keys::SESSION_MARKERS)?;

        let store = self.store(scope);
        store.set(keys::AUTH_STATE, keys::AUTHENTICATED)?;
        store.set(keys::AUTH_TIME, &session.initialized_at.to_rfc3339())?;
        store.set(keys::STORAGE_TYPE, scope.marker())?;
        store.set(keys::SESSION_ID, &session.session_id)?;
        store.remove(keys::SID)?;
        Ok(())
    }

    // ========================================================================
    // Logout
    // ========================================================================

    /// End the session. Local markers are cleared even if the backend call fails.
    pub async fn logout(&self) {
        if let Some(session) = self.session() {
            if let Err(e) = self.backend.logout(&session.session_id).await {
                tracing::warn!("Backend logout failed: {}", e);
            }
        }
        self.clear_all_markers();
        self.set_state(AuthState::Unauthenticated);
        tracing::info!("Logged out");
    }

    fn clear_session_markers(&self) {
        for scope in [StorageScope::Ephemeral, StorageScope::Durable] {
            if let Err(e) = self.store(scope).remove_all(&keys::SESSION_MARKERS) {
                tracing::error!("Failed to clear {:?} session markers: {}", scope, e);
            }
        }
    }

    fn clear_all_markers(&self) {
        self.clear_session_markers();
        for scope in [StorageScope::Ephemeral, StorageScope::Durable] {
            if let Err(e) = self.store(scope).remove(keys::OAUTH_STATE) {
                tracing::error!("Failed to clear {:?} OAuth state: {}", scope, e);
            }
        }
    }
}

/// Session recorded in one store. Markers that are partial or written for the
/// other scope are discarded.
fn read_session(store: &dyn KeyValueStore) -> Result<Option<Session>> {
    let auth_state = store.get(keys::AUTH_STATE)?;
    let storage_type = store.get(keys::STORAGE_TYPE)?;
    let session_id = match store.get(keys::SESSION_ID)? {
        Some(id) => Some(id),
        None => store.get(keys::SID)?,
    }
    .filter(|id| !id.is_empty());

    if auth_state.is_none() && storage_type.is_none() && session_id.is_none() {
        return Ok(None);
    }

    let scope = store.scope();
    let consistent = auth_state.as_deref() == Some(keys::AUTHENTICATED)
        && storage_type.as_deref() == Some(scope.marker());

    match (consistent, session_id) {
        (true, Some(session_id)) => {
            let initialized_at = store
                .get(keys::AUTH_TIME)?
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            Ok(Some(Session {
                session_id,
                is_persistent: scope == StorageScope::Durable,
                initialized_at,
            }))
        }
        _ => {
            tracing::warn!("Discarding inconsistent session markers in {:?} storage", scope);
            store.remove_all(&keys::SESSION_MARKERS)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use armory_core::{CallbackResponse, MemoryStore, ValidateResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend with fixed answers that counts calls
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        /// `None` makes validation fail with a network error
        pub validate: Option<bool>,
        /// `None` makes the exchange fail
        pub exchange: Option<CallbackResponse>,
        pub logout_fails: bool,
        pub validate_calls: AtomicUsize,
        pub exchange_calls: AtomicUsize,
        pub logout_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AuthBackend for ScriptedBackend {
        async fn validate(&self, _session_id: &str) -> Result<ValidateResponse> {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            match self.validate {
                Some(is_authenticated) => Ok(ValidateResponse { is_authenticated }),
                None => Err(ArmoryError::Network("connection refused".to_string())),
            }
        }

        async fn exchange_code(&self, _request: &CallbackRequest) -> Result<CallbackResponse> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            self.exchange
                .clone()
                .ok_or_else(|| ArmoryError::Auth("invalid_grant".to_string()))
        }

        async fn logout(&self, _session_id: &str) -> Result<()> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            if self.logout_fails {
                return Err(ArmoryError::Network("connection reset".to_string()));
            }
            Ok(())
        }
    }

    pub(crate) struct Fixture {
        pub backend: Arc<ScriptedBackend>,
        pub durable: Arc<MemoryStore>,
        pub ephemeral: Arc<MemoryStore>,
        pub auth: Arc<AuthService<ScriptedBackend>>,
    }

    pub(crate) fn fixture(backend: ScriptedBackend) -> Fixture {
        let backend = Arc::new(backend);
        let durable = Arc::new(MemoryStore::new(StorageScope::Durable));
        let ephemeral = Arc::new(MemoryStore::ephemeral());
        let auth = Arc::new(AuthService::new(
            backend.clone(),
            durable.clone(),
            ephemeral.clone(),
            "http://localhost:3000/api",
            "http://127.0.0.1:23847/auth/callback",
        ));
        Fixture {
            backend,
            durable,
            ephemeral,
            auth,
        }
    }

    pub(crate) fn store_session(store: &dyn KeyValueStore, marker: &str, session_id: &str) {
        store.set(keys::AUTH_STATE, keys::AUTHENTICATED).unwrap();
        store.set(keys::AUTH_TIME, "2024-05-01T12:00:00+00:00").unwrap();
        store.set(keys::STORAGE_TYPE, marker).unwrap();
        store.set(keys::SESSION_ID, session_id).unwrap();
    }

    fn callback(code: &str, state: &str) -> CallbackParams {
        CallbackParams {
            code: Some(code.to_string()),
            state: Some(state.to_string()),
            error: None,
        }
    }

    fn accepted(persistent: bool) -> CallbackResponse {
        CallbackResponse {
            is_authenticated: true,
            is_persistent: persistent,
            session_id: Some("sess-42".to_string()),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_no_markers_is_unauthenticated_without_backend_call() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        assert_eq!(f.auth.state(), AuthState::Uninitialized);
        assert!(!f.auth.is_initialized());

        let state = f.auth.check_auth_status().await;
        assert_eq!(state, AuthState::Unauthenticated);
        assert!(f.auth.is_initialized());
        assert_eq!(f.backend.validate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_durable_session_is_restored() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "sess-1");

        let state = f.auth.check_auth_status().await;
        let session = state.session().unwrap();
        assert_eq!(session.session_id, "sess-1");
        assert!(session.is_persistent);
        assert_eq!(session.scope(), StorageScope::Durable);
        assert_eq!(session.initialized_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_ephemeral_session_wins_over_durable() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "old");
        store_session(f.ephemeral.as_ref(), "session", "tab");

        let state = f.auth.check_auth_status().await;
        assert_eq!(state.session().unwrap().session_id, "tab");
        assert!(!state.session().unwrap().is_persistent);
    }

    #[tokio::test]
    async fn test_validation_error_fails_closed() {
        let f = fixture(ScriptedBackend {
            validate: None,
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "sess-1");

        let state = f.auth.check_auth_status().await;
        assert_eq!(state, AuthState::Unauthenticated);
        assert!(!f.auth.is_authenticated());
        assert_eq!(f.durable.get(keys::SESSION_ID).unwrap(), None);
        assert_eq!(f.durable.get(keys::AUTH_STATE).unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_session_is_cleared() {
        let f = fixture(ScriptedBackend {
            validate: Some(false),
            ..Default::default()
        });
        store_session(f.ephemeral.as_ref(), "session", "sess-1");

        assert_eq!(f.auth.check_auth_status().await, AuthState::Unauthenticated);
        assert_eq!(f.ephemeral.get(keys::SESSION_ID).unwrap(), None);
    }

    #[tokio::test]
    async fn test_mismatched_storage_type_is_unauthenticated() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "session", "sess-1");

        assert_eq!(f.auth.check_auth_status().await, AuthState::Unauthenticated);
        assert_eq!(f.backend.validate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.durable.get(keys::STORAGE_TYPE).unwrap(), None);
    }

    #[tokio::test]
    async fn test_legacy_sid_key_is_read() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        f.durable.set(keys::AUTH_STATE, keys::AUTHENTICATED).unwrap();
        f.durable.set(keys::STORAGE_TYPE, "local").unwrap();
        f.durable.set(keys::SID, "legacy").unwrap();

        let state = f.auth.check_auth_status().await;
        assert_eq!(state.session().unwrap().session_id, "legacy");
    }

    #[test]
    fn test_login_stores_state_in_consented_scope() {
        let f = fixture(ScriptedBackend::default());

        let url = f.auth.login(true).unwrap();
        let state = f.durable.get(keys::OAUTH_STATE).unwrap().unwrap();
        assert_eq!(state.len(), 64);
        assert_eq!(f.ephemeral.get(keys::OAUTH_STATE).unwrap(), None);
        assert!(url.starts_with("http://localhost:3000/api/auth/bnet?callback=http%3A%2F%2F127.0.0.1%3A23847%2Fauth%2Fcallback"));
        assert!(url.contains("consent=true"));
        assert!(url.ends_with(&format!("state={}", state)));

        f.auth.login(false).unwrap();
        assert!(f.ephemeral.get(keys::OAUTH_STATE).unwrap().is_some());
        assert_eq!(f.durable.get(keys::OAUTH_STATE).unwrap(), None);
    }

    #[test]
    fn test_abandoned_login_drops_state_token() {
        let f = fixture(ScriptedBackend::default());
        f.auth.login(true).unwrap();
        assert!(f.durable.get(keys::OAUTH_STATE).unwrap().is_some());

        f.auth
            .abandon_login(&ArmoryError::Timeout("login callback".to_string()));
        assert_eq!(f.durable.get(keys::OAUTH_STATE).unwrap(), None);
        assert_eq!(f.ephemeral.get(keys::OAUTH_STATE).unwrap(), None);
        assert_eq!(f.auth.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_state_tokens_differ() {
        assert_ne!(generate_state_token(), generate_state_token());
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_is_rejected() {
        let f = fixture(ScriptedBackend {
            exchange: Some(accepted(true)),
            ..Default::default()
        });
        f.ephemeral.set(keys::OAUTH_STATE, "abc").unwrap();

        let err = f.auth.handle_callback(callback("code", "xyz")).await.unwrap_err();
        assert!(matches!(err, ArmoryError::InvalidState));
        assert_eq!(err.reason(), "invalid_state");
        assert_eq!(f.backend.exchange_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.ephemeral.get(keys::OAUTH_STATE).unwrap(), None);
        assert_eq!(f.auth.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_callback_without_stored_state_is_rejected() {
        let f = fixture(ScriptedBackend {
            exchange: Some(accepted(true)),
            ..Default::default()
        });

        let err = f.auth.handle_callback(callback("code", "xyz")).await.unwrap_err();
        assert!(matches!(err, ArmoryError::InvalidState));
        assert_eq!(f.backend.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_missing_params_and_provider_error() {
        let f = fixture(ScriptedBackend::default());

        let err = f
            .auth
            .handle_callback(CallbackParams {
                code: Some("code".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "missing_params");

        let err = f
            .auth
            .handle_callback(CallbackParams {
                error: Some("access_denied".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "access_denied");
        assert_eq!(f.backend.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_callback_writes_server_reported_scope() {
        let f = fixture(ScriptedBackend {
            exchange: Some(accepted(false)),
            ..Default::default()
        });
        let url = f.auth.login(true).unwrap();
        let state = url.rsplit("state=").next().unwrap().to_string();

        let session = f.auth.handle_callback(callback("code", &state)).await.unwrap();
        assert_eq!(session.session_id, "sess-42");
        assert!(!session.is_persistent);
        assert!(f.auth.is_authenticated());

        assert_eq!(f.ephemeral.get(keys::STORAGE_TYPE).unwrap().as_deref(), Some("session"));
        assert_eq!(f.ephemeral.get(keys::SESSION_ID).unwrap().as_deref(), Some("sess-42"));
        assert_eq!(f.ephemeral.get(keys::AUTH_STATE).unwrap().as_deref(), Some("authenticated"));
        assert_eq!(f.durable.get(keys::SESSION_ID).unwrap(), None);
        assert_eq!(f.durable.get(keys::OAUTH_STATE).unwrap(), None);
        assert_eq!(f.ephemeral.get(keys::OAUTH_STATE).unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_exchange_clears_everything() {
        let f = fixture(ScriptedBackend {
            exchange: None,
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "stale");
        f.durable.set(keys::OAUTH_STATE, "abc").unwrap();

        let err = f.auth.handle_callback(callback("code", "abc")).await.unwrap_err();
        assert_eq!(err.reason(), "invalid_grant");
        assert_eq!(f.backend.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.durable.get(keys::OAUTH_STATE).unwrap(), None);
        assert_eq!(f.durable.get(keys::SESSION_ID).unwrap(), None);
    }

    #[tokio::test]
    async fn test_exchange_without_session_id_fails() {
        let f = fixture(ScriptedBackend {
            exchange: Some(CallbackResponse {
                is_authenticated: true,
                ..Default::default()
            }),
            ..Default::default()
        });
        f.ephemeral.set(keys::OAUTH_STATE, "abc").unwrap();

        let err = f.auth.handle_callback(callback("code", "abc")).await.unwrap_err();
        assert_eq!(err.reason(), "missing_session");
        assert!(!f.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_markers_even_when_backend_fails() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            logout_fails: true,
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "sess-1");
        f.auth.check_auth_status().await;
        assert!(f.auth.is_authenticated());

        f.auth.logout().await;
        assert_eq!(f.backend.logout_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.auth.state(), AuthState::Unauthenticated);
        assert_eq!(f.durable.get(keys::SESSION_ID).unwrap(), None);
    }

    #[tokio::test]
    async fn test_wait_times_out_before_check() {
        let f = fixture(ScriptedBackend::default());

        let err = f
            .auth
            .wait_until_initialized(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ArmoryError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_wait_resolves_when_check_finishes() {
        let f = fixture(ScriptedBackend {
            validate: Some(true),
            ..Default::default()
        });
        store_session(f.durable.as_ref(), "local", "sess-1");

        let waiter = {
            let auth = f.auth.clone();
            tokio::spawn(async move { auth.wait_until_initialized(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        f.auth.check_auth_status().await;

        assert!(waiter.await.unwrap().unwrap());
    }
}
