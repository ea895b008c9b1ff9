use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{ProfileUpdate, UserProfile};
use crate::storage::{keys, LocalStore};

use super::SessionData;

/// Minimum accepted password length for registration and resets.
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Credentials rejected by the backend; carries its human-readable
    /// reason.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Input rejected locally, before any request is made.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Observable session lifecycle. `Error` means the last login attempt
/// failed; the manager stays usable and a new attempt resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
    Error,
}

/// Owns the auth state machine: login, logout, registration and the
/// recovery flows. The bearer token lives on the [`ApiClient`]; the
/// persisted copy lives in the local store so sessions survive restarts.
pub struct SessionManager {
    api: Arc<ApiClient>,
    store: Arc<LocalStore>,
    state: Mutex<AuthState>,
    user: Mutex<Option<UserProfile>>,
    loading: AtomicBool,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>, store: Arc<LocalStore>) -> Self {
        Self {
            api,
            store,
            state: Mutex::new(AuthState::Anonymous),
            user: Mutex::new(None),
            loading: AtomicBool::new(false),
        }
    }

    fn state_lock(&self) -> MutexGuard<'_, AuthState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn user_lock(&self) -> MutexGuard<'_, Option<UserProfile>> {
        match self.user.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state_lock()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    /// Whether a profile fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.user_lock().clone()
    }

    /// Restore a persisted session, if any. The token is installed and the
    /// profile fetched best-effort; a failed fetch leaves the token alone
    /// since the backend may only be temporarily unreachable.
    pub async fn restore(&self) -> bool {
        let Some(session) = self.store.get::<SessionData>(keys::SESSION) else {
            return false;
        };
        info!(email = %session.email, "Restoring persisted session");
        self.api.set_token(Some(session.token));
        *self.state_lock() = AuthState::Authenticated;

        if let Err(e) = self.refresh_profile().await {
            warn!(error = %e, "Profile fetch failed during session restore");
        }
        true
    }

    /// Authenticate and persist the session. A rejected credential pair
    /// maps to [`AuthError::InvalidCredentials`]; transport and server
    /// failures pass through as [`AuthError::Api`].
    ///
    /// The session counts as authenticated as soon as the credential
    /// exchange succeeds. The profile fetch that follows is best-effort,
    /// same as [`SessionManager::restore`]: a failure there leaves the
    /// token installed and only logs, with `is_loading`/`current_user`
    /// telling callers the profile is not there yet.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        *self.state_lock() = AuthState::Authenticating;
        let token = match self.exchange_credentials(email, password).await {
            Ok(token) => token,
            Err(e) => {
                *self.state_lock() = AuthState::Error;
                debug!(error = %e, "Login failed");
                return Err(e);
            }
        };

        self.api.set_token(Some(token.clone()));
        self.store.set(keys::SESSION, &SessionData::new(token, email));
        *self.state_lock() = AuthState::Authenticated;
        info!(email, "Signed in");

        if let Err(e) = self.refresh_profile().await {
            warn!(error = %e, "Profile fetch failed after sign-in");
        }
        Ok(())
    }

    async fn exchange_credentials(&self, email: &str, password: &str) -> Result<String, AuthError> {
        match self.api.login(email, password).await {
            Ok(token) => Ok(token),
            Err(e) if matches!(e.status(), Some(400) | Some(401) | Some(403)) => {
                Err(AuthError::InvalidCredentials(e.message()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Tear down the session: remote logout is best-effort, then the
    /// token, the persisted session, the profile, and every cache domain
    /// are dropped before the state flips to `Anonymous`.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Remote logout failed, clearing local session anyway");
        }
        self.api.set_token(None);
        self.store.remove(keys::SESSION);
        *self.user_lock() = None;
        self.api.cache().invalidate_all();
        *self.state_lock() = AuthState::Anonymous;
        info!("Signed out");
    }

    /// Re-fetch the profile from the backend, replacing the held copy.
    pub async fn refresh_profile(&self) -> Result<UserProfile, AuthError> {
        self.loading.store(true, Ordering::Relaxed);
        let result = self.api.current_user_fresh().await;
        self.loading.store(false, Ordering::Relaxed);

        let profile = result?;
        *self.user_lock() = Some(profile.clone());
        Ok(profile)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let profile = self.api.update_profile(update).await?;
        *self.user_lock() = Some(profile.clone());
        Ok(profile)
    }

    // ===== Registration and recovery flows =====

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        Self::validate_passwords(password, password_confirm)?;
        self.api.register(email, password, password_confirm).await?;
        Ok(())
    }

    pub async fn verify_registration(&self, email: &str, otp: &str) -> Result<(), AuthError> {
        self.api.verify_registration(email, otp).await?;
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.api.request_password_reset(email).await?;
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        email: &str,
        otp: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        Self::validate_passwords(password, password_confirm)?;
        self.api
            .confirm_password_reset(email, otp, password, password_confirm)
            .await?;
        Ok(())
    }

    pub async fn resend_otp(&self, email: &str, code_type: &str) -> Result<(), AuthError> {
        self.api.resend_otp(email, code_type).await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), AuthError> {
        Self::validate_passwords(password, password_confirm)?;
        self.api
            .change_password(current_password, password, password_confirm)
            .await?;
        Ok(())
    }

    pub async fn request_email_change(&self, email: &str) -> Result<(), AuthError> {
        self.api.request_email_change(email).await?;
        Ok(())
    }

    pub async fn verify_email_change(&self, otp: &str) -> Result<UserProfile, AuthError> {
        self.api.verify_email_change(otp).await?;
        self.refresh_profile().await
    }

    fn validate_passwords(password: &str, password_confirm: &str) -> Result<(), AuthError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if password != password_confirm {
            return Err(AuthError::Validation(
                "Passwords do not match".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDomain, CacheStore};
    use crate::config::Config;
    use httpmock::prelude::*;
    use serde_json::json;

    fn manager_for(server: &MockServer, dir: &std::path::Path) -> SessionManager {
        let config = Config {
            api_base: server.base_url(),
            ..Config::default()
        };
        let api = Arc::new(ApiClient::new(&config, Arc::new(CacheStore::new())).expect("client"));
        SessionManager::new(api, Arc::new(LocalStore::new(dir)))
    }

    fn mock_login(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/accounts/login");
            then.status(200).json_body(json!({"access_token": "tok-7"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/accounts/me");
            then.status(200)
                .json_body(json!({"id": 3, "email": "a@b.c"}));
        });
    }

    #[tokio::test]
    async fn login_persists_session_and_loads_profile() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        mock_login(&server);
        let manager = manager_for(&server, dir.path());

        manager.login("a@b.c", "hunter22").await.expect("login");

        assert_eq!(manager.state(), AuthState::Authenticated);
        let profile = manager.current_user().expect("profile");
        assert_eq!(profile.email, "a@b.c");
        let saved: SessionData = LocalStore::new(dir.path())
            .get(keys::SESSION)
            .expect("persisted session");
        assert_eq!(saved.token, "tok-7");
        assert_eq!(saved.email, "a@b.c");
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_invalid_credentials() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        server.mock(|when, then| {
            when.method(POST).path("/accounts/login");
            then.status(401)
                .json_body(json!({"detail": "Incorrect email or password"}));
        });
        let manager = manager_for(&server, dir.path());

        let err = manager.login("a@b.c", "wrong").await.expect_err("rejected");

        assert!(
            matches!(&err, AuthError::InvalidCredentials(msg) if msg == "Incorrect email or password")
        );
        assert_eq!(manager.state(), AuthState::Error);
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn profile_failure_after_token_exchange_keeps_session() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        server.mock(|when, then| {
            when.method(POST).path("/accounts/login");
            then.status(200).json_body(json!({"access_token": "tok-7"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/accounts/me");
            then.status(500).json_body(json!({"detail": "boom"}));
        });
        let manager = manager_for(&server, dir.path());

        manager.login("a@b.c", "hunter22").await.expect("login");

        // The credential exchange decides the session; the profile fetch
        // is best-effort and its failure must not contradict the token
        // already installed and persisted.
        assert_eq!(manager.state(), AuthState::Authenticated);
        assert!(manager.is_authenticated());
        assert!(manager.api.has_token());
        assert!(manager.current_user().is_none());
        assert!(LocalStore::new(dir.path())
            .get::<SessionData>(keys::SESSION)
            .is_some());
    }

    #[tokio::test]
    async fn server_failure_passes_through_as_api_error() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        server.mock(|when, then| {
            when.method(POST).path("/accounts/login");
            then.status(500).json_body(json!({"detail": "boom"}));
        });
        let manager = manager_for(&server, dir.path());

        let err = manager.login("a@b.c", "hunter22").await.expect_err("500");
        assert!(matches!(err, AuthError::Api(_)));
    }

    #[tokio::test]
    async fn logout_clears_token_store_and_caches() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        mock_login(&server);
        server.mock(|when, then| {
            when.method(POST).path("/accounts/logout");
            then.status(200).json_body(json!({"message": "ok"}));
        });
        let manager = manager_for(&server, dir.path());
        manager.login("a@b.c", "hunter22").await.expect("login");
        manager
            .api
            .cache()
            .set(CacheDomain::Products, "all", &1, chrono::Duration::minutes(5));

        manager.logout().await;

        assert_eq!(manager.state(), AuthState::Anonymous);
        assert!(manager.current_user().is_none());
        assert!(!manager.api.has_token());
        assert!(LocalStore::new(dir.path())
            .get::<SessionData>(keys::SESSION)
            .is_none());
        assert!(manager
            .api
            .cache()
            .get::<i32>(CacheDomain::Products, "all")
            .is_none());
    }

    #[tokio::test]
    async fn logout_clears_locally_even_when_remote_fails() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        mock_login(&server);
        server.mock(|when, then| {
            when.method(POST).path("/accounts/logout");
            then.status(500).json_body(json!({"detail": "boom"}));
        });
        let manager = manager_for(&server, dir.path());
        manager.login("a@b.c", "hunter22").await.expect("login");

        manager.logout().await;

        assert_eq!(manager.state(), AuthState::Anonymous);
        assert!(!manager.api.has_token());
    }

    #[tokio::test]
    async fn restore_reinstalls_persisted_token() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        server.mock(|when, then| {
            when.method(GET)
                .path("/accounts/me")
                .header("authorization", "Bearer tok-old");
            then.status(200)
                .json_body(json!({"id": 3, "email": "a@b.c"}));
        });
        LocalStore::new(dir.path()).set(keys::SESSION, &SessionData::new("tok-old", "a@b.c"));
        let manager = manager_for(&server, dir.path());

        assert!(manager.restore().await);
        assert_eq!(manager.state(), AuthState::Authenticated);
        assert_eq!(manager.current_user().expect("profile").email, "a@b.c");
    }

    #[tokio::test]
    async fn restore_keeps_token_when_profile_fetch_fails() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        server.mock(|when, then| {
            when.method(GET).path("/accounts/me");
            then.status(401).json_body(json!({"detail": "expired"}));
        });
        LocalStore::new(dir.path()).set(keys::SESSION, &SessionData::new("tok-old", "a@b.c"));
        let manager = manager_for(&server, dir.path());

        assert!(manager.restore().await);
        // Token stays installed; only an explicit logout destroys it.
        assert!(manager.api.has_token());
        assert!(LocalStore::new(dir.path())
            .get::<SessionData>(keys::SESSION)
            .is_some());
    }

    #[tokio::test]
    async fn restore_without_session_is_a_noop() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager_for(&server, dir.path());

        assert!(!manager.restore().await);
        assert_eq!(manager.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn register_validates_locally_before_any_request() {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager_for(&server, dir.path());

        let err = manager
            .register("a@b.c", "hunter22", "hunter23")
            .await
            .expect_err("mismatch");
        assert!(matches!(err, AuthError::Validation(_)));

        let err = manager
            .register("a@b.c", "short", "short")
            .await
            .expect_err("too short");
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
