//! Session controller: authentication state and its operations.
//!
//! One [`SessionStore`] per running client, constructed explicitly and passed
//! by reference; consumers never reach for ambient globals. The lifecycle is
//! `UNINITIALIZED -> CHECKING -> (AUTHENTICATED | ANONYMOUS)`; `initialized`
//! is monotonic and gates all protected views.

use std::sync::{Arc, Mutex, Weak};

use byline_types::{RegisterRequest, UserProfile};
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, StoreError};
use crate::http::{self, ApiClient, AuthEvent, Body};
use crate::validate;

/// Observable authentication state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    pub loading: bool,
    /// True once the first session check (or login attempt) has completed,
    /// success or failure. Never reverts.
    pub initialized: bool,
    pub error: Option<StoreError>,
}

/// Holds authentication state and exposes the session operations.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: ApiClient,
    state: Mutex<SessionState>,
    /// Gates `check_session` so concurrent duplicates collapse into one
    /// request.
    check_gate: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(client: ApiClient) -> Self {
        let inner = Arc::new(SessionInner {
            client: client.clone(),
            state: Mutex::new(SessionState::default()),
            check_gate: tokio::sync::Mutex::new(()),
        });

        // The transport clears credentials on a detected block; the session
        // must drop its local identity at the same moment.
        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        client.on_auth_event(move |event| {
            if event == AuthEvent::AccountBlocked
                && let Some(inner) = weak.upgrade()
            {
                let mut state = inner.state.lock().expect("session state poisoned");
                state.user = None;
                state.is_authenticated = false;
            }
        });

        Self { inner }
    }

    /// Returns a copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.lock().expect("session state poisoned").clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.inner.state.lock().expect("session state poisoned");
        f(&mut state)
    }

    /// Authenticates with the server and populates the session.
    ///
    /// Bad input is rejected locally and never dispatched. A blocked account
    /// surfaces as the distinguished [`ApiError::BlockedAccount`].
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, ApiError> {
        validate::login(username, password)?;

        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .post(
                "/auth/login/",
                Body::Json(json!({ "username": username.trim(), "password": password })),
            )
            .await
            .and_then(|mut value| {
                let user = value
                    .get_mut("user")
                    .map(serde_json::Value::take)
                    .unwrap_or(serde_json::Value::Null);
                http::decode::<UserProfile>(user)
            });

        match result {
            Ok(user) => {
                debug!(username = %user.username, "login succeeded");
                self.inner.client.reset_blocked_latch();
                self.update(|state| {
                    state.loading = false;
                    state.is_authenticated = true;
                    state.user = Some(user.clone());
                    state.initialized = true;
                });
                Ok(user)
            }
            Err(err) => {
                self.update(|state| {
                    state.loading = false;
                    state.error = Some(StoreError::from(&err));
                    state.initialized = true;
                });
                Err(err)
            }
        }
    }

    /// Creates an account. Does not authenticate the session; the caller
    /// proceeds to login separately. Server field errors surface as
    /// [`ApiError::Fields`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        validate::register(request)?;
        let payload = serde_json::to_value(request)
            .map_err(|err| ApiError::transport(format!("failed to encode registration: {err}")))?;

        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self.inner.client.post("/auth/register/", Body::Json(payload)).await;

        match result {
            Ok(_) => {
                self.update(|state| state.loading = false);
                Ok(())
            }
            Err(err) => {
                self.update(|state| {
                    state.loading = false;
                    state.error = Some(StoreError::from(&err));
                });
                Err(err)
            }
        }
    }

    /// Invalidates the server-side session, then unconditionally clears
    /// local state and credentials: the local session must never remain
    /// falsely authenticated, even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .inner
            .client
            .post("/auth/logout/", Body::Empty)
            .await
            .map(|_| ());

        if let Err(err) = self.inner.client.credentials().clear_all() {
            tracing::warn!("failed to clear credentials on logout: {err:#}");
        }
        self.update(|state| {
            state.user = None;
            state.is_authenticated = false;
            state.initialized = true;
        });

        result
    }

    /// Queries the current identity. Idempotent; safe to call repeatedly.
    /// Concurrent duplicates are suppressed: a caller that finds a check in
    /// flight waits for it to finish and reuses its outcome.
    pub async fn check_session(&self) -> Result<(), ApiError> {
        let _guard = match self.inner.check_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _wait = self.inner.check_gate.lock().await;
                return Ok(());
            }
        };

        self.update(|state| state.loading = true);

        let result = self
            .inner
            .client
            .get("/auth/me/")
            .await
            .and_then(http::decode::<UserProfile>);

        match result {
            Ok(user) => {
                self.update(|state| {
                    state.loading = false;
                    state.is_authenticated = true;
                    state.user = Some(user);
                    state.initialized = true;
                });
                Ok(())
            }
            Err(err) => {
                self.update(|state| {
                    state.loading = false;
                    state.is_authenticated = false;
                    state.user = None;
                    state.initialized = true;
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;

    fn store() -> SessionStore {
        let dir = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::open(dir.path().join("credentials.json")).unwrap();
        SessionStore::new(ApiClient::new("http://127.0.0.1:9", credentials).unwrap())
    }

    /// Test: local validation failures never mark the session initialized.
    #[tokio::test]
    async fn test_local_rejection_leaves_state_untouched() {
        let session = store();
        let err = session.login("ab", "x").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));

        let state = session.snapshot();
        assert!(!state.initialized);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    /// Test: default state is uninitialized and anonymous.
    #[test]
    fn test_default_state() {
        let state = store().snapshot();
        assert!(state.user.is_none());
        assert!(!state.is_authenticated);
        assert!(!state.initialized);
    }
}
