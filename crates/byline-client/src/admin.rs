//! User administration for the admin dashboard.
//!
//! Listing, staff/blocked toggles and deletion. The server enforces the
//! staff requirement and every authorization rule; the only client-side
//! refusal is the courtesy guard against acting on one's own account.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use byline_types::{Page, UserProfile};
use serde_json::json;

use crate::error::{ApiError, StoreError};
use crate::http::{self, ApiClient, Body};

/// Observable user-administration state.
#[derive(Debug, Clone, Default)]
pub struct DirectoryState {
    pub users: Vec<UserProfile>,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub page: u32,
    /// User ids with a mutating request in flight.
    pub pending: HashSet<u64>,
    pub loading: bool,
    pub error: Option<StoreError>,
}

/// Drives the user administration views.
#[derive(Clone)]
pub struct UserDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    client: ApiClient,
    state: Mutex<DirectoryState>,
}

impl UserDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                client,
                state: Mutex::new(DirectoryState::default()),
            }),
        }
    }

    /// Returns a copy of the current directory state.
    pub fn snapshot(&self) -> DirectoryState {
        self.inner.state.lock().expect("directory state poisoned").clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut DirectoryState) -> R) -> R {
        let mut state = self.inner.state.lock().expect("directory state poisoned");
        f(&mut state)
    }

    /// Loads one page of users.
    pub async fn fetch_users(&self, page: u32) -> Result<(), ApiError> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .get(&format!("/auth/users/?page={page}"))
            .await
            .and_then(http::decode::<Page<UserProfile>>);

        match result {
            Ok(envelope) => {
                self.update(|state| {
                    state.loading = false;
                    state.users = envelope.results;
                    state.total_count = envelope.count;
                    state.has_next = envelope.next.is_some();
                    state.has_previous = envelope.previous.is_some();
                    state.page = page;
                });
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

    /// Grants or revokes staff status.
    pub async fn set_staff(&self, user_id: u64, is_staff: bool) -> Result<(), ApiError> {
        self.patch_user(user_id, json!({ "is_staff": is_staff }), move |user| {
            user.is_staff = is_staff;
        })
        .await
    }

    /// Blocks or unblocks an account. Acting on one's own account is
    /// refused locally.
    pub async fn set_blocked(
        &self,
        user_id: u64,
        is_blocked: bool,
        acting_user_id: u64,
    ) -> Result<(), ApiError> {
        if user_id == acting_user_id {
            return Err(ApiError::validation("user", "You cannot block your own account"));
        }
        self.patch_user(user_id, json!({ "is_blocked": is_blocked }), move |user| {
            user.is_blocked = is_blocked;
        })
        .await
    }

    /// Permanently deletes an account. Acting on one's own account is
    /// refused locally.
    pub async fn delete_user(&self, user_id: u64, acting_user_id: u64) -> Result<(), ApiError> {
        if user_id == acting_user_id {
            return Err(ApiError::validation("user", "You cannot delete your own account"));
        }

        self.update(|state| {
            state.pending.insert(user_id);
            state.error = None;
        });

        let result = self
            .inner
            .client
            .delete(&format!("/auth/users/{user_id}/"))
            .await;

        self.update(|state| {
            state.pending.remove(&user_id);
            match &result {
                Ok(()) => {
                    state.users.retain(|u| u.id != user_id);
                    state.total_count = state.total_count.saturating_sub(1);
                }
                Err(err) => state.error = Some(StoreError::from(err)),
            }
        });
        result
    }

    async fn patch_user(
        &self,
        user_id: u64,
        payload: serde_json::Value,
        apply: impl FnOnce(&mut UserProfile),
    ) -> Result<(), ApiError> {
        self.update(|state| {
            state.pending.insert(user_id);
            state.error = None;
        });

        let result = self
            .inner
            .client
            .patch(&format!("/auth/users/{user_id}/"), Body::Json(payload))
            .await
            .map(|_| ());

        self.update(|state| {
            state.pending.remove(&user_id);
            match &result {
                Ok(()) => {
                    if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
                        apply(user);
                    }
                }
                Err(err) => state.error = Some(StoreError::from(err)),
            }
        });
        result
    }
}
