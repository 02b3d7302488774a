//! Comment moderation queue for the admin dashboard.
//!
//! Staff-only server-side; the client just drives the queue. Every mutating
//! request is tracked in a per-item pending set (disabled-state for the
//! view), entered before dispatch and left on both outcome arms.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use byline_types::{Comment, Page};
use futures_util::future::join_all;
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, StoreError};
use crate::http::{self, ApiClient, Body};

/// Approval filter for the moderation queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApprovalFilter {
    #[default]
    All,
    Pending,
    Approved,
}

impl ApprovalFilter {
    fn query_suffix(self) -> &'static str {
        match self {
            ApprovalFilter::All => "",
            ApprovalFilter::Pending => "&is_approved=false",
            ApprovalFilter::Approved => "&is_approved=true",
        }
    }

    fn matches(self, comment: &Comment) -> bool {
        match self {
            ApprovalFilter::All => true,
            ApprovalFilter::Pending => !comment.is_approved,
            ApprovalFilter::Approved => comment.is_approved,
        }
    }
}

/// Observable moderation state.
#[derive(Debug, Clone, Default)]
pub struct ModerationState {
    pub comments: Vec<Comment>,
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub page: u32,
    pub filter: ApprovalFilter,
    /// Comment ids with a mutating request in flight.
    pub pending: HashSet<u64>,
    pub loading: bool,
    pub error: Option<StoreError>,
}

/// Drives the comment moderation queue.
#[derive(Clone)]
pub struct ModerationStore {
    inner: Arc<ModerationInner>,
}

struct ModerationInner {
    client: ApiClient,
    state: Mutex<ModerationState>,
}

impl ModerationStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            inner: Arc::new(ModerationInner {
                client,
                state: Mutex::new(ModerationState::default()),
            }),
        }
    }

    /// Returns a copy of the current moderation state.
    pub fn snapshot(&self) -> ModerationState {
        self.inner.state.lock().expect("moderation state poisoned").clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut ModerationState) -> R) -> R {
        let mut state = self.inner.state.lock().expect("moderation state poisoned");
        f(&mut state)
    }

    /// Loads one page of the queue under a filter. Changing the filter
    /// resets to page 1.
    pub async fn fetch_comments(&self, page: u32, filter: ApprovalFilter) -> Result<(), ApiError> {
        let page = if self.update(|state| state.filter != filter) {
            1
        } else {
            page
        };

        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let path = format!("/posts/comments/?page={page}{}", filter.query_suffix());
        let result = self
            .inner
            .client
            .get(&path)
            .await
            .and_then(http::decode::<Page<Comment>>);

        match result {
            Ok(envelope) => {
                self.update(|state| {
                    state.loading = false;
                    state.comments = envelope.results;
                    state.total_count = envelope.count;
                    state.has_next = envelope.next.is_some();
                    state.has_previous = envelope.previous.is_some();
                    state.page = page;
                    state.filter = filter;
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

    /// Approves or rejects one comment. The item is updated in place; when
    /// its new status no longer matches the active filter it is removed
    /// from view and the envelope count is decremented, floored at zero.
    pub async fn set_approval(&self, comment_id: u64, approved: bool) -> Result<(), ApiError> {
        self.update(|state| {
            state.pending.insert(comment_id);
            state.error = None;
        });

        let result = self.approve_request(comment_id, approved).await;

        self.update(|state| {
            state.pending.remove(&comment_id);
            match &result {
                Ok(()) => apply_approval(state, comment_id, approved),
                Err(err) => state.error = Some(StoreError::from(err)),
            }
        });
        result
    }

    /// Permanently deletes a comment from the queue.
    pub async fn delete_comment(&self, comment_id: u64) -> Result<(), ApiError> {
        self.update(|state| {
            state.pending.insert(comment_id);
            state.error = None;
        });

        let result = self
            .inner
            .client
            .delete(&format!("/posts/comments/{comment_id}/"))
            .await;

        self.update(|state| {
            state.pending.remove(&comment_id);
            match &result {
                Ok(()) => {
                    state.comments.retain(|c| c.id != comment_id);
                    state.total_count = state.total_count.saturating_sub(1);
                }
                Err(err) => state.error = Some(StoreError::from(err)),
            }
        });
        result
    }

    /// Approves every pending comment on the current page, issuing the
    /// sub-requests concurrently.
    ///
    /// Fulfilled only when every sub-request fulfills; otherwise returns
    /// [`ApiError::Batch`] ("N of M succeeded"). Sub-requests that did
    /// succeed keep their server-side effect and are applied to local state
    /// either way — partial success is reported, never silently swallowed.
    pub async fn bulk_approve(&self) -> Result<usize, ApiError> {
        let targets: Vec<u64> = self.update(|state| {
            state.error = None;
            let ids: Vec<u64> = state
                .comments
                .iter()
                .filter(|c| !c.is_approved)
                .map(|c| c.id)
                .collect();
            state.pending.extend(ids.iter().copied());
            ids
        });
        if targets.is_empty() {
            return Ok(0);
        }

        debug!(count = targets.len(), "bulk approving pending comments");
        let outcomes = join_all(targets.iter().map(|&id| {
            let store = self.clone();
            async move { (id, store.approve_request(id, true).await) }
        }))
        .await;

        let attempted = outcomes.len();
        let mut succeeded = 0;
        self.update(|state| {
            for (id, outcome) in &outcomes {
                state.pending.remove(id);
                if outcome.is_ok() {
                    succeeded += 1;
                    apply_approval(state, *id, true);
                }
            }
        });

        if succeeded == attempted {
            Ok(succeeded)
        } else {
            let err = ApiError::Batch {
                succeeded,
                attempted,
            };
            self.update(|state| state.error = Some(StoreError::from(&err)));
            Err(err)
        }
    }

    async fn approve_request(&self, comment_id: u64, approved: bool) -> Result<(), ApiError> {
        self.inner
            .client
            .post(
                &format!("/posts/comments/{comment_id}/approve/"),
                Body::Json(json!({ "is_approved": approved })),
            )
            .await
            .map(|_| ())
    }
}

fn apply_approval(state: &mut ModerationState, comment_id: u64, approved: bool) {
    if let Some(comment) = state.comments.iter_mut().find(|c| c.id == comment_id) {
        comment.is_approved = approved;
        if !state.filter.matches(comment) {
            state.comments.retain(|c| c.id != comment_id);
            state.total_count = state.total_count.saturating_sub(1);
        }
    }
}
