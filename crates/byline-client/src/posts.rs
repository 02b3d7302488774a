//! Content store: post list/detail, comments and likes.
//!
//! State mutations are optimistic where the original contract allows it
//! (prepend on create, counter bumps on comment/like) and always applied
//! only after the server acknowledged the mutation; a rejected operation
//! never partially mutates in-memory entities. Optimistic counters are a
//! display hint; [`reconcile`] recomputes them from the authoritative
//! collections on every full-post fetch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use byline_types::{Comment, ImageUpload, Post, PostDraft, UserProfile};
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, StoreError};
use crate::http::{self, ApiClient, Body, MultipartBody};
use crate::validate;

/// Expected page size when the server omits pagination metadata.
pub const PAGE_SIZE: usize = 10;

/// Pagination facts for the currently loaded page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub total_count: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Observable content state.
#[derive(Debug, Clone, Default)]
pub struct PostsState {
    /// The currently loaded page of posts, newest first.
    pub posts: Vec<Post>,
    pub page: PageInfo,
    /// The "current post" detail slot.
    pub current: Option<Post>,
    pub loading: bool,
    pub update_in_flight: bool,
    pub delete_in_flight: bool,
    pub comment_in_flight: bool,
    pub error: Option<StoreError>,
    /// Post ids the user liked in this session. Consulted only when the
    /// server does not expose a `likers` set; not persisted across restarts.
    pub liked_locally: HashSet<u64>,
}

/// Holds post/comment/like state and exposes the content operations.
#[derive(Clone)]
pub struct PostStore {
    inner: Arc<PostInner>,
}

struct PostInner {
    client: ApiClient,
    state: Mutex<PostsState>,
}

impl PostStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            inner: Arc::new(PostInner {
                client,
                state: Mutex::new(PostsState::default()),
            }),
        }
    }

    /// Returns a copy of the current content state.
    pub fn snapshot(&self) -> PostsState {
        self.inner.state.lock().expect("post state poisoned").clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut PostsState) -> R) -> R {
        let mut state = self.inner.state.lock().expect("post state poisoned");
        f(&mut state)
    }

    fn fail(&self, err: &ApiError, clear: impl FnOnce(&mut PostsState)) {
        self.update(|state| {
            clear(state);
            state.error = Some(StoreError::from(err));
        });
    }

    /// Loads one page of posts, replacing the current list wholesale.
    ///
    /// Overlapping fetches are not sequenced: the last to resolve wins,
    /// even if it was dispatched first.
    pub async fn fetch_posts(&self, page: u32) -> Result<Vec<Post>, ApiError> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .get(&format!("/posts/?page={page}"))
            .await
            .and_then(|value| decode_page(value, page));

        match result {
            Ok((posts, info)) => {
                self.update(|state| {
                    state.loading = false;
                    state.posts = posts.clone();
                    state.page = info;
                });
                Ok(posts)
            }
            Err(err) => {
                self.fail(&err, |state| state.loading = false);
                Err(err)
            }
        }
    }

    /// Loads one post into the current-post slot.
    ///
    /// `increment_view` controls whether the server counts this view toward
    /// `read_count`; the client never bumps it on its own.
    pub async fn fetch_post(&self, id: u64, increment_view: bool) -> Result<Post, ApiError> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let path = if increment_view {
            format!("/posts/{id}/?increment_view=true")
        } else {
            format!("/posts/{id}/")
        };
        let result = self
            .inner
            .client
            .get(&path)
            .await
            .and_then(http::decode::<Post>);

        match result {
            Ok(mut post) => {
                reconcile(&mut post);
                self.update(|state| {
                    state.loading = false;
                    state.current = Some(post.clone());
                });
                Ok(post)
            }
            Err(err) => {
                self.fail(&err, |state| state.loading = false);
                Err(err)
            }
        }
    }

    /// Creates a post; multipart when an image is attached. On success the
    /// new post is prepended to the in-memory list (newest first) without a
    /// re-fetch.
    pub async fn create_post(
        &self,
        draft: &PostDraft,
        image: Option<ImageUpload>,
    ) -> Result<Post, ApiError> {
        let body = draft_body(draft, image)?;
        self.update(|state| state.error = None);

        let result = self
            .inner
            .client
            .post("/posts/", body)
            .await
            .and_then(http::decode::<Post>);

        match result {
            Ok(post) => {
                debug!(id = post.id, "post created");
                self.update(|state| state.posts.insert(0, post.clone()));
                Ok(post)
            }
            Err(err) => {
                self.fail(&err, |_| {});
                Err(err)
            }
        }
    }

    /// Updates a post. On success the matching entry is replaced both in the
    /// list and in the current-post slot; on failure neither is touched.
    pub async fn update_post(
        &self,
        id: u64,
        draft: &PostDraft,
        image: Option<ImageUpload>,
    ) -> Result<Post, ApiError> {
        let body = draft_body(draft, image)?;
        self.update(|state| {
            state.update_in_flight = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .put(&format!("/posts/{id}/"), body)
            .await
            .and_then(http::decode::<Post>);

        match result {
            Ok(post) => {
                self.update(|state| {
                    state.update_in_flight = false;
                    if let Some(entry) = state.posts.iter_mut().find(|p| p.id == post.id) {
                        *entry = post.clone();
                    }
                    if state.current.as_ref().is_some_and(|c| c.id == post.id) {
                        state.current = Some(post.clone());
                    }
                });
                Ok(post)
            }
            Err(err) => {
                self.fail(&err, |state| state.update_in_flight = false);
                Err(err)
            }
        }
    }

    /// Deletes a post, removing it from the list and clearing the
    /// current-post slot when it matches. Authorization is the server's
    /// call; see [`can_modify`] for the UX courtesy check.
    pub async fn delete_post(&self, id: u64) -> Result<(), ApiError> {
        self.update(|state| {
            state.delete_in_flight = true;
            state.error = None;
        });

        match self.inner.client.delete(&format!("/posts/{id}/")).await {
            Ok(()) => {
                self.update(|state| {
                    state.delete_in_flight = false;
                    state.posts.retain(|p| p.id != id);
                    if state.current.as_ref().is_some_and(|c| c.id == id) {
                        state.current = None;
                    }
                });
                Ok(())
            }
            Err(err) => {
                self.fail(&err, |state| state.delete_in_flight = false);
                Err(err)
            }
        }
    }

    /// Submits a comment. On success the current post's `comments_count` is
    /// bumped locally; the paged list's cached copy of the post is not
    /// retroactively updated — callers needing consistency re-fetch.
    pub async fn create_comment(&self, post_id: u64, content: &str) -> Result<Comment, ApiError> {
        validate::comment(content)?;

        self.update(|state| {
            state.comment_in_flight = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .post(
                "/posts/comments/",
                Body::Json(json!({ "post": post_id, "content": content.trim() })),
            )
            .await
            .and_then(http::decode::<Comment>);

        match result {
            Ok(comment) => {
                self.update(|state| {
                    state.comment_in_flight = false;
                    if let Some(current) = state.current.as_mut()
                        && current.id == comment.post
                    {
                        current.comments_count += 1;
                    }
                });
                Ok(comment)
            }
            Err(err) => {
                self.fail(&err, |state| state.comment_in_flight = false);
                Err(err)
            }
        }
    }

    /// Edits a comment, replacing the matching comment object in the
    /// current-post comment list and in the paged list entry when present.
    pub async fn update_comment(
        &self,
        comment_id: u64,
        content: &str,
        post_id: u64,
    ) -> Result<Comment, ApiError> {
        validate::comment(content)?;

        self.update(|state| {
            state.comment_in_flight = true;
            state.error = None;
        });

        let result = self
            .inner
            .client
            .put(
                &format!("/posts/comments/{comment_id}/"),
                Body::Json(json!({ "content": content.trim() })),
            )
            .await
            .and_then(http::decode::<Comment>);

        match result {
            Ok(updated) => {
                self.update(|state| {
                    state.comment_in_flight = false;
                    if let Some(current) = state.current.as_mut()
                        && current.id == post_id
                    {
                        replace_comment(current, &updated);
                    }
                    if let Some(entry) = state.posts.iter_mut().find(|p| p.id == post_id) {
                        replace_comment(entry, &updated);
                    }
                });
                Ok(updated)
            }
            Err(err) => {
                self.fail(&err, |state| state.comment_in_flight = false);
                Err(err)
            }
        }
    }

    /// Deletes a comment from both cached locations, decrementing
    /// `comments_count` floored at zero.
    pub async fn delete_comment(&self, comment_id: u64, post_id: u64) -> Result<(), ApiError> {
        self.update(|state| {
            state.comment_in_flight = true;
            state.error = None;
        });

        match self
            .inner
            .client
            .delete(&format!("/posts/comments/{comment_id}/"))
            .await
        {
            Ok(()) => {
                self.update(|state| {
                    state.comment_in_flight = false;
                    if let Some(current) = state.current.as_mut()
                        && current.id == post_id
                    {
                        remove_comment(current, comment_id);
                    }
                    if let Some(entry) = state.posts.iter_mut().find(|p| p.id == post_id) {
                        remove_comment(entry, comment_id);
                    }
                });
                Ok(())
            }
            Err(err) => {
                self.fail(&err, |state| state.comment_in_flight = false);
                Err(err)
            }
        }
    }

    /// Fires a like/unlike request; on success adjusts the current post's
    /// `likes_count` by one, floored at zero, without waiting for a
    /// re-fetch, and records the toggle in the session-local liked set.
    pub async fn toggle_like(&self, post_id: u64, is_like: bool) -> Result<(), ApiError> {
        self.update(|state| state.error = None);

        let result = self
            .inner
            .client
            .post(
                &format!("/posts/{post_id}/like/"),
                Body::Json(json!({ "is_like": is_like })),
            )
            .await;

        match result {
            Ok(_) => {
                self.update(|state| {
                    if let Some(current) = state.current.as_mut()
                        && current.id == post_id
                    {
                        current.likes_count = if is_like {
                            current.likes_count + 1
                        } else {
                            current.likes_count.saturating_sub(1)
                        };
                    }
                    if is_like {
                        state.liked_locally.insert(post_id);
                    } else {
                        state.liked_locally.remove(&post_id);
                    }
                });
                Ok(())
            }
            Err(err) => {
                self.fail(&err, |_| {});
                Err(err)
            }
        }
    }

    /// Whether the given user has liked a post.
    ///
    /// Capability-gated: when the server exposes a `likers` set it is
    /// trusted exclusively; otherwise the session-local toggle record
    /// answers (and like-state does not survive a restart).
    pub fn has_liked(&self, post: &Post, user: &UserProfile) -> bool {
        match &post.likers {
            Some(likers) => likers.contains(&user.id),
            None => self.update(|state| state.liked_locally.contains(&post.id)),
        }
    }
}

/// UX courtesy check for edit/delete controls: author or staff. The server
/// remains the security boundary.
pub fn can_modify(post: &Post, user: &UserProfile) -> bool {
    user.is_staff || post.author == user.username
}

/// Recomputes derived counts from the authoritative collections when they
/// are present. Invoked on every full-post fetch.
pub fn reconcile(post: &mut Post) {
    if let Some(likers) = &post.likers {
        post.likes_count = likers.len() as u64;
    }
    if let Some(comments) = &post.comments {
        post.comments_count = comments.len() as u64;
    }
}

fn replace_comment(post: &mut Post, updated: &Comment) {
    if let Some(comments) = post.comments.as_mut()
        && let Some(entry) = comments.iter_mut().find(|c| c.id == updated.id)
    {
        *entry = updated.clone();
    }
}

fn remove_comment(post: &mut Post, comment_id: u64) {
    if let Some(comments) = post.comments.as_mut() {
        comments.retain(|c| c.id != comment_id);
    }
    post.comments_count = post.comments_count.saturating_sub(1);
}

/// Multipart when an image travels with the draft, plain JSON otherwise.
fn draft_body(draft: &PostDraft, image: Option<ImageUpload>) -> Result<Body, ApiError> {
    if image.is_none() {
        let payload = serde_json::to_value(draft)
            .map_err(|err| ApiError::transport(format!("failed to encode post draft: {err}")))?;
        return Ok(Body::Json(payload));
    }

    let mut fields = vec![
        ("title".to_string(), draft.title.clone()),
        ("content".to_string(), draft.content.clone()),
    ];
    if let Some(excerpt) = &draft.excerpt {
        fields.push(("excerpt".to_string(), excerpt.clone()));
    }
    Ok(Body::Multipart(MultipartBody { fields, image }))
}

/// Decodes either the standard paginated envelope or a bare results array.
/// With the envelope, cursors decide `has_next`/`has_previous`; without it
/// they are inferred from the page size.
fn decode_page(value: serde_json::Value, page: u32) -> Result<(Vec<Post>, PageInfo), ApiError> {
    if value.is_array() {
        let posts: Vec<Post> = http::decode(value)?;
        let info = PageInfo {
            total_count: posts.len() as u64,
            has_next: posts.len() == PAGE_SIZE,
            has_previous: page > 1,
        };
        return Ok((posts, info));
    }

    let envelope: byline_types::Page<Post> = http::decode(value)?;
    let info = PageInfo {
        total_count: envelope.count,
        has_next: envelope.next.is_some(),
        has_previous: envelope.previous.is_some(),
    };
    Ok((envelope.results, info))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_post(id: u64) -> Post {
        serde_json::from_value(json!({
            "id": id,
            "title": "T",
            "content": "C",
            "author": "ada",
            "likes_count": 3,
            "comments_count": 2,
            "created_at": "2025-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    /// Test: reconciliation trusts the collections when present.
    #[test]
    fn test_reconcile_recomputes_counts() {
        let mut post = sample_post(1);
        post.likers = Some(vec![10, 11, 12, 13]);
        post.comments = Some(vec![]);
        reconcile(&mut post);
        assert_eq!(post.likes_count, 4);
        assert_eq!(post.comments_count, 0);

        // Without the collections the optimistic counters stand.
        let mut post = sample_post(1);
        reconcile(&mut post);
        assert_eq!(post.likes_count, 3);
        assert_eq!(post.comments_count, 2);
    }

    /// Test: envelope cursors decide pagination flags.
    #[test]
    fn test_decode_page_envelope() {
        let value = json!({
            "count": 23,
            "next": "http://x/posts/?page=3",
            "previous": "http://x/posts/?page=1",
            "results": [sample_post(1)]
        });
        let (posts, info) = decode_page(value, 2).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(info.total_count, 23);
        assert!(info.has_next);
        assert!(info.has_previous);
    }

    /// Test: bare arrays infer pagination from the page size.
    #[test]
    fn test_decode_page_bare_array() {
        let full: Vec<_> = (1..=10).map(sample_post).collect();
        let (_, info) = decode_page(serde_json::to_value(&full).unwrap(), 1).unwrap();
        assert!(info.has_next);
        assert!(!info.has_previous);

        let short: Vec<_> = (1..=3).map(sample_post).collect();
        let (_, info) = decode_page(serde_json::to_value(&short).unwrap(), 2).unwrap();
        assert!(!info.has_next);
        assert!(info.has_previous);
    }

    /// Test: author and staff may modify; others may not.
    #[test]
    fn test_can_modify() {
        let post = sample_post(1);
        let author: UserProfile = serde_json::from_value(json!({
            "id": 1, "username": "ada", "email": "a@x.io"
        }))
        .unwrap();
        let staff: UserProfile = serde_json::from_value(json!({
            "id": 2, "username": "mod", "email": "m@x.io", "is_staff": true
        }))
        .unwrap();
        let stranger: UserProfile = serde_json::from_value(json!({
            "id": 3, "username": "bob", "email": "b@x.io"
        }))
        .unwrap();

        assert!(can_modify(&post, &author));
        assert!(can_modify(&post, &staff));
        assert!(!can_modify(&post, &stranger));
    }

    /// Test: comment removal floors the counter at zero.
    #[test]
    fn test_remove_comment_floor() {
        let mut post = sample_post(1);
        post.comments_count = 0;
        remove_comment(&mut post, 99);
        assert_eq!(post.comments_count, 0);
    }
}
