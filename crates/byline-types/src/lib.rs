//! Wire-format types shared by the byline client and CLI.
//!
//! Field names mirror the server's snake_case JSON. Collections the server
//! only includes on detail responses (`comments`, `likers`) are `Option` so
//! the client can tell "empty" apart from "not provided".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated user's profile, refreshed wholesale on
/// login/register/session-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_blocked: bool,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Author username.
    pub author: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub read_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    /// User ids that liked this post. Server-dependent: present only when
    /// the collaborator exposes the likers set.
    #[serde(default)]
    pub likers: Option<Vec<u64>>,
    #[serde(default)]
    pub comments_count: u64,
    /// Included on detail responses only.
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Comments visible to end users on the detail page. Unapproved
    /// comments only appear in the moderation views.
    pub fn approved_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments
            .iter()
            .flatten()
            .filter(|comment| comment.is_approved)
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    /// Id of the post this comment belongs to.
    pub post: u64,
    /// Author username.
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// The server's paginated list envelope: `{count, next, previous, results}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Fields of a post create/update submission. The optional image travels
/// separately as an [`ImageUpload`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// An image attached to a post submission. Held by value so a request can
/// be rebuilt for the single post-refresh replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Payload for account registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_json() -> serde_json::Value {
        serde_json::json!({
            "id": 7,
            "title": "Hello",
            "content": "Body",
            "author": "ada",
            "likes_count": 2,
            "comments_count": 1,
            "created_at": "2025-03-01T10:00:00Z"
        })
    }

    /// Test: detail-only collections deserialize as absent, not empty.
    #[test]
    fn test_post_optional_collections() {
        let post: Post = serde_json::from_value(post_json()).unwrap();
        assert!(post.comments.is_none());
        assert!(post.likers.is_none());
        assert_eq!(post.likes_count, 2);
        assert_eq!(post.excerpt, None);
    }

    /// Test: only approved comments are exposed to end users.
    #[test]
    fn test_approved_comments_filter() {
        let mut value = post_json();
        value["comments"] = serde_json::json!([
            {"id": 1, "post": 7, "author": "bob", "content": "ok",
             "is_approved": true, "created_at": "2025-03-01T11:00:00Z"},
            {"id": 2, "post": 7, "author": "eve", "content": "spam",
             "is_approved": false, "created_at": "2025-03-01T12:00:00Z"}
        ]);
        let post: Post = serde_json::from_value(value).unwrap();
        let visible: Vec<_> = post.approved_comments().map(|c| c.id).collect();
        assert_eq!(visible, vec![1]);
    }

    /// Test: paginated envelope round-trips with null cursors.
    #[test]
    fn test_page_envelope() {
        let page: Page<Comment> = serde_json::from_value(serde_json::json!({
            "count": 0,
            "next": null,
            "previous": null,
            "results": []
        }))
        .unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
        assert!(page.results.is_empty());
    }
}
