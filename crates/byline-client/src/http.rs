//! Single choke point for API requests.
//!
//! Every store talks to the server through [`ApiClient`], which attaches the
//! bearer credential, mirrors stored cookies onto outgoing requests, captures
//! `Set-Cookie` rotations, and runs the auth recovery state machine:
//!
//! `SENT -> OK` |
//! `SENT -> AUTH_FAILED -> REFRESHING -> RETRIED -> (OK | FAILED)` |
//! `SENT -> BLOCKED -> LOGGED_OUT`
//!
//! Exactly one replay is permitted per original request; the attempt counter
//! is explicit and capped, never a mutable flag on shared request state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use byline_types::ImageUpload;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::{self, ACCESS_TOKEN, CredentialStore, REFRESH_TOKEN};
use crate::error::{self, ApiError};

/// Token rotation endpoint. Requests to it are never themselves retried.
pub const REFRESH_PATH: &str = "/token/refresh/";

/// Session-level notifications emitted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The server reported the account as blocked; credentials were cleared
    /// and the consumer must return to the login entry point.
    AccountBlocked,
}

type AuthListener = Box<dyn Fn(AuthEvent) + Send + Sync>;

/// Request body shapes. Multipart bodies are described by value so the
/// post-refresh replay can rebuild the form.
pub(crate) enum Body {
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

pub(crate) struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub image: Option<ImageUpload>,
}

impl MultipartBody {
    fn to_form(&self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        if let Some(image) = &self.image {
            let part = reqwest::multipart::Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type)
                .map_err(|_| {
                    ApiError::transport(format!("invalid image content type: {}", image.mime_type))
                })?;
            form = form.part("image", part);
        }
        Ok(form)
    }
}

/// API client shared by every store of one running client instance.
///
/// Cheap to clone; clones share credentials and the blocked-account latch.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    listeners: Mutex<Vec<AuthListener>>,
    blocked_notified: AtomicBool,
}

impl ApiClient {
    /// Creates a client for `base_url` with a default 30s request timeout.
    pub fn new(base_url: &str, credentials: CredentialStore) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, credentials, 30)
    }

    /// Creates a client with an explicit request timeout (0 disables).
    pub fn with_timeout(
        base_url: &str,
        credentials: CredentialStore,
        timeout_secs: u32,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;
        url::Url::parse(base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;

        let mut builder = reqwest::Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(u64::from(timeout_secs)));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                credentials,
                listeners: Mutex::new(Vec::new()),
                blocked_notified: AtomicBool::new(false),
            }),
        })
    }

    /// The credential store this client reads and rotates.
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Registers a listener for session-level notifications. The blocked
    /// notification fires at most once per authenticated session, no matter
    /// how many concurrent requests observe the block.
    pub fn on_auth_event(&self, listener: impl Fn(AuthEvent) + Send + Sync + 'static) {
        let mut listeners = self.inner.listeners.lock().expect("listener list poisoned");
        listeners.push(Box::new(listener));
    }

    /// Re-arms the blocked-account latch after a fresh login.
    pub(crate) fn reset_blocked_latch(&self) {
        self.inner.blocked_notified.store(false, Ordering::SeqCst);
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, &Body::Empty).await
    }

    pub(crate) async fn post(&self, path: &str, body: Body) -> Result<Value, ApiError> {
        self.request(Method::POST, path, &body).await
    }

    pub(crate) async fn put(&self, path: &str, body: Body) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, &body).await
    }

    pub(crate) async fn patch(&self, path: &str, body: Body) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, &body).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, path, &Body::Empty).await?;
        Ok(())
    }

    /// Sends a request, running the 401-refresh / 403-blocked interception.
    async fn request(&self, method: Method, path: &str, body: &Body) -> Result<Value, ApiError> {
        // Explicit per-request attempt counter, capped at one replay.
        let mut attempt: u8 = 0;
        loop {
            let response = self.dispatch(method.clone(), path, body).await?;
            self.capture_cookies(response.headers());

            let status = response.status();
            if status.is_success() {
                return read_json(response).await;
            }

            let payload = read_error_payload(response).await;

            if status == StatusCode::FORBIDDEN && error::is_blocked_payload(&payload) {
                self.force_logout();
                return Err(ApiError::BlockedAccount);
            }

            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                attempt = 1;
                if self.inner.credentials.get(REFRESH_TOKEN).is_none() {
                    debug!(path, "401 with no refresh token, propagating");
                    return Err(ApiError::from_response(status.as_u16(), &payload));
                }
                // Refresh failures propagate instead of the original 401.
                self.refresh_session().await?;
                debug!(path, "replaying request with refreshed credentials");
                continue;
            }

            return Err(ApiError::from_response(status.as_u16(), &payload));
        }
    }

    /// Builds and sends one attempt. Bearer header from the stored access
    /// token when present; stored cookies mirrored onto the request so the
    /// server can also honor them directly.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: &Body,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{path}", self.inner.base_url);
        let mut builder = self.inner.http.request(method, &url);

        if let Some(token) = self.inner.credentials.get(ACCESS_TOKEN) {
            builder = builder.bearer_auth(token);
        }
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }

        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(multipart) => builder.multipart(multipart.to_form()?),
        };

        debug!(%url, "dispatching API request");
        Ok(builder.send().await?)
    }

    /// Calls the rotation endpoint with the stored credentials. New tokens
    /// arrive through `Set-Cookie` and are captured into the store.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        debug!("access token rejected, attempting silent refresh");
        let url = format!("{}{REFRESH_PATH}", self.inner.base_url);
        let mut builder = self.inner.http.post(&url).json(&Value::Object(Default::default()));
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }

        let response = builder.send().await?;
        self.capture_cookies(response.headers());

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let payload = read_error_payload(response).await;
        warn!(status = status.as_u16(), "token refresh failed");
        Err(ApiError::from_response(status.as_u16(), &payload))
    }

    /// `Cookie:` header mirroring every stored credential.
    fn cookie_header(&self) -> Option<String> {
        let mut pairs = Vec::new();
        for name in [ACCESS_TOKEN, REFRESH_TOKEN] {
            if let Some(value) = self.inner.credentials.get(name) {
                pairs.push(format!("{name}={value}"));
            }
        }
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Captures `Set-Cookie` rotations into the credential store. An empty
    /// value or `Max-Age=0` clears the entry.
    fn capture_cookies(&self, headers: &HeaderMap) {
        for raw in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            let Some(cookie) = parse_set_cookie(raw) else {
                continue;
            };
            let result = if cookie.value.is_empty() || cookie.expires == Some(0) {
                self.inner.credentials.clear(&cookie.name)
            } else {
                self.inner
                    .credentials
                    .set(&cookie.name, &cookie.value, cookie.expires)
            };
            // A persistence failure must not fail the request; the in-memory
            // token state is already current.
            if let Err(err) = result {
                warn!("failed to persist credential {}: {err:#}", cookie.name);
            }
        }
    }

    /// Blocked-account path: clear credentials, notify listeners once.
    fn force_logout(&self) {
        if let Err(err) = self.inner.credentials.clear_all() {
            warn!("failed to clear credentials on forced logout: {err:#}");
        }
        if !self.inner.blocked_notified.swap(true, Ordering::SeqCst) {
            warn!("account blocked by server, forcing logout");
            let listeners = self.inner.listeners.lock().expect("listener list poisoned");
            for listener in listeners.iter() {
                listener(AuthEvent::AccountBlocked);
            }
        }
    }
}

/// Reads a success body as JSON; empty bodies (204) decode to `Null`.
async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|err| ApiError::transport(format!("failed to decode response body: {err}")))
}

/// Reads an error body, tolerating non-JSON payloads.
async fn read_error_payload(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::Null)
}

/// Decodes a JSON value into a typed wire struct.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::transport(format!("unexpected response shape: {err}")))
}

struct ParsedCookie {
    name: String,
    value: String,
    /// Absolute expiry in milliseconds since epoch; `Some(0)` marks deletion.
    expires: Option<u64>,
}

/// Parses the name/value pair and expiry attributes of a `Set-Cookie` line.
fn parse_set_cookie(raw: &str) -> Option<ParsedCookie> {
    let mut segments = raw.split(';');
    let (name, value) = segments.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut expires = None;
    for segment in segments {
        let (key, attr) = match segment.split_once('=') {
            Some((key, attr)) => (key.trim(), attr.trim()),
            None => (segment.trim(), ""),
        };
        if key.eq_ignore_ascii_case("max-age") {
            if let Ok(secs) = attr.parse::<i64>() {
                expires = Some(if secs <= 0 {
                    0
                } else {
                    credentials::now_millis().saturating_add(secs.unsigned_abs() * 1000)
                });
            }
        } else if key.eq_ignore_ascii_case("expires") && expires.is_none() {
            // Cookie dates are RFC 2822 with optional dashes.
            let normalized = attr.replace('-', " ");
            if let Ok(when) = chrono::DateTime::parse_from_rfc2822(&normalized) {
                let millis = when.timestamp_millis();
                expires = Some(if millis <= 0 { 0 } else { millis.unsigned_abs() });
            }
        }
    }

    Some(ParsedCookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        expires,
    })
}
