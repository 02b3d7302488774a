//! Core byline library: credentials, transport, session and content stores.

pub mod admin;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod moderation;
pub mod posts;
pub mod session;
pub mod validate;

pub use error::{ApiError, FieldError, StoreError};
pub use http::{ApiClient, AuthEvent};
