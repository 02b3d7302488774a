//! CLI command handlers.

pub mod auth;
pub mod moderation;
pub mod posts;
pub mod users;

use anyhow::{Context, Result, bail};
use byline_client::http::ApiClient;
use byline_client::session::SessionStore;
use byline_types::UserProfile;

/// Runs the startup session check and returns the authenticated user.
pub(crate) async fn require_user(client: &ApiClient) -> Result<UserProfile> {
    let session = SessionStore::new(client.clone());
    let _ = session.check_session().await;
    match session.snapshot().user {
        Some(user) => Ok(user),
        None => bail!("Not logged in. Run 'byline login <username>' first."),
    }
}

/// Reads a password from the flag or interactively from stdin.
pub(crate) fn read_password(provided: Option<String>) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
