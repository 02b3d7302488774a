//! Authentication command handlers.

use anyhow::Result;
use byline_client::error::ApiError;
use byline_client::http::ApiClient;
use byline_client::session::SessionStore;
use byline_types::RegisterRequest;

use super::read_password;

pub async fn login(client: &ApiClient, username: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let session = SessionStore::new(client.clone());

    match session.login(username, &password).await {
        Ok(user) => {
            println!("Logged in as {}.", user.username);
            Ok(())
        }
        Err(ApiError::BlockedAccount) => {
            // The forced-logout notice already printed via the auth event.
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    let session = SessionStore::new(client.clone());
    // Local state is cleared even when the server call fails.
    match session.logout().await {
        Ok(()) => println!("Logged out."),
        Err(err) => println!("Logged out locally (server said: {err})."),
    }
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    let session = SessionStore::new(client.clone());
    let _ = session.check_session().await;

    let state = session.snapshot();
    match state.user {
        Some(user) => {
            let mut roles = Vec::new();
            if user.is_superuser {
                roles.push("superuser");
            }
            if user.is_staff {
                roles.push("staff");
            }
            let suffix = if roles.is_empty() {
                String::new()
            } else {
                format!(" [{}]", roles.join(", "))
            };
            println!("{} <{}>{suffix}", user.username, user.email);
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    username: String,
    email: String,
    password: Option<String>,
    bio: Option<String>,
) -> Result<()> {
    let password = read_password(password)?;
    let session = SessionStore::new(client.clone());
    let request = RegisterRequest {
        username,
        email,
        password,
        bio,
    };

    match session.register(&request).await {
        Ok(()) => {
            println!("Account created. Run 'byline login {}' to sign in.", request.username);
            Ok(())
        }
        Err(ApiError::Fields(fields)) => {
            eprintln!("Registration was rejected:");
            for field in &fields {
                eprintln!("  {}: {}", field.field, field.message);
            }
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
