//! CLI entry and dispatch.

use anyhow::{Context, Result};
use byline_client::config::{Config, paths};
use byline_client::credentials::CredentialStore;
use byline_client::http::ApiClient;
use clap::Parser;

mod commands;

use commands::moderation::ModerationCommands;
use commands::posts::PostCommands;
use commands::users::UserCommands;

#[derive(Parser)]
#[command(name = "byline")]
#[command(version)]
#[command(about = "Client for the byline blog API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with username and password
    Login {
        username: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "BYLINE_PASSWORD")]
        password: Option<String>,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show the currently authenticated user
    Whoami,

    /// Register a new account (log in separately afterwards)
    Register {
        username: String,
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },

    /// Browse and manage posts
    Posts {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Moderate comments (staff only)
    Moderation {
        #[command(subcommand)]
        command: ModerationCommands,
    },

    /// Manage user accounts (staff only)
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(dispatch(cli))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("BYLINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let client = build_client()?;

    // Blocked-account detection anywhere in the session lands back at login.
    client.on_auth_event(|_| {
        eprintln!("Your account is blocked. Please contact support.");
        eprintln!("You have been logged out; run 'byline login' to sign in again.");
    });

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&client, &username, password).await
        }
        Commands::Logout => commands::auth::logout(&client).await,
        Commands::Whoami => commands::auth::whoami(&client).await,
        Commands::Register {
            username,
            email,
            password,
            bio,
        } => commands::auth::register(&client, username, email, password, bio).await,
        Commands::Posts { command } => commands::posts::run(&client, command).await,
        Commands::Moderation { command } => commands::moderation::run(&client, command).await,
        Commands::Users { command } => commands::users::run(&client, command).await,
    }
}

fn build_client() -> Result<ApiClient> {
    let config = Config::load()?;
    let credentials = CredentialStore::open(paths::credentials_path())?;
    ApiClient::with_timeout(
        &config.resolve_base_url()?,
        credentials,
        config.request_timeout_secs,
    )
}
