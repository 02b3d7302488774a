//! User administration command handlers.

use anyhow::Result;
use byline_client::admin::UserDirectory;
use byline_client::http::ApiClient;

#[derive(clap::Subcommand)]
pub enum UserCommands {
    /// List user accounts
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Block an account
    Block { id: u64 },
    /// Unblock an account
    Unblock { id: u64 },
    /// Grant staff status
    Staff { id: u64 },
    /// Revoke staff status
    Unstaff { id: u64 },
    /// Delete an account permanently
    Delete { id: u64 },
}

pub async fn run(client: &ApiClient, command: UserCommands) -> Result<()> {
    let me = super::require_user(client).await?;
    let directory = UserDirectory::new(client.clone());

    match command {
        UserCommands::List { page } => {
            directory.fetch_users(page).await?;
            let state = directory.snapshot();
            if state.users.is_empty() {
                println!("No users found.");
                return Ok(());
            }
            for user in &state.users {
                let mut badges = Vec::new();
                if user.is_superuser {
                    badges.push("superuser");
                }
                if user.is_staff {
                    badges.push("staff");
                }
                if user.is_blocked {
                    badges.push("blocked");
                }
                let suffix = if badges.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", badges.join(", "))
                };
                println!("#{:<5} {} <{}>{suffix}", user.id, user.username, user.email);
            }
            println!("{} users total.", state.total_count);
            Ok(())
        }
        UserCommands::Block { id } => {
            directory.set_blocked(id, true, me.id).await?;
            println!("User #{id} blocked.");
            Ok(())
        }
        UserCommands::Unblock { id } => {
            directory.set_blocked(id, false, me.id).await?;
            println!("User #{id} unblocked.");
            Ok(())
        }
        UserCommands::Staff { id } => {
            directory.set_staff(id, true).await?;
            println!("User #{id} granted staff status.");
            Ok(())
        }
        UserCommands::Unstaff { id } => {
            directory.set_staff(id, false).await?;
            println!("User #{id} staff status revoked.");
            Ok(())
        }
        UserCommands::Delete { id } => {
            directory.delete_user(id, me.id).await?;
            println!("User #{id} deleted.");
            Ok(())
        }
    }
}
