//! Comment moderation command handlers.

use anyhow::Result;
use byline_client::error::ApiError;
use byline_client::http::ApiClient;
use byline_client::moderation::{ApprovalFilter, ModerationStore};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum FilterArg {
    #[default]
    All,
    Pending,
    Approved,
}

impl From<FilterArg> for ApprovalFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => ApprovalFilter::All,
            FilterArg::Pending => ApprovalFilter::Pending,
            FilterArg::Approved => ApprovalFilter::Approved,
        }
    }
}

#[derive(clap::Subcommand)]
pub enum ModerationCommands {
    /// List comments in the moderation queue
    Comments {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_enum, default_value = "all")]
        filter: FilterArg,
    },
    /// Approve a comment
    Approve { id: u64 },
    /// Reject (unapprove) a comment
    Reject { id: u64 },
    /// Delete a comment permanently
    Delete { id: u64 },
    /// Approve every pending comment on the first queue page
    BulkApprove,
}

pub async fn run(client: &ApiClient, command: ModerationCommands) -> Result<()> {
    super::require_user(client).await?;
    let store = ModerationStore::new(client.clone());

    match command {
        ModerationCommands::Comments { page, filter } => {
            store.fetch_comments(page, filter.into()).await?;
            let state = store.snapshot();
            if state.comments.is_empty() {
                println!("No comments found for the selected filter.");
                return Ok(());
            }
            for comment in &state.comments {
                let status = if comment.is_approved { "approved" } else { "pending" };
                println!(
                    "[{}] ({status}) {} on post #{}: {}",
                    comment.id, comment.author, comment.post, comment.content
                );
            }
            println!("{} comments total.", state.total_count);
            Ok(())
        }
        ModerationCommands::Approve { id } => {
            store.set_approval(id, true).await?;
            println!("Comment #{id} approved.");
            Ok(())
        }
        ModerationCommands::Reject { id } => {
            store.set_approval(id, false).await?;
            println!("Comment #{id} rejected.");
            Ok(())
        }
        ModerationCommands::Delete { id } => {
            store.delete_comment(id).await?;
            println!("Comment #{id} deleted.");
            Ok(())
        }
        ModerationCommands::BulkApprove => {
            store.fetch_comments(1, ApprovalFilter::Pending).await?;
            match store.bulk_approve().await {
                Ok(0) => println!("No pending comments to approve."),
                Ok(count) => println!("{count} comments approved."),
                Err(err @ ApiError::Batch { .. }) => {
                    eprintln!("Bulk approval incomplete: {err}.");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
            Ok(())
        }
    }
}
