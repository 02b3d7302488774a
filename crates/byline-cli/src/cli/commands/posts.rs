//! Post command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byline_client::http::ApiClient;
use byline_client::posts::PostStore;
use byline_types::{ImageUpload, PostDraft};

#[derive(clap::Subcommand)]
pub enum PostCommands {
    /// List posts, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one post with its approved comments
    Show {
        id: u64,
        /// Count this view toward the post's read count
        #[arg(long)]
        increment_view: bool,
    },
    /// Create a post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        excerpt: Option<String>,
        /// Attach an image (multipart upload)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Update a post
    Update {
        id: u64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a post
    Delete { id: u64 },
    /// Like a post
    Like { id: u64 },
    /// Remove a like
    Unlike { id: u64 },
    /// Comment on a post (held for moderation)
    Comment { id: u64, content: String },
}

pub async fn run(client: &ApiClient, command: PostCommands) -> Result<()> {
    let store = PostStore::new(client.clone());

    match command {
        PostCommands::List { page } => {
            let posts = store.fetch_posts(page).await?;
            if posts.is_empty() {
                println!("No posts on page {page}.");
                return Ok(());
            }
            for post in &posts {
                println!(
                    "#{:<5} {}  — {} ({} likes, {} comments, {} reads)",
                    post.id,
                    post.title,
                    post.author,
                    post.likes_count,
                    post.comments_count,
                    post.read_count
                );
            }
            let info = store.snapshot().page;
            println!(
                "Page {page} of {} posts{}",
                info.total_count,
                if info.has_next { " (more available)" } else { "" }
            );
            Ok(())
        }
        PostCommands::Show {
            id,
            increment_view,
        } => {
            let post = store.fetch_post(id, increment_view).await?;
            println!("# {}", post.title);
            println!(
                "by {} · {} likes · {} reads\n",
                post.author, post.likes_count, post.read_count
            );
            println!("{}\n", post.content);
            let comments: Vec<_> = post.approved_comments().collect();
            if comments.is_empty() {
                println!("No comments yet.");
            } else {
                println!("Comments:");
                for comment in comments {
                    println!("  [{}] {}: {}", comment.id, comment.author, comment.content);
                }
            }
            Ok(())
        }
        PostCommands::Create {
            title,
            content,
            excerpt,
            image,
        } => {
            let draft = PostDraft {
                title,
                content,
                excerpt,
            };
            let image = image.as_deref().map(load_image).transpose()?;
            let post = store.create_post(&draft, image).await?;
            println!("Created post #{}.", post.id);
            Ok(())
        }
        PostCommands::Update {
            id,
            title,
            content,
            excerpt,
            image,
        } => {
            let draft = PostDraft {
                title,
                content,
                excerpt,
            };
            let image = image.as_deref().map(load_image).transpose()?;
            let post = store.update_post(id, &draft, image).await?;
            println!("Updated post #{}.", post.id);
            Ok(())
        }
        PostCommands::Delete { id } => {
            store.delete_post(id).await?;
            println!("Deleted post #{id}.");
            Ok(())
        }
        PostCommands::Like { id } => {
            store.toggle_like(id, true).await?;
            println!("Liked post #{id}.");
            Ok(())
        }
        PostCommands::Unlike { id } => {
            store.toggle_like(id, false).await?;
            println!("Removed like from post #{id}.");
            Ok(())
        }
        PostCommands::Comment { id, content } => {
            let comment = store.create_comment(id, &content).await?;
            println!("Comment #{} submitted for moderation.", comment.id);
            Ok(())
        }
    }
}

/// Reads an image file, sniffing its content type from the bytes.
fn load_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image from {}", path.display()))?;
    let mime_type = infer::get(&bytes)
        .map_or("application/octet-stream", |kind| kind.mime_type())
        .to_string();
    let file_name = path
        .file_name()
        .map_or_else(|| "image".to_string(), |name| name.to_string_lossy().into_owned());
    Ok(ImageUpload {
        file_name,
        mime_type,
        bytes,
    })
}
