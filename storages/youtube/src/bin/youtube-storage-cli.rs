use attachment_sdk::{FileSystemStorage, Metadata};
use clap::{Parser, Subcommand};
use eyre::Context;
use serde_json::{Value, json};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_storage::{Config, Privacy, Snippet, UrlType, YouTubeStorage};

/// Stores videos on YouTube, keeping a copy of each in a local directory.
///
/// Credentials are read from GOOGLE_OAUTH_CLIENT_ID, GOOGLE_OAUTH_CLIENT_SECRET and
/// GOOGLE_OAUTH_REFRESH_TOKEN. YOUTUBE_CHANNEL_ID skips the channel lookup.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Directory of the original storage.
    #[arg(long, default_value = "videos")]
    dir: PathBuf,

    /// Privacy status of uploaded videos.
    #[arg(long, default_value_t = Privacy::Private)]
    privacy: Privacy,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a video file and print the id YouTube assigned.
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Check whether a video exists on YouTube.
    Exists { id: String },
    /// Delete a video from YouTube and the original storage.
    Delete { id: String },
    /// Print a link to a video.
    Url {
        id: String,
        /// watch, embed, short or original
        #[arg(long = "type", default_value = "watch")]
        kind: String,
    },
    /// Change the title or description of a video.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the channel and uploads playlist videos go to.
    Channel,
    /// Delete every video of the channel and empty the original storage.
    Clear {
        /// Required, since this cannot be undone.
        #[arg(long)]
        yes: bool,
    },
}

fn snippet_changes(title: Option<String>, description: Option<String>) -> Snippet {
    let mut snippet = Snippet::new();
    if let Some(title) = title {
        snippet.insert("title".to_string(), Value::String(title));
    }
    if let Some(description) = description {
        snippet.insert("description".to_string(), Value::String(description));
    }
    snippet
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let original = FileSystemStorage::new(&cli.dir)
        .await
        .with_context(|| format!("open original storage at {}", cli.dir.display()))?;
    let config = Config::builder()
        .original_storage(Arc::new(original))
        .default_privacy(cli.privacy)
        .credentials_from_env()
        .build()
        .context("configure YouTube storage")?;
    let storage = YouTubeStorage::new(config)?;

    match cli.command {
        Command::Upload {
            path,
            title,
            description,
        } => {
            let mut file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("open {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut metadata = Metadata::new();
            metadata.insert("filename".to_string(), Value::String(filename.clone()));
            let uploaded = storage
                .upload(
                    &mut file,
                    &filename,
                    &metadata,
                    &snippet_changes(title, description),
                )
                .await
                .context("upload video")?;
            println!("{}", uploaded.id);
        }
        Command::Exists { id } => {
            let exists = storage.exists(&id).await?;
            println!("{exists}");
            if !exists {
                std::process::exit(1);
            }
        }
        Command::Delete { id } => {
            storage.delete(&id).await.context("delete video")?;
        }
        Command::Url { id, kind } => {
            let url = storage.url(&id, UrlType::from(kind.as_str()), &Default::default())?;
            println!("{url}");
        }
        Command::Update {
            id,
            title,
            description,
        } => {
            let changes = snippet_changes(title, description);
            if changes.is_empty() {
                eyre::bail!("nothing to update, pass --title or --description");
            }
            let mut metadata = Metadata::new();
            metadata.insert(
                youtube_storage::RESERVED_METADATA_KEY.to_string(),
                Value::Object(changes),
            );
            let record = storage
                .update(&id, &metadata)
                .await
                .context("update video")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Channel => {
            let channel_id = storage.channel_id().await?.to_string();
            let playlist_id = storage.uploads_playlist_id().await?;
            println!(
                "{}",
                json!({"channelId": channel_id, "uploadsPlaylistId": playlist_id})
            );
        }
        Command::Clear { yes } => {
            if !yes {
                eyre::bail!("refusing to delete every video without --yes");
            }
            storage.clear().await.context("clear channel")?;
        }
    }

    Ok(())
}
