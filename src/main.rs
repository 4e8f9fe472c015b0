//! melody-stream - search the catalog and manage liked songs from the terminal

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use melody_stream::api::{Catalog, YouTubeClient};
use melody_stream::liked::{LikedSongs, SyncState};
use melody_stream::model::MediaItem;
use melody_stream::settings::Settings;
use melody_stream::storage::{LocalStore, RealtimeDbRemote, RemoteStore};
use melody_stream::utils::format_duration;

const INITIAL_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "melody-stream", about = "Music discovery with synced liked songs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog
    Search {
        query: Vec<String>,
        /// Like the Nth result (1-based)
        #[arg(long)]
        like: Option<usize>,
    },
    /// List liked songs
    Liked,
    /// Remove a song from the liked list
    Unlike { id: String },
    /// Remove every liked song
    Clear,
    /// Print the liked list whenever the remote copy changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::load();
    let mut liked = open_liked_songs(&settings).await;

    match cli.command {
        Command::Search { query, like } => {
            let client = YouTubeClient::with_proxy(
                settings.search.resolved_api_key(),
                settings.search.max_results,
                settings.network.proxy_url(),
            );
            let results = client.search(&query.join(" ")).await;
            print_items(&results, &liked);

            if let Some(n) = like {
                match n.checked_sub(1).and_then(|i| results.get(i)) {
                    Some(item) => {
                        liked.like(item.clone());
                        println!("Liked {}", item.title);
                    }
                    None => println!("No result #{}", n),
                }
            }
        }
        Command::Liked => print_items(liked.items(), &liked),
        Command::Unlike { id } => {
            if liked.is_liked(&id) {
                liked.unlike(&id);
                println!("Removed {}", id);
            } else {
                println!("{} is not liked", id);
            }
        }
        Command::Clear => {
            liked.clear();
            println!("Cleared liked songs");
        }
        Command::Watch => {
            if liked.state() != SyncState::RemoteAttached {
                println!("Remote sync is not available");
            } else {
                loop {
                    tokio::select! {
                        more = liked.next_snapshot() => {
                            if !more {
                                break;
                            }
                            println!("--- {} liked songs ---", liked.len());
                            print_items(liked.items(), &liked);
                        }
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
        }
    }

    liked.shutdown().await;
    Ok(())
}

/// Build the liked collection from settings, attaching the remote when configured
async fn open_liked_songs(settings: &Settings) -> LikedSongs {
    let local = LocalStore::new(settings.storage.liked_songs_path());
    let remote: Option<Arc<dyn RemoteStore>> = match settings.remote.active_url() {
        Some(url) => match RealtimeDbRemote::new(
            url,
            &settings.remote.collection_path,
            settings.remote.auth_token.clone(),
            settings.network.proxy_url(),
        ) {
            Ok(remote) => Some(Arc::new(remote) as Arc<dyn RemoteStore>),
            Err(e) => {
                warn!("Remote store disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let mut liked = LikedSongs::open(local, remote);
    if liked.attach_remote(settings.remote.retry).await == SyncState::RemoteAttached {
        // Pick up the current remote collection before acting on it
        if tokio::time::timeout(INITIAL_SNAPSHOT_TIMEOUT, liked.next_snapshot())
            .await
            .is_err()
        {
            warn!("No remote snapshot yet, using local liked songs");
        }
    }
    liked
}

fn print_items(items: &[MediaItem], liked: &LikedSongs) {
    if items.is_empty() {
        println!("(nothing)");
        return;
    }
    for (i, item) in items.iter().enumerate() {
        let heart = if liked.is_liked(&item.id) { "♥" } else { " " };
        let duration = item
            .duration_encoded
            .as_deref()
            .map(format_duration)
            .unwrap_or_else(|| "--:--".to_string());
        println!(
            "{:>2}. {} {} - {} [{}] ({})",
            i + 1,
            heart,
            item.title,
            item.channel_title,
            duration,
            item.id
        );
    }
}
