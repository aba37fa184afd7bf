//! `streamdelta playlists`: manage a tenant's source list.

use clap::Subcommand;
use streamdelta_core::TenantId;
use streamdelta_store::{add_source, load_sources, remove_source, AddOutcome, RemoveOutcome};

use crate::services::Services;

#[derive(Debug, Subcommand)]
pub(crate) enum PlaylistCommands {
    /// Track a playlist (Spotify or artist.tools URL)
    Add {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
        url: String,
    },
    /// Stop tracking a playlist, by URL or playlist id
    Remove {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
        target: String,
    },
    /// Show the tracked playlists
    List {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
    },
}

impl PlaylistCommands {
    pub(crate) fn tenant(&self) -> &TenantId {
        match self {
            PlaylistCommands::Add { tenant, .. }
            | PlaylistCommands::Remove { tenant, .. }
            | PlaylistCommands::List { tenant } => tenant,
        }
    }
}

pub(crate) async fn run_playlists(
    services: &Services,
    command: PlaylistCommands,
) -> anyhow::Result<()> {
    let store = services.store.as_ref();

    match command {
        PlaylistCommands::Add { tenant, url } => match add_source(store, &tenant, &url).await? {
            AddOutcome::Added { unit, total } => {
                println!("Playlist added\n  URL: {}\n  Total: {total} playlist(s)", unit.url);
            }
            AddOutcome::AlreadyPresent { unit } => {
                println!("Playlist already tracked: {}", unit.url);
            }
        },
        PlaylistCommands::Remove { tenant, target } => {
            match remove_source(store, &tenant, &target).await? {
                RemoveOutcome::Removed { unit, remaining } => {
                    println!("Playlist removed\n  URL: {}\n  Remaining: {remaining}", unit.url);
                }
                RemoveOutcome::NotFound => {
                    anyhow::bail!("playlist {target} is not tracked for {tenant}");
                }
            }
        }
        PlaylistCommands::List { tenant } => {
            let sources = load_sources(store, &tenant).await?;
            if sources.units.is_empty() {
                println!("No playlists tracked for {tenant}");
            }
            for (index, unit) in sources.units.iter().enumerate() {
                println!("{:>3}. {} ({})", index + 1, unit.url, unit.id);
            }
            for line in &sources.skipped {
                println!("  skipped unsupported line: {line}");
            }
        }
    }

    Ok(())
}
