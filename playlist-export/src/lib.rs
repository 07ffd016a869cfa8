//! Export every video of every playlist of a YouTube channel to CSV.
//!
//! The workflow is linear: obtain a credential, resolve the channel name to an ID, list the
//! channel's playlists, list each playlist's videos, and write one CSV row per video.

use crate::catalog::{ChannelId, LookupError};
use crate::config::ExportConfig;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::oauth::OAuthManager;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use jiff::Timestamp;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod csv_export;
pub mod oauth;
pub mod youtube_api;

#[cfg(test)]
mod mock_api;

/// How an export run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Search found no channel by that name; nothing was written.
    ChannelNotFound { channel: String },
    /// The channel search itself failed; nothing was written.
    ChannelLookupFailed { channel: String, error: String },
    Exported {
        channel_id: ChannelId,
        path: PathBuf,
        videos: usize,
    },
}

/// Runs a full export as described by `config`.
///
/// `on_resolved` is called with the channel ID as soon as it is known, before the (possibly
/// long) enumeration starts.
pub async fn run_export<F>(config: &ExportConfig, on_resolved: F) -> eyre::Result<ExportOutcome>
where
    F: FnMut(&ChannelId),
{
    // ==============================================================================
    // Credentials
    // ==============================================================================
    // A stored token is reused or refreshed when possible; otherwise the user is sent
    // through the browser consent flow. Without a credential there is nothing to do.
    let oauth_manager = OAuthManager::from_client_secret_file(&config.client_secret)
        .await
        .context("load OAuth client configuration")?;
    let store = FileCredentialStore::new(&config.token_file);
    let credential = credentials::obtain(&store, &oauth_manager, Timestamp::now()).await?;

    let http_client = reqwest::Client::builder()
        .build()
        .context("build YouTube API HTTP client")?;
    let client = YouTubeClient::new(credential, Some(Arc::new(oauth_manager)), http_client)
        .with_base_url(&config.api_base)
        .with_max_pages(Some(config.max_pages()));

    let outcome = run_with_client(&client, &config.channel, &config.output_path(), on_resolved).await;

    // A long export may outlive the access token; keep whatever refresh happened on the way.
    if client.was_refreshed() {
        let saved = store
            .save(&client.credential().await)
            .await
            .with_context(|| {
                format!("persist refreshed credential to {}", store.path().display())
            });
        combine_with_save(outcome, saved)
    } else {
        outcome
    }
}

/// The export result wins over a failure to persist the credential; the latter is only logged
/// when both fail.
fn combine_with_save(
    outcome: eyre::Result<ExportOutcome>,
    saved: eyre::Result<()>,
) -> eyre::Result<ExportOutcome> {
    match (outcome, saved) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(e)) => Err(e),
        (Err(export), Err(e)) => {
            tracing::error!(error = %format!("{e:#}"), "refreshed credential was not saved");
            Err(export)
        }
    }
}

/// The export proper, given an authenticated client.
#[tracing::instrument(skip(client, on_resolved), fields(output = %output.display()))]
pub async fn run_with_client<F>(
    client: &YouTubeClient,
    channel: &str,
    output: &Path,
    mut on_resolved: F,
) -> eyre::Result<ExportOutcome>
where
    F: FnMut(&ChannelId),
{
    let channel_id = match catalog::resolve_channel(client, channel).await {
        Ok(channel_id) => channel_id,
        Err(LookupError::NotFound(_)) => {
            return Ok(ExportOutcome::ChannelNotFound {
                channel: channel.to_string(),
            });
        }
        Err(e @ LookupError::Transport(_)) => {
            return Ok(ExportOutcome::ChannelLookupFailed {
                channel: channel.to_string(),
                error: e.to_string(),
            });
        }
    };
    on_resolved(&channel_id);

    let playlists = catalog::list_playlists(client, &channel_id)
        .await
        .context("list channel playlists")?;
    let videos = catalog::list_channel_videos(client, &playlists)
        .await
        .context("list playlist videos")?;

    let written = csv_export::export(output, &videos)
        .await
        .context("export videos to CSV")?;

    Ok(ExportOutcome::Exported {
        channel_id,
        path: output.to_path_buf(),
        videos: written,
    })
}
