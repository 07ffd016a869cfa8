//! Turning a channel name into the flat list of videos across all of its playlists.

use crate::youtube_api::{self, YouTubeClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::StreamExt;

/// Prefix of a video's canonical watch URL; the video ID is appended verbatim.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// The stable identifier YouTube assigns to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A playlist of the channel being exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub title: String,
}

impl From<youtube_api::Playlist> for Playlist {
    fn from(playlist: youtube_api::Playlist) -> Self {
        Self {
            id: playlist.id,
            title: playlist.snippet.title,
        }
    }
}

/// One row of the export: a video and the playlist it was found in.
///
/// A video that appears in several playlists yields one record per playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(rename = "Video Title")]
    pub title: String,
    /// Title of the playlist the video was listed under.
    #[serde(rename = "Playlist")]
    pub playlist: String,
    #[serde(rename = "Video URL")]
    pub url: String,
}

impl VideoRecord {
    pub fn new(title: impl Into<String>, playlist: impl Into<String>, video_id: &str) -> Self {
        Self {
            title: title.into(),
            playlist: playlist.into(),
            url: format!("{WATCH_URL_PREFIX}{video_id}"),
        }
    }
}

/// Why a channel name could not be turned into a [`ChannelId`].
#[derive(Debug, Error)]
pub enum LookupError {
    /// The search returned no channel for this name.
    #[error("no channel found for {0:?}")]
    NotFound(String),
    /// The search itself failed, so nothing is known about whether the channel exists.
    #[error("channel search failed: {0:#}")]
    Transport(eyre::Report),
}

/// Finds the channel YouTube's search ranks first for `name`.
///
/// This is approximate: the top search hit is not necessarily the channel whose title equals
/// `name`. A blank name never matches and sends no request.
#[tracing::instrument(skip(client))]
pub async fn resolve_channel(client: &YouTubeClient, name: &str) -> Result<ChannelId, LookupError> {
    if name.trim().is_empty() {
        return Err(LookupError::NotFound(name.to_string()));
    }

    let response = client.search_channels(name, 1).await.map_err(|e| {
        tracing::error!("channel search failed: {:#}", e);
        LookupError::Transport(e)
    })?;

    match response
        .items
        .into_iter()
        .next()
        .and_then(|result| result.id.channel_id)
    {
        Some(id) => {
            tracing::info!(channel_id = %id, "resolved channel");
            Ok(ChannelId(id))
        }
        None => {
            tracing::info!("no channel matched");
            Err(LookupError::NotFound(name.to_string()))
        }
    }
}

/// Fetches every playlist of a channel, in the order the API returns them.
#[tracing::instrument(skip(client), fields(channel_id = %channel_id))]
pub async fn list_playlists(
    client: &YouTubeClient,
    channel_id: &ChannelId,
) -> eyre::Result<Vec<Playlist>> {
    let stream = client.list_channel_playlists(channel_id.as_str());
    let mut stream = std::pin::pin!(stream);
    let mut playlists = Vec::new();
    while let Some(playlist) = stream.next().await {
        let playlist = playlist.map_err(|e| e.wrap_err("fetch playlist"))?;
        playlists.push(Playlist::from(playlist));
    }
    tracing::info!(playlists = playlists.len(), "listed playlists");
    Ok(playlists)
}

/// Fetches every video in a playlist, tagging each with the playlist's title.
///
/// Entries that do not point at a video are skipped.
#[tracing::instrument(skip(client), fields(playlist_id = %playlist.id, playlist = %playlist.title))]
pub async fn list_videos(
    client: &YouTubeClient,
    playlist: &Playlist,
) -> eyre::Result<Vec<VideoRecord>> {
    let stream = client.list_playlist_items(&playlist.id);
    let mut stream = std::pin::pin!(stream);
    let mut videos = Vec::new();
    while let Some(item) = stream.next().await {
        let item = item.map_err(|e| e.wrap_err("fetch playlist item"))?;
        let Some(video_id) = item.snippet.resource_id.video_id.as_deref() else {
            tracing::warn!(
                item_id = %item.id,
                kind = %item.snippet.resource_id.kind,
                "skipping playlist item that is not a video"
            );
            continue;
        };
        videos.push(VideoRecord::new(
            item.snippet.title.as_str(),
            playlist.title.as_str(),
            video_id,
        ));
    }
    tracing::debug!(videos = videos.len(), "listed playlist videos");
    Ok(videos)
}

/// Fetches the videos of each playlist in turn and concatenates them in playlist order.
pub async fn list_channel_videos(
    client: &YouTubeClient,
    playlists: &[Playlist],
) -> eyre::Result<Vec<VideoRecord>> {
    let mut videos = Vec::new();
    for playlist in playlists {
        let mut batch = list_videos(client, playlist).await?;
        videos.append(&mut batch);
    }
    tracing::info!(videos = videos.len(), "listed channel videos");
    Ok(videos)
}
