//! YouTube Data API v3 client library.
//!
//! This module provides a small client for the read-only parts of the YouTube Data API v3 that
//! are needed to catalogue a channel: channel search, playlist listing, and playlist item
//! listing.
//!
//! # Pagination
//!
//! Every list endpoint returns at most 50 items per call along with a `nextPageToken` when more
//! results exist. The listing methods on [`YouTubeClient`] hide this behind a [`PagedStream`],
//! which fetches the next page only once the current one has been consumed. A client may be
//! configured with a page cap so that an API that never ends its token chain cannot keep the
//! program running forever.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_playlist_export::credentials::Credential;
//! use youtube_playlist_export::youtube_api::YouTubeClient;
//! use tokio_stream::StreamExt;
//!
//! # async fn example(credential: Credential) -> eyre::Result<()> {
//! let client = YouTubeClient::new(credential, None, reqwest::Client::new());
//!
//! let mut playlists = std::pin::pin!(client.list_channel_playlists("UC_x5XG1OV2P6uZZ5FSM9Ttw"));
//! while let Some(playlist) = playlists.next().await {
//!     let playlist = playlist?;
//!     println!("Playlist: {} ({})", playlist.snippet.title, playlist.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod playlist_items;
pub mod playlists;
pub mod search;
pub mod types;

// Re-export main types for convenience
pub use client::YouTubeClient;
pub use types::{PageInfo, PageLimitExceeded, PagedStream, ResourceId};

pub use playlist_items::{PlaylistItem, PlaylistItemSnippet};
pub use playlists::{Playlist, PlaylistSnippet};
pub use search::SearchResult;
