//! YouTube Playlists API types.

use crate::youtube_api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlists.list` API call.
///
/// Contains a list of [`Playlist`] resources that match the request criteria,
/// along with pagination information in [`PageInfo`].
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#playlistListResponse`.
    #[serde(default)]
    pub kind: String,
    /// A list of playlists that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<Playlist>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `playlist` resource represents an ordered collection of videos on YouTube.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Playlist {
    /// The ID that YouTube uses to uniquely identify the playlist.
    pub id: String,
    /// Contains basic details about the playlist, such as its title.
    pub snippet: PlaylistSnippet,
}

/// The snippet object contains basic details about the playlist.
///
/// This is a subset of the full snippet data available from the YouTube API.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists#snippet>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    /// The playlist's title.
    pub title: String,
    /// The playlist's description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The ID of the channel that published the playlist.
    #[serde(rename = "channelId", default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// The date and time that the playlist was created.
    #[serde(rename = "publishedAt", default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_items_means_no_playlists() {
        let json = r#"{
            "kind": "youtube#playlistListResponse",
            "pageInfo": { "totalResults": 0, "resultsPerPage": 50 }
        }"#;
        let response: PlaylistListResponse = serde_json::from_str(json).unwrap();
        assert!(response.items.is_empty());
        assert_eq!(response.next_page_token, None);
    }
}
