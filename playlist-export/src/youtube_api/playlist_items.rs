//! YouTube PlaylistItems API types.

use crate::youtube_api::types::{PageInfo, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#playlistItemListResponse`.
    #[serde(default)]
    pub kind: String,
    /// The entries of the playlist, in playlist order.
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `playlistItem` resource identifies a resource, such as a video, that is included in a playlist.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// The ID that YouTube uses to uniquely identify the playlist item.
    pub id: String,
    pub snippet: PlaylistItemSnippet,
}

/// Basic details about the playlist item and the resource it contains.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#snippet>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemSnippet {
    /// The item's title, which for videos is the video title.
    ///
    /// Private and deleted videos keep their entry but report a placeholder title.
    pub title: String,
    #[serde(rename = "playlistId", default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    /// Zero-based position of the item within the playlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// The resource (usually a video) that the item refers to.
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}
