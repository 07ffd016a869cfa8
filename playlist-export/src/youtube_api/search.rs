//! YouTube Search API types.

use crate::youtube_api::types::{PageInfo, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `search.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/search/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#searchListResponse`.
    #[serde(default)]
    pub kind: String,
    /// The search results, most relevant first.
    #[serde(default)]
    pub items: VecDeque<SearchResult>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A search result points at a channel, video, or playlist matching the query.
///
/// Only the `id` part is requested, so no snippet is present.
///
/// See: <https://developers.google.com/youtube/v3/docs/search#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
}
