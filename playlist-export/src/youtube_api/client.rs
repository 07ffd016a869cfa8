//! Core YouTube API client functionality and access token management.

use crate::credentials::{Authorizer, Credential};
use crate::oauth::OAuthManager;
use crate::youtube_api::{
    playlist_items::{PlaylistItem, PlaylistItemListResponse},
    playlists::{Playlist, PlaylistListResponse},
    search::SearchListResponse,
    types::PagedStream,
};
use eyre::Context;
use http::Method;
use jiff::Timestamp;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

/// Where the YouTube Data API v3 lives.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// The largest page size the list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Client for interacting with the YouTube Data API v3.
///
/// This client wraps an OAuth2 credential and provides methods to call the read-only list
/// endpoints needed to enumerate a channel's playlists. All API calls require a valid access
/// token with a YouTube scope.
///
/// If an OAuth manager is supplied, an access token that expires mid-run is refreshed before
/// the next request. Callers can check [`Self::was_refreshed`] and persist [`Self::credential`].
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// The current credential, behind a mutex so refresh happens at most once at a time.
    credential: Arc<Mutex<Credential>>,
    /// Set once the credential has been refreshed by this client.
    refreshed: Arc<AtomicBool>,
    /// OAuth manager for refreshing tokens
    oauth_manager: Option<Arc<OAuthManager>>,
    /// HTTP client for API requests
    client: reqwest::Client,
    base_url: String,
    /// Cap on the number of pages any single listing may span.
    max_pages: Option<usize>,
}

impl YouTubeClient {
    /// Creates a new YouTube API client.
    ///
    /// # Arguments
    ///
    /// * `credential` - The credential whose access token authorizes requests
    /// * `oauth_manager` - Used to refresh the access token if it expires; `None` disables refresh
    /// * `client` - Shared HTTP client for making API requests
    pub fn new(
        credential: Credential,
        oauth_manager: Option<Arc<OAuthManager>>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            credential: Arc::new(Mutex::new(credential)),
            refreshed: Arc::new(AtomicBool::new(false)),
            oauth_manager,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_pages: None,
        }
    }

    /// Sends requests to `base_url` instead of the public API endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bounds how many pages a single paginated listing may fetch.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Returns a clone of the current credential, including any refresh that happened.
    pub async fn credential(&self) -> Credential {
        self.credential.lock().await.clone()
    }

    /// Whether the access token was refreshed since this client was created.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst)
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    ///
    /// This method is called automatically before each API request to ensure the token
    /// is valid.
    #[instrument(skip(self))]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut credential = self.credential.lock().await;

        if !credential.is_valid_at(Timestamp::now()) {
            tracing::debug!("access token expired, attempting refresh");
            let Some(oauth_manager) = &self.oauth_manager else {
                eyre::bail!("access token expired and no OAuth manager is available to refresh it");
            };

            match oauth_manager
                .refresh(&credential)
                .await
                .context("refresh OAuth token")?
            {
                Some(new) => {
                    *credential = new;
                    self.refreshed.store(true, Ordering::SeqCst);
                    tracing::debug!("access token successfully refreshed");
                }
                None => {
                    tracing::error!("access token refresh failed, client is unusable");
                    return Err(eyre::eyre!("Unable to refresh expired access token"));
                }
            }
        }

        Ok(credential.access_token.clone())
    }

    /// Makes an authenticated GET request to a YouTube API endpoint with common error handling.
    ///
    /// This method consolidates the shared logic across all YouTube API requests:
    /// - Token freshness validation and refresh
    /// - Authorization header setup
    /// - Query parameters
    /// - Status code validation and error handling
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The API resource path relative to the base URL, e.g. `playlists`
    /// * `query_params` - Query parameters
    ///
    /// # Returns
    ///
    /// The raw [`reqwest::Response`] for method-specific JSON parsing.
    #[instrument(skip(self), ret, level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self.fresh_access_token().await?;
        let method = Method::GET;
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", access_token))
            .query(query_params)
            .send()
            .await
            .with_context(|| format!("send {} request to YouTube API: {}", method, url))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }

    /// Searches for channels matching a free-text query.
    ///
    /// Uses the `search.list` API restricted to `type=channel`. Only the `id` part is requested,
    /// which is all that is needed to go from a display name to a channel ID. Matching is
    /// YouTube's relevance ranking, not exact name equality.
    ///
    /// # Arguments
    ///
    /// * `query` - The free-text search terms
    /// * `max_results` - Maximum number of results to return (0-50)
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self))]
    pub async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
    ) -> eyre::Result<SearchListResponse> {
        let max_results_string = max_results.to_string();
        let query_params = [
            ("part", "id"),
            ("type", "channel"),
            ("q", query),
            ("maxResults", max_results_string.as_str()),
        ];

        let response = self
            .make_authenticated_request("search", &query_params)
            .await?;

        let results: SearchListResponse = response
            .json()
            .await
            .context("parse YouTube search API response as JSON")?;

        tracing::debug!(
            total_results = results.page_info.total_results,
            returned_items = results.items.len(),
            "searched channels"
        );

        Ok(results)
    }

    /// Returns a paginated stream of all playlists that belong to a channel.
    ///
    /// Uses the `playlists.list` API with `channelId` and the largest page size, following
    /// `nextPageToken` until the API stops returning one. Playlists come back in API order.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlists/list>
    #[instrument(skip(self))]
    pub fn list_channel_playlists<'a>(
        &'a self,
        channel_id: &'a str,
    ) -> impl Stream<Item = eyre::Result<Playlist>> + use<'a> {
        PagedStream::new(move |page_token| async move {
            let response = self
                .list_playlists_internal(channel_id, MAX_PAGE_SIZE, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
        .with_max_pages(self.max_pages)
    }

    /// Returns a paginated stream of all entries of a playlist, in playlist order.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self))]
    pub fn list_playlist_items<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> impl Stream<Item = eyre::Result<PlaylistItem>> + use<'a> {
        PagedStream::new(move |page_token| async move {
            let response = self
                .list_playlist_items_internal(playlist_id, MAX_PAGE_SIZE, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
        .with_max_pages(self.max_pages)
    }

    /// Internal method to call the `playlists.list` API for one page.
    ///
    /// Used internally by [`Self::list_channel_playlists`] to handle pagination.
    ///
    /// # Arguments
    ///
    /// * `channel_id` - The channel whose playlists to list
    /// * `max_results` - Maximum number of playlists to return per page (1-50)
    /// * `page_token` - Token for retrieving a specific page of results
    async fn list_playlists_internal(
        &self,
        channel_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<PlaylistListResponse> {
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "snippet"),
            ("channelId", channel_id),
            ("maxResults", max_results_string.as_str()),
        ];

        // Add pageToken if provided
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request("playlists", &query_params)
            .await?;

        let playlists: PlaylistListResponse = response
            .json()
            .await
            .context("parse YouTube playlists API response as JSON")?;

        tracing::debug!(
            channel_id,
            total_results = playlists.page_info.total_results,
            returned_items = playlists.items.len(),
            "fetched playlists"
        );

        Ok(playlists)
    }

    /// Internal method to call the `playlistItems.list` API for one page.
    ///
    /// Used internally by [`Self::list_playlist_items`] to handle pagination.
    async fn list_playlist_items_internal(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results_string.as_str()),
        ];

        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request("playlistItems", &query_params)
            .await?;

        let items: PlaylistItemListResponse = response
            .json()
            .await
            .context("parse YouTube playlistItems API response as JSON")?;

        tracing::debug!(
            playlist_id,
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            "fetched playlist items"
        );

        Ok(items)
    }
}
