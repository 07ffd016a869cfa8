//! In-process stand-in for the YouTube Data API list endpoints, used by tests.
//!
//! Serves `search`, `playlists`, and `playlistItems` from a fixed [`MockChannel`], honouring
//! `maxResults` and handing out `nextPageToken`s of the form `offset-<n>`. A `/token` endpoint
//! answers refresh-token exchanges with short-lived tokens the list endpoints accept.

use crate::credentials::Credential;
use crate::oauth::{ClientSecrets, OAuthManager, YOUTUBE_SCOPE};
use crate::youtube_api::YouTubeClient;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{
    Form, Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub(crate) struct MockChannel {
    pub(crate) name: String,
    pub(crate) id: String,
    pub(crate) playlists: Vec<MockPlaylist>,
    /// Respond to every search with a server error.
    pub(crate) fail_search: bool,
    /// Respond to playlistItems requests for this playlist with a server error.
    pub(crate) fail_playlist: Option<String>,
    /// Leave the `items` key out of list responses that have no items.
    pub(crate) omit_empty_items: bool,
}

/// The access token the list endpoints accept, and the one `/token` hands out.
pub(crate) const ACCESS_TOKEN: &str = "test-access-token";

/// Lifetime of refreshed tokens; shorter than the validity buffer, so each request refreshes.
const REFRESHED_TOKEN_LIFETIME_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct MockPlaylist {
    pub(crate) id: String,
    pub(crate) title: String,
    /// `(video id, video title)` pairs.
    pub(crate) videos: Vec<(String, String)>,
}

impl MockPlaylist {
    pub(crate) fn new(id: &str, title: &str, videos: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            videos: videos
                .iter()
                .map(|(id, title)| (id.to_string(), title.to_string()))
                .collect(),
        }
    }
}

struct MockState {
    channel: MockChannel,
    requests: Mutex<Vec<String>>,
}

pub(crate) struct MockApi {
    pub(crate) base_url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub(crate) async fn serve(channel: MockChannel) -> Self {
        let state = Arc::new(MockState {
            channel,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/search", get(search))
            .route("/playlists", get(playlists))
            .route("/playlistItems", get(playlist_items))
            .route("/token", post(token))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// A client with a non-expiring credential pointed at this server.
    pub(crate) fn client(&self) -> YouTubeClient {
        let credential = Credential {
            access_token: ACCESS_TOKEN.to_string(),
            refresh_token: None,
            expiry: None,
            scopes: vec![crate::oauth::YOUTUBE_SCOPE.to_string()],
        };
        YouTubeClient::new(credential, None, reqwest::Client::new()).with_base_url(&self.base_url)
    }

    /// Contents of a client secret file whose token endpoint is this server.
    pub(crate) fn client_secret_json(&self) -> String {
        json!({
            "installed": {
                "client_id": "client-id",
                "client_secret": "client-secret",
                "token_uri": format!("{}/token", self.base_url),
            }
        })
        .to_string()
    }

    pub(crate) fn oauth_manager(&self) -> OAuthManager {
        let secrets = ClientSecrets::from_json(&self.client_secret_json()).unwrap();
        OAuthManager::new(secrets).unwrap()
    }

    /// The endpoints hit so far, in order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {ACCESS_TOKEN}"))
}

/// Slices `items` according to `maxResults` and `pageToken`.
fn page<T: Clone>(items: &[T], q: &HashMap<String, String>) -> (Vec<T>, Option<String>) {
    let size: usize = q
        .get("maxResults")
        .and_then(|m| m.parse().ok())
        .unwrap_or(5);
    let offset: usize = q
        .get("pageToken")
        .and_then(|t| t.strip_prefix("offset-"))
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    let end = (offset + size).min(items.len());
    let slice = items.get(offset..end).unwrap_or_default().to_vec();
    let next = (end < items.len()).then(|| format!("offset-{end}"));
    (slice, next)
}

fn list_response(
    channel: &MockChannel,
    kind: &str,
    total: usize,
    items: Vec<Value>,
    next: Option<String>,
) -> Value {
    let mut body = json!({
        "kind": kind,
        "pageInfo": { "totalResults": total, "resultsPerPage": items.len() },
    });
    if !(items.is_empty() && channel.omit_empty_items) {
        body["items"] = Value::Array(items);
    }
    if let Some(next) = next {
        body["nextPageToken"] = Value::String(next);
    }
    body
}

async fn search(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    state.requests.lock().unwrap().push("search".to_string());
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.channel.fail_search {
        return (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable").into_response();
    }
    assert_eq!(q.get("type").map(String::as_str), Some("channel"));
    assert_eq!(q.get("maxResults").map(String::as_str), Some("1"));

    let query = q.get("q").cloned().unwrap_or_default().to_lowercase();
    let items = if !query.is_empty() && state.channel.name.to_lowercase().contains(&query) {
        vec![json!({ "id": { "kind": "youtube#channel", "channelId": state.channel.id } })]
    } else {
        Vec::new()
    };
    let total = items.len();
    Json(list_response(
        &state.channel,
        "youtube#searchListResponse",
        total,
        items,
        None,
    ))
    .into_response()
}

async fn playlists(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    state.requests.lock().unwrap().push("playlists".to_string());
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let all: &[MockPlaylist] = if q.get("channelId") == Some(&state.channel.id) {
        &state.channel.playlists
    } else {
        &[]
    };
    let (slice, next) = page(all, &q);
    let items = slice
        .iter()
        .map(|p| {
            json!({
                "kind": "youtube#playlist",
                "id": p.id,
                "snippet": { "title": p.title, "channelId": state.channel.id },
            })
        })
        .collect();
    Json(list_response(
        &state.channel,
        "youtube#playlistListResponse",
        all.len(),
        items,
        next,
    ))
    .into_response()
}

async fn playlist_items(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    state.requests.lock().unwrap().push("playlistItems".to_string());
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let playlist_id = q.get("playlistId").cloned().unwrap_or_default();
    if state.channel.fail_playlist.as_deref() == Some(playlist_id.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response();
    }
    let Some(playlist) = state.channel.playlists.iter().find(|p| p.id == playlist_id) else {
        return (StatusCode::NOT_FOUND, "playlistNotFound").into_response();
    };
    let (slice, next) = page(&playlist.videos, &q);
    let items = slice
        .iter()
        .map(|(video_id, title)| {
            json!({
                "kind": "youtube#playlistItem",
                "id": format!("{}-{}", playlist.id, video_id),
                "snippet": {
                    "title": title,
                    "playlistId": playlist.id,
                    "resourceId": { "kind": "youtube#video", "videoId": video_id },
                },
            })
        })
        .collect();
    Json(list_response(
        &state.channel,
        "youtube#playlistItemListResponse",
        playlist.videos.len(),
        items,
        next,
    ))
    .into_response()
}

/// Accepts any refresh token except `revoked`.
async fn token(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.requests.lock().unwrap().push("token".to_string());
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    if form.get("refresh_token").map(String::as_str) == Some("revoked") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }
    Json(json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "Bearer",
        "expires_in": REFRESHED_TOKEN_LIFETIME_SECS,
        "scope": YOUTUBE_SCOPE,
    }))
    .into_response()
}
