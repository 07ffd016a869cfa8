//! OAuth 2.0 management for YouTube API authentication.
//!
//! This module encapsulates all OAuth-related operations for authenticating with the YouTube API,
//! including reading the application's client secret, initial user authorization, token refresh,
//! and secure handling of authorization flows.

use crate::credentials::{Authorizer, Credential};
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use jiff::Timestamp;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenUrl,
};
use oauth2::{RefreshToken, reqwest};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

/// Google OAuth2 authorization endpoint, used when the client secret file does not name one.
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint used for both initial authentication and token refresh
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope needed to read playlists and their items.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

const OAUTH_DONE_HTML: &str = "<!doctype html><html><body>\
    <p>Authorization complete. You may close this window and return to the terminal.</p>\
    </body></html>";

/// The application credentials a Google Cloud console client secret file describes.
///
/// See: <https://developers.google.com/identity/protocols/oauth2/native-app>
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

/// Top-level shape of the client secret file; desktop apps get `installed`, web apps `web`.
#[derive(Debug, Deserialize)]
enum ClientSecretFile {
    #[serde(rename = "installed")]
    Installed(ClientSecrets),
    #[serde(rename = "web")]
    Web(ClientSecrets),
}

impl ClientSecrets {
    /// Parses the JSON content of a client secret file.
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let file: ClientSecretFile =
            serde_json::from_str(json).context("parse client secret JSON")?;
        Ok(match file {
            ClientSecretFile::Installed(secrets) | ClientSecretFile::Web(secrets) => secrets,
        })
    }

    /// Reads and parses a client secret file.
    pub async fn from_file(path: &Path) -> eyre::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read client secret file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("load {}", path.display()))
    }
}

/// Manages OAuth 2.0 authentication flows for YouTube API access.
///
/// The OAuthManager encapsulates all OAuth operations, providing a consistent interface
/// for both initial user authentication and token refresh operations. It maintains
/// the OAuth client configuration and handles the security aspects of the authorization flow.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl OAuthManager {
    /// Creates a new OAuth manager for the given application credentials.
    ///
    /// Fails if the endpoint URLs in `secrets` are malformed.
    pub fn new(secrets: ClientSecrets) -> eyre::Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            client_id: ClientId::new(secrets.client_id),
            client_secret: ClientSecret::new(secrets.client_secret),
            auth_url: AuthUrl::new(secrets.auth_uri).context("parse authorization endpoint URL")?,
            token_url: TokenUrl::new(secrets.token_uri).context("parse token endpoint URL")?,
            scopes: vec![YOUTUBE_SCOPE.to_string()],
            http_client,
        })
    }

    /// Creates a new OAuth manager from a client secret file on disk.
    pub async fn from_client_secret_file(path: &Path) -> eyre::Result<Self> {
        Self::new(ClientSecrets::from_file(path).await?)
    }

    /// Performs a complete OAuth 2.0 authorization flow to obtain a new access token.
    ///
    /// This method initiates the full OAuth flow, including:
    /// 1. Opening the user's browser for authorization
    /// 2. Setting up a local HTTP server to receive the authorization callback
    /// 3. Exchanging the authorization code for an access token
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = self
            .setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        eprintln!("Open this URL in your browser to authorize access to YouTube:\n\n  {auth_url}\n");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            tracing::warn!("could not open a browser, follow the printed URL instead: {}", e);
        }
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let token_result = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .context("exchange authorization code with access token")?;

        Ok(token_result)
    }

    /// Attempts to exchange a refresh token for a new access token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded, new token is available
    /// * `Ok(None)` - The server considers the refresh token an invalid grant
    /// * `Err(_)` - Network or other error occurred during refresh attempt
    ///
    /// When refresh returns `None`, the user should be asked to re-authenticate using
    /// [`Self::authenticate`].
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");

        // No redirect URL is needed for a refresh exchange.
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone());

        match client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }

    /// Sets up a local HTTP server to receive the OAuth authorization callback.
    ///
    /// Creates a temporary HTTP server on a random local port to handle the OAuth
    /// redirect after user authorization. The server validates the CSRF token and
    /// extracts the authorization code from the callback.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - The redirect URL to use in the OAuth flow
    /// - A future that resolves to the authorization code when the callback is received
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(
        RedirectUrl,
        impl Future<Output = eyre::Result<AuthorizationCode>>,
    )> {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move { handle_redirect(req.uri().query(), &csrf, &got).await }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            Err(e).context("redirect server got bad request")
                        } else {
                            eyre::bail!("redirect server exit prematurely");
                        }
                    }
                    code = gotten.recv() => {
                        serve.as_mut().graceful_shutdown();
                        code.ok_or_else(|| eyre::eyre!("redirect handler dropped without a code"))?
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            rx.await.context("redirect future dropped prematurely")?
        }))
    }
}

/// Handles the one request the browser makes to the loopback redirect endpoint.
///
/// Forwards the authorization code, or the user's refusal, to the waiting flow.
async fn handle_redirect(
    query: Option<&str>,
    csrf: &CsrfToken,
    got: &tokio::sync::mpsc::Sender<eyre::Result<AuthorizationCode>>,
) -> Result<Response<Full<Bytes>>, &'static str> {
    let mut presented_state = None;
    let mut presented_code = None;
    let mut presented_error = None;
    for (k, v) in form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match &*k {
            "state" => presented_state = Some(v),
            "code" => presented_code = Some(v),
            "error" => presented_error = Some(v),
            _ => {}
        }
    }
    if presented_state.as_deref() != Some(csrf.secret().as_str()) {
        return Err("invalid csrf token");
    }
    let outcome = match (presented_code, presented_error) {
        (Some(code), _) => Ok(AuthorizationCode::new(code.into_owned())),
        (None, Some(error)) => Err(eyre::eyre!("authorization was not granted: {}", error)),
        (None, None) => return Err("no authorization code found"),
    };
    let granted = outcome.is_ok();
    // Only the first send matters; the receiver is gone after that.
    let _ = got.send(outcome).await;
    Ok(Response::new(Full::<Bytes>::from(if granted {
        OAUTH_DONE_HTML
    } else {
        "Authorization was not granted. You may close this window."
    })))
}

impl Authorizer for OAuthManager {
    fn required_scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn refresh(&self, credential: &Credential) -> eyre::Result<Option<Credential>> {
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };
        let Some(token) = self.refresh_token(refresh_token).await? else {
            return Ok(None);
        };
        let new = Credential::from_token_response(&token, &self.scopes, Timestamp::now());
        Ok(Some(credential.clone().refreshed(new)))
    }

    async fn authorize(&self) -> eyre::Result<Credential> {
        let token = self.authenticate().await?;
        let credential = Credential::from_token_response(&token, &self.scopes, Timestamp::now());
        if !credential.has_scopes(&self.scopes) {
            eyre::bail!(
                "user granted {:?} but {:?} is required",
                credential.scopes,
                self.scopes
            );
        }
        Ok(credential)
    }
}
