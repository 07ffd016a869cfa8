//! Persisted YouTube credentials and the logic deciding when to reuse, refresh, or re-authorize.
//!
//! The workflow never touches the token file directly. It goes through a [`CredentialStore`],
//! so tests can substitute a [`MemoryCredentialStore`], and through an [`Authorizer`], which is
//! implemented by [`crate::oauth::OAuthManager`] for real runs.

use eyre::Context;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

/// Access tokens are treated as expired this long before their actual expiry.
const EXPIRY_SAFETY_BUFFER: SignedDuration = SignedDuration::from_secs(300);

/// Access tokens without an `expires_in` are assumed to live for 55 minutes.
const DEFAULT_TOKEN_LIFETIME: SignedDuration = SignedDuration::from_secs(3300);

/// An OAuth 2.0 token bundle authorizing YouTube API calls on behalf of a user.
///
/// The serialized form is what ends up in the token file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token stops being accepted. `None` means unknown, and is taken as valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
    /// The scopes the user actually granted.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl Credential {
    /// Builds a credential from a token endpoint response received at `now`.
    ///
    /// If the server does not echo the granted scopes, `requested_scopes` is assumed.
    pub fn from_token_response(
        token: &BasicTokenResponse,
        requested_scopes: &[String],
        now: Timestamp,
    ) -> Self {
        let lifetime = token
            .expires_in()
            .and_then(|expires_in| SignedDuration::try_from(expires_in).ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scopes = match token.scopes() {
            Some(scopes) => scopes.iter().map(|scope| scope.to_string()).collect(),
            None => requested_scopes.to_vec(),
        };
        Self {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|rt| rt.secret().clone()),
            expiry: now.checked_add(lifetime).ok(),
            scopes,
        }
    }

    /// Whether the access token can still be used at `now`, with a safety buffer before expiry.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            None => true,
            Some(expiry) => now
                .checked_add(EXPIRY_SAFETY_BUFFER)
                .is_ok_and(|deadline| deadline < expiry),
        }
    }

    /// Whether every one of `required` was granted to this credential.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }

    /// Replaces this credential with the result of a refresh exchange.
    ///
    /// Google usually omits the refresh token from refresh responses, in which case the existing
    /// one is kept so the credential stays refreshable.
    pub fn refreshed(self, mut new: Credential) -> Credential {
        if new.refresh_token.is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            new.refresh_token = self.refresh_token;
        }
        if new.scopes.is_empty() {
            new.scopes = self.scopes;
        }
        new
    }
}

/// Persistent home of the user's [`Credential`] between runs.
pub trait CredentialStore {
    /// Returns the stored credential, or `None` if nothing has been stored yet.
    fn load(&self) -> impl Future<Output = eyre::Result<Option<Credential>>> + Send;

    /// Replaces the stored credential.
    fn save(&self, credential: &Credential) -> impl Future<Output = eyre::Result<()>> + Send;
}

/// Source of new credentials, either by refreshing an old one or by asking the user.
pub trait Authorizer {
    /// Scopes every usable credential must carry.
    fn required_scopes(&self) -> &[String];

    /// Exchanges the credential's refresh token for a new access token.
    ///
    /// Returns `Ok(None)` if there is no refresh token or the server rejected it, in which case
    /// the caller should fall back to [`Authorizer::authorize`].
    fn refresh(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = eyre::Result<Option<Credential>>> + Send;

    /// Runs the interactive consent flow.
    fn authorize(&self) -> impl Future<Output = eyre::Result<Credential>> + Send;
}

/// Stores the credential as a JSON file, rewritten whole on every save.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> eyre::Result<Option<Credential>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no stored credential");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };
        let credential = serde_json::from_str(&json)
            .with_context(|| format!("parse credential in {}", self.path.display()))?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> eyre::Result<()> {
        let json = serde_json::to_string_pretty(credential).context("serialize credential")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }
}

/// Keeps the credential in memory; used in place of the token file in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            credential: Mutex::new(credential),
            saves: AtomicUsize::new(0),
        }
    }

    /// How many times [`CredentialStore::save`] has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn current(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> eyre::Result<Option<Credential>> {
        Ok(self.credential.lock().await.clone())
    }

    async fn save(&self, credential: &Credential) -> eyre::Result<()> {
        *self.credential.lock().await = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The credential flow could not produce a usable credential. The program must not proceed.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("refresh stored YouTube credential: {0:#}")]
    Refresh(eyre::Report),
    #[error("authorize with YouTube: {0:#}")]
    Authorize(eyre::Report),
    #[error("persist YouTube credential: {0:#}")]
    Persist(eyre::Report),
}

/// Produces a credential that is valid at `now`, persisting it whenever it changes.
///
/// A stored credential that is still valid and carries the required scopes is returned as-is.
/// An expired one is refreshed if possible. Anything else (no stored credential, an unreadable
/// token file, missing scopes, a rejected refresh token) leads to the interactive flow.
#[tracing::instrument(skip_all)]
pub async fn obtain<S, A>(store: &S, authorizer: &A, now: Timestamp) -> Result<Credential, AuthFailure>
where
    S: CredentialStore,
    A: Authorizer,
{
    let stored = match store.load().await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("ignoring unreadable stored credential: {:#}", e);
            None
        }
    };

    if let Some(credential) = stored {
        if !credential.has_scopes(authorizer.required_scopes()) {
            tracing::info!(granted = ?credential.scopes, "stored credential lacks required scopes");
        } else if credential.is_valid_at(now) {
            tracing::debug!("stored credential is still valid");
            return Ok(credential);
        } else if credential.refresh_token.is_some() {
            tracing::debug!("stored credential expired, attempting refresh");
            match authorizer
                .refresh(&credential)
                .await
                .map_err(AuthFailure::Refresh)?
            {
                Some(refreshed) => {
                    store.save(&refreshed).await.map_err(AuthFailure::Persist)?;
                    tracing::info!("refreshed stored credential");
                    return Ok(refreshed);
                }
                None => {
                    tracing::warn!("refresh token was rejected, re-authorizing");
                }
            }
        } else {
            tracing::info!("stored credential expired and cannot be refreshed");
        }
    }

    let credential = authorizer
        .authorize()
        .await
        .map_err(AuthFailure::Authorize)?;
    store
        .save(&credential)
        .await
        .map_err(AuthFailure::Persist)?;
    tracing::info!("obtained new credential through user authorization");
    Ok(credential)
}
