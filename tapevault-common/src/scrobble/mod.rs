//! Scrobble-session linking
//!
//! Links the library to a third-party scrobbling account. Kept apart from
//! the source/track/composition model: the only shared piece is the
//! database file, where linked sessions are stored.
//!
//! Linking is a two-step flow: [`ScrobbleService::create_auth_link`] asks
//! the remote service for a token and builds the URL the user opens to
//! approve access, then [`ScrobbleService::create_session`] exchanges the
//! approved token for a session key and saves it.

pub mod lastfm;

pub use lastfm::LastFmClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// Linked account session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrobbleSession {
    pub username: String,
    pub session_key: String,
    pub updated_at: DateTime<Utc>,
}

/// URL the user opens to approve the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLink {
    pub url: String,
    pub token: String,
}

/// Session granted by the remote service for an approved token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedSession {
    pub username: String,
    pub session_key: String,
}

/// Remote side of the linking flow
#[async_trait]
pub trait ScrobbleAuthClient: Send + Sync {
    fn api_key(&self) -> &str;

    /// Fetch a fresh, not yet approved token
    async fn request_token(&self) -> Result<String>;

    /// Exchange an approved token for a session
    async fn exchange_token(&self, token: &str) -> Result<GrantedSession>;

    /// Page where the user approves `token`; query values are percent-encoded
    fn auth_url(&self, token: &str) -> Result<String> {
        reqwest::Url::parse_with_params(
            "http://www.last.fm/api/auth/",
            &[("api_key", self.api_key()), ("token", token)],
        )
        .map(String::from)
        .map_err(|e| Error::Internal(format!("auth url: {}", e)))
    }
}

/// Persistence of linked sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or refresh the session of `username`
    async fn save_session(&self, username: &str, session_key: &str) -> Result<ScrobbleSession>;

    /// Most recently linked session
    async fn latest_session(&self) -> Result<Option<ScrobbleSession>>;
}

pub struct ScrobbleService<C, S> {
    client: Option<C>,
    sessions: S,
}

impl<C: ScrobbleAuthClient, S: SessionStore> ScrobbleService<C, S> {
    /// `client` is `None` when no API credentials are configured
    pub fn new(client: Option<C>, sessions: S) -> Self {
        Self { client, sessions }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&C> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Config("scrobbler is not configured".to_string()))
    }

    /// Session currently in use, if any account was linked
    pub async fn current_session(&self) -> Result<Option<ScrobbleSession>> {
        self.sessions.latest_session().await
    }

    pub async fn create_auth_link(&self) -> Result<AuthLink> {
        let client = self.client()?;
        let token = client.request_token().await?;
        Ok(AuthLink {
            url: client.auth_url(&token)?,
            token,
        })
    }

    /// Exchange an approved token and remember the resulting session
    pub async fn create_session(&self, token: &str) -> Result<ScrobbleSession> {
        let client = self.client()?;
        let granted = client.exchange_token(token).await?;
        let session = self
            .sessions
            .save_session(&granted.username, &granted.session_key)
            .await?;

        info!(username = %session.username, "Linked scrobble session");
        Ok(session)
    }
}
