//! Last.fm authentication client

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::{GrantedSession, ScrobbleAuthClient};
use crate::{Error, Result};

const API_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session: SessionBody,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    name: String,
    key: String,
}

pub struct LastFmClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl LastFmClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Point the client at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `api_sig`: md5 over the sorted `key value` pairs followed by the secret.
    /// `format` is never part of the signature.
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let mut hasher = Md5::new();
        for (key, value) in params {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.update(self.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, extra: &[(&'static str, &str)]) -> Result<T> {
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("method", method.to_string());
        params.insert("api_key", self.api_key.clone());
        for (key, value) in extra {
            params.insert(*key, value.to_string());
        }
        let signature = self.sign(&params);
        params.insert("api_sig", signature);
        params.insert("format", "json".to_string());

        debug!(method, "Last.fm request");

        let response = self.http.get(&self.base_url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "last.fm http {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ScrobbleAuthClient for LastFmClient {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    async fn request_token(&self) -> Result<String> {
        let response: TokenResponse = self.call("auth.getToken", &[]).await?;
        Ok(response.token)
    }

    async fn exchange_token(&self, token: &str) -> Result<GrantedSession> {
        let response: SessionResponse = self.call("auth.getSession", &[("token", token)]).await?;
        Ok(GrantedSession {
            username: response.session.name,
            session_key: response.session.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_sorts_params_and_appends_secret() {
        let client = LastFmClient::new("key", "secret");
        let mut params = BTreeMap::new();
        params.insert("token", "tok".to_string());
        params.insert("method", "auth.getSession".to_string());
        params.insert("api_key", "key".to_string());

        let mut hasher = Md5::new();
        hasher.update(b"api_keykeymethodauth.getSessiontokentoksecret");
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(client.sign(&params), expected);
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn test_auth_url_embeds_key_and_token() {
        let client = LastFmClient::new("key", "secret");
        assert_eq!(
            client.auth_url("tok").unwrap(),
            "http://www.last.fm/api/auth/?api_key=key&token=tok"
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_transport_failure() {
        let client = LastFmClient::new("key", "secret").with_base_url("http://127.0.0.1:9/");
        let err = client.request_token().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
