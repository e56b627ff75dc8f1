//! Client for the Site API, the system of record for moderated content.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::model::{ItemKey, ItemKind, PlaylistCover, PlaylistName, Song};

/// Operations the moderation core needs from the Site.
#[async_trait]
pub trait SiteApi: Send + Sync {
    async fn pending_songs(&self) -> Result<Vec<Song>>;

    async fn pending_names(&self) -> Result<Vec<PlaylistName>>;

    async fn pending_covers(&self) -> Result<Vec<PlaylistCover>>;

    /// Display name of a playlist's creator.
    async fn playlist_creator(&self, playlist_id: i64) -> Result<Option<String>>;

    async fn approve(&self, key: ItemKey) -> Result<()>;

    async fn reject_song(&self, id: i64, reason: &str) -> Result<()>;

    async fn reject_name(&self, id: i64, new_name: &str, reason: &str) -> Result<()>;

    async fn reject_cover(&self, id: i64, reason: &str) -> Result<()>;

    async fn sign_song(&self, id: i64, artist: &str, title: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpSiteApi {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for HttpSiteApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSiteApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct PlaylistResp {
    #[serde(default)]
    creator: Option<String>,
}

fn approve_path(key: ItemKey) -> String {
    match key.kind {
        ItemKind::Song => format!("/api/bot/songs/{}/approve", key.id),
        ItemKind::Name => format!("/api/bot/playlists/{}/name/approve", key.id),
        ItemKind::Cover => format!("/api/bot/playlists/{}/cover/approve", key.id),
    }
}

impl HttpSiteApi {
    pub fn new(base_url: Url, token: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("tg-modbot/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build Site API client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.site.base_url).context("invalid site.base_url")?;
        Self::new(
            base_url,
            cfg.site.api_secret.clone(),
            cfg.app.request_timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).context("invalid Site API URL")
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let mut req = self
            .http
            .request(method, self.endpoint(path)?)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        req.build().context("failed to build Site API request")
    }

    #[instrument(skip(self, body))]
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let request = self.build_request(method.clone(), path, body.as_ref())?;
        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("failed to reach Site API ({} {})", method, path))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "Site API error: {}", body);
            return Err(anyhow!("site error {} on {} {}: {}", status, method, path, body));
        }

        let text = res.text().await.context("failed to read Site API response")?;
        debug!(%status, bytes = text.len(), "Site API response");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("invalid Site API response JSON")
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.call(Method::GET, path, None).await?;
        serde_json::from_value(value).with_context(|| format!("unexpected payload from {}", path))
    }
}

#[async_trait]
impl SiteApi for HttpSiteApi {
    async fn pending_songs(&self) -> Result<Vec<Song>> {
        let env: DataEnvelope<Song> = self.fetch("/api/bot/pending/songs").await?;
        Ok(env.data)
    }

    async fn pending_names(&self) -> Result<Vec<PlaylistName>> {
        let env: DataEnvelope<PlaylistName> = self.fetch("/api/bot/pending/names").await?;
        Ok(env.data)
    }

    async fn pending_covers(&self) -> Result<Vec<PlaylistCover>> {
        let env: DataEnvelope<PlaylistCover> = self.fetch("/api/bot/pending/covers").await?;
        Ok(env.data)
    }

    async fn playlist_creator(&self, playlist_id: i64) -> Result<Option<String>> {
        let pl: PlaylistResp = self
            .fetch(&format!("/api/bot/playlists/{}", playlist_id))
            .await?;
        Ok(pl.creator)
    }

    async fn approve(&self, key: ItemKey) -> Result<()> {
        self.call(Method::POST, &approve_path(key), None).await?;
        Ok(())
    }

    async fn reject_song(&self, id: i64, reason: &str) -> Result<()> {
        let path = format!("/api/bot/songs/{}", id);
        self.call(Method::DELETE, &path, Some(json!({ "reason": reason })))
            .await?;
        Ok(())
    }

    async fn reject_name(&self, id: i64, new_name: &str, reason: &str) -> Result<()> {
        let path = format!("/api/bot/playlists/{}/name/reject", id);
        let body = json!({ "new_name": new_name, "reason": reason });
        self.call(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }

    async fn reject_cover(&self, id: i64, reason: &str) -> Result<()> {
        let path = format!("/api/bot/playlists/{}/cover", id);
        self.call(Method::DELETE, &path, Some(json!({ "reason": reason })))
            .await?;
        Ok(())
    }

    async fn sign_song(&self, id: i64, artist: &str, title: &str) -> Result<()> {
        let path = format!("/api/bot/songs/{}/sign", id);
        let body = json!({ "artist": artist, "title": title });
        self.call(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpSiteApi {
        HttpSiteApi::new(
            Url::parse(base).unwrap(),
            "site-secret".into(),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn build_request_sets_bearer_and_path() {
        let api = client("https://music.example.com/");
        let body = json!({ "reason": "spam" });
        let request = api
            .build_request(Method::DELETE, "/api/bot/songs/9", Some(&body))
            .unwrap();
        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.url().as_str(), "https://music.example.com/api/bot/songs/9");
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer site-secret"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
        let sent: Value =
            serde_json::from_slice(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(sent, body);
    }

    #[test]
    fn base_path_prefix_is_preserved() {
        let api = client("https://example.com/site");
        let request = api
            .build_request(Method::GET, "/api/bot/pending/songs", None)
            .unwrap();
        assert_eq!(request.url().path(), "/site/api/bot/pending/songs");
        assert!(request.body().is_none());
    }

    #[test]
    fn approve_paths_per_kind() {
        assert_eq!(
            approve_path(ItemKey::new(ItemKind::Song, 1)),
            "/api/bot/songs/1/approve"
        );
        assert_eq!(
            approve_path(ItemKey::new(ItemKind::Name, 2)),
            "/api/bot/playlists/2/name/approve"
        );
        assert_eq!(
            approve_path(ItemKey::new(ItemKind::Cover, 3)),
            "/api/bot/playlists/3/cover/approve"
        );
    }

    #[test]
    fn debug_hides_token() {
        let api = client("https://example.com");
        assert!(!format!("{:?}", api).contains("site-secret"));
    }
}
