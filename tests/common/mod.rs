#![allow(dead_code)]

use anyhow::{anyhow, Result};
use serde_json::Map;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tg_modbot::actions::ActionProcessor;
use tg_modbot::auth::{sign_init_data, InitDataVerifier};
use tg_modbot::model::{ItemKey, ItemKind, PlaylistCover, PlaylistName, Song};
use tg_modbot::notify::{Messenger, NotificationDispatcher};
use tg_modbot::server::AppState;
use tg_modbot::site::SiteApi;
use tg_modbot::state::ModerationState;
use tokio::sync::Mutex;
use url::Url;

pub const BOT_TOKEN: &str = "123456:TEST-TOKEN";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const ROSTER: [i64; 3] = [1, 2, 3];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteCall {
    Approve(ItemKey),
    RejectSong { id: i64, reason: String },
    RejectName { id: i64, new_name: String, reason: String },
    RejectCover { id: i64, reason: String },
    Sign { id: i64, artist: String, title: String },
    Creator(i64),
}

/// In-memory Site that records every write.
#[derive(Default)]
pub struct RecordingSite {
    songs: Mutex<Vec<Song>>,
    names: Mutex<Vec<PlaylistName>>,
    covers: Mutex<Vec<PlaylistCover>>,
    failing_fetches: Mutex<HashSet<ItemKind>>,
    fail_writes: Mutex<bool>,
    fail_next_writes: Mutex<usize>,
    fail_creator: Mutex<bool>,
    write_delay: Mutex<Option<Duration>>,
    creator: Mutex<Option<String>>,
    calls: Mutex<Vec<SiteCall>>,
}

impl RecordingSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_pending(&self, songs: &[i64], names: &[i64], covers: &[i64]) {
        *self.songs.lock().await = songs.iter().map(|id| song(*id)).collect();
        *self.names.lock().await = names.iter().map(|id| name(*id)).collect();
        *self.covers.lock().await = covers.iter().map(|id| cover(*id)).collect();
    }

    pub async fn fail_fetch(&self, kind: ItemKind) {
        self.failing_fetches.lock().await.insert(kind);
    }

    pub async fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().await = fail;
    }

    /// Fail only the next `count` writes.
    pub async fn fail_next_writes(&self, count: usize) {
        *self.fail_next_writes.lock().await = count;
    }

    pub async fn fail_creator(&self, fail: bool) {
        *self.fail_creator.lock().await = fail;
    }

    pub async fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().await = Some(delay);
    }

    pub async fn set_creator(&self, creator: Option<&str>) {
        *self.creator.lock().await = creator.map(str::to_string);
    }

    pub async fn calls(&self) -> Vec<SiteCall> {
        self.calls.lock().await.clone()
    }

    async fn fetch_guard(&self, kind: ItemKind) -> Result<()> {
        if self.failing_fetches.lock().await.contains(&kind) {
            return Err(anyhow!("site error 502 on GET pending {}", kind));
        }
        Ok(())
    }

    async fn write(&self, call: SiteCall) -> Result<()> {
        let delay = *self.write_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_writes.lock().await {
            return Err(anyhow!("site error 503: maintenance"));
        }
        {
            let mut left = self.fail_next_writes.lock().await;
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("site error 503: maintenance"));
            }
        }
        self.calls.lock().await.push(call);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SiteApi for RecordingSite {
    async fn pending_songs(&self) -> Result<Vec<Song>> {
        self.fetch_guard(ItemKind::Song).await?;
        Ok(self.songs.lock().await.clone())
    }

    async fn pending_names(&self) -> Result<Vec<PlaylistName>> {
        self.fetch_guard(ItemKind::Name).await?;
        Ok(self.names.lock().await.clone())
    }

    async fn pending_covers(&self) -> Result<Vec<PlaylistCover>> {
        self.fetch_guard(ItemKind::Cover).await?;
        Ok(self.covers.lock().await.clone())
    }

    async fn playlist_creator(&self, playlist_id: i64) -> Result<Option<String>> {
        self.calls.lock().await.push(SiteCall::Creator(playlist_id));
        if *self.fail_creator.lock().await {
            return Err(anyhow!("site error 500 on GET playlist {}", playlist_id));
        }
        Ok(self.creator.lock().await.clone())
    }

    async fn approve(&self, key: ItemKey) -> Result<()> {
        self.write(SiteCall::Approve(key)).await
    }

    async fn reject_song(&self, id: i64, reason: &str) -> Result<()> {
        self.write(SiteCall::RejectSong {
            id,
            reason: reason.into(),
        })
        .await
    }

    async fn reject_name(&self, id: i64, new_name: &str, reason: &str) -> Result<()> {
        self.write(SiteCall::RejectName {
            id,
            new_name: new_name.into(),
            reason: reason.into(),
        })
        .await
    }

    async fn reject_cover(&self, id: i64, reason: &str) -> Result<()> {
        self.write(SiteCall::RejectCover {
            id,
            reason: reason.into(),
        })
        .await
    }

    async fn sign_song(&self, id: i64, artist: &str, title: &str) -> Result<()> {
        self.write(SiteCall::Sign {
            id,
            artist: artist.into(),
            title: title.into(),
        })
        .await
    }
}

/// Messenger that records deliveries and fails for selected chats.
#[derive(Default)]
pub struct RecordingMessenger {
    failing_chats: Mutex<HashSet<i64>>,
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn fail_for(&self, chat_id: i64) {
        self.failing_chats.lock().await.insert(chat_id);
    }

    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: i64, html: &str, _panel_url: &Url) -> Result<()> {
        if self.failing_chats.lock().await.contains(&chat_id) {
            return Err(anyhow!("Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().await.push((chat_id, html.to_string()));
        Ok(())
    }
}

pub fn song(id: i64) -> Song {
    Song {
        id,
        artist: Some(format!("Artist {}", id)),
        title: Some(format!("Title {}", id)),
        uploader: Some("uploader".into()),
        extra: Map::new(),
    }
}

pub fn name(id: i64) -> PlaylistName {
    PlaylistName {
        id,
        name: Some(format!("Playlist {}", id)),
        creator: Some("creator".into()),
        extra: Map::new(),
    }
}

pub fn cover(id: i64) -> PlaylistCover {
    PlaylistCover {
        id,
        name: Some(format!("Playlist {}", id)),
        creator: Some("creator".into()),
        extra: Map::new(),
    }
}

pub fn panel_url() -> Url {
    Url::parse("https://moderation.example.com/app").unwrap()
}

pub fn dispatcher(messenger: &Arc<RecordingMessenger>) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        messenger.clone(),
        ROSTER.to_vec(),
        panel_url(),
    ))
}

/// Signed `X-Init-Data` for a roster member.
pub fn init_data(user_id: i64, first_name: &str) -> String {
    let user = serde_json::json!({ "id": user_id, "first_name": first_name }).to_string();
    sign_init_data(
        BOT_TOKEN,
        &[("auth_date", "1700000000"), ("user", user.as_str())],
    )
}

pub struct Harness {
    pub site: Arc<RecordingSite>,
    pub messenger: Arc<RecordingMessenger>,
    pub state: Arc<ModerationState>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub app: Arc<AppState>,
}

pub fn harness(share_webhook_dedup: bool) -> Harness {
    let site = RecordingSite::new();
    let messenger = RecordingMessenger::new();
    let state = ModerationState::new();
    let dispatcher = dispatcher(&messenger);
    let app = Arc::new(AppState {
        verifier: InitDataVerifier::new(BOT_TOKEN, ROSTER),
        processor: ActionProcessor::new(site.clone(), state.clone()),
        state: state.clone(),
        dispatcher: dispatcher.clone(),
        webhook_secret: WEBHOOK_SECRET.into(),
        share_webhook_dedup,
        panel_html: PathBuf::from("/nonexistent/app.html"),
    });
    Harness {
        site,
        messenger,
        state,
        dispatcher,
        app,
    }
}
