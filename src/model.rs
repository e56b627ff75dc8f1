use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// The three kinds of content that pass through moderation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Song,
    Name,
    Cover,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Song, ItemKind::Name, ItemKind::Cover];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Song => "song",
            ItemKind::Name => "name",
            ItemKind::Cover => "cover",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "song" => Ok(ItemKind::Song),
            "name" => Ok(ItemKind::Name),
            "cover" => Ok(ItemKind::Cover),
            _ => Err(()),
        }
    }
}

/// Identity of a moderated item, rendered as `kind:id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemKey {
    pub fn new(kind: ItemKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A song awaiting review. Fields the Site sends beyond the typed ones
/// (audio URL and the like) are carried through in `extra` for the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistName {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistCover {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Webhook event body: `{"type": "song"|"name"|"cover", "id": .., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModerationItem {
    Song(Song),
    Name(PlaylistName),
    Cover(PlaylistCover),
}

impl ModerationItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ModerationItem::Song(_) => ItemKind::Song,
            ModerationItem::Name(_) => ItemKind::Name,
            ModerationItem::Cover(_) => ItemKind::Cover,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ModerationItem::Song(s) => s.id,
            ModerationItem::Name(n) => n.id,
            ModerationItem::Cover(c) => c.id,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.kind(), self.id())
    }
}

/// An item as shown in the panel: the Site's fields plus who resolved it.
#[derive(Debug, Clone, Serialize)]
pub struct Annotated<T> {
    #[serde(flatten)]
    pub item: T,
    pub handled_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingView {
    pub songs: Vec<Annotated<Song>>,
    pub names: Vec<Annotated<PlaylistName>>,
    pub covers: Vec<Annotated<PlaylistCover>>,
}

/// Last-observed queue sizes per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub songs: usize,
    pub names: usize,
    pub covers: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.songs + self.names + self.covers
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: i64,
    pub action: HistoryAction,
    #[serde(rename = "mod")]
    pub moderator: String,
    pub reason: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Approve,
    Reject,
    Sign,
}

/// Raw panel request body for `POST /api/action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: i64,
    pub action: ActionKind,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A validated moderator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Approve,
    Reject { reason_code: String },
    Sign { artist: String, title: String },
}

impl ActionRequest {
    /// Check the fields each action needs and produce the typed action.
    pub fn into_action(self) -> Result<(ItemKey, Action), ValidationError> {
        let key = ItemKey::new(self.kind, self.id);
        let action = match self.action {
            ActionKind::Approve => Action::Approve,
            ActionKind::Reject => Action::Reject {
                reason_code: self.reason.unwrap_or_default(),
            },
            ActionKind::Sign => {
                if self.kind != ItemKind::Song {
                    return Err(ValidationError::UnsupportedAction);
                }
                let artist = self.artist.as_deref().map(str::trim).unwrap_or_default();
                let title = self.title.as_deref().map(str::trim).unwrap_or_default();
                if artist.is_empty() || title.is_empty() {
                    return Err(ValidationError::EmptyFields);
                }
                Action::Sign {
                    artist: artist.to_string(),
                    title: title.to_string(),
                }
            }
        };
        Ok((key, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn webhook_body_parses_into_tagged_item() {
        let item: ModerationItem = serde_json::from_value(json!({
            "type": "song",
            "id": 7,
            "artist": "A",
            "title": "T",
            "uploader": "u",
            "audio_url": "https://cdn/7.mp3"
        }))
        .unwrap();
        assert_eq!(item.key().to_string(), "song:7");
        match item {
            ModerationItem::Song(song) => {
                assert_eq!(song.artist.as_deref(), Some("A"));
                assert_eq!(song.extra["audio_url"], "https://cdn/7.mp3");
                assert!(song.extra.get("type").is_none());
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn unknown_webhook_type_is_rejected() {
        let res: Result<ModerationItem, _> =
            serde_json::from_value(json!({ "type": "album", "id": 1 }));
        assert!(res.is_err());
    }

    #[test]
    fn annotated_item_keeps_extra_fields() {
        let cover: PlaylistCover = serde_json::from_value(json!({
            "id": 3, "name": "Mix", "creator": "bob", "cover_url": "https://cdn/3.png"
        }))
        .unwrap();
        let value = serde_json::to_value(Annotated {
            item: cover,
            handled_by: Some("Ivan".into()),
        })
        .unwrap();
        assert_eq!(value["cover_url"], "https://cdn/3.png");
        assert_eq!(value["handled_by"], "Ivan");
        assert_eq!(value["id"], 3);
    }

    #[test]
    fn sign_requires_trimmed_fields() {
        let req = ActionRequest {
            kind: ItemKind::Song,
            id: 1,
            action: ActionKind::Sign,
            reason: None,
            artist: Some("   ".into()),
            title: Some("Song".into()),
        };
        assert_eq!(req.into_action(), Err(ValidationError::EmptyFields));

        let req = ActionRequest {
            kind: ItemKind::Song,
            id: 1,
            action: ActionKind::Sign,
            reason: None,
            artist: Some(" Band ".into()),
            title: Some(" Song".into()),
        };
        let (_, action) = req.into_action().unwrap();
        assert_eq!(
            action,
            Action::Sign {
                artist: "Band".into(),
                title: "Song".into()
            }
        );
    }

    #[test]
    fn sign_only_applies_to_songs() {
        let req = ActionRequest {
            kind: ItemKind::Cover,
            id: 1,
            action: ActionKind::Sign,
            reason: None,
            artist: Some("a".into()),
            title: Some("b".into()),
        };
        assert_eq!(req.into_action(), Err(ValidationError::UnsupportedAction));
    }
}
