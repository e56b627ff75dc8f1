//! Human-readable texts: notifications, rules and rejection reasons.
use serde::Serialize;
use teloxide::utils::html::escape;

use crate::model::{ItemKind, ModerationItem, PlaylistCover, PlaylistName, Song};

pub const PANEL_BUTTON_LABEL: &str = "🎛 Open moderation panel";
pub const QUEUE_EMPTY_TEXT: &str = "🎉 <b>Queue is empty! Everything is handled.</b>";
pub const NO_ACCESS_TEXT: &str = "⛔ No access.";

pub const RULES_TEXT: &str = "📋 <b>Track moderation rules</b>

<b>✅ Accept:</b>
• Original tracks (studio recordings)
• Existing songs with the correct title and artist
• Length between 1 and 10 minutes (usually 1–6 minutes)

<b>❌ Reject:</b>
• Voice messages, stream clips, random noise
• Tracks longer than 10–15 minutes
• Political subtext
• Trolling and provocative topics
• Inappropriate content

<b>💡 Tip:</b>
If a track has no credits, look it up online, then fill in the artist and title with the ✍️ button";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RejectReason {
    pub label: &'static str,
    pub code: &'static str,
}

const fn reason(label: &'static str, code: &'static str) -> RejectReason {
    RejectReason { label, code }
}

const SONG_REASONS: &[RejectReason] = &[
    reason("🔇 Not a track (voice/clip)", "not_a_track"),
    reason("🤬 Inappropriate content", "bad_content"),
    reason("⚡ Political subtext", "political"),
    reason("📋 Copyright", "copyright"),
    reason("⏱ Wrong length", "bad_length"),
    reason("🔁 Duplicate", "duplicate"),
    reason("✏️ Other reason", "other"),
];

const NAME_REASONS: &[RejectReason] = &[
    reason("🤬 Offensive name", "offensive"),
    reason("⚡ Political subtext", "political"),
    reason("📢 Spam / advertising", "spam"),
    reason("✏️ Other reason", "other"),
];

const COVER_REASONS: &[RejectReason] = &[
    reason("🔞 Inappropriate image", "nsfw"),
    reason("©️ Someone else's image", "copyright"),
    reason("🖼 Poor quality", "bad_quality"),
    reason("✏️ Other reason", "other"),
];

/// Rejection reasons offered in the panel for `kind`.
pub fn reject_reasons(kind: ItemKind) -> &'static [RejectReason] {
    match kind {
        ItemKind::Song => SONG_REASONS,
        ItemKind::Name => NAME_REASONS,
        ItemKind::Cover => COVER_REASONS,
    }
}

const OTHER_REASON_TEXT: &str = "other reason";

/// Text sent to the Site for a reason code. Unknown codes are taken as
/// free-form text.
pub fn reason_text(code: &str) -> String {
    let text = match code.trim() {
        "" | "other" => OTHER_REASON_TEXT,
        "not_a_track" => "not a track",
        "bad_content" => "inappropriate content",
        "political" => "political subtext",
        "copyright" => "copyright infringement",
        "bad_length" => "wrong length",
        "duplicate" => "duplicate track",
        "offensive" => "offensive name",
        "spam" => "spam / advertising",
        "nsfw" => "inappropriate image",
        "bad_quality" => "poor quality",
        _ => return code.to_string(),
    };
    text.to_string()
}

/// Name a rejected playlist gets instead of the one the user picked.
pub fn fallback_playlist_name(creator: Option<&str>) -> String {
    let creator = creator.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("user");
    format!("Playlist by {}", creator)
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .map(escape)
        .unwrap_or_else(|| "—".to_string())
}

pub fn song_notification(song: &Song) -> String {
    let artist = song.artist.as_deref().filter(|a| !a.is_empty());
    let title = song.title.as_deref().filter(|t| !t.is_empty());
    let tag = if artist.is_none() || title.is_none() {
        "\n⚠️ <b>Track without credits</b>"
    } else {
        ""
    };
    format!(
        "🎵 <b>New song for moderation</b>{}\n\n🎤 {}\n📝 {}\n👤 Uploaded by: {}",
        tag,
        artist.map(escape).unwrap_or_else(|| "❓ Unknown".into()),
        title.map(escape).unwrap_or_else(|| "❓ Unknown".into()),
        or_dash(song.uploader.as_deref()),
    )
}

pub fn name_notification(name: &PlaylistName) -> String {
    format!(
        "📋 <b>New playlist name</b>\n\n📝 <b>{}</b>\n👤 Creator: {}",
        or_dash(name.name.as_deref()),
        or_dash(name.creator.as_deref()),
    )
}

pub fn cover_notification(cover: &PlaylistCover) -> String {
    format!(
        "🖼 <b>New playlist cover</b>\n\n📋 {}\n👤 Creator: {}",
        or_dash(cover.name.as_deref()),
        or_dash(cover.creator.as_deref()),
    )
}

/// Notification for a newly surfaced item; shared by the webhook and the poller.
pub fn notification(item: &ModerationItem) -> String {
    match item {
        ModerationItem::Song(s) => song_notification(s),
        ModerationItem::Name(n) => name_notification(n),
        ModerationItem::Cover(c) => cover_notification(c),
    }
}

pub fn start_text() -> &'static str {
    "👋 <b>Music site moderation bot</b>\n\n\
     Notifications about new songs, playlist names and covers will arrive here.\n\n\
     Press the button below to open the panel:"
}

pub fn panel_text() -> &'static str {
    "🎛 Open the moderation panel:"
}

pub fn id_text(user_id: u64) -> String {
    format!("👤 Your Telegram ID: <code>{}</code>", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn song(artist: Option<&str>, title: Option<&str>) -> Song {
        Song {
            id: 1,
            artist: artist.map(Into::into),
            title: title.map(Into::into),
            uploader: Some("<script>".into()),
            extra: Map::new(),
        }
    }

    #[test]
    fn reason_codes_resolve_and_unknown_pass_through() {
        assert_eq!(reason_text("political"), "political subtext");
        assert_eq!(reason_text("nsfw"), "inappropriate image");
        assert_eq!(reason_text(""), "other reason");
        assert_eq!(reason_text("sounds like a kazoo"), "sounds like a kazoo");
        assert_eq!(reason_text("  "), "other reason");
        assert_eq!(reason_text(" political "), "political subtext");
        // free-form text is sent exactly as typed
        assert_eq!(reason_text("  low bitrate "), "  low bitrate ");
    }

    #[test]
    fn every_offered_code_has_text() {
        for kind in ItemKind::ALL {
            for r in reject_reasons(kind) {
                assert_ne!(reason_text(r.code), r.code, "code {} has no text", r.code);
            }
        }
    }

    #[test]
    fn uncredited_song_is_flagged_and_escaped() {
        let text = song_notification(&song(None, Some("Title")));
        assert!(text.contains("Track without credits"));
        assert!(text.contains("❓ Unknown"));
        assert!(text.contains("&lt;script&gt;"));

        let text = song_notification(&song(Some("Band"), Some("Title")));
        assert!(!text.contains("Track without credits"));
        assert!(text.contains("🎤 Band"));
    }

    #[test]
    fn fallback_name_uses_creator() {
        assert_eq!(fallback_playlist_name(Some("bob")), "Playlist by bob");
        assert_eq!(fallback_playlist_name(Some("  ")), "Playlist by user");
        assert_eq!(fallback_playlist_name(None), "Playlist by user");
    }
}
