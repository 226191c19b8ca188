use serde::{Deserialize, Serialize};

/// Longest preview shown for a conversation's latest message.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// A conversation as returned by the gateway, with its latest message
/// denormalized in (at most one element, newest first).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub messages: Vec<MessagePreview>,
}

impl Conversation {
    pub fn latest_message(&self) -> Option<&MessagePreview> {
        self.messages.first()
    }
}

/// The denormalized latest-message preview attached to a conversation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MessagePreview {
    pub content: String,
    pub is_bot: bool,
}

/// A single chat message. Immutable once created.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub is_bot: bool,
    pub created_at: String,
}

/// Reduced shape returned by the create-conversation mutation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CreatedChat {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

/// The signed-in user, as reported by the auth service.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

impl User {
    /// Name shown in the header: display name, falling back to email.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_default()
    }
}

/// Result of the server-side response-generation action.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ActionReply {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

/// Truncates a message preview to [`PREVIEW_MAX_CHARS`] characters, with a
/// trailing ellipsis when anything was cut.
pub fn preview_text(content: &str) -> String {
    if content.chars().count() <= PREVIEW_MAX_CHARS {
        content.to_string()
    } else {
        let head: String = content.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{head}...")
    }
}

/// Visual prefix for a preview line, by sender-kind.
pub fn sender_prefix(is_bot: bool) -> &'static str {
    if is_bot { "🤖 " } else { "👤 " }
}

/// Extracts "HH:MM" from an ISO-8601 timestamp, falling back to the raw
/// string when it is too short to slice.
pub fn format_timestamp(created_at: &str) -> String {
    created_at
        .get(11..16)
        .map(str::to_string)
        .unwrap_or_else(|| created_at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_short_content_untouched() {
        assert_eq!(preview_text(""), "");
        assert_eq!(preview_text("a"), "a");
        let exactly_fifty = "x".repeat(50);
        assert_eq!(preview_text(&exactly_fifty), exactly_fifty);
    }

    #[test]
    fn preview_long_content_truncated_with_ellipsis() {
        let fifty_one = "y".repeat(51);
        assert_eq!(preview_text(&fifty_one), format!("{}...", "y".repeat(50)));

        let huge = "z".repeat(1000);
        let preview = preview_text(&huge);
        assert_eq!(preview.chars().count(), 53);
        assert!(preview.ends_with("..."));
        assert_eq!(&preview[..50], &huge[..50]);
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let long_unicode: String = "é".repeat(60);
        let preview = preview_text(&long_unicode);
        assert_eq!(preview.chars().count(), 53);
    }

    #[test]
    fn sender_prefix_by_kind() {
        assert_eq!(sender_prefix(true), "🤖 ");
        assert_eq!(sender_prefix(false), "👤 ");
    }

    #[test]
    fn timestamp_extracts_wall_clock_time() {
        assert_eq!(format_timestamp("2025-08-28T09:41:07.123456+00:00"), "09:41");
        assert_eq!(format_timestamp("bogus"), "bogus");
        assert_eq!(format_timestamp(""), "");
    }

    #[test]
    fn user_label_prefers_display_name() {
        let user = User {
            id: "u1".into(),
            email: Some("a@b.c".into()),
            display_name: Some("Ada".into()),
        };
        assert_eq!(user.label(), "Ada");

        let no_name = User { id: "u1".into(), email: Some("a@b.c".into()), display_name: None };
        assert_eq!(no_name.label(), "a@b.c");
    }
}
