use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender id reserved for the human user. Every other sender id is a
/// persona id.
pub const USER_SENDER_ID: &str = "user";

/// Content cached as the conversation's last message when only images
/// were sent.
pub const IMAGE_PLACEHOLDER: &str = "[image]";

pub const MOOD_MAX: i32 = 100;
pub const INTIMACY_MAX: i32 = 1000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Personas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-persona idle outreach settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReply {
    pub enabled: bool,
    /// Minutes of silence before the persona reaches out. Zero means
    /// "use the configured default".
    pub idle_minutes: u32,
}

impl Default for AutoReply {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_minutes: 10,
        }
    }
}

/// A persistent AI character ("friend").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub personality: String,
    #[serde(default)]
    pub appearance: String,
    /// Inline `data:` payload or URL.
    #[serde(default)]
    pub avatar: Option<String>,
    pub mood: i32,
    pub intimacy: i32,
    #[serde(default)]
    pub outfit: Option<String>,
    #[serde(default)]
    pub physical_condition: Option<String>,
    #[serde(default)]
    pub last_state_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_reply: AutoReply,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    pub fn new(name: impl Into<String>, personality: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            personality: personality.into(),
            appearance: String::new(),
            avatar: None,
            mood: 50,
            intimacy: 0,
            outfit: None,
            physical_condition: None,
            last_state_update: None,
            auto_reply: AutoReply::default(),
            created_at: Utc::now(),
        }
    }

    /// Apply affect deltas, clamping mood to 0..=100 and intimacy to 0..=1000.
    pub fn apply_stats(&mut self, intimacy_delta: i32, mood_delta: i32) {
        self.intimacy = (self.intimacy + intimacy_delta).clamp(0, INTIMACY_MAX);
        self.mood = (self.mood + mood_delta).clamp(0, MOOD_MAX);
    }

    pub fn mood_label(&self) -> &'static str {
        match self.mood {
            m if m >= 80 => "very happy",
            m if m >= 60 => "cheerful",
            m if m >= 40 => "calm",
            m if m >= 20 => "a little down",
            _ => "upset",
        }
    }

    pub fn relationship_label(&self) -> &'static str {
        match self.intimacy {
            i if i >= 800 => "soulmate",
            i if i >= 500 => "close friend",
            i if i >= 200 => "good friend",
            i if i >= 50 => "friend",
            _ => "acquaintance",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Private,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    /// Reply order for group turns.
    pub friend_ids: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn private(friend_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ConversationKind::Private,
            friend_ids: vec![friend_id.into()],
            name: None,
            last_message: None,
            last_message_time: None,
            created_at: Utc::now(),
        }
    }

    pub fn group(name: impl Into<String>, friend_ids: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ConversationKind::Group,
            friend_ids,
            name: Some(name.into()),
            last_message: None,
            last_message_time: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ConversationKind::Private
    }

    /// A private conversation must reference exactly one persona; a group
    /// needs at least one.
    pub fn check_members(&self) -> crate::error::Result<()> {
        match self.kind {
            ConversationKind::Private if self.friend_ids.len() != 1 => Err(
                crate::error::Error::Store(format!(
                    "private conversation {} must have exactly one friend, got {}",
                    self.id,
                    self.friend_ids.len()
                )),
            ),
            ConversationKind::Group if self.friend_ids.is_empty() => Err(
                crate::error::Error::Store(format!("group conversation {} has no members", self.id)),
            ),
            _ => Ok(()),
        }
    }

    /// The instant the conversation last saw activity.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_time.unwrap_or(self.created_at)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    #[default]
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    /// Inline `data:<mime>;base64,...` payloads.
    #[serde(default)]
    pub images: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            content: content.into(),
            images,
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
        }
    }

    pub fn is_from_user(&self) -> bool {
        self.sender_id == USER_SENDER_ID
    }

    /// Text for the conversation's last-message cache.
    pub fn preview(&self) -> String {
        if !self.images.is_empty() && (self.is_from_user() || self.content.trim().is_empty()) {
            IMAGE_PLACEHOLDER.to_owned()
        } else {
            self.content.clone()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Event,
    Preference,
    Fact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub friend_id: String,
    pub content: String,
    pub importance: u8,
    pub kind: MemoryKind,
    pub timestamp: DateTime<Utc>,
}

impl Memory {
    pub fn new(friend_id: impl Into<String>, content: impl Into<String>, importance: u8, kind: MemoryKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            friend_id: friend_id.into(),
            content: content.into(),
            importance,
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_are_clamped() {
        let mut p = Persona::new("Mika", "cheerful");
        p.mood = 99;
        p.intimacy = 999;
        p.apply_stats(2, 3);
        assert_eq!(p.mood, 100);
        assert_eq!(p.intimacy, 1000);

        p.apply_stats(-5000, -500);
        assert_eq!(p.mood, 0);
        assert_eq!(p.intimacy, 0);
    }

    #[test]
    fn private_conversation_requires_one_member() {
        let mut c = Conversation::private("f1");
        assert!(c.check_members().is_ok());
        c.friend_ids.push("f2".into());
        assert!(c.check_members().is_err());
    }

    #[test]
    fn empty_group_is_rejected() {
        let c = Conversation::group("crew", vec![]);
        assert!(c.check_members().is_err());
    }

    #[test]
    fn user_image_message_previews_as_placeholder() {
        let m = Message::new("c1", USER_SENDER_ID, "Me", "look", vec!["data:image/png;base64,AA".into()]);
        assert_eq!(m.preview(), IMAGE_PLACEHOLDER);

        let m = Message::new("c1", USER_SENDER_ID, "Me", "plain", vec![]);
        assert_eq!(m.preview(), "plain");
    }

    #[test]
    fn last_activity_falls_back_to_creation() {
        let c = Conversation::private("f1");
        assert_eq!(c.last_activity(), c.created_at);
    }

    #[test]
    fn new_persona_defaults() {
        let p = Persona::new("Rin", "shy");
        assert_eq!(p.mood, 50);
        assert_eq!(p.intimacy, 0);
        assert!(!p.auto_reply.enabled);
        assert_eq!(p.auto_reply.idle_minutes, 10);
        assert_eq!(p.relationship_label(), "acquaintance");
    }
}
