use pal_domain::error::Result;
use pal_domain::model::{Conversation, Memory, Message, Persona};

/// Storage operations used by the orchestration runtime and the CLI.
///
/// Message pages are always returned oldest-first. `offset` counts back from
/// the newest message, so `get_messages(id, 20, 0)` is the latest twenty.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ── reads ─────────────────────────────────────────────────────

    async fn get_friend(&self, id: &str) -> Result<Option<Persona>>;
    async fn list_friends(&self) -> Result<Vec<Persona>>;
    async fn get_messages(&self, conversation_id: &str, limit: usize, offset: usize) -> Result<Vec<Message>>;
    /// Number of stored messages; changes whenever anyone posts.
    async fn message_count(&self, conversation_id: &str) -> Result<usize>;
    /// Newest first.
    async fn get_memories(&self, friend_id: &str) -> Result<Vec<Memory>>;
    /// Most recently active first.
    async fn get_conversations(&self) -> Result<Vec<Conversation>>;
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;
    async fn get_last_message(&self, conversation_id: &str) -> Result<Option<Message>>;
    async fn user_name(&self) -> Result<String>;

    // ── runtime writes ────────────────────────────────────────────

    async fn create_message(&self, message: Message) -> Result<Message>;
    async fn update_conversation_last_message(&self, conversation_id: &str, text: &str) -> Result<()>;
    /// Apply affect deltas; values are clamped to their ranges.
    async fn update_friend_stats(&self, id: &str, intimacy_delta: i32, mood_delta: i32) -> Result<()>;
    async fn create_memory(&self, memory: Memory) -> Result<Memory>;

    // ── user actions ──────────────────────────────────────────────

    async fn create_friend(&self, friend: Persona) -> Result<Persona>;
    async fn update_friend(&self, friend: Persona) -> Result<()>;
    /// Removes the persona, its memories, its private conversations and its
    /// seat in every group.
    async fn delete_friend(&self, id: &str) -> Result<()>;
    async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation>;
    async fn delete_conversation(&self, id: &str) -> Result<()>;
    async fn delete_message(&self, message_id: &str) -> Result<()>;
    async fn clear_conversation(&self, id: &str) -> Result<()>;
    async fn delete_memory(&self, id: &str) -> Result<()>;

    /// Persist pending changes. No-op for stores that write through.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// The private conversation with `friend_id`, if one exists.
    async fn find_private_conversation(&self, friend_id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .get_conversations()
            .await?
            .into_iter()
            .find(|c| c.is_private() && c.friend_ids.iter().any(|f| f == friend_id)))
    }

    /// Reuse the private conversation with `friend_id` or start one.
    async fn open_private_conversation(&self, friend_id: &str) -> Result<Conversation> {
        if let Some(existing) = self.find_private_conversation(friend_id).await? {
            return Ok(existing);
        }
        self.create_conversation(Conversation::private(friend_id)).await
    }
}
