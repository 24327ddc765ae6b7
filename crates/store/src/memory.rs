//! In-memory store with JSON snapshot persistence.
//!
//! Snapshots go to a single JSON file (`store.state_path`). Writes mark the
//! store dirty; [`MemoryStore::flush`] writes a temp file and renames it over
//! the snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pal_domain::error::{Error, Result};
use pal_domain::model::{Conversation, Memory, Message, Persona};
use pal_domain::trace::TraceEvent;

use crate::traits::Store;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    friends: Vec<Persona>,
    #[serde(default)]
    conversations: Vec<Conversation>,
    /// conversation id -> messages in insertion order
    #[serde(default)]
    messages: HashMap<String, Vec<Message>>,
    #[serde(default)]
    memories: Vec<Memory>,
}

impl Snapshot {
    fn friend_mut(&mut self, id: &str) -> Result<&mut Persona> {
        self.friends
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::NotFound(format!("friend {id}")))
    }

    fn conversation_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MemoryStore {
    path: Option<PathBuf>,
    user_name: String,
    data: RwLock<Snapshot>,
    dirty: AtomicBool,
}

impl MemoryStore {
    /// A store that never touches disk.
    pub fn ephemeral(user_name: impl Into<String>) -> Self {
        Self {
            path: None,
            user_name: user_name.into(),
            data: RwLock::new(Snapshot::default()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the snapshot at `path`, or start empty when it does not exist.
    pub fn open(path: &Path, user_name: impl Into<String>) -> Result<Self> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Store(format!("corrupt snapshot {}: {e}", path.display())))?
        } else {
            Snapshot::default()
        };

        tracing::info!(
            friends = data.friends.len(),
            conversations = data.conversations.len(),
            path = %path.display(),
            "store loaded"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            user_name: user_name.into(),
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Persist the current state if anything changed since the last flush.
    pub fn flush_now(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }

        let (json, conversations, messages) = {
            let data = self.data.read();
            let json = serde_json::to_string_pretty(&*data)?;
            let messages = data.messages.values().map(Vec::len).sum::<usize>();
            (json, data.conversations.len(), messages)
        };

        let result = (|| -> Result<()> {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(&tmp, path)?;
            Ok(())
        })();

        if let Err(e) = result {
            self.touch();
            return Err(e);
        }

        TraceEvent::StoreFlushed {
            path: path.display().to_string(),
            conversations,
            messages,
        }
        .emit();
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get_friend(&self, id: &str) -> Result<Option<Persona>> {
        Ok(self.data.read().friends.iter().find(|f| f.id == id).cloned())
    }

    async fn list_friends(&self) -> Result<Vec<Persona>> {
        Ok(self.data.read().friends.clone())
    }

    async fn get_messages(&self, conversation_id: &str, limit: usize, offset: usize) -> Result<Vec<Message>> {
        let data = self.data.read();
        let Some(all) = data.messages.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let end = all.len().saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok(all[start..end].to_vec())
    }

    async fn message_count(&self, conversation_id: &str) -> Result<usize> {
        Ok(self
            .data
            .read()
            .messages
            .get(conversation_id)
            .map_or(0, Vec::len))
    }

    async fn get_memories(&self, friend_id: &str) -> Result<Vec<Memory>> {
        let mut out: Vec<Memory> = self
            .data
            .read()
            .memories
            .iter()
            .filter(|m| m.friend_id == friend_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        out.reverse();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>> {
        let mut out = self.data.read().conversations.clone();
        out.sort_by(|a, b| {
            b.last_message_time
                .is_some()
                .cmp(&a.last_message_time.is_some())
                .then(b.last_message_time.cmp(&a.last_message_time))
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .data
            .read()
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_last_message(&self, conversation_id: &str) -> Result<Option<Message>> {
        Ok(self
            .data
            .read()
            .messages
            .get(conversation_id)
            .and_then(|m| m.last())
            .cloned())
    }

    async fn user_name(&self) -> Result<String> {
        Ok(self.user_name.clone())
    }

    async fn create_message(&self, message: Message) -> Result<Message> {
        {
            let mut data = self.data.write();
            if !data.conversations.iter().any(|c| c.id == message.conversation_id) {
                return Err(Error::NotFound(format!(
                    "conversation {}",
                    message.conversation_id
                )));
            }
            data.messages
                .entry(message.conversation_id.clone())
                .or_default()
                .push(message.clone());
        }
        self.touch();
        Ok(message)
    }

    async fn update_conversation_last_message(&self, conversation_id: &str, text: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let conv = data.conversation_mut(conversation_id)?;
            conv.last_message = Some(text.to_owned());
            conv.last_message_time = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    async fn update_friend_stats(&self, id: &str, intimacy_delta: i32, mood_delta: i32) -> Result<()> {
        self.data
            .write()
            .friend_mut(id)?
            .apply_stats(intimacy_delta, mood_delta);
        self.touch();
        Ok(())
    }

    async fn create_memory(&self, memory: Memory) -> Result<Memory> {
        {
            let mut data = self.data.write();
            if !data.friends.iter().any(|f| f.id == memory.friend_id) {
                return Err(Error::NotFound(format!("friend {}", memory.friend_id)));
            }
            data.memories.push(memory.clone());
        }
        self.touch();
        Ok(memory)
    }

    async fn create_friend(&self, friend: Persona) -> Result<Persona> {
        {
            let mut data = self.data.write();
            if data.friends.iter().any(|f| f.id == friend.id) {
                return Err(Error::Store(format!("friend {} already exists", friend.id)));
            }
            data.friends.push(friend.clone());
        }
        self.touch();
        Ok(friend)
    }

    async fn update_friend(&self, friend: Persona) -> Result<()> {
        {
            let mut data = self.data.write();
            let slot = data.friend_mut(&friend.id)?;
            *slot = friend;
        }
        self.touch();
        Ok(())
    }

    async fn delete_friend(&self, id: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let before = data.friends.len();
            data.friends.retain(|f| f.id != id);
            if data.friends.len() == before {
                return Err(Error::NotFound(format!("friend {id}")));
            }
            data.memories.retain(|m| m.friend_id != id);

            let doomed: Vec<String> = data
                .conversations
                .iter()
                .filter(|c| c.is_private() && c.friend_ids.iter().any(|f| f == id))
                .map(|c| c.id.clone())
                .collect();
            data.conversations.retain(|c| !doomed.contains(&c.id));
            for cid in &doomed {
                data.messages.remove(cid);
            }
            for conv in data.conversations.iter_mut() {
                conv.friend_ids.retain(|f| f != id);
            }
        }
        self.touch();
        Ok(())
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation> {
        conversation.check_members()?;
        {
            let mut data = self.data.write();
            if let Some(missing) = conversation
                .friend_ids
                .iter()
                .find(|fid| !data.friends.iter().any(|f| &f.id == *fid))
            {
                return Err(Error::NotFound(format!("friend {missing}")));
            }
            if data.conversations.iter().any(|c| c.id == conversation.id) {
                return Err(Error::Store(format!(
                    "conversation {} already exists",
                    conversation.id
                )));
            }
            data.conversations.push(conversation.clone());
        }
        self.touch();
        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let before = data.conversations.len();
            data.conversations.retain(|c| c.id != id);
            if data.conversations.len() == before {
                return Err(Error::NotFound(format!("conversation {id}")));
            }
            data.messages.remove(id);
        }
        self.touch();
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<()> {
        let removed = {
            let mut data = self.data.write();
            data.messages.values_mut().any(|msgs| {
                let before = msgs.len();
                msgs.retain(|m| m.id != message_id);
                msgs.len() != before
            })
        };
        if !removed {
            return Err(Error::NotFound(format!("message {message_id}")));
        }
        self.touch();
        Ok(())
    }

    async fn clear_conversation(&self, id: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let conv = data.conversation_mut(id)?;
            conv.last_message = None;
            conv.last_message_time = None;
            data.messages.remove(id);
        }
        self.touch();
        Ok(())
    }

    async fn delete_memory(&self, id: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let before = data.memories.len();
            data.memories.retain(|m| m.id != id);
            if data.memories.len() == before {
                return Err(Error::NotFound(format!("memory {id}")));
            }
        }
        self.touch();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_domain::model::{MemoryKind, USER_SENDER_ID};

    async fn seeded() -> (MemoryStore, Persona, Conversation) {
        let store = MemoryStore::ephemeral("Me");
        let p = store.create_friend(Persona::new("Rin", "shy")).await.unwrap();
        let c = store.create_conversation(Conversation::private(&p.id)).await.unwrap();
        (store, p, c)
    }

    #[tokio::test]
    async fn pages_are_chronological_and_offset_from_newest() {
        let (store, _, c) = seeded().await;
        for i in 0..5 {
            store
                .create_message(Message::new(&c.id, USER_SENDER_ID, "Me", format!("m{i}"), vec![]))
                .await
                .unwrap();
        }
        let page: Vec<_> = store
            .get_messages(&c.id, 2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(page, vec!["m3", "m4"]);

        let page: Vec<_> = store
            .get_messages(&c.id, 2, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(page, vec!["m1", "m2"]);

        assert_eq!(store.get_messages(&c.id, 10, 10).await.unwrap().len(), 0);
        assert_eq!(store.message_count(&c.id).await.unwrap(), 5);
        assert_eq!(store.get_last_message(&c.id).await.unwrap().unwrap().content, "m4");
    }

    #[tokio::test]
    async fn message_into_unknown_conversation_fails() {
        let store = MemoryStore::ephemeral("Me");
        let err = store
            .create_message(Message::new("nope", USER_SENDER_ID, "Me", "hi", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn private_conversation_must_have_one_friend() {
        let store = MemoryStore::ephemeral("Me");
        let a = store.create_friend(Persona::new("A", "x")).await.unwrap();
        let b = store.create_friend(Persona::new("B", "y")).await.unwrap();
        let mut c = Conversation::private(&a.id);
        c.friend_ids.push(b.id.clone());
        assert!(store.create_conversation(c).await.is_err());
        assert!(store
            .create_conversation(Conversation::private("ghost"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_friend_cascades() {
        let (store, rin, private) = seeded().await;
        let kai = store.create_friend(Persona::new("Kai", "loud")).await.unwrap();
        let group = store
            .create_conversation(Conversation::group("crew", vec![rin.id.clone(), kai.id.clone()]))
            .await
            .unwrap();
        store
            .create_message(Message::new(&private.id, USER_SENDER_ID, "Me", "hi", vec![]))
            .await
            .unwrap();
        store
            .create_memory(Memory::new(&rin.id, "likes tea", 5, MemoryKind::Fact))
            .await
            .unwrap();

        store.delete_friend(&rin.id).await.unwrap();

        assert!(store.get_friend(&rin.id).await.unwrap().is_none());
        assert!(store.get_conversation(&private.id).await.unwrap().is_none());
        assert_eq!(store.message_count(&private.id).await.unwrap(), 0);
        assert!(store.get_memories(&rin.id).await.unwrap().is_empty());
        let group = store.get_conversation(&group.id).await.unwrap().unwrap();
        assert_eq!(group.friend_ids, vec![kai.id]);
    }

    #[tokio::test]
    async fn stats_are_clamped_in_store() {
        let (store, p, _) = seeded().await;
        store.update_friend_stats(&p.id, 2, 3).await.unwrap();
        let got = store.get_friend(&p.id).await.unwrap().unwrap();
        assert_eq!((got.intimacy, got.mood), (2, 53));
        store.update_friend_stats(&p.id, 5000, 5000).await.unwrap();
        let got = store.get_friend(&p.id).await.unwrap().unwrap();
        assert_eq!((got.intimacy, got.mood), (1000, 100));
    }

    #[tokio::test]
    async fn conversations_sorted_by_activity() {
        let (store, p, first) = seeded().await;
        let other = store.create_friend(Persona::new("Kai", "loud")).await.unwrap();
        let second = store
            .create_conversation(Conversation::group("g", vec![p.id.clone(), other.id.clone()]))
            .await
            .unwrap();
        store.update_conversation_last_message(&first.id, "yo").await.unwrap();
        let ids: Vec<_> = store
            .get_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![first.id.clone(), second.id.clone()]);
    }

    #[tokio::test]
    async fn clear_and_delete_message() {
        let (store, _, c) = seeded().await;
        let m = store
            .create_message(Message::new(&c.id, USER_SENDER_ID, "Me", "one", vec![]))
            .await
            .unwrap();
        store
            .create_message(Message::new(&c.id, USER_SENDER_ID, "Me", "two", vec![]))
            .await
            .unwrap();
        store.delete_message(&m.id).await.unwrap();
        assert_eq!(store.message_count(&c.id).await.unwrap(), 1);
        assert!(store.delete_message(&m.id).await.is_err());

        store.update_conversation_last_message(&c.id, "two").await.unwrap();
        store.clear_conversation(&c.id).await.unwrap();
        assert_eq!(store.message_count(&c.id).await.unwrap(), 0);
        assert!(store.get_conversation(&c.id).await.unwrap().unwrap().last_message.is_none());
    }

    #[tokio::test]
    async fn open_private_conversation_reuses_existing() {
        let (store, p, c) = seeded().await;
        let again = store.open_private_conversation(&p.id).await.unwrap();
        assert_eq!(again.id, c.id);
        assert_eq!(store.get_conversations().await.unwrap().len(), 1);
    }
}
