//! `palchat friend …` and `palchat group …`.

use anyhow::Context;

use pal_domain::model::{Conversation, Persona};
use pal_store::Store;

use super::{FriendCommand, GroupCommand};
use crate::runtime::persona_state;
use crate::state::AppState;

/// Find a friend by id, falling back to a case-insensitive name match.
pub async fn resolve_friend(store: &dyn Store, key: &str) -> anyhow::Result<Persona> {
    if let Some(p) = store.get_friend(key).await? {
        return Ok(p);
    }
    let mut matches: Vec<Persona> = store
        .list_friends()
        .await?
        .into_iter()
        .filter(|p| p.name.eq_ignore_ascii_case(key))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no friend with id or name \"{key}\""),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("{n} friends are named \"{key}\"; use the id instead"),
    }
}

pub async fn run_friend(state: &AppState, cmd: FriendCommand) -> anyhow::Result<()> {
    let store = state.store.as_ref();
    match cmd {
        FriendCommand::Add {
            name,
            personality,
            appearance,
            auto_reply,
            idle_minutes,
        } => {
            let mut persona = Persona::new(name, personality);
            persona.appearance = appearance;
            persona.auto_reply.enabled = auto_reply;
            persona.auto_reply.idle_minutes = idle_minutes;
            let persona = store.create_friend(persona).await?;
            let conversation = store.open_private_conversation(&persona.id).await?;
            println!("Added {} ({})", persona.name, persona.id);
            println!("Private chat: {}", conversation.id);
        }
        FriendCommand::List => {
            let friends = store.list_friends().await?;
            if friends.is_empty() {
                println!("No friends yet. Add one with `palchat friend add <name> --personality ...`");
            }
            for f in friends {
                println!(
                    "{}  {:<12} mood {:>3} ({})  intimacy {:>4} ({})  outreach {}",
                    f.id,
                    f.name,
                    f.mood,
                    f.mood_label(),
                    f.intimacy,
                    f.relationship_label(),
                    if f.auto_reply.enabled {
                        format!("after {}m", f.auto_reply.idle_minutes)
                    } else {
                        "off".to_owned()
                    },
                );
            }
        }
        FriendCommand::Remove { friend } => {
            let persona = resolve_friend(store, &friend).await?;
            store.delete_friend(&persona.id).await?;
            println!("Removed {} and their memories", persona.name);
        }
        FriendCommand::Refresh { friend } => {
            let persona = resolve_friend(store, &friend).await?;
            let updated = persona_state::regenerate_state(state, &persona.id).await?;
            println!(
                "{}: wearing {}, {}, mood {}",
                updated.name,
                updated.outfit.as_deref().unwrap_or("-"),
                updated.physical_condition.as_deref().unwrap_or("-"),
                updated.mood
            );
        }
        FriendCommand::Avatar { friend } => {
            let mut persona = resolve_friend(store, &friend).await?;
            let avatar = persona_state::generate_avatar(state, &persona)
                .await
                .with_context(|| format!("generating avatar for {}", persona.name))?;
            println!("Avatar updated for {} ({} bytes)", persona.name, avatar.len());
            persona.avatar = Some(avatar);
            store.update_friend(persona).await?;
        }
    }
    store.flush().await.context("saving store")?;
    Ok(())
}

pub async fn run_group(state: &AppState, cmd: GroupCommand) -> anyhow::Result<()> {
    let store = state.store.as_ref();
    match cmd {
        GroupCommand::Create { name, members } => {
            let mut ids = Vec::with_capacity(members.len());
            for m in &members {
                ids.push(resolve_friend(store, m).await?.id);
            }
            let conversation = store.create_conversation(Conversation::group(name, ids)).await?;
            println!("Created group {} ({})", conversation.name.as_deref().unwrap_or("-"), conversation.id);
        }
        GroupCommand::List => {
            for c in store.get_conversations().await? {
                let title = match &c.name {
                    Some(name) => name.clone(),
                    None => {
                        let mut names = Vec::new();
                        for id in &c.friend_ids {
                            if let Some(p) = store.get_friend(id).await? {
                                names.push(p.name);
                            }
                        }
                        names.join(", ")
                    }
                };
                println!(
                    "{}  {:<7} {:<20} {}",
                    c.id,
                    if c.is_private() { "private" } else { "group" },
                    title,
                    c.last_message.as_deref().unwrap_or("")
                );
            }
        }
    }
    store.flush().await.context("saving store")?;
    Ok(())
}
