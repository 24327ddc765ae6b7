//! `palchat chat`: interactive REPL over one conversation.
//!
//! Lines typed at the prompt go to the conversation's session, which
//! debounces them and lets the personas answer. Replies (including idle
//! outreach) arrive through a channel sink and are printed as they land.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use pal_domain::config::Config;
use pal_domain::model::{Conversation, Message};

use super::friends::resolve_friend;
use crate::bootstrap::{self, BackgroundTasks};
use crate::runtime::notify::{ChannelSink, Delivery};
use crate::runtime::{spawn_session, DeliveryOrigin, SessionHandle};
use crate::state::AppState;

const HISTORY_PREVIEW: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(config: Config, conversation: Option<String>, friend: Option<String>) -> anyhow::Result<()> {
    // 1. Boot the runtime with a sink the REPL can print from.
    let (sink, mut deliveries) = ChannelSink::new();
    let state = bootstrap::build_app_state(config, Arc::new(sink)).await?;
    let background = bootstrap::spawn_background_tasks(&state, BackgroundTasks::from_config(&state.config));

    let conversation = pick_conversation(&state, conversation.as_deref(), friend.as_deref()).await?;

    // 2. Print replies as they are delivered.
    let printer = tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            print_delivery(&delivery);
        }
    });

    // 3. Readline editor with a history file in $HOME.
    let history_path = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".palchat_history");
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    print_header(&state, &conversation).await?;
    let mut session = spawn_session(state.clone(), conversation.id.clone());

    // 4. REPL loop.
    loop {
        let readline = tokio::task::block_in_place(|| rl.readline("you> "));
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                // ── Slash commands ────────────────────────────────
                if trimmed.starts_with('/') {
                    match handle_slash_command(&state, &mut session, trimmed).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("\x1B[31merror: {e:#}\x1B[0m"),
                    }
                    continue;
                }

                // ── User message → debounced persona replies ─────
                if let Err(e) = session.submit(trimmed, Vec::new()).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    // 5. Shut down: discard buffered input, let running replies finish.
    rl.save_history(&history_path).ok();
    session.close().await;
    for handle in background {
        handle.abort();
    }
    printer.abort();
    state.store.flush().await.context("saving store")?;

    eprintln!("Bye!");
    Ok(())
}

async fn pick_conversation(
    state: &AppState,
    conversation: Option<&str>,
    friend: Option<&str>,
) -> anyhow::Result<Conversation> {
    let store = state.store.as_ref();
    if let Some(id) = conversation {
        return store
            .get_conversation(id)
            .await?
            .with_context(|| format!("no conversation {id}"));
    }
    if let Some(key) = friend {
        let persona = resolve_friend(store, key).await?;
        return Ok(store.open_private_conversation(&persona.id).await?);
    }
    store
        .get_conversations()
        .await?
        .into_iter()
        .next()
        .context("no conversations yet; add a friend with `palchat friend add`")
}

async fn print_header(state: &AppState, conversation: &Conversation) -> anyhow::Result<()> {
    let store = state.store.as_ref();
    let mut names = Vec::new();
    for id in &conversation.friend_ids {
        if let Some(p) = store.get_friend(id).await? {
            names.push(p.name);
        }
    }
    let title = conversation.name.clone().unwrap_or_else(|| names.join(", "));
    eprintln!("palchat: {title}  ({})", names.join(", "));
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();
    for m in store.get_messages(&conversation.id, HISTORY_PREVIEW, 0).await? {
        print_message(&m, None);
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
async fn handle_slash_command(state: &AppState, session: &mut SessionHandle, input: &str) -> anyhow::Result<bool> {
    let store = state.store.as_ref();
    let (cmd, arg) = match input.split_once(' ') {
        Some((c, a)) => (c, a.trim()),
        None => (input, ""),
    };

    match cmd {
        "/exit" | "/quit" => return Ok(true),

        "/retry" => {
            session.retry().await?;
            eprintln!("Retrying the last message...");
        }

        "/switch" => {
            if arg.is_empty() {
                eprintln!("Usage: /switch <friend name | friend id | conversation id>");
                return Ok(false);
            }
            let next = match store.get_conversation(arg).await? {
                Some(c) => c,
                None => {
                    let persona = resolve_friend(store, arg).await?;
                    store.open_private_conversation(&persona.id).await?
                }
            };
            session.cancel().await.ok();
            let previous = std::mem::replace(session, spawn_session(state.clone(), next.id.clone()));
            tokio::spawn(previous.close());
            print_header(state, &next).await?;
        }

        "/memories" => {
            let conversation = store
                .get_conversation(session.conversation_id())
                .await?
                .context("conversation no longer exists")?;
            for id in &conversation.friend_ids {
                let Some(persona) = store.get_friend(id).await? else {
                    continue;
                };
                let memories = store.get_memories(id).await?;
                eprintln!("{} remembers {} thing(s):", persona.name, memories.len());
                for m in memories {
                    eprintln!("  {}  {}", m.id, m.content);
                }
            }
        }

        "/forget" => {
            if arg.is_empty() {
                eprintln!("Usage: /forget <memory id>");
            } else {
                store.delete_memory(arg).await?;
                eprintln!("Forgotten.");
            }
        }

        "/delete" => {
            if arg.is_empty() {
                eprintln!("Usage: /delete <message id>");
            } else {
                store.delete_message(arg).await?;
                eprintln!("Message deleted.");
            }
        }

        "/history" => {
            let n = arg.parse().unwrap_or(HISTORY_PREVIEW);
            for m in store.get_messages(session.conversation_id(), n, 0).await? {
                print_message(&m, None);
            }
        }

        "/clear" => {
            store.clear_conversation(session.conversation_id()).await?;
            eprintln!("Conversation cleared.");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /retry             Re-send your last message right away");
            eprintln!("  /switch <target>   Open another conversation (friend or conversation id)");
            eprintln!("  /memories          Show what the friends here remember");
            eprintln!("  /forget <id>       Delete a memory");
            eprintln!("  /history [n]       Show the last n messages");
            eprintln!("  /delete <id>       Delete a message");
            eprintln!("  /clear             Delete every message in this conversation");
            eprintln!("  /exit, /quit       Exit the chat");
            eprintln!("  /help              Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    Ok(false)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn print_delivery(delivery: &Delivery) {
    print_message(&delivery.message, Some(delivery.origin));
}

fn print_message(m: &Message, origin: Option<DeliveryOrigin>) {
    let tag = match origin {
        Some(DeliveryOrigin::Outreach) => " \x1B[2m(reached out)\x1B[0m",
        _ => "",
    };
    let images = if m.images.is_empty() {
        String::new()
    } else {
        format!(" \x1B[2m[{} image(s)]\x1B[0m", m.images.len())
    };
    if m.is_from_user() {
        println!("\x1B[2m{}>\x1B[0m {}{images}", m.sender_name, m.content);
    } else {
        println!("\r\x1B[1m{}>\x1B[0m {}{images}{tag}", m.sender_name, m.content);
    }
}
