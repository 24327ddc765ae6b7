pub mod chat;
pub mod config;
pub mod daemon;
pub mod friends;

use clap::{Parser, Subcommand};

/// palchat: chat with persistent AI personas.
#[derive(Debug, Parser)]
#[command(name = "palchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default when no subcommand is given).
    Chat {
        /// Conversation id to open.
        #[arg(long, conflicts_with = "friend")]
        conversation: Option<String>,
        /// Open (or start) the private chat with this friend (id or name).
        #[arg(long)]
        friend: Option<String>,
    },
    /// Manage friends (personas).
    #[command(subcommand)]
    Friend(FriendCommand),
    /// Manage group chats.
    #[command(subcommand)]
    Group(GroupCommand),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run idle outreach and daily refresh without a terminal.
    Daemon,
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum FriendCommand {
    /// Create a friend.
    Add {
        name: String,
        /// Free-text personality description.
        #[arg(long)]
        personality: String,
        #[arg(long, default_value = "")]
        appearance: String,
        /// Let this friend message you after a quiet period.
        #[arg(long)]
        auto_reply: bool,
        /// Quiet minutes before reaching out.
        #[arg(long, default_value_t = 10)]
        idle_minutes: u32,
    },
    /// List friends with their current state.
    List,
    /// Delete a friend with their memories and private chat.
    Remove {
        /// Friend id or name.
        friend: String,
    },
    /// Ask the model for a fresh outfit, condition and mood.
    Refresh {
        friend: String,
    },
    /// Generate a new avatar image.
    Avatar {
        friend: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// Create a group chat.
    Create {
        name: String,
        /// Member ids or names, in reply order.
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// List conversations.
    List,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
    /// List the built-in models for each configured provider.
    Models,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `PAL_CONFIG` (or `palchat.toml`
/// by default). A missing file yields the defaults. Returns the parsed
/// [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(pal_domain::config::Config, String)> {
    let config_path = std::env::var("PAL_CONFIG").unwrap_or_else(|_| "palchat.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pal_domain::config::Config::default()
    };

    Ok((config, config_path))
}
