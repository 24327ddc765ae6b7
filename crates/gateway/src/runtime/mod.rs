//! Conversation runtime: the pieces that decide when a persona speaks and
//! what happens to its reply.
//!
//! Flow: user input → [`session`] (debounce) → [`scheduler`] (persona order,
//! interruption, pacing) → [`turn`] (prompt, model call, decode, persist) →
//! [`notify::DeliverySink`]. The [`outreach`] sweep feeds the same scheduler
//! with a synthetic prompt.

pub mod debounce;
pub mod decoder;
pub mod history;
pub mod notify;
pub mod outreach;
pub mod persona_state;
pub mod prompt;
pub mod scheduler;
pub mod session;
pub mod session_lock;
pub mod status;
pub mod turn;

use serde::Serialize;

pub use notify::{Delivery, DeliverySink};
pub use scheduler::{dispatch, run_pass, PassOutcome};
pub use session::{spawn_session, SessionCommand, SessionHandle};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GenerationRequest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What triggered a scheduler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrigin {
    User,
    Retry,
    Outreach,
}

impl DeliveryOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOrigin::User => "user",
            DeliveryOrigin::Retry => "retry",
            DeliveryOrigin::Outreach => "outreach",
        }
    }
}

/// One scheduler pass over a conversation's personas.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub conversation_id: String,
    /// Persona ids in reply order.
    pub targets: Vec<String>,
    /// Goes to the first target only; later targets answer the history.
    pub text: String,
    pub images: Vec<String>,
    pub origin: DeliveryOrigin,
}

impl GenerationRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        targets: Vec<String>,
        text: impl Into<String>,
        images: Vec<String>,
        origin: DeliveryOrigin,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            targets,
            text: text.into(),
            images,
            origin,
        }
    }
}
