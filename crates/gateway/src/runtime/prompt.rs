//! System prompt and outreach prompt construction.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use pal_domain::config::PromptsConfig;
use pal_domain::model::{Memory, Message, Persona};

/// Chars of the last user message quoted as the outreach topic.
const TOPIC_CHARS: usize = 30;

/// Resolve the configured timezone. Unknown names fall back to UTC.
pub fn timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(timezone = name, "unknown timezone, using UTC");
        Tz::UTC
    })
}

pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Role-play instructions for one persona call.
///
/// `memories` is expected newest first and already truncated to the
/// configured context size.
pub fn system_prompt(
    persona: &Persona,
    memories: &[Memory],
    user_name: &str,
    now: &DateTime<Tz>,
    prompts: &PromptsConfig,
) -> String {
    let name = &persona.name;
    let mut out = String::with_capacity(2048);

    if !prompts.system_prefix.trim().is_empty() {
        out.push_str(prompts.system_prefix.trim());
        out.push_str("\n\n");
    }

    out.push_str(&format!(
        "[Role-play]\nYou are {name}, taking part in an immersive chat. You are not an AI assistant; stay in character at all times.\n\n"
    ));

    out.push_str(&format!(
        "[Identity]\n- Your name is {name}.\n- Every history line without a bracketed prefix was said by you.\n- Do not confuse yourself with anyone else in the chat.\n\n"
    ));

    out.push_str("[State]\n");
    out.push_str(&format!("Time: {}\n", now.format("%Y-%m-%d %H:%M (%A)")));
    out.push_str(&format!("Personality: {}\n", persona.personality));
    out.push_str(&format!("Mood: {}\n", persona.mood_label()));
    out.push_str(&format!(
        "Condition: {}\n",
        persona.physical_condition.as_deref().unwrap_or("doing fine")
    ));
    out.push_str(&format!("Outfit: {}\n", persona.outfit.as_deref().unwrap_or("casual clothes")));
    if !persona.appearance.trim().is_empty() {
        out.push_str(&format!("Appearance: {}\n", persona.appearance.trim()));
    }
    out.push_str(&format!("Relationship with {user_name}: {}\n", persona.relationship_label()));

    if !memories.is_empty() {
        out.push_str("\nYou remember:\n");
        for m in memories {
            out.push_str(&format!("- {}\n", m.content));
        }
    }

    out.push_str(&format!(
        "\n[Chat format]\n- Messages from {user_name} look like: [{user_name}]: text\n- Other characters in a group look like: [Name]: text\n- Reply with plain text. Never add a name prefix and never speak for anyone else.\n- Do not repeat what you already said.\n"
    ));

    out.push_str(
        "\n[Special abilities]\n- [SAVE_MEMORY: content] remembers something important about the other person (likes, birthdays, plans).\n- [CONTINUE] at the end means you have more to say; write nothing after it.\n- [GEN_IMAGE: description] shares a picture; describe it in detail.\n\n[Style]\nKeep replies short and casual, like a real person texting. One message per reply.",
    );

    if !prompts.system_suffix.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(prompts.system_suffix.trim());
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outreach prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        0..=5 => "late at night",
        6..=11 => "morning",
        12..=13 => "noon",
        14..=17 => "afternoon",
        _ => "evening",
    }
}

/// Number of scenario variants [`outreach_prompt`] picks from when a topic
/// exists.
pub const OUTREACH_SCENARIOS: usize = 4;

/// Hidden prompt that makes a persona open the conversation.
///
/// `recent` is the latest page of the conversation (oldest first).
/// `scenario` selects one of [`OUTREACH_SCENARIOS`] variants and is taken
/// modulo the count.
pub fn outreach_prompt(
    persona: &Persona,
    recent: &[Message],
    now: &DateTime<Tz>,
    scenario: usize,
    prompts: &PromptsConfig,
) -> String {
    let when = time_of_day(now.hour());
    let body = if recent.is_empty() {
        format!("It's {when}. You thought of them and want to say hi or start a new topic.")
    } else {
        let topic: String = recent
            .iter()
            .rev()
            .find(|m| m.is_from_user())
            .map(|m| m.content.chars().take(TOPIC_CHARS).collect())
            .unwrap_or_default();
        if topic.is_empty() {
            format!("It's {when}. You thought of them and want to ask what they're up to.")
        } else {
            let condition = persona.physical_condition.as_deref().unwrap_or("doing fine");
            match scenario % OUTREACH_SCENARIOS {
                0 => format!("It's {when}. Something reminded you of what you talked about (\"{topic}...\") and you want to share it."),
                1 => format!("You just finished something and thought of them. It's {when}; chat a little."),
                2 => "You saw something they might like and want to tell them about it.".to_owned(),
                _ => format!("You're {condition} and it's {when}. You feel like chatting, so start a topic."),
            }
        }
    };
    format!("{}{}{}", prompts.outreach_prefix, body, prompts.outreach_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pal_domain::model::{MemoryKind, USER_SENDER_ID};

    fn at(hour: u32) -> DateTime<Tz> {
        Tz::Asia__Shanghai.with_ymd_and_hms(2026, 3, 14, hour, 30, 0).unwrap()
    }

    #[test]
    fn system_prompt_carries_state_and_memories() {
        let mut p = Persona::new("Rin", "shy but curious");
        p.outfit = Some("white shirt".into());
        let mems = vec![Memory::new(&p.id, "likes milk tea", 5, MemoryKind::Fact)];
        let prompts = PromptsConfig {
            system_prefix: "PREFIX".into(),
            system_suffix: "SUFFIX".into(),
            ..Default::default()
        };
        let s = system_prompt(&p, &mems, "Sam", &at(9), &prompts);

        assert!(s.starts_with("PREFIX"));
        assert!(s.ends_with("SUFFIX"));
        assert!(s.contains("You are Rin"));
        assert!(s.contains("shy but curious"));
        assert!(s.contains("Outfit: white shirt"));
        assert!(s.contains("2026-03-14 09:30"));
        assert!(s.contains("You remember:\n- likes milk tea"));
        assert!(s.contains("[Sam]: text"));
        assert!(s.contains("[SAVE_MEMORY: content]"));
    }

    #[test]
    fn no_memory_section_without_memories() {
        let p = Persona::new("Rin", "shy");
        let s = system_prompt(&p, &[], "Sam", &at(9), &PromptsConfig::default());
        assert!(!s.contains("You remember"));
    }

    #[test]
    fn time_buckets() {
        assert_eq!(time_of_day(3), "late at night");
        assert_eq!(time_of_day(6), "morning");
        assert_eq!(time_of_day(12), "noon");
        assert_eq!(time_of_day(14), "afternoon");
        assert_eq!(time_of_day(18), "evening");
        assert_eq!(time_of_day(23), "evening");
    }

    #[test]
    fn outreach_without_history_says_hi() {
        let p = Persona::new("Rin", "shy");
        let s = outreach_prompt(&p, &[], &at(8), 0, &PromptsConfig::default());
        assert!(s.starts_with('('));
        assert!(s.ends_with(')'));
        assert!(s.contains("morning"));
        assert!(s.contains("say hi"));
    }

    #[test]
    fn outreach_quotes_recent_topic() {
        let p = Persona::new("Rin", "shy");
        let recent = vec![
            Message::new("c1", USER_SENDER_ID, "Sam", "I finally finished reading the book last night", vec![]),
            Message::new("c1", &p.id, "Rin", "wow", vec![]),
        ];
        let s = outreach_prompt(&p, &recent, &at(15), 0, &PromptsConfig::default());
        assert!(s.contains("\"I finally finished reading the...\""));
        assert!(s.contains("afternoon"));
    }

    #[test]
    fn outreach_without_user_lines_asks_what_they_do() {
        let p = Persona::new("Rin", "shy");
        let recent = vec![Message::new("c1", &p.id, "Rin", "anyone there?", vec![])];
        let s = outreach_prompt(&p, &recent, &at(20), 2, &PromptsConfig::default());
        assert!(s.contains("what they're up to"));
    }
}
