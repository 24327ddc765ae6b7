//! Turns a model's raw reply into visible text plus side-effect directives.
//!
//! Directives are handled in a fixed order: `[CONTINUE]`, `[GEN_IMAGE: …]`,
//! `[SAVE_MEMORY: …]`, then impersonation prefixes (`[Name]: ` and `Name:`).
//! Anything that does not match a directive exactly stays in the text.

use regex::Regex;

const CONTINUE_MARKER: &str = "[CONTINUE]";

/// Text after `[CONTINUE]` longer than this means the model merged several
/// messages into one reply.
const MERGED_TAIL_CHARS: usize = 20;

/// Characters that make a `Foo:` prefix look like a sentence, not a name.
const SENTENCE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', '"', '\'', '。', '，', '！', '？', '；', '、', '“', '”',
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub visible_text: String,
    pub continue_requested: bool,
    pub image_prompt: Option<String>,
    pub memory: Option<String>,
}

/// Precompiled directive patterns. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct Decoder {
    gen_image: Regex,
    save_memory: Regex,
    bracket_prefix: Regex,
    name_prefix: Regex,
}

impl Decoder {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            gen_image: Regex::new(r"\[GEN_IMAGE:\s*(.*?)\]")?,
            save_memory: Regex::new(r"\[SAVE_MEMORY:\s*(.*?)\]")?,
            bracket_prefix: Regex::new(r"^\[[^\]]+\]:\s*")?,
            name_prefix: Regex::new(r"^([^:：\n\[\]]{1,24})[:：]\s*")?,
        })
    }

    pub fn decode(&self, raw: &str) -> Decoded {
        let mut text = raw.trim().to_owned();
        let mut continue_requested = false;

        if let Some(idx) = text.find(CONTINUE_MARKER) {
            let tail = text[idx + CONTINUE_MARKER.len()..].trim();
            if tail.chars().count() > MERGED_TAIL_CHARS {
                tracing::debug!(dropped_chars = tail.chars().count(), "reply merged several messages, truncating");
                text = text[..idx].trim().to_owned();
            } else {
                text = text.replacen(CONTINUE_MARKER, "", 1).trim().to_owned();
                continue_requested = true;
            }
        }

        let image_prompt = take_directive(&self.gen_image, &mut text);
        let memory = take_directive(&self.save_memory, &mut text);

        if let Some(m) = self.bracket_prefix.find(&text) {
            text = text[m.end()..].trim().to_owned();
        }
        text = self.strip_name_prefix(text);

        Decoded {
            visible_text: text,
            continue_requested,
            image_prompt,
            memory,
        }
    }

    /// Remove a leading `Name:` / `Name：` unless it is part of a URL or a
    /// sentence.
    fn strip_name_prefix(&self, text: String) -> String {
        let Some(caps) = self.name_prefix.captures(&text) else {
            return text;
        };
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            return text;
        };
        let name = name.as_str();
        let colon_end = name.len() + text[name.len()..].chars().next().map_or(0, char::len_utf8);
        if text[colon_end..].starts_with('/') || name.trim().is_empty() || name.contains(SENTENCE_PUNCTUATION) {
            return text;
        }
        text[whole.end()..].trim().to_owned()
    }
}

/// Remove the first match of `re` from `text` and return its trimmed capture.
fn take_directive(re: &Regex, text: &mut String) -> Option<String> {
    let (range, value) = {
        let caps = re.captures(text)?;
        let whole = caps.get(0)?;
        let value = caps.get(1).map(|m| m.as_str().trim().to_owned()).unwrap_or_default();
        (whole.range(), value)
    };
    text.replace_range(range, "");
    *text = text.trim().to_owned();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Decoded {
        Decoder::new().unwrap().decode(raw)
    }

    #[test]
    fn continue_with_short_tail() {
        let d = decode("hello [CONTINUE]");
        assert!(d.continue_requested);
        assert_eq!(d.visible_text, "hello");
    }

    #[test]
    fn continue_with_long_tail_truncates() {
        let d = decode("hello [CONTINUE] and then more than twenty characters of extra content here");
        assert!(!d.continue_requested);
        assert_eq!(d.visible_text, "hello");
    }

    #[test]
    fn tail_of_exactly_twenty_chars_still_continues() {
        let d = decode("hi [CONTINUE] 12345678901234567890");
        assert!(d.continue_requested);
        assert_eq!(d.visible_text, "hi  12345678901234567890");
    }

    #[test]
    fn image_directive_is_extracted() {
        let d = decode("[GEN_IMAGE: a cat] meow");
        assert_eq!(d.image_prompt.as_deref(), Some("a cat"));
        assert_eq!(d.visible_text, "meow");
        assert!(!d.continue_requested);
    }

    #[test]
    fn memory_directive_is_extracted() {
        let d = decode("noted! [SAVE_MEMORY: likes milk tea, hates cilantro]");
        assert_eq!(d.memory.as_deref(), Some("likes milk tea, hates cilantro"));
        assert_eq!(d.visible_text, "noted!");
    }

    #[test]
    fn all_directives_together() {
        let d = decode("[GEN_IMAGE: sunset] look [SAVE_MEMORY: birthday is May 3] [CONTINUE]");
        assert!(d.continue_requested);
        assert_eq!(d.image_prompt.as_deref(), Some("sunset"));
        assert_eq!(d.memory.as_deref(), Some("birthday is May 3"));
        assert_eq!(d.visible_text, "look");
    }

    #[test]
    fn unterminated_directive_stays_visible() {
        let d = decode("[GEN_IMAGE: a dog running");
        assert_eq!(d.image_prompt, None);
        assert_eq!(d.visible_text, "[GEN_IMAGE: a dog running");
    }

    #[test]
    fn empty_directive_yields_nothing() {
        let d = decode("[GEN_IMAGE: ] hey");
        assert_eq!(d.image_prompt, None);
        assert_eq!(d.visible_text, "hey");
    }

    #[test]
    fn bracket_impersonation_prefix_is_stripped() {
        assert_eq!(decode("[Rin]: hi there").visible_text, "hi there");
    }

    #[test]
    fn name_prefix_is_stripped_with_either_colon() {
        assert_eq!(decode("Rin: hi there").visible_text, "hi there");
        assert_eq!(decode("小雪：你好").visible_text, "你好");
    }

    #[test]
    fn urls_and_sentences_keep_their_colon() {
        assert_eq!(decode("https://example.com is cool").visible_text, "https://example.com is cool");
        assert_eq!(decode("Well, here's the thing: no").visible_text, "Well, here's the thing: no");
    }

    #[test]
    fn name_prefix_longer_than_24_chars_is_kept() {
        let name = "雪".repeat(24);
        assert_eq!(decode(&format!("{name}：你好")).visible_text, "你好");

        let long = format!("{}：你好", "雪".repeat(25));
        assert_eq!(decode(&long).visible_text, long);
    }

    #[test]
    fn plain_text_passes_through() {
        let d = decode("  just chatting  ");
        assert_eq!(d, Decoded { visible_text: "just chatting".into(), ..Default::default() });
    }
}
