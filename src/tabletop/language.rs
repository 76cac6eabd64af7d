use dashmap::DashMap;
use rand::Rng;
use serenity::model::id::MessageId;

pub const LANGUAGES: [&str; 9] = [
    "Undercommon",
    "Celestial",
    "Giant",
    "Elvish",
    "Dwarvish",
    "Goblin",
    "Thieves' Cant",
    "Common Sign Language",
    "Old Omuan",
];

const GIBBERISH_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GARBLE_PROBABILITY: f64 = 0.7;

pub fn is_language(name: &str) -> bool {
    LANGUAGES.contains(&name)
}

/// Replaces roughly 70% of the characters with random letters and digits.
pub fn gibberish<R: Rng + ?Sized>(rng: &mut R, text: &str) -> String {
    text.chars()
        .map(|c| {
            if rng.gen_bool(GARBLE_PROBABILITY) {
                GIBBERISH_CHARS[rng.gen_range(0..GIBBERISH_CHARS.len())] as char
            } else {
                c
            }
        })
        .collect()
}

/// Role names are compared case-insensitively.
pub fn has_role<'a>(wanted: &str, mut role_names: impl Iterator<Item = &'a str>) -> bool {
    role_names.any(|role| role.eq_ignore_ascii_case(wanted))
}

/// A member speaks a language when they hold the role named after it.
pub fn understands<'a>(language: &str, role_names: impl Iterator<Item = &'a str>) -> bool {
    has_role(language, role_names)
}

/// What one recipient gets to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendition {
    Clear(String),
    Garbled(String),
}

impl Rendition {
    pub fn for_reader<R: Rng + ?Sized>(rng: &mut R, content: &str, understood: bool) -> Self {
        if understood {
            Rendition::Clear(format!("**{}**", content))
        } else {
            Rendition::Garbled(gibberish(rng, content))
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Rendition::Clear(text) | Rendition::Garbled(text) => text,
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Rendition::Clear(_))
    }
}

/// Message bodies waiting for a language to be picked, keyed by the prompt
/// message that carries the select menu.
#[derive(Debug, Default)]
pub struct PendingBroadcasts {
    contents: DashMap<MessageId, String>,
}

impl PendingBroadcasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, prompt: MessageId, content: String) {
        self.contents.insert(prompt, content);
    }

    /// The menu stays usable, so the content is kept after a lookup.
    pub fn get(&self, prompt: MessageId) -> Option<String> {
        self.contents.get(&prompt).map(|c| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn gibberish_keeps_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(99);
        let original = "Meet at the old mill at dawn!";
        let garbled = gibberish(&mut rng, original);

        assert_eq!(garbled.chars().count(), original.chars().count());
        for (new, old) in garbled.chars().zip(original.chars()) {
            assert!(new == old || new.is_ascii_alphanumeric());
        }
        assert_ne!(garbled, original);
    }

    #[test]
    fn role_match_is_case_insensitive() {
        assert!(understands("Elvish", ["Spiller", "elvish"].into_iter()));
        assert!(understands("Thieves' Cant", ["THIEVES' CANT"].into_iter()));
        assert!(!understands("Giant", ["Spiller", "Goblin"].into_iter()));
    }

    #[test]
    fn readers_get_bold_text() {
        let mut rng = StdRng::seed_from_u64(1);
        let clear = Rendition::for_reader(&mut rng, "hello", true);
        assert_eq!(clear, Rendition::Clear("**hello**".to_string()));
        assert!(clear.is_clear());
        assert!(!Rendition::for_reader(&mut rng, "hello", false).is_clear());
    }

    #[test]
    fn known_languages() {
        assert!(is_language("Old Omuan"));
        assert!(!is_language("Klingon"));
    }

    #[test]
    fn pending_content_survives_lookup() {
        let pending = PendingBroadcasts::new();
        let prompt = MessageId::new(5);
        pending.insert(prompt, "secret".to_string());
        assert_eq!(pending.get(prompt), Some("secret".to_string()));
        assert_eq!(pending.get(prompt), Some("secret".to_string()));
        assert_eq!(pending.get(MessageId::new(6)), None);
    }
}
