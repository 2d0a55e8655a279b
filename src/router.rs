//! Transcript routing
//!
//! Every transcript, from either STT path, is classified in strict priority
//! order: inactive session, awaiting a field number, pending dictation, then
//! command text. Each stage consumes the transcript; nothing falls through.

use std::sync::LazyLock;

use regex::Regex;

use crate::session::Session;
use crate::stt::TranscriptEvent;

/// Shortest text treated as speech
const MIN_TEXT_LEN: usize = 3;

/// Number words and common recognizer homophones
const NUMBER_WORDS: &[(&str, u32)] = &[
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("to", 2),
    ("too", 2),
    ("tu", 2),
    ("for", 4),
    ("ate", 8),
    ("won", 1),
];

static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(thank you|thanks|bye|okay|yeah|right|see you|you know|so|um|uh)[\s.,!?]*$")
        .expect("valid regex")
});

/// Recognizer hallucinations on silence and stray letters
static HALLUCINATIONS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"(?i)^open up for now",
        r"(?i)^thank you for",
        r"(?i)^thanks for watching",
        r"(?i)^[a-z]{1,2}[\s.,!?]*$",
    ]
    .map(|p| Regex::new(p).expect("valid regex"))
});

static LEADING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

static EMBEDDED_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));

static CONTINUE_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)continue in\s+(notes|summary|message)").expect("valid regex")
});

/// Parse a spoken field number
///
/// Tries, in order: a leading integer, an embedded integer, the whole text as
/// a number word, any word of the text, then the longest number word
/// contained in the text.
#[must_use]
pub fn parse_spoken_number(text: &str) -> Option<u32> {
    let lower = text.trim().to_lowercase();

    for re in [&*LEADING_DIGITS, &*EMBEDDED_DIGITS] {
        if let Some(n) = re.captures(&lower).and_then(|c| c[1].parse().ok()) {
            return Some(n);
        }
    }

    let cleaned = lower.trim_matches(|c: char| !c.is_alphanumeric());
    if let Some(n) = word_value(cleaned) {
        return Some(n);
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if let Some(n) = tokens.iter().find_map(|t| word_value(t)) {
        return Some(n);
    }

    NUMBER_WORDS
        .iter()
        .filter(|(word, _)| word.len() > 3 && lower.contains(word))
        .max_by_key(|(word, _)| word.len())
        .map(|(_, n)| *n)
}

fn word_value(word: &str) -> Option<u32> {
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, n)| *n)
}

/// Short or filler text that must never be dictated or executed
#[must_use]
pub fn is_filler(text: &str) -> bool {
    let text = text.trim();
    text.chars().count() < MIN_TEXT_LEN || FILLER.is_match(text)
}

/// Filler plus recognizer hallucinations
#[must_use]
pub fn is_noise(text: &str) -> bool {
    is_filler(text) || HALLUCINATIONS.iter().any(|re| re.is_match(text.trim()))
}

/// Whether the text asks a dictation area to continue
#[must_use]
pub fn is_continue_control(text: &str) -> bool {
    CONTINUE_IN.is_match(text)
}

/// Why a transcript was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Not actively listening
    Inactive,
    /// Awaiting a number and none was heard
    NotANumber,
    /// Dictation only accepts final transcripts
    Interim,
    /// Filler, hallucination or too short
    Noise,
}

/// What to do with a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Drop it
    Discard(Discard),
    /// Select the numbered field
    SelectNumber(u32),
    /// Commit text to the pending dictation target
    Dictate(String),
    /// Broadcast interim command text without executing it
    Interim(String),
    /// Enqueue final command text
    Command {
        /// Trimmed text
        text: String,
        /// Also a "continue in ..." dictation control
        continue_in: bool,
    },
}

/// Classifies transcripts and keeps the running transcript buffer
#[derive(Debug, Default)]
pub struct TranscriptRouter {
    transcript: String,
}

impl TranscriptRouter {
    /// Create a router with an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            transcript: String::new(),
        }
    }

    /// Classify one transcript against the session
    pub fn route(&mut self, session: &Session, event: &TranscriptEvent) -> RouteDecision {
        let text = event.text.trim();

        if !session.is_active() {
            return RouteDecision::Discard(Discard::Inactive);
        }

        if session.awaiting_number() {
            return parse_spoken_number(text).map_or_else(
                || {
                    tracing::debug!(text, "not a number, still waiting");
                    RouteDecision::Discard(Discard::NotANumber)
                },
                RouteDecision::SelectNumber,
            );
        }

        if session.dictation_target().is_some() {
            if !event.is_final {
                return RouteDecision::Discard(Discard::Interim);
            }
            if is_filler(text) {
                tracing::debug!(text, "skipping filler during dictation");
                return RouteDecision::Discard(Discard::Noise);
            }
            return RouteDecision::Dictate(text.to_string());
        }

        if is_noise(text) {
            tracing::debug!(text, "skipping noise");
            return RouteDecision::Discard(Discard::Noise);
        }

        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);

        if event.is_final {
            RouteDecision::Command {
                text: text.to_string(),
                continue_in: is_continue_control(text),
            }
        } else {
            RouteDecision::Interim(text.to_string())
        }
    }

    /// Running transcript buffer
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Empty the running transcript buffer
    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::TranscriptSource;

    fn final_text(text: &str) -> TranscriptEvent {
        TranscriptEvent {
            text: text.to_string(),
            is_final: true,
            source: TranscriptSource::Server,
        }
    }

    fn active() -> Session {
        let mut session = Session::new();
        session.start();
        session.wake();
        session
    }

    #[test]
    fn test_number_words_and_digits() {
        assert_eq!(parse_spoken_number("three"), Some(3));
        assert_eq!(parse_spoken_number("number 2"), Some(2));
        assert_eq!(parse_spoken_number("12."), Some(12));
        assert_eq!(parse_spoken_number("Twenty"), Some(20));
        assert_eq!(parse_spoken_number("zero"), Some(0));
        assert_eq!(parse_spoken_number("banana"), None);
        assert_eq!(parse_spoken_number(""), None);
    }

    #[test]
    fn test_every_number_word() {
        for (word, n) in NUMBER_WORDS {
            assert_eq!(parse_spoken_number(word), Some(*n), "{word}");
        }
    }

    #[test]
    fn test_homophones() {
        assert_eq!(parse_spoken_number("to"), Some(2));
        assert_eq!(parse_spoken_number("for"), Some(4));
        assert_eq!(parse_spoken_number("ate"), Some(8));
        assert_eq!(parse_spoken_number("won"), Some(1));
    }

    #[test]
    fn test_exact_word_beats_contained_word() {
        // "seventeen" contains "seven"; the whole word wins
        assert_eq!(parse_spoken_number("seventeen"), Some(17));
        assert_eq!(parse_spoken_number("field number four please"), Some(4));
        assert_eq!(parse_spoken_number("fourteenth"), Some(14));
    }

    #[test]
    fn test_noise() {
        for text in ["um", "thanks", "Thank you.", "ok", "a", "  ", "Thanks for watching!"] {
            assert!(is_noise(text), "{text}");
        }
        assert!(!is_noise("fill email"));
        assert!(!is_noise("show numbers"));
    }

    #[test]
    fn test_inactive_discards() {
        let mut router = TranscriptRouter::new();
        let mut session = Session::new();
        assert_eq!(
            router.route(&session, &final_text("submit form")),
            RouteDecision::Discard(Discard::Inactive)
        );

        session.start();
        assert_eq!(
            router.route(&session, &final_text("submit form")),
            RouteDecision::Discard(Discard::Inactive)
        );
    }

    #[test]
    fn test_awaiting_number_never_falls_through() {
        let mut router = TranscriptRouter::new();
        let mut session = active();
        session.await_number();

        assert_eq!(
            router.route(&session, &final_text("submit form")),
            RouteDecision::Discard(Discard::NotANumber)
        );
        assert_eq!(
            router.route(&session, &final_text("two")),
            RouteDecision::SelectNumber(2)
        );
        assert!(router.transcript().is_empty());
    }

    #[test]
    fn test_dictation_requires_final_non_noise() {
        let mut router = TranscriptRouter::new();
        let mut session = active();
        let target = crate::page::Document::new(
            "/",
            crate::page::PageSpec {
                elements: vec![crate::page::Element::new(crate::page::ElementKind::Input, "x")],
                forms: 0,
            },
        );
        let id = crate::page::Page::elements(&target)[0];
        session.await_dictation(id);

        let mut interim = final_text("John Doe");
        interim.is_final = false;
        assert_eq!(
            router.route(&session, &interim),
            RouteDecision::Discard(Discard::Interim)
        );
        assert_eq!(
            router.route(&session, &final_text("um")),
            RouteDecision::Discard(Discard::Noise)
        );
        assert_eq!(
            router.route(&session, &final_text("  John Doe ")),
            RouteDecision::Dictate("John Doe".to_string())
        );
    }

    #[test]
    fn test_commands_buffered() {
        let mut router = TranscriptRouter::new();
        let session = active();

        assert_eq!(
            router.route(&session, &final_text("fill email")),
            RouteDecision::Command {
                text: "fill email".to_string(),
                continue_in: false
            }
        );

        let mut interim = final_text("continue in notes");
        interim.is_final = false;
        assert_eq!(
            router.route(&session, &interim),
            RouteDecision::Interim("continue in notes".to_string())
        );
        assert_eq!(
            router.route(&session, &final_text("Continue in Notes")),
            RouteDecision::Command {
                text: "Continue in Notes".to_string(),
                continue_in: true
            }
        );
        assert_eq!(
            router.transcript(),
            "fill email continue in notes Continue in Notes"
        );

        router.clear();
        assert!(router.transcript().is_empty());
    }
}
