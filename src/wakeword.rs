//! Wake-phrase gate for recognized speech.
//!
//! Speech recognition runs continuously, so most transcripts are not meant
//! for Niva. Unless always-listening mode is on, a transcript only becomes a
//! command when it contains the wake phrase (default "hey niva"); the phrase
//! is cut out and the rest is forwarded.

use crate::config::ConversationConfig;

/// Decides which transcripts become commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeGate {
    /// Lowercased wake phrase.
    phrase: String,
}

impl WakeGate {
    /// Create a gate for `phrase` (matched case-insensitively).
    ///
    /// An empty phrase never matches, so only always-listening mode
    /// forwards anything.
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.trim().to_ascii_lowercase(),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(&config.wake_phrase)
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Returns the command text to forward, if any.
    ///
    /// - `always_listening`: any non-blank transcript, trimmed.
    /// - otherwise: the transcript with the first occurrence of the wake
    ///   phrase removed and the remainder trimmed. No wake phrase, or
    ///   nothing left after removing it, forwards nothing.
    pub fn accept(&self, transcript: &str, always_listening: bool) -> Option<String> {
        if always_listening {
            let text = transcript.trim();
            return (!text.is_empty()).then(|| text.to_owned());
        }

        let (pos, len) = self.find(transcript)?;
        let command = strip_match(transcript, pos, len);
        (!command.is_empty()).then_some(command)
    }

    /// Byte position and length of the wake phrase in `text`.
    fn find(&self, text: &str) -> Option<(usize, usize)> {
        if self.phrase.is_empty() {
            return None;
        }
        // ASCII lowercasing keeps byte offsets aligned with `text`.
        let lower = text.to_ascii_lowercase();
        lower.find(&self.phrase).map(|pos| (pos, self.phrase.len()))
    }
}

/// Remove `text[pos..pos + len]` along with punctuation that STT tends to
/// attach to the phrase ("Hey Niva, ...").
fn strip_match(text: &str, pos: usize, len: usize) -> String {
    const SEPARATORS: [char; 6] = [',', ':', '.', '!', '?', ' '];
    let before = text[..pos].trim_end_matches(SEPARATORS).trim();
    let after = text[pos + len..].trim_start_matches(SEPARATORS).trim();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_owned(),
        (false, true) => before.to_owned(),
        (false, false) => format!("{before} {after}"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn gate() -> WakeGate {
        WakeGate::new("hey niva")
    }

    #[test]
    fn wake_phrase_is_stripped() {
        assert_eq!(
            gate().accept("hey niva turn on the lights", false).as_deref(),
            Some("turn on the lights")
        );
    }

    #[test]
    fn no_wake_phrase_forwards_nothing() {
        assert_eq!(gate().accept("turn on the lights", false), None);
    }

    #[test]
    fn match_is_case_insensitive_and_keeps_command_case() {
        assert_eq!(
            gate().accept("Hey Niva, what is Rust?", false).as_deref(),
            Some("what is Rust?")
        );
        assert_eq!(
            gate().accept("HEY NIVA Turn On The Lights", false).as_deref(),
            Some("Turn On The Lights")
        );
    }

    #[test]
    fn wake_phrase_alone_forwards_nothing() {
        assert_eq!(gate().accept("  hey niva  ", false), None);
        assert_eq!(gate().accept("Hey Niva!", false), None);
    }

    #[test]
    fn wake_phrase_mid_sentence() {
        assert_eq!(
            gate().accept("please hey niva play some music", false).as_deref(),
            Some("please play some music")
        );
    }

    #[test]
    fn only_first_occurrence_is_removed() {
        assert_eq!(
            gate().accept("hey niva say hey niva", false).as_deref(),
            Some("say hey niva")
        );
    }

    #[test]
    fn always_listening_forwards_verbatim() {
        assert_eq!(
            gate().accept("turn on the lights", true).as_deref(),
            Some("turn on the lights")
        );
        assert_eq!(
            gate().accept("hey niva turn on the lights", true).as_deref(),
            Some("hey niva turn on the lights")
        );
        assert_eq!(
            gate().accept("  Mixed Case Text ", true).as_deref(),
            Some("Mixed Case Text")
        );
    }

    #[test]
    fn always_listening_ignores_blank() {
        assert_eq!(gate().accept("   ", true), None);
        assert_eq!(gate().accept("", true), None);
    }

    #[test]
    fn empty_phrase_never_matches() {
        let gate = WakeGate::new("  ");
        assert_eq!(gate.accept("anything", false), None);
        assert_eq!(gate.accept("anything", true).as_deref(), Some("anything"));
    }

    #[test]
    fn non_ascii_text_is_handled() {
        assert_eq!(
            gate().accept("héllo hey niva café ☕", false).as_deref(),
            Some("héllo café ☕")
        );
    }

    #[test]
    fn from_config_lowercases() {
        let config = ConversationConfig {
            wake_phrase: " OK Niva ".to_owned(),
            ..ConversationConfig::default()
        };
        assert_eq!(WakeGate::from_config(&config).phrase(), "ok niva");
    }
}
