//! Prompt composition for Niva.
//!
//! The prompt sent to the completion backend is assembled from four layers:
//!
//! 1. **Persona** ([`PERSONA_PREAMBLE`]): who Niva is and how she sounds.
//! 2. **Context**: mood, local time and weather. Empty time/weather lines
//!    are left out.
//! 3. **User message**: the utterance, embedded verbatim.
//! 4. **Behaviour guide** ([`BEHAVIOUR_GUIDE`]) and, in small-talk mode, the
//!    [`SMALL_TALK_GUIDE`].
//!
//! Composition is pure: the same inputs always produce the same bytes.

use crate::mood::Mood;
use crate::session::SessionContext;

/// Identity and tone. Always the first layer.
pub const PERSONA_PREAMBLE: &str = "\
You are Niva, a 17-year-old CS student and AI bestie with a sweet, helpful, charming, and slightly playful personality.\n\
You speak with a sweet Indian female tone. Keep responses concise but friendly.";

/// Behaviour rules that follow the user message.
pub const BEHAVIOUR_GUIDE: &str = "\
Remember to respond as Niva with her personality:\n\
- Be helpful, charming, and slightly playful\n\
- Use casual, friendly language\n\
- Keep responses concise but engaging\n\
- Add emojis occasionally to show personality\n\
- Be knowledgeable about CS topics since you're a CS student\n\
- Show empathy and understanding";

/// Extra rules appended only while small-talk mode is on.
pub const SMALL_TALK_GUIDE: &str = "\
User has enabled Small Talk mode. In this mode:\n\
- Be more conversational and casual\n\
- Feel free to suggest music or discuss light topics\n\
- You can be more creative and playful\n\
- Share personal thoughts or experiences as Niva\n\
- Suggest music based on mood or user preferences if mentioned";

/// Borrowed inputs for [`compose_from`].
///
/// The mood is a free-form name so that callers outside a session (the HTTP
/// endpoint) can pass through whatever name they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptInputs<'a> {
    pub mood: &'a str,
    pub current_time: &'a str,
    pub weather: &'a str,
    pub small_talk: bool,
}

impl<'a> From<&'a SessionContext> for PromptInputs<'a> {
    fn from(ctx: &'a SessionContext) -> Self {
        Self {
            mood: ctx.mood.display_name(),
            current_time: &ctx.current_time,
            weather: &ctx.weather,
            small_talk: ctx.small_talk_mode,
        }
    }
}

impl Default for PromptInputs<'_> {
    fn default() -> Self {
        Self {
            mood: Mood::default().display_name(),
            current_time: "",
            weather: "",
            small_talk: false,
        }
    }
}

/// Compose the prompt for `user_text` under the session's current context.
///
/// Callers are expected to skip empty (whitespace-only) input before calling.
pub fn compose(context: &SessionContext, user_text: &str) -> String {
    compose_from(PromptInputs::from(context), user_text)
}

/// Compose a prompt from borrowed inputs.
pub fn compose_from(inputs: PromptInputs<'_>, user_text: &str) -> String {
    let mut context_lines = format!("Current mood: {}", inputs.mood);
    if !inputs.current_time.is_empty() {
        context_lines.push_str("\nCurrent time: ");
        context_lines.push_str(inputs.current_time);
    }
    if !inputs.weather.is_empty() {
        context_lines.push_str("\nCurrent weather: ");
        context_lines.push_str(inputs.weather);
    }

    // Persona and context share a paragraph. The utterance is not escaped.
    let mut paragraphs: Vec<String> = Vec::with_capacity(4);
    paragraphs.push(format!("{PERSONA_PREAMBLE}\n{context_lines}"));
    paragraphs.push(format!("User message: {user_text}"));
    paragraphs.push(BEHAVIOUR_GUIDE.to_owned());
    if inputs.small_talk {
        paragraphs.push(SMALL_TALK_GUIDE.to_owned());
    }
    paragraphs.join("\n\n")
}
