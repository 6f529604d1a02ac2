//! Niva: a conversational assistant persona over a hosted text-generation API.
//!
//! One conversational turn flows through the pipeline like this:
//! typed or spoken input → session store → prompt composer → completion
//! client → session store → speech output.
//!
//! # Architecture
//!
//! - **Session**: message history, mood, mode flags and ambient context
//! - **Prompt**: builds Niva's persona prompt from the session context
//! - **LLM**: Gemini `generateContent` client plus the HTTP endpoint
//! - **STT / wake word**: recognizer capability and the "hey niva" gate
//! - **TTS**: synthesizer capability and a serialized speech queue
//! - **Conversation**: orders turns and wires everything together

pub mod ambient;
pub mod config;
pub mod conversation;
pub mod diagnostics;
pub mod error;
pub mod llm;
pub mod mood;
pub mod prompt;
pub mod session;
pub mod stt;
pub mod tts;
pub mod wakeword;

pub use config::NivaConfig;
pub use conversation::{Conversation, ConversationBuilder, PendingTurn};
pub use error::{NivaError, Result};
pub use llm::{CompletionClient, CompletionError};
pub use mood::Mood;
pub use session::{Message, Role, SessionContext, SessionStore};
