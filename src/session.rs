//! In-memory session state: message history, mood, mode flags, ambient
//! context, and transient typing/listening indicators.
//!
//! The store is shared across tasks as `Arc<SessionStore>`. Every operation
//! takes the internal lock once, so individual operations are atomic with
//! respect to each other, and none of them can fail.

use crate::mood::Mood;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Assistant greeting seeded into every new conversation.
pub const DEFAULT_GREETING: &str =
    "Hello! I'm Niva, your 17-year-old CS student AI bestie. How may I assist you today?";

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message stamped with the current time.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered, shared view of the message history at one point in time.
///
/// Later appends never show up in a snapshot that was already taken.
pub type MessageSnapshot = Arc<Vec<Message>>;

/// Boolean mode flags toggled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Relaxes the persona towards casual replies and music suggestions.
    SmallTalk,
    /// Forwards every recognized utterance without requiring the wake phrase.
    AlwaysListening,
}

/// Context injected into every composed prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// The currently selected mood.
    pub mood: Mood,
    /// Local time string (empty until the first refresh).
    pub current_time: String,
    /// Weather summary (empty until the first refresh).
    pub weather: String,
    /// Small-talk mode flag.
    pub small_talk_mode: bool,
    /// Always-listening mode flag.
    pub always_listening_mode: bool,
}

impl SessionContext {
    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::SmallTalk => self.small_talk_mode,
            Flag::AlwaysListening => self.always_listening_mode,
        }
    }
}

/// Messages plus transient indicators.
#[derive(Debug, Clone)]
struct ConversationState {
    messages: MessageSnapshot,
    is_typing: bool,
    is_listening: bool,
}

#[derive(Debug)]
struct Inner {
    conversation: ConversationState,
    context: SessionContext,
}

/// Mutable state of one chat session.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    /// Create a session seeded with `greeting` as the first assistant message.
    pub fn new(context: SessionContext, greeting: &str) -> Self {
        let conversation = ConversationState {
            messages: Arc::new(vec![Message::assistant(greeting)]),
            is_typing: false,
            is_listening: false,
        };
        Self {
            inner: Mutex::new(Inner {
                conversation,
                context,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message. This is the only way messages enter the history.
    pub fn append_message(&self, message: Message) {
        let mut inner = self.lock();
        // Copies the history only while an older snapshot is still alive.
        Arc::make_mut(&mut inner.conversation.messages).push(message);
    }

    /// Snapshot of the history in insertion order.
    pub fn messages(&self) -> MessageSnapshot {
        Arc::clone(&self.lock().conversation.messages)
    }

    pub fn set_mood(&self, mood: Mood) {
        self.lock().context.mood = mood;
    }

    pub fn set_flag(&self, flag: Flag, value: bool) {
        let mut inner = self.lock();
        match flag {
            Flag::SmallTalk => inner.context.small_talk_mode = value,
            Flag::AlwaysListening => inner.context.always_listening_mode = value,
        }
    }

    /// Replace the time and/or weather strings. `None` leaves a value as is.
    pub fn update_context(&self, time: Option<String>, weather: Option<String>) {
        let mut inner = self.lock();
        if let Some(time) = time {
            inner.context.current_time = time;
        }
        if let Some(weather) = weather {
            inner.context.weather = weather;
        }
    }

    pub fn context(&self) -> SessionContext {
        self.lock().context.clone()
    }

    pub fn set_typing(&self, value: bool) {
        self.lock().conversation.is_typing = value;
    }

    pub fn is_typing(&self) -> bool {
        self.lock().conversation.is_typing
    }

    pub fn set_listening(&self, value: bool) {
        self.lock().conversation.is_listening = value;
    }

    pub fn is_listening(&self) -> bool {
        self.lock().conversation.is_listening
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionContext::default(), DEFAULT_GREETING)
    }
}
