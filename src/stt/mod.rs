//! Speech recognition capability.
//!
//! Recognition is continuous: once started, a recognizer keeps emitting
//! [`RecognizerEvent`]s until stopped. Hosts without a recognizer get
//! [`UnavailableRecognizer`], which reports itself unavailable and refuses to
//! start, so the rest of the pipeline only ever talks to the trait.
//!
//! [`ChannelRecognizer`] is the generic adapter: whatever produces
//! transcripts (a platform engine, a test, the `/hear` CLI command) pushes
//! them through a [`RecognizerFeed`], and events arrive on a tokio channel.

use crate::error::{NivaError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One recognition result: the result alternatives in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub results: Vec<String>,
}

impl RecognitionEvent {
    pub fn new(results: Vec<String>) -> Self {
        Self { results }
    }

    /// Event with a single result.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            results: vec![text.into()],
        }
    }

    /// The full transcript: every result concatenated in order.
    pub fn transcript(&self) -> String {
        self.results.concat()
    }
}

/// Something the recognizer reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    Result(RecognitionEvent),
    /// The engine reported an error. Recognition may continue afterwards.
    Error(String),
}

/// A continuous speech recognizer.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether this host can recognize speech at all.
    fn is_available(&self) -> bool;

    /// Locale requested from the engine, e.g. `en-IN`.
    fn locale(&self) -> &str;

    /// Begin continuous recognition.
    ///
    /// # Errors
    ///
    /// Returns [`NivaError::Speech`] when recognition is unavailable or the
    /// engine refuses to start.
    fn start(&self) -> Result<()>;

    /// Stop recognition. Stopping an idle recognizer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NivaError::Speech`] if the engine fails to stop.
    fn stop(&self) -> Result<()>;
}

/// Recognizer for hosts with no speech input.
#[derive(Debug, Clone, Default)]
pub struct UnavailableRecognizer {
    locale: String,
}

impl UnavailableRecognizer {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }
}

impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn locale(&self) -> &str {
        &self.locale
    }

    fn start(&self) -> Result<()> {
        Err(NivaError::Speech(
            "speech recognition is not available on this host".to_owned(),
        ))
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Recognizer fed externally through a [`RecognizerFeed`].
///
/// Events pushed while the recognizer is stopped are dropped, the same way
/// a microphone engine produces nothing while idle.
#[derive(Debug)]
pub struct ChannelRecognizer {
    locale: String,
    active: Arc<AtomicBool>,
}

/// Producer side of a [`ChannelRecognizer`].
#[derive(Debug, Clone)]
pub struct RecognizerFeed {
    tx: mpsc::UnboundedSender<RecognizerEvent>,
    active: Arc<AtomicBool>,
}

impl ChannelRecognizer {
    /// Create the recognizer, its feed, and the receiver events arrive on.
    pub fn new(
        locale: impl Into<String>,
    ) -> (Self, RecognizerFeed, mpsc::UnboundedReceiver<RecognizerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));
        let recognizer = Self {
            locale: locale.into(),
            active: Arc::clone(&active),
        };
        (recognizer, RecognizerFeed { tx, active }, rx)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for ChannelRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn locale(&self) -> &str {
        &self.locale
    }

    fn start(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        info!(locale = %self.locale, "speech recognition started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("speech recognition stopped");
        }
        Ok(())
    }
}

impl RecognizerFeed {
    /// Deliver a transcript. Returns `false` if it was dropped because the
    /// recognizer is stopped or the receiver is gone.
    pub fn push_transcript(&self, text: impl Into<String>) -> bool {
        self.push(RecognizerEvent::Result(RecognitionEvent::single(text)))
    }

    /// Deliver an engine error. Returns `false` if it was dropped.
    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.push(RecognizerEvent::Error(message.into()))
    }

    pub fn push(&self, event: RecognizerEvent) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            debug!("recognizer idle, dropping event");
            return false;
        }
        self.tx.send(event).is_ok()
    }
}

/// Listening state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenState {
    #[default]
    Idle,
    Listening,
}

/// Tracks whether recognition is running and drives the recognizer.
pub struct Listener {
    recognizer: Arc<dyn SpeechRecognizer>,
    state: std::sync::Mutex<ListenState>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("available", &self.recognizer.is_available())
            .field("state", &self.state())
            .finish()
    }
}

impl Listener {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            state: std::sync::Mutex::new(ListenState::Idle),
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    pub fn state(&self) -> ListenState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start listening. A failed start is logged and leaves the state idle.
    pub fn start(&self) -> ListenState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ListenState::Listening {
            return *state;
        }
        match self.recognizer.start() {
            Ok(()) => *state = ListenState::Listening,
            Err(e) => warn!("could not start listening: {e}"),
        }
        *state
    }

    /// Stop listening. Always ends idle.
    pub fn stop(&self) -> ListenState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ListenState::Listening
            && let Err(e) = self.recognizer.stop()
        {
            warn!("recognizer failed to stop cleanly: {e}");
        }
        *state = ListenState::Idle;
        *state
    }

    pub fn toggle(&self) -> ListenState {
        match self.state() {
            ListenState::Idle => self.start(),
            ListenState::Listening => self.stop(),
        }
    }
}
