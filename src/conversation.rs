//! Conversation turn coordinator.
//!
//! Wires typed or spoken input through the session store, prompt composer,
//! completion client and speech queue:
//!
//! ```text
//! input ─▶ store (user message) ─▶ compose ─▶ complete ─▶ store (reply) ─▶ speech
//! ```
//!
//! Turns are numbered at submission and processed one at a time by a single
//! worker task, so replies always land in the history in the order their
//! inputs were submitted. Mood and mode changes go straight to the store and
//! never wait on an in-flight completion.

use crate::config::ConversationConfig;
use crate::llm::CompletionClient;
use crate::mood::Mood;
use crate::prompt;
use crate::session::{Flag, Message, SessionContext, SessionStore};
use crate::stt::{ListenState, Listener, RecognizerEvent, SpeechRecognizer, UnavailableRecognizer};
use crate::tts::SpeechQueue;
use crate::wakeword::WakeGate;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Called when a turn starts, before the completion request goes out.
pub type TypingCue = Arc<dyn Fn() + Send + Sync>;

/// Delay between accepting a voice command and submitting it.
pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_millis(100);

/// A submitted turn waiting for the worker.
#[derive(Debug)]
struct QueuedTurn {
    turn: u64,
    text: String,
    /// Context as it was when the user submitted.
    context: SessionContext,
    reply_tx: oneshot::Sender<String>,
}

/// Handle to a submitted turn.
#[derive(Debug)]
pub struct PendingTurn {
    turn: u64,
    reply_rx: oneshot::Receiver<String>,
}

impl PendingTurn {
    /// Position of this turn in submission order, starting at 1.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Wait for the reply. `None` if the conversation shut down first.
    pub async fn reply(self) -> Option<String> {
        self.reply_rx.await.ok()
    }
}

struct TurnQueue {
    next_turn: u64,
    tx: mpsc::UnboundedSender<QueuedTurn>,
}

/// Configures and starts a [`Conversation`].
pub struct ConversationBuilder {
    store: Arc<SessionStore>,
    client: CompletionClient,
    gate: WakeGate,
    speech: Option<SpeechQueue>,
    recognizer: Arc<dyn SpeechRecognizer>,
    command_delay: Duration,
    typing_cue: Option<TypingCue>,
}

impl ConversationBuilder {
    /// Use the wake phrase and command delay from `config`.
    pub fn with_config(self, config: &ConversationConfig) -> Self {
        self.with_wake_gate(WakeGate::from_config(config))
            .with_command_delay(Duration::from_millis(config.command_delay_ms))
    }

    pub fn with_wake_gate(mut self, gate: WakeGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    /// Speak every reply through `speech`.
    pub fn with_speech(mut self, speech: SpeechQueue) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Play a short cue (a beep, a bell) each time Niva starts typing.
    pub fn with_typing_cue(mut self, cue: TypingCue) -> Self {
        self.typing_cue = Some(cue);
        self
    }

    /// Spawn the turn worker. It stops when `cancel` fires.
    ///
    /// If the session starts in always-listening mode, listening starts too.
    pub fn start(self, cancel: CancellationToken) -> (Arc<Conversation>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_turns(
            Arc::clone(&self.store),
            self.client,
            self.speech,
            self.typing_cue,
            rx,
            cancel,
        ));

        let conversation = Arc::new(Conversation {
            store: self.store,
            gate: self.gate,
            listener: Listener::new(self.recognizer),
            command_delay: self.command_delay,
            queue: Mutex::new(TurnQueue { next_turn: 1, tx }),
        });
        if conversation.store.context().always_listening_mode {
            conversation.start_listening();
        }
        (conversation, worker)
    }
}

/// A running conversation.
pub struct Conversation {
    store: Arc<SessionStore>,
    gate: WakeGate,
    listener: Listener,
    command_delay: Duration,
    queue: Mutex<TurnQueue>,
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("gate", &self.gate)
            .field("listener", &self.listener)
            .field("command_delay", &self.command_delay)
            .finish_non_exhaustive()
    }
}

impl Conversation {
    pub fn builder(store: Arc<SessionStore>, client: CompletionClient) -> ConversationBuilder {
        ConversationBuilder {
            store,
            client,
            gate: WakeGate::from_config(&ConversationConfig::default()),
            speech: None,
            recognizer: Arc::new(UnavailableRecognizer::default()),
            command_delay: DEFAULT_COMMAND_DELAY,
            typing_cue: None,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Submit user input.
    ///
    /// Blank input is ignored. Otherwise the user message is appended to the
    /// history right away and the turn is queued behind any earlier ones.
    /// Returns `None` for blank input or after the worker has stopped.
    pub fn submit(&self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.tx.is_closed() {
            warn!("conversation stopped, dropping input");
            return None;
        }
        let turn = queue.next_turn;
        queue.next_turn += 1;

        self.store.append_message(Message::user(text));
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = QueuedTurn {
            turn,
            text: text.to_owned(),
            context: self.store.context(),
            reply_tx,
        };
        if queue.tx.send(queued).is_err() {
            warn!(turn, "turn worker gone, input will not be answered");
            return None;
        }
        debug!(turn, "turn queued");
        Some(PendingTurn { turn, reply_rx })
    }

    /// Submit input and wait for the reply.
    pub async fn ask(&self, text: &str) -> Option<String> {
        self.submit(text)?.reply().await
    }

    /// Handle one recognizer event.
    ///
    /// Engine errors are logged and otherwise ignored. A transcript that
    /// passes the wake gate is submitted after the command delay.
    pub async fn handle_recognition(&self, event: RecognizerEvent) -> Option<PendingTurn> {
        let transcript = match event {
            RecognizerEvent::Error(e) => {
                warn!("speech recognition error: {e}");
                return None;
            }
            RecognizerEvent::Result(result) => result.transcript(),
        };

        let always_listening = self.store.context().always_listening_mode;
        let Some(command) = self.gate.accept(&transcript, always_listening) else {
            debug!("transcript ignored, no wake phrase");
            return None;
        };
        info!(command = %command, "voice command accepted");
        if !self.command_delay.is_zero() {
            tokio::time::sleep(self.command_delay).await;
        }
        self.submit(&command)
    }

    /// Feed recognizer events into the conversation until `cancel` fires or
    /// the event stream ends.
    pub async fn run_voice_input(
        &self,
        mut events: mpsc::UnboundedReceiver<RecognizerEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_recognition(event).await;
                    }
                    None => break,
                },
            }
        }
        debug!("voice input stopped");
    }

    pub fn set_mood(&self, mood: Mood) {
        info!(mood = mood.id(), "mood changed");
        self.store.set_mood(mood);
    }

    /// Flip small-talk mode, returning the new value.
    pub fn toggle_small_talk(&self) -> bool {
        let enabled = !self.store.context().small_talk_mode;
        self.store.set_flag(Flag::SmallTalk, enabled);
        info!(enabled, "small talk mode");
        enabled
    }

    /// Flip always-listening mode, returning the new value.
    ///
    /// Turning it on starts listening; turning it off stops.
    pub fn toggle_always_listening(&self) -> bool {
        let enabled = !self.store.context().always_listening_mode;
        self.store.set_flag(Flag::AlwaysListening, enabled);
        info!(enabled, "always listening mode");
        if enabled {
            self.start_listening();
        } else {
            self.stop_listening();
        }
        enabled
    }

    /// Start or stop listening. A no-op without a recognizer.
    pub fn toggle_listening(&self) -> ListenState {
        let state = self.listener.toggle();
        self.sync_listening(state)
    }

    pub fn start_listening(&self) -> ListenState {
        let state = self.listener.start();
        self.sync_listening(state)
    }

    pub fn stop_listening(&self) -> ListenState {
        let state = self.listener.stop();
        self.sync_listening(state)
    }

    pub fn listen_state(&self) -> ListenState {
        self.listener.state()
    }

    fn sync_listening(&self, state: ListenState) -> ListenState {
        self.store.set_listening(state == ListenState::Listening);
        state
    }
}

/// Turn worker: one completion at a time, in submission order.
async fn run_turns(
    store: Arc<SessionStore>,
    client: CompletionClient,
    speech: Option<SpeechQueue>,
    typing_cue: Option<TypingCue>,
    mut rx: mpsc::UnboundedReceiver<QueuedTurn>,
    cancel: CancellationToken,
) {
    loop {
        let queued = tokio::select! {
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        let QueuedTurn {
            turn,
            text,
            context,
            reply_tx,
        } = queued;
        let started = Instant::now();
        store.set_typing(true);
        if let Some(cue) = &typing_cue {
            debug!(turn, "typing cue");
            cue();
        }
        let prompt = prompt::compose(&context, &text);

        let reply = tokio::select! {
            () = cancel.cancelled() => {
                store.set_typing(false);
                break;
            }
            reply = client.complete(&prompt) => reply,
        };

        store.append_message(Message::assistant(reply.as_str()));
        store.set_typing(false);
        info!(turn, elapsed_ms = started.elapsed().as_millis() as u64, "turn finished");

        if let Some(speech) = &speech {
            speech.say(&reply);
        }
        // The submitter may not be waiting.
        let _ = reply_tx.send(reply);
    }
    debug!("turn worker stopped");
}
