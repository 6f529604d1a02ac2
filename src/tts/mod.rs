//! Speech output.
//!
//! Replies are spoken through a [`SpeechSynthesizer`]. Playback requests go
//! through a [`SpeechQueue`]: a single worker task plays one utterance at a
//! time, so replies that arrive back to back never talk over each other.
//!
//! Hosts without a synthesizer get [`UnavailableSynthesizer`] and the queue
//! silently discards everything.

mod system;

pub use system::{SystemTts, TtsProgram, parse_espeak_voices, parse_say_voices};

use crate::config::SpeechConfig;
use crate::error::{NivaError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A voice offered by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// Language tag, e.g. `en-IN` or `en_US`.
    pub lang: String,
    /// Whether the engine marks this voice as its default.
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// One playback request.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speaking rate, 1.0 is normal.
    pub rate: f32,
    /// Pitch, 1.0 is normal.
    pub pitch: f32,
    /// Volume in `[0, 1]`.
    pub volume: f32,
    /// `None` lets the engine pick.
    pub voice: Option<Voice>,
}

/// Rate, pitch, volume and preferred locale applied to every utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub locale: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

impl From<&SpeechConfig> for VoiceSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume.clamp(0.0, 1.0),
        }
    }
}

impl VoiceSettings {
    pub fn utterance(&self, text: impl Into<String>, voice: Option<Voice>) -> Utterance {
        Utterance {
            text: text.into(),
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            voice,
        }
    }
}

/// A text-to-speech engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether this host can speak at all.
    fn is_available(&self) -> bool;

    /// Voices the engine offers. May be empty.
    async fn voices(&self) -> Vec<Voice>;

    /// Speak one utterance, returning once playback has finished.
    ///
    /// # Errors
    ///
    /// Returns [`NivaError::Speech`] if playback fails.
    async fn speak(&self, utterance: &Utterance) -> Result<()>;
}

/// Synthesizer for hosts with no speech output.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSynthesizer;

#[async_trait]
impl SpeechSynthesizer for UnavailableSynthesizer {
    fn is_available(&self) -> bool {
        false
    }

    async fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    async fn speak(&self, _utterance: &Utterance) -> Result<()> {
        Err(NivaError::Speech(
            "speech synthesis is not available on this host".to_owned(),
        ))
    }
}

/// Pick the voice to speak with.
///
/// The first voice that matches the preferred locale, is an "India" voice,
/// or is an English Google voice wins. Otherwise the engine's default
/// English voice, otherwise none.
pub fn select_voice<'a>(voices: &'a [Voice], preferred_locale: &str) -> Option<&'a Voice> {
    let locale = normalize_lang(preferred_locale);
    let regional = voices.iter().find(|v| {
        let lang = normalize_lang(&v.lang);
        (!locale.is_empty() && lang.contains(&locale))
            || v.name.contains("India")
            || (v.name.contains("Google") && lang.contains("en"))
    });
    regional.or_else(|| {
        voices
            .iter()
            .find(|v| v.is_default && normalize_lang(&v.lang).contains("en"))
    })
}

/// `en_IN` and `EN-in` both become `en-in`.
fn normalize_lang(lang: &str) -> String {
    lang.trim().replace('_', "-").to_ascii_lowercase()
}

/// Choose the synthesizer for this host from config.
pub fn select_synthesizer(config: &SpeechConfig) -> Arc<dyn SpeechSynthesizer> {
    if !config.synthesis {
        info!("speech synthesis disabled by config");
        return Arc::new(UnavailableSynthesizer);
    }
    match SystemTts::detect(config.tts_program.as_deref()) {
        Some(tts) => {
            info!(program = %tts.program().display(), "speech synthesis available");
            Arc::new(tts)
        }
        None => {
            info!("no speech synthesizer found, replies will not be spoken");
            Arc::new(UnavailableSynthesizer)
        }
    }
}

/// Serializes playback: one utterance at a time, in request order.
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    tx: mpsc::UnboundedSender<String>,
    available: bool,
}

impl SpeechQueue {
    /// Spawn the playback worker. It runs until `cancel` fires or every
    /// queue handle has been dropped.
    pub fn spawn(
        synth: Arc<dyn SpeechSynthesizer>,
        settings: VoiceSettings,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let available = synth.is_available();
        let handle = tokio::spawn(run_playback(synth, settings, rx, cancel));
        (Self { tx, available }, handle)
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Queue `text` for playback. Returns `false` when nothing will be
    /// spoken (blank text, no synthesizer, or the worker has stopped).
    pub fn say(&self, text: &str) -> bool {
        if !self.available || text.trim().is_empty() {
            return false;
        }
        self.tx.send(text.to_owned()).is_ok()
    }
}

async fn run_playback(
    synth: Arc<dyn SpeechSynthesizer>,
    settings: VoiceSettings,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    // Engines may populate their voice list late, so look it up on first use.
    let mut voice: Option<Option<Voice>> = None;

    loop {
        let text = tokio::select! {
            () = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };

        if voice.is_none() {
            let voices = synth.voices().await;
            let picked = select_voice(&voices, &settings.locale).cloned();
            debug!(
                voices = voices.len(),
                voice = picked.as_ref().map(|v| v.name.as_str()).unwrap_or("<engine default>"),
                "selected voice"
            );
            voice = Some(picked);
        }
        let utterance = settings.utterance(text, voice.clone().flatten());

        tokio::select! {
            () = cancel.cancelled() => break,
            result = synth.speak(&utterance) => {
                if let Err(e) = result {
                    warn!("speech playback failed: {e}");
                }
            }
        }
    }
    debug!("speech queue stopped");
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording synthesizer shared by unit tests.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records every utterance and flags overlapping playback.
    pub struct RecordingSynth {
        pub voices: Vec<Voice>,
        pub delay: Duration,
        spoken: Mutex<Vec<Utterance>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl RecordingSynth {
        pub fn new(delay: Duration) -> Self {
            Self {
                voices: Vec::new(),
                delay,
                spoken: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
            self.voices = voices;
            self
        }

        pub fn spoken(&self) -> Vec<Utterance> {
            self.spoken.lock().unwrap().clone()
        }

        pub fn spoken_texts(&self) -> Vec<String> {
            self.spoken().into_iter().map(|u| u.text).collect()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        fn is_available(&self) -> bool {
            true
        }

        async fn voices(&self) -> Vec<Voice> {
            self.voices.clone()
        }

        async fn speak(&self, utterance: &Utterance) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.spoken.lock().unwrap().push(utterance.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Poll until `cond` holds or a second passes.
    pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cond()
    }
}
