//! Speech through the host's command-line synthesizer.
//!
//! Supports `espeak-ng` / `espeak` (Linux) and `say` (macOS). The text is
//! written to the program's stdin so it never passes through argv.

use super::{SpeechSynthesizer, Utterance, Voice};
use crate::error::{NivaError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Programs probed on `PATH`, in order.
const CANDIDATES: [&str; 3] = ["espeak-ng", "espeak", "say"];

/// espeak speaking rate at `rate = 1.0`, in words per minute.
const ESPEAK_BASE_WPM: f32 = 175.0;
/// espeak pitch at `pitch = 1.0` (range 0-99).
const ESPEAK_BASE_PITCH: f32 = 50.0;
/// `say` speaking rate at `rate = 1.0`, in words per minute.
const SAY_BASE_WPM: f32 = 175.0;

/// Command-line flavour of the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProgram {
    Espeak,
    Say,
}

impl TtsProgram {
    /// Guess the flavour from the executable name.
    pub fn from_path(path: &Path) -> Self {
        match path.file_stem().and_then(|s| s.to_str()) {
            Some("say") => Self::Say,
            _ => Self::Espeak,
        }
    }
}

/// Synthesizer backed by an external TTS program.
#[derive(Debug, Clone)]
pub struct SystemTts {
    program: PathBuf,
    kind: TtsProgram,
}

impl SystemTts {
    pub fn new(program: PathBuf) -> Self {
        let kind = TtsProgram::from_path(&program);
        Self { program, kind }
    }

    /// Find a synthesizer: the explicit program when given, else the first
    /// known program on `PATH`.
    pub fn detect(explicit: Option<&str>) -> Option<Self> {
        if let Some(name) = explicit {
            return match which::which(name) {
                Ok(path) => Some(Self::new(path)),
                Err(e) => {
                    warn!("configured TTS program {name:?} not found: {e}");
                    None
                }
            };
        }
        CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn kind(&self) -> TtsProgram {
        self.kind
    }

    /// Arguments for speaking `utterance`, text excluded.
    pub fn speak_args(&self, utterance: &Utterance) -> Vec<String> {
        let mut args = Vec::new();
        match self.kind {
            TtsProgram::Espeak => {
                let wpm = (ESPEAK_BASE_WPM * utterance.rate).round().max(80.0);
                let pitch = (ESPEAK_BASE_PITCH * utterance.pitch).round().clamp(0.0, 99.0);
                let amplitude = (utterance.volume.clamp(0.0, 1.0) * 100.0).round();
                args.push("--stdin".to_owned());
                args.push(format!("-s{wpm}"));
                args.push(format!("-p{pitch}"));
                args.push(format!("-a{amplitude}"));
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_owned());
                    args.push(voice.lang.clone());
                }
            }
            TtsProgram::Say => {
                // `say` has no pitch or volume flags.
                let wpm = (SAY_BASE_WPM * utterance.rate).round().max(80.0);
                args.push("-r".to_owned());
                args.push(wpm.to_string());
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_owned());
                    args.push(voice.name.clone());
                }
                args.push("-f".to_owned());
                args.push("-".to_owned());
            }
        }
        args
    }

    fn voice_list_args(&self) -> &'static [&'static str] {
        match self.kind {
            TtsProgram::Espeak => &["--voices"],
            TtsProgram::Say => &["-v", "?"],
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SystemTts {
    fn is_available(&self) -> bool {
        true
    }

    async fn voices(&self) -> Vec<Voice> {
        let output = match Command::new(&self.program)
            .args(self.voice_list_args())
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(status = %output.status, "voice listing failed");
                return Vec::new();
            }
            Err(e) => {
                warn!("failed to run {}: {e}", self.program.display());
                return Vec::new();
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        match self.kind {
            TtsProgram::Espeak => parse_espeak_voices(&stdout),
            TtsProgram::Say => parse_say_voices(&stdout),
        }
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let args = self.speak_args(utterance);
        debug!(program = %self.program.display(), chars = utterance.text.len(), "speaking");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NivaError::Speech(format!("failed to spawn {}: {e}", self.program.display()))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| NivaError::Speech("failed to capture TTS stdin".to_owned()))?;
        stdin
            .write_all(utterance.text.as_bytes())
            .await
            .map_err(|e| NivaError::Speech(format!("failed to write to TTS stdin: {e}")))?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| NivaError::Speech(format!("TTS process failed: {e}")))?;
        if !status.success() {
            return Err(NivaError::Speech(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}

/// Parse `espeak --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en             --/M      English            gmw/en
///  5  en-us          --/M      English_(America)  gmw/en-US
/// ```
///
/// The plain `en` voice is espeak's default.
pub fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip_while(|line| line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let lang = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?.replace('_', " ");
            Some(Voice::new(name, lang).with_default(lang == "en"))
        })
        .collect()
}

/// Parse `say -v ?` output.
///
/// ```text
/// Alex                en_US    # Most people recognize me by my voice.
/// Bad News            en_US    # The light you see at the end of the tunnel...
/// ```
pub fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, lang) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || lang.is_empty() {
                return None;
            }
            Some(Voice::new(name, lang))
        })
        .collect()
}
