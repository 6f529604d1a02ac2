//! Terminal chat with Niva.
//!
//! Type a message to chat. Lines starting with `/` are commands; `/help`
//! lists them. Voice input is simulated with `/hear <transcript>`, which goes
//! through the same wake-phrase gate as a microphone would.
//!
//! Replies are printed from background tasks, so commands such as `/mood`
//! and `/quit` (and Ctrl+C) keep working while Niva is still thinking.

use clap::Parser;
use niva::ambient::{AmbientRefresher, FixedWeather};
use niva::llm::CompletionClient;
use niva::stt::{ChannelRecognizer, ListenState, RecognizerEvent, RecognizerFeed};
use niva::tts::{SpeechQueue, VoiceSettings};
use niva::{Conversation, Mood, NivaConfig, PendingTurn, Role, SessionContext, SessionStore};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Niva: your CS student AI bestie, in the terminal.
#[derive(Parser)]
#[command(name = "niva", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable speech input and output.
    #[arg(long)]
    no_speech: bool,

    /// Gemini API key (overrides `llm.api_key`).
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Chat(&'a str),
    Quit,
    Help,
    Mood(&'a str),
    Moods,
    SmallTalk,
    AlwaysListening,
    Listen,
    Hear(&'a str),
    History,
    Status,
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return if line.is_empty() {
            Input::Empty
        } else {
            Input::Chat(line)
        };
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "quit" | "exit" => Input::Quit,
        "help" => Input::Help,
        "mood" if arg.is_empty() => Input::Moods,
        "mood" => Input::Mood(arg),
        "moods" => Input::Moods,
        "smalltalk" => Input::SmallTalk,
        "always" => Input::AlwaysListening,
        "listen" => Input::Listen,
        "hear" => Input::Hear(arg),
        "history" => Input::History,
        "status" => Input::Status,
        other => Input::Unknown(other),
    }
}

const HELP: &str = "\
Commands:
  /mood <name>       switch mood (focused, energetic, calm, creative, casual)
  /moods             list moods
  /smalltalk         toggle small talk mode
  /always            toggle always-listening mode
  /listen            start or stop listening
  /hear <text>       simulate a recognized utterance
  /history           show the conversation
  /status            show mood, time, weather and modes
  /quit              leave";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NivaConfig::load(cli.config.as_deref())?;
    if cli.no_speech {
        config.speech.recognition = false;
        config.speech.synthesis = false;
    }
    if let Some(key) = cli.api_key {
        config.llm.api_key = key;
    }

    let _log_guard = niva::diagnostics::init_tracing(&config.logging);
    info!("niva starting");

    let mood = Mood::parse(&config.conversation.default_mood).unwrap_or_else(|| {
        tracing::warn!(
            mood = %config.conversation.default_mood,
            "unknown default mood, using Focused"
        );
        Mood::default()
    });
    let store = Arc::new(SessionStore::new(
        SessionContext {
            mood,
            small_talk_mode: config.conversation.small_talk,
            always_listening_mode: config.conversation.always_listening,
            ..SessionContext::default()
        },
        &config.conversation.greeting,
    ));

    let cancel = CancellationToken::new();
    let _ambient = AmbientRefresher::new(
        Arc::clone(&store),
        Arc::new(FixedWeather::from_config(&config.ambient)),
        &config.ambient,
        cancel.clone(),
    )
    .spawn();

    let synth = niva::tts::select_synthesizer(&config.speech);
    let (speech, _playback) =
        SpeechQueue::spawn(synth, VoiceSettings::from(&config.speech), cancel.clone());

    let client = CompletionClient::from_config(&config.llm);
    let bell = config.speech.synthesis;
    let mut builder = Conversation::builder(Arc::clone(&store), client)
        .with_config(&config.conversation)
        .with_speech(speech.clone())
        .with_typing_cue(Arc::new(move || typing_cue(bell)));

    let mut voice = None;
    if config.speech.recognition {
        let (recognizer, feed, events) = ChannelRecognizer::new(config.speech.locale.clone());
        builder = builder.with_recognizer(Arc::new(recognizer));
        voice = Some((feed, events));
    }
    let (conversation, _worker) = builder.start(cancel.clone());

    println!("Niva v{}", env!("CARGO_PKG_VERSION"));
    if let Some(greeting) = store.messages().first() {
        println!("Niva: {}", greeting.text());
    }
    println!("Type /help for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!("received Ctrl+C, shutting down...");
                }
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Chat(text) => match conversation.submit(text) {
                Some(pending) => {
                    let _ = spawn_reply(pending);
                }
                None => break,
            },
            Input::Mood(name) => match Mood::parse(name) {
                Some(mood) => {
                    conversation.set_mood(mood);
                    println!("Mood: {} ({})", mood, mood.style().description);
                }
                None => println!("Unknown mood {name:?}. Try /moods."),
            },
            Input::Moods => {
                let current = store.context().mood;
                for mood in Mood::ALL {
                    let marker = if mood == current { '*' } else { ' ' };
                    println!(
                        "{marker} {:<10} {}",
                        mood.id(),
                        mood.style().description
                    );
                }
            }
            Input::SmallTalk => {
                let on = conversation.toggle_small_talk();
                println!("Small talk {}", on_off(on));
            }
            Input::AlwaysListening => {
                let on = conversation.toggle_always_listening();
                println!("Always listening {}", on_off(on));
            }
            Input::Listen => match conversation.toggle_listening() {
                ListenState::Listening => println!("Listening..."),
                ListenState::Idle if voice.is_none() => {
                    println!("Speech recognition is not available.");
                }
                ListenState::Idle => println!("Stopped listening."),
            },
            Input::Hear(transcript) => match voice.as_mut() {
                Some((feed, events)) => hear(&conversation, feed, events, transcript),
                None => println!("Speech recognition is not available."),
            },
            Input::History => {
                for message in store.messages().iter() {
                    let who = match message.role() {
                        Role::User => "You",
                        Role::Assistant => "Niva",
                    };
                    let at = message.created_at().with_timezone(&chrono::Local);
                    println!("[{}] {who}: {}", at.format("%I:%M %p"), message.text());
                }
            }
            Input::Status => {
                let ctx = store.context();
                println!("Mood:            {} ({})", ctx.mood, ctx.mood.style().description);
                println!("Time:            {}", placeholder(&ctx.current_time));
                println!("Weather:         {}", placeholder(&ctx.weather));
                println!("Small talk:      {}", on_off(ctx.small_talk_mode));
                println!("Always listening: {}", on_off(ctx.always_listening_mode));
                println!(
                    "Listening:       {}",
                    on_off(conversation.listen_state() == ListenState::Listening)
                );
                println!("Speech output:   {}", on_off(speech.is_available()));
            }
            Input::Unknown(name) => println!("Unknown command /{name}. Try /help."),
        }
    }

    cancel.cancel();
    info!("niva shut down");
    Ok(())
}

/// Print the reply to `pending` once it arrives, without holding up input.
fn spawn_reply(pending: PendingTurn) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let reply = pending.reply().await?;
        println!("Niva: {reply}\n");
        Some(reply)
    })
}

/// Push a transcript through the recognizer and answer it in the background
/// if it passes the wake gate.
fn hear(
    conversation: &Arc<Conversation>,
    feed: &RecognizerFeed,
    events: &mut mpsc::UnboundedReceiver<RecognizerEvent>,
    transcript: &str,
) {
    if !feed.push_transcript(transcript) {
        println!("Not listening. Use /listen or /always first.");
        return;
    }
    let Ok(event) = events.try_recv() else {
        return;
    };
    let conversation = Arc::clone(conversation);
    tokio::spawn(async move {
        match conversation.handle_recognition(event).await {
            Some(pending) => {
                let _ = spawn_reply(pending).await;
            }
            None => println!("(ignored: say \"hey niva\" first, or enable /always)"),
        }
    });
}

/// Shown when the turn worker starts on a reply. Rings the terminal bell
/// when sound is on.
fn typing_cue(bell: bool) {
    let mut out = std::io::stdout().lock();
    if bell {
        let _ = write!(out, "\x07");
    }
    let _ = writeln!(out, "Niva is typing...");
    let _ = out.flush();
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn placeholder(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
