//! Terminal front end: settings, the chat loop and rendering
//!
//! Everything here is presentation. Turns go through [`TurnPipeline`]
//! against the [`SessionState`] owned by [`Assistant`].

use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::config::{CaptureConfig, Config, HISTORY_DISPLAY_LEN, VoiceSettings};
use crate::model::ModelClient;
use crate::pipeline::{FailureKind, TurnOutcome, TurnPipeline};
use crate::session::{Message, Role, SessionState};
use crate::voice::{
    self, AudioPlayback, ListenMode, MicrophoneListener, Speaker, SpeechCapture,
    SpeechSynthesizer,
};
use crate::Result;

/// Display name of the assistant
pub const ASSISTANT_NAME: &str = "J.A.R.V.I.S";

/// Settings the user can change while chatting
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub voice: VoiceSettings,
    pub capture: CaptureConfig,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            voice: config.voice.clone(),
            capture: config.capture,
        }
    }
}

/// Session state, pipeline and settings for one user
pub struct Assistant {
    state: SessionState,
    pipeline: TurnPipeline,
    settings: Settings,
}

impl Assistant {
    #[must_use]
    pub fn new(
        settings: Settings,
        client: Arc<dyn ModelClient>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            state: SessionState::new(client),
            pipeline: TurnPipeline::new(synthesizer),
            settings,
        }
    }

    /// Run one turn with the voice resolved from the current settings
    pub async fn turn(&mut self, transcript: &str) -> TurnOutcome {
        let voice = self.settings.voice.voice_config();
        self.pipeline
            .process_turn(&mut self.state, transcript, &voice)
            .await
    }

    /// Clear the conversation and its model context
    pub fn clear(&mut self) {
        self.state.clear_history();
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }
}

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Empty line: start (or stop) a recording
    Record,
    /// Plain text: send it as a typed turn
    Say(String),
    Clear,
    Accent(String),
    Slow(bool),
    AutoStop(bool),
    History,
    Voices,
    Help,
    Quit,
    /// Unrecognized `/command` or bad argument
    Invalid(String),
}

/// Parse one line of chat input
#[must_use]
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Record;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Say(line.to_string());
    };

    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));

    match name.to_ascii_lowercase().as_str() {
        "clear" => ReplCommand::Clear,
        "history" => ReplCommand::History,
        "voices" | "accents" => ReplCommand::Voices,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "accent" if !arg.is_empty() => ReplCommand::Accent(arg.to_string()),
        "slow" => parse_toggle(arg).map_or_else(
            || ReplCommand::Invalid("usage: /slow on|off".to_string()),
            ReplCommand::Slow,
        ),
        "auto" => parse_toggle(arg).map_or_else(
            || ReplCommand::Invalid("usage: /auto on|off".to_string()),
            ReplCommand::AutoStop,
        ),
        "accent" => ReplCommand::Invalid("usage: /accent <preset name>".to_string()),
        other => ReplCommand::Invalid(format!("unknown command: /{other}")),
    }
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Render messages the way the history panel shows them
#[must_use]
pub fn format_history(messages: &[Message]) -> String {
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        let speaker = match message.role() {
            Role::User => "🧑 You".to_string(),
            Role::Assistant => format!("🤖 {ASSISTANT_NAME}"),
        };
        let _ = writeln!(out, "{speaker}: {}", message.content());
    }
    out
}

/// Lines describing the outcome of a turn
#[must_use]
pub fn format_outcome(outcome: &TurnOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if outcome.is_idle() {
        lines.push(format!("🔇 {}", FailureKind::NoSpeech.user_message()));
        return lines;
    }
    if let Some(text) = &outcome.assistant_text {
        lines.push(format!("🤖 {ASSISTANT_NAME}: {text}"));
    }
    if let Some(error) = &outcome.error {
        lines.push(format!("❌ {}", error.user_message()));
    }
    if let Some(error) = &outcome.synthesis_error {
        lines.push(format!("🔈 {}", error.user_message()));
    }
    lines
}

/// Status line describing how the next recording will end
#[must_use]
pub fn listen_hint(mode: ListenMode) -> String {
    match mode {
        ListenMode::AutoStop { max_listen } => format!(
            "🔇 Auto-stop enabled: will stop after ~{}s (press Enter to stop early)",
            max_listen.as_secs()
        ),
        ListenMode::Manual => "⏱️ Manual recording mode: press Enter when done".to_string(),
    }
}

/// Speak a reply if there is audio and a speaker
pub fn play_reply(playback: Option<&AudioPlayback>, outcome: &TurnOutcome) {
    let (Some(playback), Some(audio)) = (playback, outcome.audio.as_deref()) else {
        return;
    };
    if let Err(e) = playback.play_mp3(audio) {
        tracing::warn!(error = %e, "playback failed");
        println!("🔈 Could not play the voice response: {e}");
    }
}

/// Notice for text typed while recording, which only stops the recording
#[must_use]
pub fn ignored_input_notice(line: &str) -> Option<String> {
    let text = line.trim();
    (!text.is_empty()).then(|| format!("⌨️ Stopped recording; typed text {text:?} was not sent"))
}

fn print_help() {
    println!("Press Enter to talk, or type a message and press Enter.");
    println!("  /clear            clear the conversation");
    println!("  /accent <name>    change the voice accent (see /voices)");
    println!("  /slow on|off      toggle slow speech");
    println!("  /auto on|off      toggle auto-stop recording");
    println!("  /history          show the conversation");
    println!("  /quit             exit");
}

fn print_voices(current: &str) {
    let current = voice::canonical_name(current).unwrap_or(voice::DEFAULT_PRESET);
    for name in voice::preset_names() {
        let marker = if name == current { "*" } else { " " };
        println!(" {marker} {name}");
    }
}

fn print_status(settings: &Settings, has_mic: bool) {
    let accent = voice::canonical_name(&settings.voice.accent).unwrap_or(voice::DEFAULT_PRESET);
    let speed = if settings.voice.slow { "slow" } else { "normal" };
    println!("📊 Voice: {accent} ({speed})");
    if has_mic {
        println!("{}", listen_hint(settings.capture.listen_mode()));
    } else {
        println!("⌨️ Voice input unavailable: type your questions instead");
    }
}

/// Run a typed or spoken turn and show the result
#[allow(clippy::future_not_send)]
async fn converse(assistant: &mut Assistant, speaker: Option<&Speaker>, transcript: &str) {
    println!("🤔 {ASSISTANT_NAME} is thinking...");
    let outcome = assistant.turn(transcript).await;
    for line in format_outcome(&outcome) {
        println!("{line}");
    }
    if let (Some(speaker), Some(audio)) = (speaker, outcome.audio) {
        speaker.speak(audio);
    }

    let recent = assistant.state().recent_history(HISTORY_DISPLAY_LEN);
    if !recent.is_empty() {
        println!("\n💬 Conversation History");
        print!("{}", format_history(recent));
    }
}

/// Record until the listener finishes, stopping it on the next input line
#[allow(clippy::future_not_send)]
async fn listen_until_stopped(
    listener: &mut MicrophoneListener,
    lines: &mut mpsc::Receiver<String>,
) -> Result<Option<String>> {
    let stop = listener.stop_handle();
    let listen = listener.listen();
    tokio::pin!(listen);

    let mut input_open = true;
    loop {
        tokio::select! {
            biased;
            result = &mut listen => return result,
            line = lines.recv(), if input_open => {
                if let Some(notice) = line.as_deref().and_then(ignored_input_notice) {
                    println!("{notice}");
                }
                input_open = line.is_some();
                stop.notify_waiters();
            }
        }
    }
}

/// Read stdin lines on a background task
fn spawn_line_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Interactive chat loop
///
/// `listener` is `None` when no microphone or STT key is available; typed
/// turns still work. `speaker` is `None` when muted. Replies play in the
/// background and are cut off when recording starts or the chat ends.
///
/// # Errors
///
/// Returns error only if the terminal cannot be read
#[allow(clippy::future_not_send)]
pub async fn run_chat(
    mut assistant: Assistant,
    mut listener: Option<MicrophoneListener>,
    speaker: Option<Speaker>,
) -> Result<()> {
    let mut lines = spawn_line_reader();

    println!("🤖 {ASSISTANT_NAME} Assistant");
    print_status(assistant.settings(), listener.is_some());
    print_help();

    loop {
        println!();
        if assistant.state().is_empty() {
            println!("🎤 Ready: press Enter to start recording");
        } else {
            println!("🎤 Ready for your next question");
        }

        let Some(line) = lines.recv().await else {
            break;
        };

        match parse_command(&line) {
            ReplCommand::Record => {
                let Some(listener) = listener.as_mut() else {
                    println!(
                        "⚙️ {} Voice input needs a microphone and OPENAI_API_KEY or DEEPGRAM_API_KEY; type your question instead.",
                        FailureKind::Configuration.user_message()
                    );
                    continue;
                };
                if let Some(speaker) = &speaker {
                    speaker.interrupt();
                }
                let mode = assistant.settings().capture.listen_mode();
                listener.set_mode(mode);
                println!("🎧 Listening... Speak now!");
                println!("{}", listen_hint(mode));

                match listen_until_stopped(listener, &mut lines).await {
                    Ok(Some(transcript)) => {
                        println!("✅ Speech recognized");
                        println!("🧑 You: {transcript}");
                        converse(&mut assistant, speaker.as_ref(), &transcript).await;
                    }
                    Ok(None) => println!("🔇 {}", FailureKind::NoSpeech.user_message()),
                    Err(e) => {
                        tracing::warn!(error = %e, "speech capture failed");
                        println!("❌ {} ({e})", FailureKind::from(&e).user_message());
                    }
                }
            }
            ReplCommand::Say(text) => {
                converse(&mut assistant, speaker.as_ref(), &text).await;
            }
            ReplCommand::Clear => {
                assistant.clear();
                println!("🗑️ Conversation cleared");
            }
            ReplCommand::Accent(name) => match voice::canonical_name(&name) {
                Some(canonical) => {
                    assistant.settings_mut().voice.accent = canonical.to_string();
                    println!("🗣️ Voice accent: {canonical}");
                }
                None => {
                    println!("Unknown accent {name:?}. Available:");
                    print_voices(&assistant.settings().voice.accent);
                }
            },
            ReplCommand::Slow(slow) => {
                assistant.settings_mut().voice.slow = slow;
                println!("🐢 Slow speech {}", if slow { "on" } else { "off" });
            }
            ReplCommand::AutoStop(on) => {
                assistant.settings_mut().capture.auto_stop = on;
                println!("{}", listen_hint(assistant.settings().capture.listen_mode()));
            }
            ReplCommand::History => {
                let recent = assistant.state().recent_history(HISTORY_DISPLAY_LEN);
                if recent.is_empty() {
                    println!("💬 No conversation yet");
                } else {
                    print!("{}", format_history(recent));
                }
            }
            ReplCommand::Voices => print_voices(&assistant.settings().voice.accent),
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => println!("{message}"),
        }
    }

    if let Some(speaker) = &speaker {
        speaker.interrupt();
    }
    println!("👋 Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command(""), ReplCommand::Record);
        assert_eq!(parse_command("   "), ReplCommand::Record);
        assert_eq!(parse_command("/clear"), ReplCommand::Clear);
        assert_eq!(parse_command("/QUIT"), ReplCommand::Quit);
        assert_eq!(
            parse_command("/accent  Indian English "),
            ReplCommand::Accent("Indian English".to_string())
        );
        assert_eq!(parse_command("/slow on"), ReplCommand::Slow(true));
        assert_eq!(parse_command("/auto off"), ReplCommand::AutoStop(false));
        assert_eq!(
            parse_command(" What time is it? "),
            ReplCommand::Say("What time is it?".to_string())
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(parse_command("/slow maybe"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_command("/accent"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_command("/dance"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn history_format() {
        let messages = [Message::user("Hi"), Message::assistant("Hello!")];
        assert_eq!(
            format_history(&messages),
            "🧑 You: Hi\n---\n🤖 J.A.R.V.I.S: Hello!\n"
        );
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn outcome_lines() {
        assert_eq!(format_outcome(&TurnOutcome::idle()).len(), 1);

        let outcome = TurnOutcome {
            transcript: "hi".to_string(),
            assistant_text: Some("hello".to_string()),
            synthesis_error: Some(crate::pipeline::TurnFailure::new(
                FailureKind::Synthesis,
                "boom",
            )),
            ..TurnOutcome::default()
        };
        let lines = format_outcome(&outcome);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("couldn't generate speech"));
    }

    #[test]
    fn hints_follow_mode() {
        assert!(listen_hint(ListenMode::auto_stop(Duration::from_secs(2))).contains("~6s"));
        assert!(listen_hint(ListenMode::Manual).contains("Manual"));
    }

    #[test]
    fn typed_text_while_recording_is_reported() {
        assert_eq!(ignored_input_notice(""), None);
        assert_eq!(ignored_input_notice("   "), None);

        let notice = ignored_input_notice(" what time is it ").unwrap();
        assert!(notice.contains("\"what time is it\""));
        assert!(notice.contains("not sent"));
    }
}
