use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_assistant::app::{self, Assistant, Settings};
use jarvis_assistant::config;
use jarvis_assistant::voice::{
    self, AudioCapture, AudioPlayback, GoogleTts, MicrophoneListener, Speaker,
    SpeechSynthesizer, SpeechToText,
};
use jarvis_assistant::{Config, GeminiClient};

/// Jarvis - voice-driven chat assistant
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Voice accent preset (e.g. "UK English"); see `jarvis voices`
    #[arg(short, long, env = "JARVIS_ACCENT")]
    accent: Option<String>,

    /// Speak replies slowly
    #[arg(long)]
    slow: bool,

    /// Stop recording with Enter instead of a timer
    #[arg(long)]
    manual: bool,

    /// Silence threshold in seconds (1.0 to 5.0); recordings auto-stop after three times this
    #[arg(long)]
    silence_threshold: Option<f64>,

    /// Don't play spoken replies
    #[arg(long)]
    mute: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive voice chat (default)
    Chat,
    /// Ask a single question and speak the answer
    Ask {
        /// Question text
        text: String,
        /// Write the spoken reply (MP3) to this path
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
    /// List voice accent presets
    Voices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,jarvis_assistant=info",
        1 => "info,jarvis_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Voices) => {
            list_voices();
            return Ok(());
        }
        Some(Command::TestMic { duration }) => return test_mic(duration).await,
        Some(Command::TestTts { ref text }) => return test_tts(&cli, text).await,
        _ => {}
    }

    // A missing model key stops us here, before any turn is taken
    let config = Config::load()?;
    let settings = settings_from(&cli, &config)?;

    tracing::info!(
        model = %config.model.model,
        accent = %settings.voice.accent,
        slow = settings.voice.slow,
        auto_stop = settings.capture.auto_stop,
        "starting jarvis"
    );

    let client = Arc::new(GeminiClient::new(&config.model)?);
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(GoogleTts::new());
    let assistant = Assistant::new(settings, client, synthesizer);

    match cli.command {
        Some(Command::Ask { text, save }) => {
            let playback = if cli.mute {
                None
            } else {
                AudioPlayback::new()
                    .inspect_err(|e| {
                        tracing::warn!(error = %e, "no audio output, reply will be text only");
                    })
                    .ok()
            };
            ask(assistant, playback.as_ref(), &text, save).await
        }
        _ => {
            let speaker = if cli.mute {
                None
            } else {
                Speaker::spawn()
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(error = %e, "no audio output, replies will be text only");
                    })
                    .ok()
            };
            let listener = build_listener(&config, &assistant);
            app::run_chat(assistant, listener, speaker).await?;
            Ok(())
        }
    }
}

/// Apply command-line overrides on top of loaded configuration
fn settings_from(cli: &Cli, config: &Config) -> anyhow::Result<Settings> {
    let mut settings = Settings::from(config);
    if let Some(accent) = &cli.accent {
        settings.voice.accent.clone_from(accent);
    }
    if cli.slow {
        settings.voice.slow = true;
    }
    if cli.manual {
        settings.capture.auto_stop = false;
    }
    if let Some(secs) = cli.silence_threshold {
        settings.capture.silence_threshold = config::silence_threshold(secs)?;
    }
    Ok(settings)
}

/// Microphone listener, or `None` if voice input can't be set up
fn build_listener(config: &Config, assistant: &Assistant) -> Option<MicrophoneListener> {
    let stt = match SpeechToText::from_config(&config.stt) {
        Ok(stt) => stt,
        Err(e) => {
            tracing::warn!(error = %e, "voice input disabled");
            return None;
        }
    };
    match AudioCapture::new() {
        Ok(capture) => Some(MicrophoneListener::new(
            capture,
            stt,
            assistant.settings().capture.listen_mode(),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "no microphone, voice input disabled");
            None
        }
    }
}

#[allow(clippy::future_not_send)]
async fn ask(
    mut assistant: Assistant,
    playback: Option<&AudioPlayback>,
    text: &str,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let outcome = assistant.turn(text).await;
    for line in app::format_outcome(&outcome) {
        println!("{line}");
    }

    if let Some(error) = &outcome.error {
        anyhow::bail!("{error}");
    }

    if let (Some(path), Some(audio)) = (save, outcome.audio.as_deref()) {
        std::fs::write(&path, audio)?;
        println!("Saved {} bytes of audio to {}", audio.len(), path.display());
    }

    app::play_reply(playback, &outcome);

    tracing::debug!(messages = assistant.state().len(), "ask finished");
    Ok(())
}

fn list_voices() {
    for name in voice::preset_names() {
        let config = voice::resolve(name, false);
        let marker = if name == voice::DEFAULT_PRESET {
            " (default)"
        } else {
            ""
        };
        println!(
            "{name:<18} lang={} domain=translate.google.{}{marker}",
            config.language_code, config.region_variant
        );
    }
}

async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = voice::rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

async fn test_tts(cli: &Cli, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let accent = cli.accent.as_deref().unwrap_or(voice::DEFAULT_PRESET);
    let voice_config = voice::resolve(accent, cli.slow);
    println!(
        "Voice: lang={} domain={} rate={:?}",
        voice_config.language_code, voice_config.region_variant, voice_config.speech_rate
    );

    println!("Synthesizing speech...");
    let tts = GoogleTts::new();
    let spoken = voice::clean_text_for_speech(text);
    let mp3_data = tts.synthesize(&spoken, &voice_config).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if mp3_data.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            mp3_data[0], mp3_data[1], mp3_data[2], mp3_data[3]
        );
    }

    if !cli.mute {
        println!("Playing audio...");
        let playback = AudioPlayback::new()?;
        playback.play_mp3(&mp3_data)?;
    }

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
