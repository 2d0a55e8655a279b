use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use voice_assist::channel;
use voice_assist::voice::{
    AudioChunk, AudioSource, AudioSourceFactory, ChunkRecorder, CpalSource, CpalSourceFactory,
    MicrophoneRecognizers, RecognizerFactory, TypedSpeech, list_input_devices, rms,
};
use voice_assist::{
    Assistant, AssistantHandle, CommandParser, Config, Document, HttpTranscriber, ParseClient,
    Page, ProviderSet, SettingsUpdate, SttProviderKind, UiEvent, inbox,
};

/// Demo site used when no page file is given
const DEMO_SITE: &str = include_str!("../demos/clinic.json");

/// Voice Assist - Voice-controlled form assistant
#[derive(Parser)]
#[command(name = "voice-assist", version, about)]
struct Cli {
    /// Page model to drive (JSON site description)
    #[arg(long)]
    page: Option<std::path::PathBuf>,

    /// STT provider ("browser" or "server")
    #[arg(long, env = "VOICE_ASSIST_STT")]
    stt: Option<SttProviderKind>,

    /// Wake phrase
    #[arg(short, long, env = "VOICE_ASSIST_WAKE_WORD")]
    wake_word: Option<String>,

    /// Input device name
    #[arg(long, env = "VOICE_ASSIST_DEVICE")]
    device: Option<String>,

    /// Do not open the transcript channel; use HTTP transcription only
    #[arg(long)]
    no_channel: bool,

    /// Take speech from stdin lines instead of the microphone
    #[arg(long)]
    typed: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// List input devices
    Devices,
    /// Send an utterance to the parse service and print the command
    Parse {
        /// Utterance
        text: String,
    },
    /// Record a clip, upload it for inspection and transcribe it
    Diagnose {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voice_assist=info",
        1 => "info,voice_assist=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(cli.device.as_deref(), duration).await,
            Command::Devices => devices(),
            Command::Parse { text } => parse(&text).await,
            Command::Diagnose { duration } => diagnose(cli.device.as_deref(), duration).await,
            Command::Setup => voice_assist::setup::run_setup(),
        };
    }

    let mut config = Config::load()?;
    config.settings.apply(SettingsUpdate {
        wake_word: cli.wake_word,
        stt_provider: cli.stt,
        ..SettingsUpdate::default()
    })?;
    if cli.device.is_some() {
        config.device = cli.device;
    }
    tracing::debug!(?config, "loaded configuration");

    let page = match &cli.page {
        Some(path) => Document::from_json(&std::fs::read_to_string(path)?)?,
        None => Document::from_json(DEMO_SITE)?,
    };

    let (tx, rx) = inbox();
    let audio: Arc<dyn AudioSourceFactory> = Arc::new(CpalSourceFactory);
    let transcriber = HttpTranscriber::new(&config.backend);

    let speech = cli.typed.then(TypedSpeech::new);
    let recognizers: Arc<dyn RecognizerFactory> = match &speech {
        Some(speech) => Arc::new(speech.clone()),
        None => Arc::new(MicrophoneRecognizers::new(
            Arc::clone(&audio),
            config.device.clone(),
            config.vad,
            &config.recording,
            transcriber.clone(),
        )),
    };

    let channel = if cli.no_channel {
        None
    } else {
        let url = config.backend.channel_url()?;
        tracing::info!(%url, "opening transcript channel");
        let (handle, _task) = channel::spawn(url, config.channel.clone(), tx.clone());
        Some(handle)
    };

    let providers = ProviderSet {
        recognizers,
        audio,
        channel,
        transcriber: Some(transcriber),
        recording: config.recording.clone(),
        vad: config.vad,
        vad_enabled: config.vad_enabled,
        device: config.device.clone(),
    };
    let parser: Arc<dyn CommandParser> = Arc::new(ParseClient::new(&config.backend));

    let wake_word = config.settings.wake_word().to_string();
    let (assistant, handle) =
        Assistant::new(config.settings, page, providers, parser, tx, rx);

    let printer = tokio::spawn(print_ui_events(handle.subscribe()));
    let mut task = tokio::spawn(assistant.run());

    handle.set_listening(true)?;
    if speech.is_some() {
        tracing::info!("voice assist ready - type \"{wake_word}\" (lines are speech, /help for commands)");
    } else {
        tracing::info!("voice assist ready - say \"{wake_word}\" (/help for commands)");
    }

    let input = {
        let handle = handle.clone();
        tokio::spawn(async move { read_input(&handle, speech.as_ref()).await })
    };

    let page = tokio::select! {
        result = &mut task => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            handle.shutdown()?;
            task.await?
        }
    };

    input.abort();
    printer.abort();
    tracing::info!(route = page.route(), "voice assist stopped");
    Ok(())
}

/// Print UI events as JSON lines
async fn print_ui_events(mut events: broadcast::Receiver<UiEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "unprintable ui event"),
            },
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "ui printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Read host actions from stdin; with typed speech, other lines are spoken
async fn read_input(handle: &AssistantHandle, speech: Option<&TypedSpeech>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(e) = handle_input(handle, speech, line).await {
            tracing::warn!(error = %e, line, "input rejected");
        }
    }

    tracing::info!("input closed");
    let _ = handle.shutdown();
}

async fn handle_input(
    handle: &AssistantHandle,
    speech: Option<&TypedSpeech>,
    line: &str,
) -> voice_assist::Result<()> {
    let Some(action) = line.strip_prefix('/') else {
        match speech {
            Some(speech) if speech.say(line) == 0 => println!("(nothing is listening)"),
            Some(_) => {}
            None => println!("(listening on the microphone; run with --typed to type speech)"),
        }
        return Ok(());
    };

    let (verb, arg) = action.split_once(' ').unwrap_or((action, ""));
    match verb {
        "key" => {
            handle.key(arg, true)?;
            handle.key(arg, false)
        }
        "click" => match arg.trim().parse() {
            Ok(n) => handle.click_badge(n),
            Err(_) => {
                println!("usage: /click <number>");
                Ok(())
            }
        },
        "start" => handle.set_listening(true),
        "stop" => handle.set_listening(false),
        "nav" => handle.navigate(arg.trim()),
        "scroll" => handle.layout_changed(),
        "interim" => {
            if let Some(speech) = speech {
                speech.say_interim(arg);
            }
            Ok(())
        }
        "state" => {
            let snapshot = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        "quit" => handle.shutdown(),
        _ => {
            println!("commands: /key K, /click N, /start, /stop, /nav ROUTE, /scroll, /interim TEXT, /state, /quit");
            Ok(())
        }
    }
}

/// Capture from the microphone into a recorder
fn open_recorder(device: Option<&str>) -> anyhow::Result<(CpalSource, ChunkRecorder, u32)> {
    let mut source = CpalSource::open(device)?;
    let recorder = ChunkRecorder::new();

    let sink = recorder.clone();
    source.attach(Box::new(move |frame| sink.push(frame)));
    recorder.start();

    let sample_rate = source.format().sample_rate;
    Ok((source, recorder, sample_rate))
}

/// Test microphone input
async fn test_mic(device: Option<&str>, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (mut source, recorder, sample_rate) = open_recorder(device)?;
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recorder.take();
        let energy = rms(&samples);
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
    }

    source.close();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: voice-assist devices");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// List input devices
fn devices() -> anyhow::Result<()> {
    let names = list_input_devices()?;
    if names.is_empty() {
        println!("No input devices found");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Parse one utterance against the configured backend
async fn parse(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = ParseClient::new(&config.backend);
    tracing::debug!(url = client.url(), "using parse endpoint");

    let outcome = client.parse(text).await?;
    println!("{outcome:?}");
    Ok(())
}

/// Record a clip, save it on the backend and transcribe it
async fn diagnose(device: Option<&str>, duration: u64) -> anyhow::Result<()> {
    let config = Config::load()?;
    let device = device.or(config.device.as_deref());
    let transcriber = HttpTranscriber::new(&config.backend);

    println!("Recording {duration} seconds...");
    let (mut source, recorder, sample_rate) = open_recorder(device)?;
    tokio::time::sleep(Duration::from_secs(duration)).await;
    let samples = recorder.stop();
    source.close();

    let chunk = AudioChunk::encode(&samples, sample_rate)?;
    println!(
        "Captured {:.1}s, {} bytes, RMS {:.4} (chunk {})",
        chunk.duration().as_secs_f32(),
        chunk.wav.len(),
        chunk.rms,
        chunk.id
    );
    if chunk.rms < config.recording.silence_rms {
        println!("Warning: the clip is below the silence threshold and would be discarded");
    }

    match transcriber.save_debug_audio(chunk.wav.clone()).await {
        Ok(info) => println!("Saved on backend: {info}"),
        Err(e) => println!("Could not save clip: {e}"),
    }

    let transcript = transcriber
        .transcribe(chunk.wav, config.settings.language())
        .await?;
    println!("Transcript: {transcript:?}");
    Ok(())
}
