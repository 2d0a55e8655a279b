//! Interactive first-run setup wizard (`voice-assist setup`)

use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    AssistantFileConfig, AudioFileConfig, BackendFileConfig, VadFileConfig, VoiceAssistConfigFile,
};
use crate::config::{DEFAULT_BACKEND_URL, DEFAULT_HOTKEY, DEFAULT_LANGUAGE, DEFAULT_WAKE_WORD};
use crate::hotkey::Hotkey;
use crate::settings::SttProviderKind;
use crate::voice::list_input_devices;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Voice Assist Setup\n");

    // Load existing config if present
    let existing = crate::config::file::load_config_file();
    let config_path = crate::config::file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/voice-assist/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Wake word
    let wake_word: String = Input::new()
        .with_prompt("Wake word")
        .default(
            existing
                .assistant
                .wake_word
                .clone()
                .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
        )
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("wake word cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    // 2. Pause hotkey
    let hotkey: String = Input::new()
        .with_prompt("Pause hotkey (single key or F1-F24)")
        .default(
            existing
                .assistant
                .hotkey
                .clone()
                .unwrap_or_else(|| DEFAULT_HOTKEY.to_string()),
        )
        .validate_with(|input: &String| Hotkey::parse(input).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;

    // 3. STT provider
    let providers = [SttProviderKind::Server, SttProviderKind::Browser];
    let labels = [
        "Server (record chunks, transcribe on the backend)",
        "Browser (continuous on-device recognition)",
    ];
    let default_provider = existing
        .assistant
        .stt_provider
        .as_deref()
        .and_then(|p| p.parse::<SttProviderKind>().ok())
        .and_then(|kind| providers.iter().position(|&p| p == kind))
        .unwrap_or(0);

    let provider_idx = Select::new()
        .with_prompt("Speech-to-text provider")
        .items(&labels)
        .default(default_provider)
        .interact()?;
    let stt_provider = providers[provider_idx];

    // 4. Language
    let language: String = Input::new()
        .with_prompt("Recognition language")
        .default(
            existing
                .assistant
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        )
        .interact_text()?;

    // 5. Backend
    let backend_url: String = Input::new()
        .with_prompt("Backend URL")
        .default(
            existing
                .backend
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
        )
        .validate_with(|input: &String| {
            url::Url::parse(input).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    // 6. Input device
    let device = choose_device(existing.audio.device.as_deref())?;

    // 7. VAD
    let vad_enabled = Confirm::new()
        .with_prompt("Detect speech automatically (VAD)? Otherwise record fixed-length chunks")
        .default(existing.vad.enabled.unwrap_or(true))
        .interact()?;

    let config_file = VoiceAssistConfigFile {
        assistant: AssistantFileConfig {
            wake_word: Some(wake_word),
            hotkey: Some(hotkey),
            stt_provider: Some(stt_provider.to_string()),
            language: Some(language),
        },
        backend: BackendFileConfig {
            url: Some(backend_url),
            channel_url: existing.backend.channel_url,
            parse_timeout_secs: existing.backend.parse_timeout_secs,
        },
        vad: VadFileConfig {
            enabled: Some(vad_enabled),
            ..existing.vad
        },
        recording: existing.recording,
        channel: existing.channel,
        audio: AudioFileConfig { device },
    };

    write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());

    if stt_provider == SttProviderKind::Server {
        println!("Tip: run `voice-assist test-mic` to check your microphone levels.");
    }
    println!("\nSetup complete! Run `voice-assist -v` to start.");

    Ok(())
}

/// Pick an input device; `None` means the system default
fn choose_device(current: Option<&str>) -> anyhow::Result<Option<String>> {
    let devices = match list_input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            println!("Could not list input devices ({e}); using the system default");
            return Ok(current.map(str::to_string));
        }
    };

    let mut labels = vec!["(system default)".to_string()];
    labels.extend(devices.iter().cloned());

    let default = current
        .and_then(|c| devices.iter().position(|d| d == c))
        .map_or(0, |i| i + 1);

    let idx = Select::new()
        .with_prompt("Microphone")
        .items(&labels)
        .default(default)
        .interact()?;

    Ok((idx > 0).then(|| labels[idx].clone()))
}

/// Serialize and write the config file
fn write_config(path: &Path, config: &VoiceAssistConfigFile) -> anyhow::Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, serialize_config(config)?)?;
    Ok(())
}

/// Serialize config to TOML
fn serialize_config(config: &VoiceAssistConfigFile) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
