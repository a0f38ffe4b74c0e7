use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use inquire::{InquireError, Select};
use owo_colors::OwoColorize;
use read_aloud::chunking::{DEFAULT_MAX_SENTENCES, truncate_to_sentences};
use read_aloud::providers::host::HostSynthesizer;
use read_aloud::{
    JsonFileStorage, PlatformQuirks, ReadAloud, SettingsStore, UserVoicePreference,
    VoiceDescriptor,
};
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Most characters read from stdin.
const MAX_STDIN_CHARS: usize = 10_000;

type Reader = ReadAloud<HostSynthesizer, JsonFileStorage>;

/// Read text aloud with your preferred voice
#[derive(Parser)]
#[command(name = "read-to-me")]
#[command(about = "Read text aloud using the system speech engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.read-aloud.json)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read text aloud (reads from stdin if no text is given)
    Speak {
        /// Text to speak
        text: Vec<String>,

        /// Voice id to use instead of the stored preference
        #[arg(long)]
        voice: Option<String>,

        /// Only read this many sentences
        #[arg(long, default_value_t = DEFAULT_MAX_SENTENCES)]
        max_sentences: usize,

        /// Speak long text sentence by sentence
        #[arg(long)]
        chunked: bool,
    },

    /// List available voices, best first
    Voices {
        /// Only voices that work offline
        #[arg(long, conflicts_with_all = ["network", "preferred"])]
        offline: bool,

        /// Only voices that need the network
        #[arg(long, conflicts_with = "preferred")]
        network: bool,

        /// Only higher quality and widely available voices
        #[arg(long)]
        preferred: bool,
    },

    /// Manage the preferred voice
    Voice {
        #[command(subcommand)]
        action: VoiceAction,
    },

    /// Restrict voice selection to offline voices
    Offline {
        #[arg(value_enum)]
        mode: Toggle,
    },

    /// Set the speaking rate (0.5 to 2.0)
    Rate { value: f32 },

    /// Set the preferred language
    Language { code: String },

    /// Print the stored preference as JSON
    Show,

    /// Forget all stored settings
    Clear,
}

#[derive(Subcommand)]
enum VoiceAction {
    /// Use the voice with this id
    Set { id: String },
    /// Use the platform default voice and stop automatic voice picking
    Clear,
    /// Choose a voice interactively
    Pick,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Initialize tracing based on verbosity level.
///
/// `RUST_LOG` wins when set. Otherwise:
/// - 0: WARN (absorbed engine and storage failures)
/// - 1 (-v): INFO
/// - 2 (-vv): DEBUG for voice loading and playback
/// - 3+ (-vvv): TRACE with file/line numbers
fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,read_to_me=info,read_aloud=info".to_string(),
            2 => "info,read_to_me=debug,read_aloud=debug".to_string(),
            _ => "debug,read_to_me=trace,read_aloud=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose >= 2)
                .with_file(verbose >= 3)
                .with_line_number(verbose >= 3)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// Joins multiple arguments into a single string with spaces.
fn join_args(args: Vec<String>) -> String {
    args.join(" ")
}

/// Keep at most `max` characters.
fn cap_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Reads text from stdin, keeping at most 10,000 characters.
fn read_from_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(cap_chars(buffer.trim(), MAX_STDIN_CHARS).to_string())
}

fn storage(cli_path: Option<PathBuf>) -> Result<JsonFileStorage> {
    match cli_path {
        Some(path) => Ok(JsonFileStorage::new(path)),
        None => JsonFileStorage::default_path().context("Failed to locate settings file"),
    }
}

async fn reader(storage: JsonFileStorage, quirks: PlatformQuirks) -> Reader {
    let synth = Arc::new(HostSynthesizer::detect().await);
    ReadAloud::new(synth, storage, quirks)
}

/// Initialize the reader, warning when no voices could be loaded.
async fn initialize(reader: &Reader) {
    if reader.initialize().await.is_unavailable() {
        eprintln!(
            "{}",
            "No voices found: voice features may not work well on this device.".yellow()
        );
    }
}

fn find_voice<'a>(voices: &'a [VoiceDescriptor], query: &str) -> Option<&'a VoiceDescriptor> {
    voices
        .iter()
        .find(|v| v.id == query)
        .or_else(|| voices.iter().find(|v| v.name.eq_ignore_ascii_case(query)))
}

fn describe(voice: &VoiceDescriptor, current: Option<&VoiceDescriptor>) -> String {
    let marker = if current.is_some_and(|c| c.id == voice.id) {
        "*"
    } else {
        " "
    };

    let mut tags = vec![format!("{:?}", voice.gender).to_lowercase()];
    if voice.is_network_voice {
        tags.push("network".into());
    }
    if voice.is_high_quality {
        tags.push("high quality".into());
    }

    format!(
        "{marker} {} {} [{}] {}",
        voice.name.bold(),
        voice.id.dimmed(),
        voice.language.as_deref().unwrap_or("-"),
        tags.join(", ").dimmed()
    )
}

async fn run_speak(
    cli_settings: Option<PathBuf>,
    text: Vec<String>,
    voice: Option<String>,
    max_sentences: usize,
    chunked: bool,
) -> Result<()> {
    let message = if text.is_empty() {
        read_from_stdin()?
    } else {
        join_args(text)
    };

    if message.trim().is_empty() {
        return Err(eyre!(
            "No input provided\nUsage: read-to-me speak <text> or echo \"text\" | read-to-me speak"
        ));
    }

    let message = truncate_to_sentences(&message, max_sentences);
    let quirks = PlatformQuirks {
        requires_chunked_speech: chunked,
        ..PlatformQuirks::default()
    };

    let reader = reader(storage(cli_settings)?, quirks).await;
    if !reader.is_supported() {
        return Err(eyre!(
            "No speech program found; install espeak-ng (or use macOS `say`)"
        ));
    }
    initialize(&reader).await;

    let voice = voice.map(|query| {
        let catalog = reader.get_voice_catalog();
        find_voice(&catalog, &query).cloned().unwrap_or_else(|| {
            eprintln!(
                "{}",
                format!("Unknown voice '{query}', using the default voice.").yellow()
            );
            VoiceDescriptor::new(query.clone(), query)
        })
    });

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    reader.speak(&message, voice.as_ref());
    reader.on_playback_end(move || {
        let _ = done_tx.send(());
    });

    tokio::select! {
        _ = done_rx => debug!("Playback finished"),
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupted, stopping playback");
            reader.stop();
        }
    }

    Ok(())
}

async fn run_voices(
    cli_settings: Option<PathBuf>,
    offline: bool,
    network: bool,
    preferred: bool,
) -> Result<()> {
    let reader = reader(storage(cli_settings)?, PlatformQuirks::default()).await;
    initialize(&reader).await;

    let voices = if offline {
        reader.get_offline_voices()
    } else if network {
        reader.get_network_voices()
    } else if preferred {
        reader.get_preferred_voices()
    } else {
        reader.get_voice_catalog()
    };

    let current = reader.settings().current().preferred_voice;
    for voice in &voices {
        println!("{}", describe(voice, current.as_ref()));
    }
    if voices.is_empty() {
        println!("{}", "No matching voices.".dimmed());
    }

    Ok(())
}

/// Ask the user to pick a voice. `None` when the prompt is cancelled.
fn pick_voice(
    catalog: &[VoiceDescriptor],
    current: Option<&VoiceDescriptor>,
) -> Result<Option<VoiceDescriptor>> {
    if catalog.is_empty() {
        return Err(eyre!("No voices available to pick from"));
    }

    let options: Vec<String> = catalog.iter().map(|v| describe(v, current)).collect();
    match Select::new("Choose a voice:", options.clone()).prompt() {
        Ok(selection) => {
            let index = options
                .iter()
                .position(|o| *o == selection)
                .ok_or_else(|| eyre!("Selection not found"))?;
            Ok(Some(catalog[index].clone()))
        }
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e).context("Voice selection failed"),
    }
}

async fn run_voice(cli_settings: Option<PathBuf>, action: VoiceAction) -> Result<()> {
    let storage = storage(cli_settings)?;

    let requested = match action {
        VoiceAction::Clear => {
            SettingsStore::new(storage).set_voice(None);
            println!("Preferred voice cleared; the platform default voice will be used.");
            return Ok(());
        }
        VoiceAction::Set { id } => Some(id),
        VoiceAction::Pick => None,
    };

    let reader = reader(storage, PlatformQuirks::default()).await;
    initialize(&reader).await;
    let catalog = reader.get_voice_catalog();

    let chosen = match requested {
        Some(id) => find_voice(&catalog, &id)
            .cloned()
            .ok_or_else(|| eyre!("Unknown voice '{id}'; run `read-to-me voices` to list them"))?,
        None => {
            let current = reader.settings().current().preferred_voice;
            match pick_voice(&catalog, current.as_ref())? {
                Some(voice) => voice,
                None => return Ok(()),
            }
        }
    };

    println!("Preferred voice set to {}", chosen.name.green());
    reader.set_preferred_voice(Some(chosen));
    Ok(())
}

fn print_preference(preference: &UserVoicePreference) -> Result<()> {
    let json = serde_json::to_string_pretty(preference).context("Failed to serialize settings")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Speak {
            text,
            voice,
            max_sentences,
            chunked,
        } => run_speak(cli.settings, text, voice, max_sentences, chunked).await,
        Command::Voices {
            offline,
            network,
            preferred,
        } => run_voices(cli.settings, offline, network, preferred).await,
        Command::Voice { action } => run_voice(cli.settings, action).await,
        Command::Offline { mode } => {
            let enabled = matches!(mode, Toggle::On);
            let reader = reader(storage(cli.settings)?, PlatformQuirks::default()).await;
            reader.set_offline_only(enabled);

            let preference = reader.settings().current();
            if enabled {
                println!("Offline-only mode {}", "enabled".green());
            } else {
                println!("Offline-only mode disabled");
            }
            if let Some(voice) = preference.preferred_voice {
                println!("Preferred voice: {}", voice.name);
            }
            Ok(())
        }
        Command::Rate { value } => {
            let store = SettingsStore::new(storage(cli.settings)?);
            store.set_speech_rate(value);
            println!("Speaking rate set to {}", store.current().speech_rate);
            Ok(())
        }
        Command::Language { code } => {
            let store = SettingsStore::new(storage(cli.settings)?);
            store.set_language(code);
            println!("Language set to {}", store.current().preferred_language);
            Ok(())
        }
        Command::Show => {
            let store = SettingsStore::new(storage(cli.settings)?);
            print_preference(&store.load())
        }
        Command::Clear => {
            let store = SettingsStore::new(storage(cli.settings)?);
            store.clear();
            println!("Settings cleared.");
            Ok(())
        }
    }
}
