//! Speech synthesis through a TTS program installed on the host.
//!
//! [`HostSynthesizer`] runs macOS `say` or `espeak-ng`/`espeak` as a child
//! process per utterance. The text is written to the child's stdin; the
//! utterance completes when the process exits.

mod espeak;
mod say;

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::io::AsyncWriteExt;
use tokio::sync::{Notify, broadcast};
use tracing::{debug, info, warn};

use crate::errors::SpeechError;
use crate::traits::SpeechSynthesizer;
use crate::types::{PlatformVoice, Utterance, UtteranceOutcome};

/// A supported host TTS program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostProgram {
    /// macOS `say`.
    Say,
    /// `espeak-ng` or legacy `espeak`; holds the binary name.
    ESpeak(String),
}

impl HostProgram {
    /// Find the first available program: `say` on macOS, then `espeak-ng`,
    /// then `espeak`.
    pub fn detect() -> Option<Self> {
        if cfg!(target_os = "macos") && which::which("say").is_ok() {
            return Some(HostProgram::Say);
        }

        ["espeak-ng", "espeak"]
            .into_iter()
            .find(|binary| which::which(binary).is_ok())
            .map(|binary| HostProgram::ESpeak(binary.to_string()))
    }

    /// The executable name.
    pub fn binary(&self) -> &str {
        match self {
            HostProgram::Say => "say",
            HostProgram::ESpeak(binary) => binary,
        }
    }

    fn list_voices_args(&self) -> &'static [&'static str] {
        match self {
            HostProgram::Say => &["-v", "?"],
            HostProgram::ESpeak(_) => &["--voices"],
        }
    }

    fn parse_voices(&self, output: &str) -> Vec<PlatformVoice> {
        match self {
            HostProgram::Say => say::parse_voices(output),
            HostProgram::ESpeak(binary) => espeak::parse_voices(output, binary),
        }
    }

    fn speak_args(&self, utterance: &Utterance) -> Vec<String> {
        let voice = utterance.voice.as_ref();
        match self {
            HostProgram::Say => say::speak_args(voice, &utterance.params),
            HostProgram::ESpeak(_) => espeak::speak_args(voice, &utterance.params),
        }
    }
}

/// A [`SpeechSynthesizer`] backed by a host TTS program.
///
/// The voice list starts empty and is filled by
/// [`refresh_voices`](Self::refresh_voices), which also fires the
/// voices-changed notification. Once a listing has run, successful or not,
/// the list is final. Pause and resume are not supported by these programs
/// and are ignored.
///
/// ## Examples
///
/// ```no_run
/// use read_aloud::providers::host::HostSynthesizer;
///
/// # async fn example() {
/// let synth = HostSynthesizer::detect().await;
/// if synth.is_available() {
///     println!("speaking with {}", synth.program().map_or("", |p| p.binary()));
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct HostSynthesizer {
    program: Option<HostProgram>,
    voices: RwLock<Vec<PlatformVoice>>,
    voices_changed: broadcast::Sender<()>,
    voices_listed: AtomicBool,
    cancel_signal: Notify,
    speaking: AtomicBool,
}

impl HostSynthesizer {
    /// Create a synthesizer for `program` without loading its voices.
    ///
    /// `None` yields an unsupported synthesizer.
    pub fn new(program: Option<HostProgram>) -> Self {
        let (voices_changed, _) = broadcast::channel(16);
        Self {
            program,
            voices: RwLock::new(Vec::new()),
            voices_changed,
            voices_listed: AtomicBool::new(false),
            cancel_signal: Notify::new(),
            speaking: AtomicBool::new(false),
        }
    }

    /// Detect the host program and load its voices.
    ///
    /// A failed voice listing is logged; the synthesizer still speaks with
    /// the program's default voice.
    pub async fn detect() -> Self {
        let synth = Self::new(HostProgram::detect());

        match &synth.program {
            Some(program) => {
                debug!(program = program.binary(), "Detected host TTS program");
                if let Err(e) = synth.refresh_voices().await {
                    warn!(error = %e, "Failed to list host voices");
                }
            }
            None => info!("No host TTS program found"),
        }

        synth
    }

    pub fn program(&self) -> Option<&HostProgram> {
        self.program.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    /// Re-list the program's voices and notify subscribers.
    ///
    /// ## Errors
    ///
    /// Returns `SpeechError::Unsupported` without a program, or
    /// `SpeechError::VoiceEnumerationFailed` if listing fails.
    pub async fn refresh_voices(&self) -> Result<usize, SpeechError> {
        let program = self.program.as_ref().ok_or(SpeechError::Unsupported)?;
        let result = self.list_program_voices(program).await;
        self.voices_listed.store(true, Ordering::SeqCst);
        result
    }

    async fn list_program_voices(&self, program: &HostProgram) -> Result<usize, SpeechError> {
        let output = tokio::process::Command::new(program.binary())
            .args(program.list_voices_args())
            .output()
            .await
            .map_err(|e| SpeechError::VoiceEnumerationFailed {
                program: program.binary().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SpeechError::VoiceEnumerationFailed {
                program: program.binary().to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let voices = program.parse_voices(&String::from_utf8_lossy(&output.stdout));
        let count = voices.len();
        *self.voices.write().unwrap_or_else(PoisonError::into_inner) = voices;

        // No subscribers is fine
        let _ = self.voices_changed.send(());
        Ok(count)
    }

    async fn run_utterance(
        &self,
        program: &HostProgram,
        utterance: Utterance,
    ) -> Result<UtteranceOutcome, SpeechError> {
        // Registered before spawning so a cancel during startup is not lost
        let cancelled = self.cancel_signal.notified();

        let mut child = tokio::process::Command::new(program.binary())
            .args(program.speak_args(&utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::ProcessSpawnFailed {
                program: program.binary().to_string(),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(utterance.text.as_bytes()).await?;
            // Dropping stdin sends EOF
            drop(stdin);
        }

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(UtteranceOutcome::Completed)
                } else {
                    Err(SpeechError::ProcessFailed {
                        program: program.binary().to_string(),
                        status: status.to_string(),
                    })
                }
            }
            _ = cancelled => {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Speech process already exited");
                }
                child.wait().await?;
                Ok(UtteranceOutcome::Cancelled)
            }
        }
    }
}

impl SpeechSynthesizer for HostSynthesizer {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn voices(&self) -> Vec<PlatformVoice> {
        self.voices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.voices_changed.subscribe()
    }

    fn voice_list_is_final(&self) -> bool {
        self.voices_listed.load(Ordering::SeqCst)
    }

    async fn speak(&self, utterance: Utterance) -> Result<UtteranceOutcome, SpeechError> {
        let program = self.program.as_ref().ok_or(SpeechError::Unsupported)?;

        self.speaking.store(true, Ordering::SeqCst);
        let result = self.run_utterance(program, utterance).await;
        self.speaking.store(false, Ordering::SeqCst);
        result
    }

    fn cancel(&self) {
        self.cancel_signal.notify_waiters();
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        debug!("Host TTS programs cannot pause; ignoring");
    }

    fn resume(&self) {
        debug!("Host TTS programs cannot resume; ignoring");
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        false
    }
}
