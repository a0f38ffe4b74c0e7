//! The caller-facing read-aloud API.
//!
//! [`ReadAloud`] wires a [`VoiceCatalog`], a [`SettingsStore`] and a
//! [`PlaybackEngine`] around one speech engine. Nothing here returns an
//! error: engine and storage problems are absorbed and logged further down.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::{RetryPolicy, VoiceCatalog, VoiceLoad};
use crate::playback::PlaybackEngine;
use crate::selection::{network_subset, offline_subset, preferred_subset, rank};
use crate::settings::SettingsStore;
use crate::traits::{KeyValueStore, SpeechSynthesizer};
use crate::types::{PlatformQuirks, PlaybackState, VoiceDescriptor, VoiceRef};

/// Voice selection, persisted preference and playback behind one handle.
///
/// ## Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use read_aloud::providers::host::HostSynthesizer;
/// use read_aloud::{JsonFileStorage, PlatformQuirks, ReadAloud};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let synth = Arc::new(HostSynthesizer::detect().await);
/// let reader = ReadAloud::new(synth, JsonFileStorage::default_path()?, PlatformQuirks::default());
///
/// if reader.initialize().await.is_unavailable() {
///     eprintln!("Voice features may not work well on this device");
/// }
///
/// let (tx, rx) = tokio::sync::oneshot::channel();
/// reader.speak("Hello there.", None);
/// reader.on_playback_end(move || {
///     let _ = tx.send(());
/// });
/// rx.await?;
/// # Ok(())
/// # }
/// ```
pub struct ReadAloud<S, K> {
    catalog: VoiceCatalog<S>,
    settings: Arc<SettingsStore<K>>,
    playback: PlaybackEngine<S>,
}

impl<S, K> ReadAloud<S, K>
where
    S: SpeechSynthesizer + 'static,
    K: KeyValueStore + 'static,
{
    pub fn new(synth: Arc<S>, storage: K, quirks: PlatformQuirks) -> Self {
        Self {
            catalog: VoiceCatalog::new(Arc::clone(&synth), quirks),
            settings: Arc::new(SettingsStore::new(storage)),
            playback: PlaybackEngine::new(synth, quirks),
        }
    }

    /// Override the voice loading retry bound.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.catalog = self.catalog.with_retry_policy(policy);
        self
    }

    pub fn is_supported(&self) -> bool {
        self.playback.is_supported()
    }

    /// Load the voice list (bounded retry) and auto-pick a default voice.
    ///
    /// [`VoiceLoad::Unavailable`] is the cue to tell the user that voice
    /// features may not work well on this device.
    pub async fn initialize(&self) -> VoiceLoad {
        let load = self.catalog.load_voices().await;

        match &load {
            VoiceLoad::Ready(voices) => {
                self.settings.apply_catalog(voices);
            }
            VoiceLoad::Unavailable { attempts } => {
                warn!(attempts, "No voices available; using the platform default");
            }
        }

        load
    }

    /// Re-run auto-pick every time the engine's voice list changes.
    ///
    /// The task ends when the engine drops its notification channel.
    pub fn watch_voice_changes(&self) -> JoinHandle<()> {
        let catalog = self.catalog.clone();
        let settings = Arc::clone(&self.settings);
        let mut changes = catalog.subscribe();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let voices = catalog.list_voices();
                        debug!(voice_count = voices.len(), "Voice list changed");
                        settings.apply_catalog(&voices);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Every voice, ranked.
    pub fn get_voice_catalog(&self) -> Vec<VoiceDescriptor> {
        rank(self.catalog.list_voices())
    }

    pub fn get_preferred_voices(&self) -> Vec<VoiceDescriptor> {
        rank(preferred_subset(&self.catalog.list_voices()))
    }

    pub fn get_network_voices(&self) -> Vec<VoiceDescriptor> {
        rank(network_subset(&self.catalog.list_voices()))
    }

    pub fn get_offline_voices(&self) -> Vec<VoiceDescriptor> {
        rank(offline_subset(&self.catalog.list_voices()))
    }

    /// Record the user's explicit voice choice (`None` for the default).
    pub fn set_preferred_voice(&self, voice: Option<VoiceDescriptor>) {
        self.settings.set_voice(voice);
    }

    pub fn set_offline_only(&self, enabled: bool) {
        self.settings
            .set_offline_only(enabled, &self.catalog.list_voices());
    }

    /// Speak `text`, replacing whatever is playing.
    ///
    /// Without an explicit `voice` the stored preference is used. The
    /// speaking rate always comes from the stored preference.
    pub fn speak(&self, text: &str, voice: Option<&VoiceDescriptor>) {
        let preference = self.settings.current();
        let voice = match voice {
            Some(voice) => VoiceRef::from(voice),
            None => VoiceRef::from(preference.preferred_voice.as_ref()),
        };

        self.playback.set_params(preference.speech_params());
        self.playback.speak(text, voice);
    }

    pub fn stop(&self) {
        self.playback.stop();
    }

    pub fn pause(&self) {
        self.playback.pause();
    }

    pub fn resume(&self) {
        self.playback.resume();
    }

    /// Run `callback` once the current playback completes (or shortly, if
    /// nothing is playing).
    pub fn on_playback_end(&self, callback: impl FnOnce() + Send + 'static) {
        self.playback.on_completion(callback);
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn settings(&self) -> &SettingsStore<K> {
        &self.settings
    }

    pub fn catalog(&self) -> &VoiceCatalog<S> {
        &self.catalog
    }

    pub fn playback(&self) -> &PlaybackEngine<S> {
        &self.playback
    }
}
