//! The persisted voice preference and its store.
//!
//! [`SettingsStore`] owns the single [`UserVoicePreference`] record. Every
//! mutation is written through to the [`KeyValueStore`] immediately and
//! republished to observers through a `tokio::sync::watch` channel.
//!
//! ## Failure Model
//!
//! Reads never fail: missing, unreadable or malformed data is treated as
//! absent and yields the defaults. Write failures are logged and the
//! in-memory change still takes effect for the current session.
//!
//! ## Schema
//!
//! The record is stored under [`SETTINGS_KEY`] inside an envelope carrying
//! [`SETTINGS_SCHEMA_VERSION`]; a different version is treated as malformed.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::StorageError;
use crate::selection::choose_default;
use crate::traits::KeyValueStore;
use crate::types::{SpeechParams, VoiceDescriptor};

/// Storage key of the preference record.
pub const SETTINGS_KEY: &str = "userSettings";

/// Current schema version of the stored record.
///
/// Increment this when making breaking changes to the record.
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// Language used when nothing is stored.
pub const DEFAULT_LANGUAGE: &str = "en";

/// How the stored voice came to be chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceSource {
    /// Picked by [`SettingsStore::apply_catalog`]; may be re-picked when a
    /// new voice list arrives.
    #[default]
    Auto,
    /// Chosen by the user; never replaced automatically.
    User,
}

/// The user's persisted read-aloud preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserVoicePreference {
    /// `None` means "use the platform default".
    pub preferred_voice: Option<VoiceDescriptor>,
    /// Restrict voice selection to voices that work offline.
    pub use_offline_only: bool,
    pub voice_source: VoiceSource,
    /// Language code of the text being read. Stored for the embedder;
    /// voice selection does not consult it.
    pub preferred_language: String,
    /// Speaking rate multiplier (0.5 to 2.0).
    pub speech_rate: f32,
}

impl Default for UserVoicePreference {
    fn default() -> Self {
        Self {
            preferred_voice: None,
            use_offline_only: false,
            voice_source: VoiceSource::Auto,
            preferred_language: DEFAULT_LANGUAGE.to_string(),
            speech_rate: 1.0,
        }
    }
}

impl UserVoicePreference {
    /// Whether the stored voice was explicitly chosen by the user.
    pub fn has_explicit_voice(&self) -> bool {
        self.voice_source == VoiceSource::User && self.preferred_voice.is_some()
    }

    /// Utterance parameters derived from this preference.
    pub fn speech_params(&self) -> SpeechParams {
        SpeechParams::default().with_rate(self.speech_rate)
    }
}

/// Wrapper stored on disk, carrying the schema version.
#[derive(Debug, Serialize, Deserialize)]
struct SettingsEnvelope {
    schema_version: u32,
    settings: UserVoicePreference,
}

/// Owns, persists and publishes the [`UserVoicePreference`].
///
/// Constructed per embedder and passed to consumers; there is no global
/// instance.
///
/// ## Examples
///
/// ```
/// use read_aloud::{MemoryStorage, SettingsStore, VoiceDescriptor};
///
/// let store = SettingsStore::new(MemoryStorage::new());
/// store.set_voice(Some(VoiceDescriptor::new("v1", "Samantha")));
/// assert_eq!(store.load().preferred_voice.unwrap().id, "v1");
/// ```
pub struct SettingsStore<K> {
    storage: K,
    state: watch::Sender<UserVoicePreference>,
}

impl<K: KeyValueStore> SettingsStore<K> {
    /// Create a store, loading the persisted preference.
    pub fn new(storage: K) -> Self {
        let initial = read_preference(&storage);
        let (state, _) = watch::channel(initial);
        Self { storage, state }
    }

    /// Read the preference from storage, defaulting on any problem.
    pub fn load(&self) -> UserVoicePreference {
        read_preference(&self.storage)
    }

    /// The in-memory preference.
    pub fn current(&self) -> UserVoicePreference {
        self.state.borrow().clone()
    }

    /// Observe every change to the preference.
    pub fn subscribe(&self) -> watch::Receiver<UserVoicePreference> {
        self.state.subscribe()
    }

    /// Set (or clear) the user's chosen voice.
    ///
    /// This is an explicit choice: automatic picking is disabled afterwards.
    pub fn set_voice(&self, voice: Option<VoiceDescriptor>) {
        self.update(|pref| {
            pref.preferred_voice = voice;
            pref.voice_source = VoiceSource::User;
        });
    }

    /// Enable or disable offline-only mode.
    ///
    /// When enabling while the preferred voice is missing or needs the
    /// network, a new voice is picked from the offline voices in `catalog`.
    pub fn set_offline_only(&self, enabled: bool, catalog: &[VoiceDescriptor]) {
        self.update(|pref| {
            let was_enabled = pref.use_offline_only;
            pref.use_offline_only = enabled;

            let needs_offline_voice = pref
                .preferred_voice
                .as_ref()
                .is_none_or(|v| v.is_network_voice);

            if enabled && !was_enabled && needs_offline_voice {
                let offline = UserVoicePreference {
                    preferred_voice: None,
                    use_offline_only: true,
                    ..pref.clone()
                };
                pref.preferred_voice = choose_default(catalog, &offline);
                pref.voice_source = VoiceSource::Auto;
                debug!(
                    voice = pref.preferred_voice.as_ref().map(|v| v.name.as_str()),
                    "Re-picked voice for offline-only mode"
                );
            }
        });
    }

    pub fn set_language(&self, language: impl Into<String>) {
        let language = language.into();
        self.update(|pref| pref.preferred_language = language);
    }

    /// Set the speaking rate, clamped to 0.5–2.0.
    pub fn set_speech_rate(&self, rate: f32) {
        self.update(|pref| pref.speech_rate = SpeechParams::clamp_rate(rate));
    }

    /// Auto-pick a voice from a freshly loaded catalog.
    ///
    /// Does nothing once the user has explicitly chosen a voice, or when the
    /// catalog is empty. Returns `true` when the preferred voice changed.
    pub fn apply_catalog(&self, catalog: &[VoiceDescriptor]) -> bool {
        let current = self.current();
        if current.voice_source == VoiceSource::User || catalog.is_empty() {
            return false;
        }

        let candidate = UserVoicePreference {
            preferred_voice: None,
            ..current.clone()
        };
        let picked = choose_default(catalog, &candidate);
        if picked == current.preferred_voice {
            return false;
        }

        debug!(
            voice = picked.as_ref().map(|v| v.name.as_str()),
            "Auto-picked default voice"
        );
        self.update(|pref| {
            pref.preferred_voice = picked;
            pref.voice_source = VoiceSource::Auto;
        });
        true
    }

    /// Forget everything: remove the stored record and restore defaults.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(SETTINGS_KEY) {
            warn!(error = %e, "Failed to remove stored settings");
        }
        self.state.send_replace(UserVoicePreference::default());
    }

    /// Apply a change, persist it, then publish it.
    fn update(&self, change: impl FnOnce(&mut UserVoicePreference)) {
        let mut next = self.current();
        change(&mut next);
        self.persist(&next);
        self.state.send_replace(next);
    }

    fn persist(&self, preference: &UserVoicePreference) {
        let envelope = SettingsEnvelope {
            schema_version: SETTINGS_SCHEMA_VERSION,
            settings: preference.clone(),
        };

        let result = serde_json::to_string(&envelope)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.write(SETTINGS_KEY, &json));

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist settings; keeping in-memory change");
        }
    }
}

fn read_preference<K: KeyValueStore>(storage: &K) -> UserVoicePreference {
    let raw = match storage.read(SETTINGS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return UserVoicePreference::default(),
        Err(e) => {
            warn!(error = %e, "Failed to read settings; using defaults");
            return UserVoicePreference::default();
        }
    };

    match serde_json::from_str::<SettingsEnvelope>(&raw) {
        Ok(envelope) if envelope.schema_version == SETTINGS_SCHEMA_VERSION => envelope.settings,
        Ok(envelope) => {
            warn!(
                expected = SETTINGS_SCHEMA_VERSION,
                found = envelope.schema_version,
                "Settings schema version mismatch; using defaults"
            );
            UserVoicePreference::default()
        }
        Err(e) => {
            warn!(error = %e, "Malformed settings; using defaults");
            UserVoicePreference::default()
        }
    }
}
