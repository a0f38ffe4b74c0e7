//! Core types for the read-aloud voice layer.
//!
//! This module defines the values that flow between the platform's speech
//! engine, the voice catalog, the persisted preference and the playback
//! engine:
//! - Voices as the platform reports them ([`PlatformVoice`]) and as the rest
//!   of the crate sees them ([`VoiceDescriptor`])
//! - Utterances and their tuning parameters
//! - Platform quirk flags and playback state

use serde::{Deserialize, Serialize};

// ============================================================================
// Gender
// ============================================================================

/// Inferred gender of a synthesis voice.
///
/// Platforms do not report this, so it is always a best-effort guess from
/// the voice name (see [`crate::gender_inference`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

// ============================================================================
// Voices
// ============================================================================

/// A voice exactly as the speech engine reports it.
///
/// Mirrors the fields a browser `SpeechSynthesisVoice` exposes. The `id` is
/// the engine's voice URI and is only guaranteed stable for the lifetime of
/// the current process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVoice {
    /// Engine voice URI.
    pub id: String,
    /// Display name.
    pub name: String,
    /// BCP-47 language tag, when the engine reports one.
    pub lang: Option<String>,
    /// `false` when the engine says synthesis needs the network.
    pub local_service: bool,
    /// Engine-reported enhanced/neural quality flag.
    pub enhanced: bool,
}

impl PlatformVoice {
    /// Create an on-device voice with the given identifier and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lang: None,
            local_service: true,
            enhanced: false,
        }
    }

    /// Set the language tag.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Mark the voice as requiring network access.
    #[must_use]
    pub fn remote(mut self) -> Self {
        self.local_service = false;
        self
    }

    /// Mark the voice as enhanced quality.
    #[must_use]
    pub fn enhanced(mut self) -> Self {
        self.enhanced = true;
        self
    }
}

/// A classified voice from the [`VoiceCatalog`](crate::catalog::VoiceCatalog).
///
/// This is what callers display, rank and persist. The `id` can be turned
/// back into a live [`PlatformVoice`] at playback time; when that fails the
/// playback engine falls back to the platform default.
///
/// ## Examples
///
/// ```
/// use read_aloud::types::{Gender, VoiceDescriptor};
///
/// let voice = VoiceDescriptor::new("com.apple.samantha", "Samantha")
///     .with_gender(Gender::Female)
///     .with_language("en-US");
/// assert!(!voice.is_network_voice);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub gender: Gender,
    #[serde(default)]
    pub is_network_voice: bool,
    #[serde(default)]
    pub is_high_quality: bool,
}

impl VoiceDescriptor {
    /// Create an offline, standard-quality, male descriptor.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: None,
            gender: Gender::Male,
            is_network_voice: false,
            is_high_quality: false,
        }
    }

    /// Set the inferred gender.
    #[must_use]
    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    /// Set the language tag.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set whether the voice needs the network.
    #[must_use]
    pub fn with_network(mut self, is_network_voice: bool) -> Self {
        self.is_network_voice = is_network_voice;
        self
    }

    /// Set whether the voice is high quality.
    #[must_use]
    pub fn with_high_quality(mut self, is_high_quality: bool) -> Self {
        self.is_high_quality = is_high_quality;
        self
    }
}

/// Which voice a playback request should use.
///
/// Resolved once against the live engine voice list when speech starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VoiceRef {
    /// A voice identifier previously taken from a [`VoiceDescriptor`].
    ById(String),
    /// Let the engine pick.
    #[default]
    Default,
}

impl From<Option<&VoiceDescriptor>> for VoiceRef {
    fn from(voice: Option<&VoiceDescriptor>) -> Self {
        match voice {
            Some(v) => VoiceRef::ById(v.id.clone()),
            None => VoiceRef::Default,
        }
    }
}

impl From<&VoiceDescriptor> for VoiceRef {
    fn from(voice: &VoiceDescriptor) -> Self {
        VoiceRef::ById(voice.id.clone())
    }
}

// ============================================================================
// Utterances
// ============================================================================

/// Rate, pitch and volume for an utterance.
///
/// All three default to `1.0`. Values are clamped on construction through
/// [`SpeechParams::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    /// Speaking rate multiplier (0.5 to 2.0).
    pub rate: f32,
    /// Pitch multiplier (0.0 to 2.0).
    pub pitch: f32,
    /// Volume (0.0 to 1.0).
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl SpeechParams {
    pub const MIN_RATE: f32 = 0.5;
    pub const MAX_RATE: f32 = 2.0;

    /// Build clamped parameters.
    pub fn new(rate: f32, pitch: f32, volume: f32) -> Self {
        Self {
            rate: Self::clamp_rate(rate),
            pitch: pitch.clamp(0.0, 2.0),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    /// Clamp a rate multiplier into the supported range.
    ///
    /// ```
    /// use read_aloud::types::SpeechParams;
    ///
    /// assert_eq!(SpeechParams::clamp_rate(3.0), 2.0);
    /// assert_eq!(SpeechParams::clamp_rate(0.1), 0.5);
    /// ```
    pub fn clamp_rate(rate: f32) -> f32 {
        if rate.is_nan() {
            return 1.0;
        }
        rate.clamp(Self::MIN_RATE, Self::MAX_RATE)
    }

    /// Replace the rate, clamped.
    #[must_use]
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Self::clamp_rate(rate);
        self
    }
}

/// One request to the speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` lets the engine use its implicit default voice.
    pub voice: Option<PlatformVoice>,
    pub lang: Option<String>,
    pub params: SpeechParams,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            lang: None,
            params: SpeechParams::default(),
        }
    }

    /// Speak with the given voice; the utterance language follows the voice.
    #[must_use]
    pub fn with_voice(mut self, voice: Option<PlatformVoice>) -> Self {
        self.lang = voice.as_ref().and_then(|v| v.lang.clone());
        self.voice = voice;
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: SpeechParams) -> Self {
        self.params = params;
        self
    }
}

/// How an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// The engine fired its completion event.
    Completed,
    /// The utterance was cut short by `cancel`.
    Cancelled,
}

// ============================================================================
// Platform quirks
// ============================================================================

/// Known defects of the host speech engine, supplied by the embedder.
///
/// The core never sniffs user agents or operating systems; whoever builds the
/// engine states which workarounds it needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformQuirks {
    /// Long utterances silently stop; speak them sentence by sentence.
    pub requires_chunked_speech: bool,
    /// The voice list is populated late; keep polling for it even when the
    /// engine calls an empty list final.
    pub voice_load_is_flaky: bool,
}

impl PlatformQuirks {
    /// Quirks of mobile browser engines (e.g. Android WebView).
    pub fn mobile_browser() -> Self {
        Self {
            requires_chunked_speech: true,
            voice_load_is_flaky: true,
        }
    }
}

// ============================================================================
// Playback state
// ============================================================================

/// State of the current [`PlaybackSession`](crate::playback::PlaybackSession).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
    Completed,
    Stopped,
}

impl PlaybackState {
    /// Whether a session in this state still owns the speech engine.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Speaking | PlaybackState::Paused)
    }
}

// ============================================================================
// Tests
// ============================================================================
