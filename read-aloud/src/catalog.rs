//! Voice catalog: enumerate and classify the engine's voices.
//!
//! Several engines (notably mobile browsers) report an empty voice list right
//! after startup and fill it in later, sometimes without firing their change
//! notification. [`VoiceCatalog::load_voices`] therefore runs a bounded
//! retry protocol:
//!
//! 1. Query immediately.
//! 2. If empty, wait for either a "voices changed" notification or the next
//!    poll tick ([`VOICE_POLL_INTERVAL`]) and query again.
//! 3. Give up after [`VOICE_POLL_MAX_ATTEMPTS`] wakes and report
//!    [`VoiceLoad::Unavailable`].
//!
//! An engine whose list is already final
//! ([`SpeechSynthesizer::voice_list_is_final`]) skips the protocol unless the
//! embedder marks its voice loading flaky
//! ([`PlatformQuirks::voice_load_is_flaky`]).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

use crate::gender_inference::infer_gender;
use crate::traits::SpeechSynthesizer;
use crate::types::{PlatformQuirks, PlatformVoice, VoiceDescriptor};

/// Delay between voice list polls.
pub const VOICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of wakes before the catalog reports voices as unavailable.
pub const VOICE_POLL_MAX_ATTEMPTS: u32 = 10;

/// Lowercase name fragments of cloud-backed voices.
pub const NETWORK_VOICE_MARKERS: &[&str] = &["google", "remote"];

/// Lowercase name fragments of enhanced/neural voices.
pub const HIGH_QUALITY_MARKERS: &[&str] = &["enhanced", "premium", "neural", "wavenet"];

/// Bound and spacing of the voice loading retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: VOICE_POLL_INTERVAL,
            max_attempts: VOICE_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Result of [`VoiceCatalog::load_voices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceLoad {
    /// A non-empty voice list.
    Ready(Vec<VoiceDescriptor>),
    /// Still no voices after `attempts` retries. Playback will use the
    /// engine's implicit default voice.
    Unavailable { attempts: u32 },
}

impl VoiceLoad {
    /// The loaded voices, or an empty list when unavailable.
    pub fn voices(&self) -> &[VoiceDescriptor] {
        match self {
            VoiceLoad::Ready(voices) => voices,
            VoiceLoad::Unavailable { .. } => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, VoiceLoad::Unavailable { .. })
    }
}

/// Whether a voice needs the network to synthesize.
///
/// True when the engine says so, or when the name carries a cloud vendor
/// marker (see [`NETWORK_VOICE_MARKERS`]).
pub fn is_network_voice(voice: &PlatformVoice) -> bool {
    if !voice.local_service {
        return true;
    }
    let name = voice.name.to_lowercase();
    NETWORK_VOICE_MARKERS.iter().any(|m| name.contains(m))
}

/// Whether a voice is enhanced quality, by engine flag or name marker.
pub fn is_high_quality(voice: &PlatformVoice) -> bool {
    if voice.enhanced {
        return true;
    }
    let name = voice.name.to_lowercase();
    HIGH_QUALITY_MARKERS.iter().any(|m| name.contains(m))
}

/// Classify a platform voice.
pub fn describe_voice(voice: &PlatformVoice) -> VoiceDescriptor {
    VoiceDescriptor {
        id: voice.id.clone(),
        name: voice.name.clone(),
        language: voice.lang.clone(),
        gender: infer_gender(&voice.name),
        is_network_voice: is_network_voice(voice),
        is_high_quality: is_high_quality(voice),
    }
}

/// Enumerates and classifies the voices of a [`SpeechSynthesizer`].
#[derive(Debug)]
pub struct VoiceCatalog<S> {
    synth: Arc<S>,
    quirks: PlatformQuirks,
    policy: RetryPolicy,
}

impl<S> Clone for VoiceCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            synth: Arc::clone(&self.synth),
            quirks: self.quirks,
            policy: self.policy,
        }
    }
}

impl<S: SpeechSynthesizer> VoiceCatalog<S> {
    pub fn new(synth: Arc<S>, quirks: PlatformQuirks) -> Self {
        Self {
            synth,
            quirks,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the retry bound and interval.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Classify whatever the engine reports right now. May be empty.
    pub fn list_voices(&self) -> Vec<VoiceDescriptor> {
        if !self.synth.is_supported() {
            return Vec::new();
        }
        self.synth.voices().iter().map(describe_voice).collect()
    }

    /// Subscribe to the engine's voice list change notification.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.synth.subscribe_voices_changed()
    }

    /// Load a non-empty voice list, retrying within the policy's bound.
    ///
    /// Never blocks indefinitely: after `max_attempts` wakes it returns
    /// [`VoiceLoad::Unavailable`].
    pub async fn load_voices(&self) -> VoiceLoad {
        if !self.synth.is_supported() {
            debug!("Speech synthesis unsupported, skipping voice load");
            return VoiceLoad::Unavailable { attempts: 0 };
        }

        let voices = self.list_voices();
        if !voices.is_empty() {
            return VoiceLoad::Ready(voices);
        }

        if self.synth.voice_list_is_final() && !self.quirks.voice_load_is_flaky {
            debug!("Engine reports a final, empty voice list");
            return VoiceLoad::Unavailable { attempts: 0 };
        }

        let mut changes = Some(self.synth.subscribe_voices_changed());

        for attempt in 1..=self.policy.max_attempts {
            wait_for_wake(&mut changes, self.policy.interval).await;

            let voices = self.list_voices();
            trace!(attempt, voice_count = voices.len(), "Polled voice list");
            if !voices.is_empty() {
                debug!(attempt, voice_count = voices.len(), "Voices loaded");
                return VoiceLoad::Ready(voices);
            }
        }

        debug!(
            attempts = self.policy.max_attempts,
            "Voice list still empty, giving up"
        );
        VoiceLoad::Unavailable {
            attempts: self.policy.max_attempts,
        }
    }
}

/// Sleep until the next poll tick or an earlier change notification.
///
/// A closed notification channel is dropped so later waits fall back to the
/// timer alone.
async fn wait_for_wake(changes: &mut Option<broadcast::Receiver<()>>, interval: Duration) {
    let Some(rx) = changes.as_mut() else {
        tokio::time::sleep(interval).await;
        return;
    };

    tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        received = rx.recv() => {
            if let Err(RecvError::Closed) = received {
                *changes = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;

    #[test]
    fn test_network_voice_by_metadata() {
        let voice = PlatformVoice::new("v", "Anna").remote();
        assert!(is_network_voice(&voice));
    }

    #[test]
    fn test_network_voice_by_name() {
        assert!(is_network_voice(&PlatformVoice::new("v", "Google US English")));
        assert!(is_network_voice(&PlatformVoice::new("v", "Remote Voice")));
        assert!(!is_network_voice(&PlatformVoice::new("v", "Samantha")));
    }

    #[test]
    fn test_high_quality_by_flag_or_name() {
        assert!(is_high_quality(&PlatformVoice::new("v", "Zoe").enhanced()));
        assert!(is_high_quality(&PlatformVoice::new("v", "Zoe (Premium)")));
        assert!(is_high_quality(&PlatformVoice::new("v", "en-US-Wavenet-F")));
        assert!(!is_high_quality(&PlatformVoice::new("v", "Zoe")));
    }

    #[test]
    fn test_describe_voice() {
        let voice = PlatformVoice::new("urn:google-uk-female", "Google UK English Female")
            .with_lang("en-GB")
            .remote();

        let described = describe_voice(&voice);
        assert_eq!(described.id, "urn:google-uk-female");
        assert_eq!(described.name, "Google UK English Female");
        assert_eq!(described.language.as_deref(), Some("en-GB"));
        assert_eq!(described.gender, Gender::Female);
        assert!(described.is_network_voice);
        assert!(!described.is_high_quality);
    }

    #[test]
    fn test_voice_load_accessors() {
        let ready = VoiceLoad::Ready(vec![VoiceDescriptor::new("a", "A")]);
        assert_eq!(ready.voices().len(), 1);
        assert!(!ready.is_unavailable());

        let unavailable = VoiceLoad::Unavailable { attempts: 10 };
        assert!(unavailable.voices().is_empty());
        assert!(unavailable.is_unavailable());
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 10);
    }
}
