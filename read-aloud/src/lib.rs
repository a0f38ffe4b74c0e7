//! Read Aloud
//!
//! Voice selection and speech playback over an unreliable host speech
//! engine.
//!
//! ## Features
//!
//! - **Voice catalog**: enumerates engine voices with a bounded retry for
//!   engines that load their voice list late
//! - **Selection policy**: ranks voices and picks a sensible default
//!   (female, high quality) when the user has not chosen one
//! - **Persisted preference**: write-through settings with change
//!   notifications
//! - **Playback**: one session at a time, sentence chunking and stall
//!   recovery for engines that need it
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use read_aloud::{JsonFileStorage, PlatformQuirks, ReadAloud};
//! use read_aloud::providers::host::HostSynthesizer;
//!
//! let synth = Arc::new(HostSynthesizer::detect().await);
//! let reader = ReadAloud::new(synth, JsonFileStorage::default_path()?, PlatformQuirks::default());
//! reader.initialize().await;
//! reader.speak("Once upon a time.", None);
//! ```
//!
//! ## Module Structure
//!
//! - [`types`] - Voices, utterances, quirks and playback state
//! - [`errors`] - Engine and storage error types
//! - [`traits`] - The `SpeechSynthesizer` and `KeyValueStore` seams
//! - [`catalog`] - Voice enumeration and classification
//! - [`selection`] - Voice subsets, ranking and default choice
//! - [`settings`] - The persisted `UserVoicePreference`
//! - [`playback`] - The playback engine
//! - [`service`] - The `ReadAloud` façade

pub mod catalog;
pub mod chunking;
pub mod errors;
pub mod gender_inference;
pub mod playback;
pub mod providers;
pub mod selection;
pub mod service;
pub mod settings;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export main types at crate root for convenience
pub use catalog::{RetryPolicy, VoiceCatalog, VoiceLoad};
pub use errors::{SpeechError, StorageError};
pub use gender_inference::infer_gender;
pub use playback::{PlaybackEngine, PlaybackSession};
pub use service::ReadAloud;
pub use settings::{SettingsStore, UserVoicePreference, VoiceSource};
pub use storage::{JsonFileStorage, MemoryStorage};
pub use traits::{KeyValueStore, SpeechSynthesizer};
pub use types::{
    Gender, PlatformQuirks, PlatformVoice, PlaybackState, SpeechParams, Utterance,
    UtteranceOutcome, VoiceDescriptor, VoiceRef,
};
