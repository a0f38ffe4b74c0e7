//! Traits for the platform seams of the read-aloud layer.
//!
//! The crate never talks to a speech engine or to persistent storage
//! directly; the embedder supplies both through these traits.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::errors::{SpeechError, StorageError};
use crate::types::{PlatformVoice, Utterance, UtteranceOutcome};

/// A host speech synthesis engine.
///
/// Modelled on the browser Web Speech API: a single global engine that
/// speaks one utterance at a time, can be cancelled, paused and resumed, and
/// publishes a (possibly unreliable) "voice list changed" notification.
///
/// ## Native Async Traits
///
/// `speak` uses native async functions in traits; no `async-trait` crate is
/// needed.
///
/// ## Examples
///
/// ```ignore
/// use read_aloud::{SpeechSynthesizer, Utterance, UtteranceOutcome, SpeechError};
///
/// struct Silent;
///
/// impl SpeechSynthesizer for Silent {
///     async fn speak(&self, _utterance: Utterance) -> Result<UtteranceOutcome, SpeechError> {
///         Ok(UtteranceOutcome::Completed)
///     }
///     // ...
/// }
/// ```
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the host has speech synthesis at all.
    fn is_supported(&self) -> bool;

    /// Snapshot of the voices the engine currently reports.
    ///
    /// May be empty for a while after startup on some engines.
    fn voices(&self) -> Vec<PlatformVoice>;

    /// Subscribe to "voice list changed" notifications.
    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()>;

    /// Whether [`voices`](Self::voices) is already complete, so an empty
    /// list will not fill in later.
    fn voice_list_is_final(&self) -> bool {
        false
    }

    /// Speak one utterance, resolving when the engine reports it finished.
    ///
    /// The engine must receive the utterance during the first poll, and a
    /// `cancel` that runs after that poll must end it.
    ///
    /// ## Errors
    ///
    /// Returns `SpeechError` if the engine fails the utterance.
    fn speak(
        &self,
        utterance: Utterance,
    ) -> impl Future<Output = Result<UtteranceOutcome, SpeechError>> + Send;

    /// Cancel every queued and in-flight utterance.
    fn cancel(&self);

    fn pause(&self);

    fn resume(&self);

    fn is_speaking(&self) -> bool;

    /// True when the engine is mid-utterance but paused.
    fn is_paused(&self) -> bool;
}

/// A string key-value store, the analogue of browser `localStorage`.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}
