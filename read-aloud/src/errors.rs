/// Errors raised by a speech synthesis engine.
///
/// These never cross the [`ReadAloud`](crate::service::ReadAloud) façade;
/// the playback engine absorbs them and logs instead.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The host has no usable speech synthesis capability.
    #[error("Speech synthesis is not supported on this host")]
    Unsupported,

    /// The engine rejected or failed an utterance.
    #[error("Utterance failed: {message}")]
    UtteranceFailed {
        /// Description of the failure.
        message: String,
    },

    /// The synthesis program could not be started.
    #[error("Failed to spawn {program}")]
    ProcessSpawnFailed {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The synthesis program exited unsuccessfully.
    #[error("{program} exited with {status}")]
    ProcessFailed {
        /// The program that failed.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
    },

    /// Listing the engine's voices failed.
    #[error("Voice enumeration failed for {program}: {message}")]
    VoiceEnumerationFailed {
        /// The program whose voices could not be listed.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// IO error while talking to the synthesis program.
    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// Errors raised by a [`KeyValueStore`](crate::traits::KeyValueStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to read or write the backing file.
    #[error("Storage IO failed for {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored data could not be parsed or serialized.
    #[error("Stored data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// No home directory to place the default storage file in.
    #[error("Could not determine home directory")]
    NoHomeDirectory,
}
