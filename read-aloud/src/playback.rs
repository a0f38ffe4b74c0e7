//! Playback engine: drive text through a speech engine.
//!
//! [`PlaybackEngine`] owns the single active [`PlaybackSession`]. Starting a
//! new session cancels the previous one first; there is no queue.
//!
//! ## Session Lifecycle
//!
//! ```text
//! Idle -> Speaking -> Completed
//!            |  ^
//!            v  |
//!           Paused      (any active state) -> Stopped
//! ```
//!
//! Each session is driven by one spawned task that speaks its chunks in
//! order, waiting for each utterance to finish before issuing the next.
//! While an utterance is in flight a liveness check runs every
//! [`LIVENESS_INTERVAL`] and force-resumes an engine that reports itself
//! paused without the user having asked for it (screen-lock stalls).
//!
//! ## Completion Callbacks
//!
//! Callbacks registered with [`PlaybackEngine::on_completion`] fire exactly
//! once when the session completes. Superseded or stopped sessions drop
//! their callbacks without calling them. A callback registered while no
//! session is active fires after [`IDLE_COMPLETION_DELAY`].

use std::convert::Infallible;
use std::future::{Future, poll_fn};
use std::pin::{Pin, pin};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::chunking::plan_chunks;
use crate::traits::SpeechSynthesizer;
use crate::types::{
    PlatformQuirks, PlatformVoice, PlaybackState, SpeechParams, Utterance, UtteranceOutcome,
    VoiceRef,
};

/// Interval of the stalled-engine check while speaking.
pub const LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

/// Delay before a callback registered with no active session fires.
pub const IDLE_COMPLETION_DELAY: Duration = Duration::from_millis(50);

/// A completion callback.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Snapshot of one "speak this text" request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    source_text: String,
    chunks: Vec<String>,
    cursor: usize,
    state: PlaybackState,
}

impl PlaybackSession {
    fn new(source_text: String, chunks: Vec<String>) -> Self {
        let state = if chunks.is_empty() {
            PlaybackState::Completed
        } else {
            PlaybackState::Speaking
        };
        Self {
            source_text,
            chunks,
            cursor: 0,
            state,
        }
    }

    /// The full text of the request.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Utterance texts in speaking order.
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Index of the chunk being spoken (or next to speak).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }
}

#[derive(Default)]
struct EngineState {
    generation: u64,
    session: Option<PlaybackSession>,
    driver: Option<JoinHandle<()>>,
    callbacks: Vec<CompletionCallback>,
    params: SpeechParams,
    user_paused: bool,
}

impl EngineState {
    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.state.is_active())
    }

    /// End the current session without firing its callbacks.
    fn end_session(&mut self, state: PlaybackState) {
        self.generation += 1;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.callbacks.clear();
        self.user_paused = false;
        if let Some(session) = self.session.as_mut()
            && session.state.is_active()
        {
            session.state = state;
        }
    }
}

type SharedState = Arc<Mutex<EngineState>>;

fn lock(state: &Mutex<EngineState>) -> std::sync::MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolve a voice reference against the engine's live voice list.
///
/// A missing or stale identifier falls back to the first available voice;
/// with no voices at all the engine's implicit default is used (`None`).
///
/// ## Examples
///
/// ```
/// use read_aloud::playback::resolve_voice;
/// use read_aloud::types::{PlatformVoice, VoiceRef};
///
/// let voices = vec![PlatformVoice::new("a", "Alex"), PlatformVoice::new("b", "Samantha")];
/// let stale = VoiceRef::ById("gone".into());
/// assert_eq!(resolve_voice(&voices, &stale).map(|v| v.id), Some("a".to_string()));
/// assert_eq!(resolve_voice(&[], &stale), None);
/// ```
pub fn resolve_voice(voices: &[PlatformVoice], voice: &VoiceRef) -> Option<PlatformVoice> {
    if let VoiceRef::ById(id) = voice {
        if let Some(found) = voices.iter().find(|v| &v.id == id) {
            return Some(found.clone());
        }
        debug!(voice_id = %id, "Voice not in live list, falling back");
    }
    voices.first().cloned()
}

/// Speaks text through a [`SpeechSynthesizer`], one session at a time.
pub struct PlaybackEngine<S> {
    synth: Arc<S>,
    quirks: PlatformQuirks,
    state: SharedState,
}

impl<S: SpeechSynthesizer + 'static> PlaybackEngine<S> {
    pub fn new(synth: Arc<S>, quirks: PlatformQuirks) -> Self {
        Self {
            synth,
            quirks,
            state: SharedState::default(),
        }
    }

    /// Whether the underlying engine can speak at all.
    pub fn is_supported(&self) -> bool {
        self.synth.is_supported()
    }

    /// Rate, pitch and volume used for subsequent sessions.
    pub fn set_params(&self, params: SpeechParams) {
        lock(&self.state).params = params;
    }

    pub fn params(&self) -> SpeechParams {
        lock(&self.state).params
    }

    /// Start speaking `text`, cancelling any active session first.
    ///
    /// Returns immediately; the session is driven by a spawned task, so this
    /// must be called from within a Tokio runtime. On an unsupported engine
    /// this is a no-op.
    pub fn speak(&self, text: &str, voice: VoiceRef) {
        if !self.synth.is_supported() {
            debug!("Speech synthesis unsupported, ignoring speak request");
            return;
        }

        let voice = resolve_voice(&self.synth.voices(), &voice);
        let chunks = plan_chunks(text, self.quirks.requires_chunked_speech);

        let mut state = lock(&self.state);
        state.end_session(PlaybackState::Stopped);
        // Silence the engine before the new session can issue anything
        self.synth.cancel();

        let session = PlaybackSession::new(text.to_string(), chunks.clone());
        debug!(
            chunk_count = chunks.len(),
            voice = voice.as_ref().map(|v| v.name.as_str()),
            "Starting playback session"
        );

        state.session = Some(session);
        if chunks.is_empty() {
            return;
        }

        let driver = tokio::spawn(drive_session(
            Arc::clone(&self.synth),
            Arc::clone(&self.state),
            state.generation,
            chunks,
            voice,
            state.params,
        ));
        state.driver = Some(driver);
    }

    /// Cancel any active speech. Safe to call in any state.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        state.end_session(PlaybackState::Stopped);
        if self.synth.is_supported() {
            self.synth.cancel();
        }
    }

    pub fn pause(&self) {
        if !self.synth.is_supported() {
            return;
        }
        {
            let mut state = lock(&self.state);
            state.user_paused = true;
            if let Some(session) = state.session.as_mut()
                && session.state == PlaybackState::Speaking
            {
                session.state = PlaybackState::Paused;
            }
        }
        self.synth.pause();
    }

    pub fn resume(&self) {
        if !self.synth.is_supported() {
            return;
        }
        {
            let mut state = lock(&self.state);
            state.user_paused = false;
            if let Some(session) = state.session.as_mut()
                && session.state == PlaybackState::Paused
            {
                session.state = PlaybackState::Speaking;
            }
        }
        self.synth.resume();
    }

    /// Run `callback` once the active session completes.
    ///
    /// With no active session the callback fires after
    /// [`IDLE_COMPLETION_DELAY`]. Must be called from within a Tokio runtime.
    pub fn on_completion(&self, callback: impl FnOnce() + Send + 'static) {
        let mut state = lock(&self.state);
        if state.is_active() {
            state.callbacks.push(Box::new(callback));
            return;
        }
        drop(state);

        tokio::spawn(async move {
            tokio::time::sleep(IDLE_COMPLETION_DELAY).await;
            callback();
        });
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.state)
            .session
            .as_ref()
            .map_or(PlaybackState::Idle, |s| s.state)
    }

    /// Snapshot of the current (or last) session.
    pub fn session(&self) -> Option<PlaybackSession> {
        lock(&self.state).session.clone()
    }
}

impl<S> Drop for PlaybackEngine<S> {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.state).driver.take() {
            driver.abort();
        }
    }
}

/// Speak each chunk in order, then complete the session.
async fn drive_session<S: SpeechSynthesizer>(
    synth: Arc<S>,
    state: SharedState,
    generation: u64,
    chunks: Vec<String>,
    voice: Option<PlatformVoice>,
    params: SpeechParams,
) {
    let total = chunks.len();

    for (index, chunk) in chunks.into_iter().enumerate() {
        let utterance = Utterance::new(chunk)
            .with_voice(voice.clone())
            .with_params(params);
        trace!(chunk = index, total, "Speaking chunk");

        let mut speaking = pin!(synth.speak(utterance));
        let outcome = match issue(&state, generation, index, speaking.as_mut()).await {
            None => return,
            Some(Poll::Ready(outcome)) => outcome,
            Some(Poll::Pending) => tokio::select! {
                outcome = speaking.as_mut() => outcome,
                never = keep_alive(synth.as_ref(), &state) => match never {},
            },
        };

        match outcome {
            Ok(UtteranceOutcome::Completed) => {}
            Ok(UtteranceOutcome::Cancelled) => {
                debug!(chunk = index, "Utterance cancelled by the engine");
                let mut guard = lock(&state);
                if guard.generation == generation {
                    guard.end_session(PlaybackState::Stopped);
                }
                return;
            }
            Err(e) => {
                warn!(chunk = index, error = %e, "Chunk failed, skipping");
            }
        }
    }

    complete_session(&state, generation, total);
}

/// Move the session cursor and hand the utterance to the engine.
///
/// The generation check and the utterance's first poll (where the engine
/// receives it) run under one lock hold, so a competing `speak` or `stop`
/// either cancels the issued utterance or stops it from being issued.
/// Returns `None` if the session was superseded.
async fn issue<F: Future>(
    state: &Mutex<EngineState>,
    generation: u64,
    index: usize,
    mut utterance: Pin<&mut F>,
) -> Option<Poll<F::Output>> {
    poll_fn(|cx| {
        let mut guard = lock(state);
        if guard.generation != generation {
            return Poll::Ready(None);
        }
        if let Some(session) = guard.session.as_mut() {
            session.cursor = index;
        }
        Poll::Ready(Some(utterance.as_mut().poll(cx)))
    })
    .await
}

fn complete_session(state: &Mutex<EngineState>, generation: u64, total: usize) {
    let callbacks = {
        let mut guard = lock(state);
        if guard.generation != generation {
            return;
        }
        if let Some(session) = guard.session.as_mut() {
            session.cursor = total;
            session.state = PlaybackState::Completed;
        }
        guard.driver = None;
        guard.user_paused = false;
        std::mem::take(&mut guard.callbacks)
    };

    debug!(callback_count = callbacks.len(), "Playback session completed");
    for callback in callbacks {
        callback();
    }
}

fn is_user_paused(state: &Mutex<EngineState>) -> bool {
    lock(state).user_paused
}

/// Force-resume an engine that stalls in the paused state.
///
/// Never resolves: once the engine reports it is not speaking the check
/// goes quiet until the utterance future wins the enclosing `select!`.
async fn keep_alive<S: SpeechSynthesizer>(synth: &S, state: &Mutex<EngineState>) -> Infallible {
    let mut ticks = tokio::time::interval(LIVENESS_INTERVAL);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticks.tick().await;

    loop {
        ticks.tick().await;

        if !synth.is_speaking() {
            return std::future::pending().await;
        }

        if synth.is_paused() && !is_user_paused(state) {
            debug!("Engine paused itself mid-utterance, resuming");
            synth.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_voice_by_id() {
        let voices = vec![PlatformVoice::new("a", "Alex"), PlatformVoice::new("b", "Samantha")];
        let resolved = resolve_voice(&voices, &VoiceRef::ById("b".into()));
        assert_eq!(resolved.unwrap().id, "b");
    }

    #[test]
    fn resolve_default_uses_first_voice() {
        let voices = vec![PlatformVoice::new("a", "Alex")];
        assert_eq!(resolve_voice(&voices, &VoiceRef::Default).unwrap().id, "a");
        assert_eq!(resolve_voice(&[], &VoiceRef::Default), None);
    }

    #[test]
    fn empty_session_is_completed() {
        let session = PlaybackSession::new(String::new(), Vec::new());
        assert_eq!(session.state(), PlaybackState::Completed);

        let session = PlaybackSession::new("Hi.".into(), vec!["Hi.".into()]);
        assert_eq!(session.state(), PlaybackState::Speaking);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.chunks(), ["Hi."]);
        assert_eq!(session.source_text(), "Hi.");
    }

    #[test]
    fn end_session_drops_callbacks_and_bumps_generation() {
        let mut state = EngineState {
            session: Some(PlaybackSession::new("x".into(), vec!["x".into()])),
            ..Default::default()
        };
        state.callbacks.push(Box::new(|| panic!("must not fire")));

        state.end_session(PlaybackState::Stopped);

        assert_eq!(state.generation, 1);
        assert!(state.callbacks.is_empty());
        assert_eq!(state.session.unwrap().state(), PlaybackState::Stopped);
    }

    #[test]
    fn end_session_keeps_completed_state() {
        let mut state = EngineState {
            session: Some(PlaybackSession::new(String::new(), Vec::new())),
            ..Default::default()
        };
        state.end_session(PlaybackState::Stopped);
        assert_eq!(state.session.unwrap().state(), PlaybackState::Completed);
    }
}
