//! Scripted speech engine for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use read_aloud::{PlatformVoice, SpeechError, SpeechSynthesizer, Utterance, UtteranceOutcome};
use tokio::sync::{Notify, broadcast};

/// How long each scripted utterance takes unless cancelled.
pub const UTTERANCE_DURATION: Duration = Duration::from_secs(2);

/// An in-memory engine whose voices, timing and failures are scripted.
pub struct ScriptedSynthesizer {
    supported: bool,
    voices: Mutex<Vec<PlatformVoice>>,
    voice_queries: AtomicUsize,
    voices_changed: broadcast::Sender<()>,
    voice_list_final: AtomicBool,
    spoken: Mutex<Vec<Utterance>>,
    fail_texts: Mutex<Vec<String>>,
    utterance_duration: Duration,
    cancel_signal: Notify,
    speaking: AtomicBool,
    paused: AtomicBool,
    resume_count: AtomicUsize,
    cancel_count: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new(voices: Vec<PlatformVoice>) -> Self {
        let (voices_changed, _) = broadcast::channel(16);
        Self {
            supported: true,
            voices: Mutex::new(voices),
            voice_queries: AtomicUsize::new(0),
            voices_changed,
            voice_list_final: AtomicBool::new(false),
            spoken: Mutex::new(Vec::new()),
            fail_texts: Mutex::new(Vec::new()),
            utterance_duration: UTTERANCE_DURATION,
            cancel_signal: Notify::new(),
            speaking: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            resume_count: AtomicUsize::new(0),
            cancel_count: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.utterance_duration = duration;
        self
    }

    /// Make utterances with exactly this text fail.
    pub fn fail_on(&self, text: &str) {
        self.fail_texts.lock().unwrap().push(text.to_string());
    }

    /// Replace the voice list without notifying.
    pub fn set_voices(&self, voices: Vec<PlatformVoice>) {
        *self.voices.lock().unwrap() = voices;
    }

    /// Replace the voice list and fire the change notification.
    pub fn publish_voices(&self, voices: Vec<PlatformVoice>) {
        self.set_voices(voices);
        let _ = self.voices_changed.send(());
    }

    /// Report the current voice list as complete.
    pub fn mark_voice_list_final(&self) {
        self.voice_list_final.store(true, Ordering::SeqCst);
    }

    /// Put the engine into the "speaking but paused" stall state.
    pub fn simulate_stall(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn voice_queries(&self) -> usize {
        self.voice_queries.load(Ordering::SeqCst)
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn resume_count(&self) -> usize {
        self.resume_count.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for ScriptedSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<PlatformVoice> {
        self.voice_queries.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().clone()
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.voices_changed.subscribe()
    }

    fn voice_list_is_final(&self) -> bool {
        self.voice_list_final.load(Ordering::SeqCst)
    }

    async fn speak(&self, utterance: Utterance) -> Result<UtteranceOutcome, SpeechError> {
        let cancelled = self.cancel_signal.notified();
        let fails = self.fail_texts.lock().unwrap().contains(&utterance.text);
        self.spoken.lock().unwrap().push(utterance);

        if fails {
            return Err(SpeechError::UtteranceFailed {
                message: "scripted failure".into(),
            });
        }

        self.speaking.store(true, Ordering::SeqCst);
        let outcome = tokio::select! {
            _ = tokio::time::sleep(self.utterance_duration) => UtteranceOutcome::Completed,
            _ = cancelled => UtteranceOutcome::Cancelled,
        };
        self.speaking.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        Ok(outcome)
    }

    fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        self.cancel_signal.notify_waiters();
        self.speaking.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resume_count.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

pub fn sample_voices() -> Vec<PlatformVoice> {
    vec![
        PlatformVoice::new("alex", "Alex").with_lang("en-US"),
        PlatformVoice::new("samantha", "Samantha").with_lang("en-US"),
        PlatformVoice::new("google-uk-female", "Google UK English Female")
            .with_lang("en-GB")
            .remote(),
    ]
}
