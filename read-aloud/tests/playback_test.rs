//! Integration tests for the playback engine.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ScriptedSynthesizer, sample_voices};
use read_aloud::playback::IDLE_COMPLETION_DELAY;
use read_aloud::{
    PlatformQuirks, PlaybackEngine, PlaybackState, SpeechParams, SpeechSynthesizer, VoiceRef,
};
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};

fn engine_with(
    synth: &Arc<ScriptedSynthesizer>,
    quirks: PlatformQuirks,
) -> PlaybackEngine<ScriptedSynthesizer> {
    PlaybackEngine::new(Arc::clone(synth), quirks)
}

/// Register a completion callback that reports through a oneshot.
fn completion(engine: &PlaybackEngine<ScriptedSynthesizer>) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    engine.on_completion(move || {
        let _ = tx.send(());
    });
    rx
}

fn long_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| {
            format!("Sentence number {i} is here to pad the text out well past the chunking limit.")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Session exclusivity
// ============================================================================

#[tokio::test(start_paused = true)]
async fn second_speak_supersedes_first() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());
    let fired = Arc::new(Mutex::new(Vec::new()));

    engine.speak("first", VoiceRef::Default);
    let log = Arc::clone(&fired);
    engine.on_completion(move || log.lock().unwrap().push("first"));

    engine.speak("second", VoiceRef::Default);
    let log = Arc::clone(&fired);
    let (tx, rx) = oneshot::channel();
    engine.on_completion(move || {
        log.lock().unwrap().push("second");
        let _ = tx.send(());
    });

    rx.await.unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(*fired.lock().unwrap(), vec!["second"]);
    assert_eq!(synth.spoken_texts().last().map(String::as_str), Some("second"));
    assert_eq!(engine.state(), PlaybackState::Completed);
}

#[tokio::test(start_paused = true)]
async fn superseding_an_utterance_in_flight_cancels_it() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());
    let fired = Arc::new(Mutex::new(Vec::new()));

    engine.speak("first", VoiceRef::Default);
    let log = Arc::clone(&fired);
    engine.on_completion(move || log.lock().unwrap().push("first"));

    sleep(Duration::from_millis(500)).await;
    assert!(synth.is_speaking());

    engine.speak("second", VoiceRef::Default);
    let log = Arc::clone(&fired);
    engine.on_completion(move || log.lock().unwrap().push("second"));

    sleep(Duration::from_secs(10)).await;

    assert_eq!(*fired.lock().unwrap(), vec!["second"]);
    assert_eq!(synth.spoken_texts(), vec!["first", "second"]);
    assert!(synth.cancel_count() >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn superseded_session_issues_no_chunk_after_new_speak() {
    for _ in 0..100 {
        let synth = Arc::new(
            ScriptedSynthesizer::new(sample_voices()).with_duration(Duration::from_micros(50)),
        );
        let engine = engine_with(&synth, PlatformQuirks::mobile_browser());

        engine.speak(&long_text(400), VoiceRef::Default);
        tokio::task::yield_now().await;
        engine.speak("new", VoiceRef::Default);
        let issued_before = synth.spoken_texts().len();

        completion(&engine).await.unwrap();

        let late: Vec<String> = synth.spoken_texts()[issued_before..]
            .iter()
            .filter(|text| text.starts_with("Sentence"))
            .cloned()
            .collect();
        assert!(late.is_empty(), "old chunks issued after supersede: {late:?}");
        assert_eq!(synth.spoken_texts().last().map(String::as_str), Some("new"));
    }
}

// ============================================================================
// Chunking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn text_at_threshold_is_one_utterance() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::mobile_browser());

    let text = format!("{}. {}.", "a".repeat(98), "b".repeat(98));
    assert_eq!(text.chars().count(), 200);

    engine.speak(&text, VoiceRef::Default);
    completion(&engine).await.unwrap();

    assert_eq!(synth.spoken_texts(), vec![text]);
}

#[tokio::test(start_paused = true)]
async fn text_over_threshold_is_spoken_in_sentence_order() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::mobile_browser());

    let first = format!("{}.", "a".repeat(99));
    let second = format!("{}.", "b".repeat(99));
    let text = format!("{first} {second}");
    assert_eq!(text.chars().count(), 201);

    engine.speak(&text, VoiceRef::Default);
    let done = completion(&engine);

    // Strictly sequential: the second chunk waits for the first to finish
    sleep(Duration::from_secs(1)).await;
    assert_eq!(synth.spoken_texts(), vec![first.clone()]);

    done.await.unwrap();
    assert_eq!(synth.spoken_texts(), vec![first, second]);

    let session = engine.session().unwrap();
    assert_eq!(session.chunks().len(), 2);
    assert_eq!(session.cursor(), 2);
    assert_eq!(session.state(), PlaybackState::Completed);
}

#[tokio::test(start_paused = true)]
async fn long_text_is_not_chunked_without_the_quirk() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    let text = long_text(5);
    engine.speak(&text, VoiceRef::Default);
    completion(&engine).await.unwrap();

    assert_eq!(synth.spoken_texts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_sequence_prevents_further_chunks() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::mobile_browser());
    let fired = Arc::new(Mutex::new(false));

    engine.speak(&long_text(4), VoiceRef::Default);
    let flag = Arc::clone(&fired);
    engine.on_completion(move || *flag.lock().unwrap() = true);

    sleep(Duration::from_secs(1)).await;
    engine.stop();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(synth.spoken_texts().len(), 1);
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(!*fired.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn failing_chunk_is_skipped() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::mobile_browser());

    let text = long_text(3);
    let broken = "Sentence number 1 is here to pad the text out well past the chunking limit.";
    synth.fail_on(broken);

    engine.speak(&text, VoiceRef::Default);
    completion(&engine).await.unwrap();

    assert_eq!(synth.spoken_texts().len(), 3);
    assert_eq!(engine.state(), PlaybackState::Completed);
}

// ============================================================================
// Stop, pause and resume
// ============================================================================

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_in_any_state() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), PlaybackState::Idle);

    engine.speak("Hello.", VoiceRef::Default);
    sleep(Duration::from_millis(100)).await;
    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(!synth.is_speaking());
}

#[tokio::test(start_paused = true)]
async fn engine_side_cancel_stops_the_session() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());
    let fired = Arc::new(Mutex::new(false));

    engine.speak("Hello.", VoiceRef::Default);
    let flag = Arc::clone(&fired);
    engine.on_completion(move || *flag.lock().unwrap() = true);

    sleep(Duration::from_millis(100)).await;
    synth.cancel();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(!*fired.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn stalled_engine_is_force_resumed() {
    let synth = Arc::new(
        ScriptedSynthesizer::new(sample_voices()).with_duration(Duration::from_secs(3)),
    );
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("Hello.", VoiceRef::Default);
    sleep(Duration::from_millis(100)).await;
    synth.simulate_stall();

    sleep(Duration::from_millis(600)).await;
    assert_eq!(synth.resume_count(), 1);
    assert_eq!(engine.state(), PlaybackState::Speaking);
}

#[tokio::test(start_paused = true)]
async fn user_pause_is_not_overridden() {
    let synth = Arc::new(
        ScriptedSynthesizer::new(sample_voices()).with_duration(Duration::from_secs(3)),
    );
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("Hello.", VoiceRef::Default);
    sleep(Duration::from_millis(100)).await;

    engine.pause();
    assert_eq!(engine.state(), PlaybackState::Paused);

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(synth.resume_count(), 0);

    engine.resume();
    assert_eq!(synth.resume_count(), 1);
    assert_eq!(engine.state(), PlaybackState::Speaking);
}

// ============================================================================
// Voice resolution
// ============================================================================

#[tokio::test(start_paused = true)]
async fn known_voice_is_used() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("Hi.", VoiceRef::ById("samantha".into()));
    completion(&engine).await.unwrap();

    let spoken = synth.spoken();
    let voice = spoken[0].voice.as_ref().unwrap();
    assert_eq!(voice.id, "samantha");
    assert_eq!(spoken[0].lang.as_deref(), Some("en-US"));
}

#[tokio::test(start_paused = true)]
async fn stale_voice_falls_back_to_first_voice() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("Hi.", VoiceRef::ById("vanished".into()));
    completion(&engine).await.unwrap();

    assert_eq!(synth.spoken()[0].voice.as_ref().unwrap().id, "alex");
}

#[tokio::test(start_paused = true)]
async fn no_voices_uses_engine_default() {
    let synth = Arc::new(ScriptedSynthesizer::new(Vec::new()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("Hi.", VoiceRef::ById("samantha".into()));
    completion(&engine).await.unwrap();

    assert!(synth.spoken()[0].voice.is_none());
}

#[tokio::test(start_paused = true)]
async fn params_are_applied_to_utterances() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.set_params(SpeechParams::default().with_rate(1.5));
    engine.speak("Hi.", VoiceRef::Default);
    completion(&engine).await.unwrap();

    assert_eq!(synth.spoken()[0].params.rate, 1.5);
}

// ============================================================================
// Idle and unsupported engines
// ============================================================================

#[tokio::test(start_paused = true)]
async fn idle_completion_fires_after_short_delay() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    let start = Instant::now();
    completion(&engine).await.unwrap();
    assert!(start.elapsed() >= IDLE_COMPLETION_DELAY);
}

#[tokio::test(start_paused = true)]
async fn empty_text_completes_immediately() {
    let synth = Arc::new(ScriptedSynthesizer::new(sample_voices()));
    let engine = engine_with(&synth, PlatformQuirks::default());

    engine.speak("   ", VoiceRef::Default);
    assert_eq!(engine.state(), PlaybackState::Completed);
    completion(&engine).await.unwrap();
    assert!(synth.spoken_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unsupported_engine_is_a_no_op() {
    let synth = Arc::new(ScriptedSynthesizer::unsupported());
    let engine = engine_with(&synth, PlatformQuirks::default());

    assert!(!engine.is_supported());
    engine.speak("Hello.", VoiceRef::Default);
    engine.pause();
    engine.resume();
    engine.stop();

    assert_eq!(engine.state(), PlaybackState::Idle);
    assert!(synth.spoken_texts().is_empty());
    completion(&engine).await.unwrap();
}
