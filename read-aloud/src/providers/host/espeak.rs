//! eSpeak / eSpeak-NG backend.
//!
//! Voices come from `<binary> --voices`. eSpeak selects voices by language
//! code (`-v en-gb`), so that code is the voice identifier.

use crate::types::{PlatformVoice, SpeechParams};

/// eSpeak speaking rate at a rate multiplier of 1.0, in words per minute.
const DEFAULT_SPEED_WPM: f32 = 175.0;

/// eSpeak amplitude at full volume.
const DEFAULT_AMPLITUDE: f32 = 100.0;

/// eSpeak pitch at a pitch multiplier of 1.0 (range 0-99).
const DEFAULT_PITCH: f32 = 50.0;

/// Arguments for speaking one utterance with eSpeak.
pub(crate) fn speak_args(voice: Option<&PlatformVoice>, params: &SpeechParams) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(voice) = voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }

    let speed = (DEFAULT_SPEED_WPM * params.rate).round() as u32;
    let amplitude = (DEFAULT_AMPLITUDE * params.volume).round() as u32;
    let pitch = (DEFAULT_PITCH * params.pitch).round().clamp(0.0, 99.0) as u32;

    args.extend([
        "-s".to_string(),
        speed.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
        "-p".to_string(),
        pitch.to_string(),
    ]);
    args
}

/// Parse the output of `espeak-ng --voices` or `espeak --voices`.
///
/// The output is whitespace-separated columns:
/// ```text
/// Pty Language Age/Gender VoiceName File Other Languages
///  5  af       --/M       Afrikaans gmw/af
/// ```
///
/// Unparseable lines are skipped.
pub(crate) fn parse_voices(output: &str, binary: &str) -> Vec<PlatformVoice> {
    let mut voices = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_voice_line(line) {
            Some(voice) => voices.push(voice),
            None => tracing::trace!(binary, line, "Skipping unparseable eSpeak voice line"),
        }
    }

    tracing::debug!(binary, voice_count = voices.len(), "Parsed eSpeak voices");
    voices
}

/// Parse one voice line. Returns `None` for the header and malformed lines.
fn parse_voice_line(line: &str) -> Option<PlatformVoice> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    // Pty, Language, Age/Gender, VoiceName, File
    if parts.len() < 5 {
        return None;
    }

    // A numeric priority also rules out the header
    parts[0].parse::<u32>().ok()?;

    let language = parts[1];
    // eSpeak writes spaces in names as underscores
    let name = parts[3].replace('_', " ");
    let name = match parse_gender_marker(parts[2]) {
        Some('F') if !name.to_lowercase().contains("female") => format!("{name} (female)"),
        _ => name,
    };

    Some(PlatformVoice::new(language, name).with_lang(language))
}

/// The gender letter from an Age/Gender field such as `--/M` or `55/F`.
fn parse_gender_marker(field: &str) -> Option<char> {
    let (_, gender) = field.split_once('/')?;
    match gender.trim() {
        "M" => Some('M'),
        "F" => Some('F'),
        _ => None,
    }
}
