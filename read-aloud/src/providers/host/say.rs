//! macOS `say` backend.
//!
//! Voices come from `say -v '?'`; `say` selects voices by display name, so
//! the voice name doubles as its identifier.

use tracing::{debug, trace};

use crate::types::{PlatformVoice, SpeechParams};

/// Speaking rate of `say` at a rate multiplier of 1.0, in words per minute.
pub(crate) const DEFAULT_RATE_WPM: f32 = 175.0;

/// Arguments for speaking one utterance with `say`.
///
/// `say` has no volume or pitch flag, so only voice and rate are mapped.
pub(crate) fn speak_args(voice: Option<&PlatformVoice>, params: &SpeechParams) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(voice) = voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }

    if let Some(rate) = resolve_rate(params.rate) {
        args.push("-r".to_string());
        args.push(rate.to_string());
    }

    args
}

/// Words per minute for `-r`, or `None` at normal speed.
fn resolve_rate(rate: f32) -> Option<u32> {
    if (rate - 1.0).abs() < f32::EPSILON {
        return None;
    }
    Some((DEFAULT_RATE_WPM * rate).round() as u32)
}

/// Parse the output of `say -v '?'`.
pub(crate) fn parse_voices(output: &str) -> Vec<PlatformVoice> {
    let voices: Vec<PlatformVoice> = output.lines().filter_map(parse_voice_line).collect();
    debug!(voice_count = voices.len(), "Parsed say voices");
    voices
}

/// Parse one line of `say -v '?'` output.
///
/// The format is:
/// ```text
/// VoiceName           locale    # Sample text
/// VoiceName (Qualifier) locale  # Sample text
/// ```
///
/// Eloquence voices are skipped.
fn parse_voice_line(line: &str) -> Option<PlatformVoice> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let metadata = line.split('#').next()?.trim();

    // The locale is the last token; everything before it is the name
    let locale = metadata.split_whitespace().last()?;
    let name = metadata[..metadata.rfind(locale)?].trim();
    if name.is_empty() {
        trace!(line, "Skipping line without a voice name");
        return None;
    }

    if name.contains("Eloquence") {
        trace!(name, "Skipping Eloquence voice");
        return None;
    }

    let mut voice = PlatformVoice::new(name, name).with_lang(locale.replace('_', "-"));
    if name.contains("(Enhanced)") || name.contains("(Premium)") {
        voice = voice.enhanced();
    }
    Some(voice)
}
