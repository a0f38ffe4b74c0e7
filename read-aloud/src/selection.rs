//! Voice selection policy.
//!
//! Pure functions that cut the catalog into named subsets, rank them, and
//! pick a default voice when the user has not chosen one. Nothing here does
//! I/O; the worst outcome is an empty list or `None`.

use crate::settings::UserVoicePreference;
use crate::types::{Gender, VoiceDescriptor};

/// Lowercase name fragments of widely available or higher quality voices.
pub const PREFERRED_NAME_MARKERS: &[&str] = &[
    "google", "samantha", "victoria", "english", "us ", "uk ", "enhanced", "premium", "neural",
    "wavenet",
];

/// Voices matching quality or broadly-available locale markers.
pub fn preferred_subset(catalog: &[VoiceDescriptor]) -> Vec<VoiceDescriptor> {
    catalog
        .iter()
        .filter(|voice| {
            let name = voice.name.to_lowercase();
            voice.is_high_quality || PREFERRED_NAME_MARKERS.iter().any(|m| name.contains(m))
        })
        .cloned()
        .collect()
}

/// Voices that need the network.
pub fn network_subset(catalog: &[VoiceDescriptor]) -> Vec<VoiceDescriptor> {
    catalog
        .iter()
        .filter(|v| v.is_network_voice)
        .cloned()
        .collect()
}

/// Voices that work offline.
pub fn offline_subset(catalog: &[VoiceDescriptor]) -> Vec<VoiceDescriptor> {
    catalog
        .iter()
        .filter(|v| !v.is_network_voice)
        .cloned()
        .collect()
}

/// Stable sort: female before male, then network or high-quality voices
/// before the rest.
pub fn rank(mut subset: Vec<VoiceDescriptor>) -> Vec<VoiceDescriptor> {
    subset.sort_by_key(|voice| {
        let gender_rank = match voice.gender {
            Gender::Female => 0,
            Gender::Male => 1,
        };
        let quality_rank = if voice.is_network_voice || voice.is_high_quality {
            0
        } else {
            1
        };
        (gender_rank, quality_rank)
    });
    subset
}

fn first_female(subset: Vec<VoiceDescriptor>) -> Option<VoiceDescriptor> {
    rank(subset).into_iter().find(|v| v.gender == Gender::Female)
}

/// Pick a voice for a user who has not chosen one.
///
/// An explicit `preferred_voice` is always returned unchanged. Otherwise the
/// first non-empty result wins:
///
/// 1. a female network voice (skipped in offline-only mode)
/// 2. a female voice from the preferred subset
/// 3. any female voice
/// 4. the first voice
/// 5. `None` for an empty catalog
///
/// In offline-only mode steps 2 to 4 only look at offline voices.
///
/// ## Examples
///
/// ```
/// use read_aloud::selection::choose_default;
/// use read_aloud::settings::UserVoicePreference;
/// use read_aloud::types::{Gender, VoiceDescriptor};
///
/// let catalog = vec![
///     VoiceDescriptor::new("a", "").with_network(true),
///     VoiceDescriptor::new("b", "").with_gender(Gender::Female),
/// ];
/// let chosen = choose_default(&catalog, &UserVoicePreference::default());
/// assert_eq!(chosen.map(|v| v.id), Some("b".to_string()));
/// ```
pub fn choose_default(
    catalog: &[VoiceDescriptor],
    preference: &UserVoicePreference,
) -> Option<VoiceDescriptor> {
    if let Some(voice) = &preference.preferred_voice {
        return Some(voice.clone());
    }

    let pool = if preference.use_offline_only {
        offline_subset(catalog)
    } else {
        catalog.to_vec()
    };

    let network_female = if preference.use_offline_only {
        None
    } else {
        first_female(network_subset(&pool))
    };

    network_female
        .or_else(|| first_female(preferred_subset(&pool)))
        .or_else(|| pool.iter().find(|v| v.gender == Gender::Female).cloned())
        .or_else(|| pool.first().cloned())
}
