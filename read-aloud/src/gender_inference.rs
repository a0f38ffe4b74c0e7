//! Gender inference from voice names.
//!
//! Speech engines never report a voice's gender, so it is guessed from the
//! display name by a case-insensitive substring match against a curated list
//! of name fragments that vendors use for female voices. Anything that does
//! not match is classified as [`Gender::Male`].
//!
//! ## Accuracy Note
//!
//! This is a heuristic. It is deterministic, but it only knows the names in
//! [`FEMALE_NAME_MARKERS`]; a female voice with any other name is reported as
//! male.

use crate::types::Gender;

/// Lowercase name fragments that mark a voice as female.
pub const FEMALE_NAME_MARKERS: &[&str] = &[
    "female", "woman", "girl", "samantha", "victoria", "tessa", "monica", "kathy", "karen",
    "veena", "fiona", "lisa", "laura", "allison",
];

/// Infer gender from a voice name.
///
/// ## Examples
///
/// ```
/// use read_aloud::gender_inference::infer_gender;
/// use read_aloud::Gender;
///
/// assert_eq!(infer_gender("Google UK English Female"), Gender::Female);
/// assert_eq!(infer_gender("Microsoft David"), Gender::Male);
/// assert_eq!(infer_gender(""), Gender::Male);
/// ```
pub fn infer_gender(name: &str) -> Gender {
    let lowered = name.to_lowercase();

    if FEMALE_NAME_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        Gender::Female
    } else {
        Gender::Male
    }
}
