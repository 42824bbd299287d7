//! Voice presets and their resolution to a concrete [`VoiceConfig`]

use serde::Serialize;

/// Preset used when nothing (or something unknown) is selected
pub const DEFAULT_PRESET: &str = "UK English";

/// Named accent presets: (name, language code, regional variant)
///
/// The regional variant is the Google Translate top-level domain that
/// selects the accent for a given language.
const PRESETS: &[(&str, &str, &str)] = &[
    ("US English", "en", "com"),
    ("UK English", "en", "co.uk"),
    ("Australian English", "en", "com.au"),
    ("Indian English", "en", "co.in"),
    ("Urdu", "ur", "com"),
];

/// Speaking rate for synthesized speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechRate {
    #[default]
    Normal,
    Slow,
}

impl SpeechRate {
    /// Map the "slow speech" toggle to a rate
    #[must_use]
    pub const fn from_slow(slow: bool) -> Self {
        if slow { Self::Slow } else { Self::Normal }
    }

    #[must_use]
    pub const fn is_slow(self) -> bool {
        matches!(self, Self::Slow)
    }
}

/// Concrete voice settings for one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceConfig {
    /// Language code (e.g. "en")
    pub language_code: String,
    /// Regional variant selecting the accent (e.g. "co.uk")
    pub region_variant: String,
    /// Speaking rate
    pub speech_rate: SpeechRate,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        resolve(DEFAULT_PRESET, false)
    }
}

/// Resolve a preset name and the slow toggle to a [`VoiceConfig`]
///
/// Lookup ignores ASCII case and surrounding whitespace. Unknown names fall
/// back to [`DEFAULT_PRESET`].
#[must_use]
pub fn resolve(preset: &str, slow: bool) -> VoiceConfig {
    let (_, lang, region) = find(preset).unwrap_or_else(|| {
        tracing::debug!(preset, fallback = DEFAULT_PRESET, "unknown voice preset");
        default_entry()
    });

    VoiceConfig {
        language_code: (*lang).to_string(),
        region_variant: (*region).to_string(),
        speech_rate: SpeechRate::from_slow(slow),
    }
}

/// Canonical name of a preset, if it exists
#[must_use]
pub fn canonical_name(preset: &str) -> Option<&'static str> {
    find(preset).map(|(name, _, _)| *name)
}

/// All preset names in display order
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _, _)| *name)
}

fn find(preset: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let wanted = preset.trim();
    PRESETS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(wanted))
}

fn default_entry() -> &'static (&'static str, &'static str, &'static str) {
    // DEFAULT_PRESET is a member of PRESETS
    &PRESETS[1]
}
