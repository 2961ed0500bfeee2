//! Keyword markers for the deterministic intent path.
//!
//! Markers are written with their diacritics. A question typed with tone marks
//! is matched against those accented forms, so "đọc" (read) and "dọc" (along)
//! never pass for "độc" (venomous). A question typed without any tone marks is
//! matched against the folded forms of the same words. All patterns match
//! whole words only.

use std::sync::OnceLock;

use regex::Regex;

use serpens_core::text::{fold, has_diacritics, lower};
use serpens_core::types::LISTING_RESULT_LIMIT;
use serpens_core::{DangerLevel, Intent, IntentType};

const NEGATION: &[&str] = &[
    "không",
    "chẳng",
    "ko",
    "trừ",
    "ngoại trừ",
    "not",
    "except",
    "excluding",
    "without",
    "non",
];

const LISTING: &[&str] = &[
    "liệt kê",
    "danh sách",
    "các loài",
    "những loài",
    "bao nhiêu loài",
    "list",
    "which species",
    "all species",
];

const NON_VENOMOUS: &[&str] = &["vô hại", "lành tính", "rắn lành", "harmless", "nonvenomous"];

const VENOMOUS: &[&str] = &[
    "độc",
    "nọc",
    "nguy hiểm",
    "chết người",
    "venom",
    "venomous",
    "poison",
    "poisonous",
    "toxic",
    "dangerous",
    "deadly",
];

/// Countries in match order, with their canonical English name.
const COUNTRIES: &[(&str, &[&str])] = &[
    ("Vietnam", &["việt nam", "vietnam", "vn"]),
    ("Thailand", &["thái lan", "thailand"]),
    ("Laos", &["lào", "laos"]),
    ("Cambodia", &["campuchia", "cambodia"]),
    ("China", &["trung quốc", "china"]),
    ("India", &["ấn độ", "india"]),
    ("Indonesia", &["indonesia"]),
    ("Malaysia", &["malaysia", "mã lai"]),
    ("Myanmar", &["myanmar", "miến điện"]),
    ("Philippines", &["philippines", "philippin"]),
    ("Australia", &["úc", "australia"]),
];

/// A question prepared for marker matching.
#[derive(Debug, Clone)]
pub struct MarkerText {
    /// Lowercased, punctuation collapsed, diacritics kept.
    lowered: String,
    /// Lowercased, punctuation collapsed, diacritics stripped.
    folded: String,
    /// Whether the question was typed with diacritics.
    toned: bool,
}

impl MarkerText {
    /// Normalize `question` both ways.
    pub fn new(question: &str) -> Self {
        Self {
            lowered: lower(question),
            folded: fold(question),
            toned: has_diacritics(question),
        }
    }
}

/// One marker list compiled for both kinds of input.
struct MarkerSet {
    toned: Regex,
    plain: Regex,
}

impl MarkerSet {
    fn compile(words: &[&str]) -> Result<Self, regex::Error> {
        let folded: Vec<String> = words.iter().map(|word| fold(word)).collect();
        Ok(Self {
            toned: word_pattern(words.iter().copied())?,
            plain: word_pattern(folded.iter().map(String::as_str))?,
        })
    }

    fn is_match(&self, text: &MarkerText) -> bool {
        if text.toned {
            self.toned.is_match(&text.lowered)
        } else {
            self.plain.is_match(&text.folded)
        }
    }
}

/// Compiled marker lists.
struct Markers {
    negation: MarkerSet,
    listing: MarkerSet,
    non_venomous: MarkerSet,
    venomous: MarkerSet,
    countries: Vec<(&'static str, MarkerSet)>,
}

impl Markers {
    fn compile() -> Result<Self, regex::Error> {
        let countries = COUNTRIES
            .iter()
            .map(|(name, words)| Ok((*name, MarkerSet::compile(words)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            negation: MarkerSet::compile(NEGATION)?,
            listing: MarkerSet::compile(LISTING)?,
            non_venomous: MarkerSet::compile(NON_VENOMOUS)?,
            venomous: MarkerSet::compile(VENOMOUS)?,
            countries,
        })
    }
}

/// One alternation matching any of `words` on word boundaries.
fn word_pattern<'word>(words: impl Iterator<Item = &'word str>) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = words.map(regex::escape).collect();
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
}

/// Compiled markers, or `None` if compilation failed. Every question then
/// counts as negated, so the generative path handles all of them.
fn markers() -> Option<&'static Markers> {
    static MARKERS: OnceLock<Option<Markers>> = OnceLock::new();
    MARKERS.get_or_init(|| Markers::compile().ok()).as_ref()
}

/// Whether the question contains a negation marker, which rules out the
/// deterministic path.
pub fn has_negation(text: &MarkerText) -> bool {
    markers().is_none_or(|markers| markers.negation.is_match(text))
}

/// Deterministic intent from keyword markers.
///
/// Callers must check [`has_negation`] first: independent keyword hits cannot
/// express a negated filter.
pub fn fast_path(text: &MarkerText) -> Intent {
    let mut intent = Intent::default();
    let Some(markers) = markers() else {
        return intent;
    };

    if markers.listing.is_match(text) {
        intent = intent
            .with_type(IntentType::Listing)
            .with_limit(i64::from(LISTING_RESULT_LIMIT));
    }

    if let Some((country, _)) = markers
        .countries
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
    {
        intent = intent.with_country(*country);
    }

    if markers.non_venomous.is_match(text) {
        intent = intent.with_danger(DangerLevel::NonVenomous);
    } else if markers.venomous.is_match(text) {
        intent = intent.with_danger(DangerLevel::Venomous);
    }

    intent
}
