//! Word normalization, at build time and at query time
//!
//! Build-time normalization is strict: only lowercase ASCII words make it
//! into the lookup tables. Query-time normalization is lenient, any string
//! can be looked up and will simply be reported absent if it cannot match.

use crate::Word;

/// Turn a raw dataset ngram into a normalized word, or reject it
///
/// The ngram is stripped of any part-of-speech tag (everything from the first
/// underscore onwards, e.g. `running_VERB` becomes `running`) and rejected if
/// the rest is empty or contains anything other than ASCII letters. Accepted
/// words are then lowercased.
pub fn normalize_ngram(ngram: &str) -> Option<Word> {
    let word = ngram.split('_').next().unwrap_or_default();
    if word.is_empty() || !word.bytes().all(|b| b.is_ascii_alphabetic()) {
        log::trace!("Rejected ngram {ngram:?} because it's not a plain word");
        return None;
    }
    Some(word.to_ascii_lowercase().into())
}

/// Unicode characters that are used in the wild in place of an apostrophe
const APOSTROPHE_VARIANTS: &[char] = &[
    '\u{2019}', // RIGHT SINGLE QUOTATION MARK
    '\u{2018}', // LEFT SINGLE QUOTATION MARK
    '\u{0060}', // GRAVE ACCENT
    '\u{00B4}', // ACUTE ACCENT
    '\u{201B}', // SINGLE HIGH-REVERSED-9 QUOTATION MARK
    '\u{2032}', // PRIME
    '\u{2035}', // REVERSED PRIME
    '\u{02B9}', // MODIFIER LETTER PRIME
    '\u{02BC}', // MODIFIER LETTER APOSTROPHE
    '\u{02C8}', // MODIFIER LETTER VERTICAL LINE
    '\u{0313}', // COMBINING COMMA ABOVE
    '\u{0315}', // COMBINING COMMA ABOVE RIGHT
    '\u{055A}', // ARMENIAN APOSTROPHE
    '\u{05F3}', // HEBREW PUNCTUATION GERESH
    '\u{07F4}', // NKO HIGH TONE APOSTROPHE
    '\u{07F5}', // NKO LOW TONE APOSTROPHE
    '\u{FF07}', // FULLWIDTH APOSTROPHE
    '\u{1FBF}', // GREEK PSILI
    '\u{1FBD}', // GREEK KORONIS
    '\u{A78C}', // LATIN SMALL LETTER SALTILLO
];

/// Normalize a user-provided word before it is hashed
///
/// Apostrophe look-alikes become ASCII apostrophes, surrounding whitespace
/// is removed and the word is lowercased.
pub fn normalize_query(word: &str) -> String {
    word.trim()
        .chars()
        .map(|c| if APOSTROPHE_VARIANTS.contains(&c) { '\'' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Contraction suffixes that the corpus tokenizes as separate ngrams
///
/// Longer suffixes must come first.
const CONTRACTION_SUFFIXES: &[&str] = &["n't", "'ll", "'re", "'ve", "'m", "'d"];

/// Words that form an `'s` contraction meaning "is", "has" or "us"
///
/// `'s` is otherwise a possessive, so only these stems are split.
const S_CONTRACTION_STEMS: &[&str] = &[
    "it", "he", "she", "that", "what", "who", "where", "how", "here", "there", "let", "somebody",
    "everybody", "everyone", "nobody", "anywhere", "nowhere",
];

/// Split a normalized contraction like `we'll` into its stem and suffix
pub fn split_contraction(word: &str) -> Option<(&str, &str)> {
    for suffix in CONTRACTION_SUFFIXES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if !stem.is_empty() {
                return Some((stem, *suffix));
            }
        }
    }
    let stem = word.strip_suffix("'s")?;
    S_CONTRACTION_STEMS
        .contains(&stem)
        .then_some((stem, "'s"))
}

/// Normalized forms under which a query may be found, in order of preference
pub fn lookup_candidates(word: &str) -> Vec<String> {
    let normalized = normalize_query(word);
    if normalized.is_empty() {
        return Vec::new();
    }
    let stem = split_contraction(&normalized).map(|(stem, _suffix)| stem.to_owned());
    std::iter::once(normalized).chain(stem).collect()
}
