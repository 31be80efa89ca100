//! Offline word frequency statistics from the Google Books Ngram dataset,
//! whose general documentation you can find at
//! <http://storage.googleapis.com/books/ngrams/books/datasetsv3.html>.
//!
//! The crate has two halves sharing the vocabulary defined below:
//!
//! - A build pipeline that turns raw 1-gram TSV files into decade-aggregated
//!   tables ([`aggregate`]), then into 256 hash-bucketed lookup tables
//!   ([`bucket`]), then into a distributable archive ([`package`]).
//! - A query layer ([`lookup`]) that answers single and batch frequency
//!   queries by reading only the buckets that the requested words hash to.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod error;
pub mod hash;
pub mod install;
pub mod lookup;
pub mod normalize;
pub mod package;
pub mod progress;
pub mod report;
pub mod stats;
mod table;
pub mod tsv;

pub use crate::{
    error::{Error, Result},
    lookup::{BucketSource, CachedSource, DataDir, Lookup},
};

/// Year of Gregorian Calendar
pub type Year = i16;

/// Years that the dataset can hold: four-digit years
pub const VALID_YEARS: std::ops::RangeInclusive<Year> = 1000..=9999;

/// First year of a decade, e.g. 1980 for 1980-1989
pub type Decade = Year;

/// Normalized word: lowercase ASCII letters only
pub type Word = Box<str>;

/// Number of occurences of a word
///
/// According to
/// https://github.com/orgtre/google-books-ngram-frequency?tab=readme-ov-file#the-underlying-corpus,
/// English can have >283 billion matches over 10 years, so anything narrower
/// than 64 bits would be asking for trouble once decades are summed.
pub type TermFrequency = u64;

/// Number of documents in which a word occurs
pub type DocumentFrequency = u64;

/// Decade that a year belongs to
pub fn decade_of(year: Year) -> Decade {
    year.div_euclid(10) * 10
}

/// Usage counts accumulated over some period of time
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Counts {
    /// Number of recorded occurences
    pub tf: TermFrequency,

    /// Number of documents across which occurences were recorded
    pub df: DocumentFrequency,
}
//
impl Counts {
    /// Accumulate other counts into these ones
    pub fn add(&mut self, other: Counts) {
        self.tf += other.tf;
        self.df += other.df;
    }
}

/// Summary statistics stored for each word in the lookup tables
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FrequencyRecord {
    /// Decade with the highest term frequency
    pub peak_tf: Decade,

    /// Decade with the highest document frequency
    pub peak_df: Decade,

    /// Total term frequency across all decades
    pub sum_tf: TermFrequency,

    /// Total document frequency across all decades
    pub sum_df: DocumentFrequency,
}

/// Outcome of a successful word lookup
///
/// A word that is not part of the corpus is a valid answer, not an error.
/// Failures to consult the data at all are reported through [`Error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Frequency {
    /// The word is in the corpus, with these statistics
    Found(FrequencyRecord),

    /// The word is not in the corpus
    Absent,
}
//
impl Frequency {
    /// Truth that the word was found
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Statistics of the word, if it was found
    pub fn record(&self) -> Option<&FrequencyRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Absent => None,
        }
    }
}
//
impl From<Option<FrequencyRecord>> for Frequency {
    fn from(value: Option<FrequencyRecord>) -> Self {
        value.map_or(Self::Absent, Self::Found)
    }
}
