//! Per-word usage statistics and their summary into lookup table entries

use crate::{Counts, Decade, FrequencyRecord, Year};
use anyhow::Context;
use std::{collections::BTreeMap, path::Path};

/// Usage history of a single word, decade by decade
///
/// Decades are kept sorted in increasing order, with at most one entry per
/// decade. Counts are only ever added to, never subtracted from.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct WordHistory {
    /// (decade, counts) pairs sorted by increasing decade
    decades: Vec<(Decade, Counts)>,
}
//
impl WordHistory {
    /// Start with an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage within a decade
    pub fn add(&mut self, decade: Decade, counts: Counts) {
        match self.decades.binary_search_by_key(&decade, |(d, _)| *d) {
            Ok(idx) => self.decades[idx].1.add(counts),
            Err(idx) => self.decades.insert(idx, (decade, counts)),
        }
    }

    /// Merge the history of the same word from another source
    pub fn merge(&mut self, other: WordHistory) {
        for (decade, counts) in other.decades {
            self.add(decade, counts);
        }
    }

    /// Recorded decades, in increasing order
    pub fn decades(&self) -> impl Iterator<Item = (Decade, Counts)> + '_ {
        self.decades.iter().copied()
    }

    /// Truth that nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.decades.is_empty()
    }

    /// Summarize into the statistics that the lookup tables store
    ///
    /// Returns `None` for an empty history.
    pub fn summarize(&self, weighting: &PeakWeighting) -> Option<FrequencyRecord> {
        let mut total = Counts::default();
        for (_decade, counts) in &self.decades {
            total.add(*counts);
        }
        let raw_tf = self.peak_by(|_, counts| Some(counts.tf))?;
        let raw_df = self.peak_by(|_, counts| Some(counts.df))?;
        let (peak_tf, peak_df) = match weighting {
            PeakWeighting::Raw => (raw_tf, raw_df),
            PeakWeighting::Normalized {
                totals,
                min_corpus_pages,
            } => {
                let corpus = |decade| {
                    totals
                        .get(decade)
                        .filter(|corpus| corpus.pages >= *min_corpus_pages)
                };
                let peak_tf = self
                    .peak_by(|decade, counts| Some(ratio(counts.tf, corpus(decade)?.tf)))
                    .unwrap_or(raw_tf);
                let peak_df = self
                    .peak_by(|decade, counts| Some(ratio(counts.df, corpus(decade)?.pages)))
                    .unwrap_or(raw_df);
                (peak_tf, peak_df)
            }
        };
        Some(FrequencyRecord {
            peak_tf,
            peak_df,
            sum_tf: total.tf,
            sum_df: total.df,
        })
    }

    /// Decade where some statistic is highest, among decades where it is
    /// defined
    ///
    /// Ties go to the earliest decade.
    fn peak_by<K: PartialOrd>(&self, key: impl Fn(Decade, &Counts) -> Option<K>) -> Option<Decade> {
        let mut best: Option<(Decade, K)> = None;
        for (decade, counts) in &self.decades {
            let Some(value) = key(*decade, counts) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, top)| value > *top) {
                best = Some((*decade, value));
            }
        }
        best.map(|(decade, _)| decade)
    }
}

/// Share of the corpus represented by a count
fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// How the peak decade of a word is picked
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PeakWeighting {
    /// Decade with the highest absolute count
    #[default]
    Raw,

    /// Decade with the highest count relative to the size of the corpus
    /// during that decade
    ///
    /// More books were published in recent decades, which biases raw peaks
    /// towards them. Decades with fewer than `min_corpus_pages` pages in the
    /// corpus are ignored, since tiny corpora yield erratic ratios. If no
    /// decade of a word qualifies, the raw peak is used.
    Normalized {
        totals: DecadeTotals,
        min_corpus_pages: u64,
    },
}

/// Minimal corpus size for a decade to be considered by normalized peaks
///
/// The corpus reached one million pages per decade around 1800.
pub const DEFAULT_MIN_CORPUS_PAGES: u64 = 1_000_000;

/// Size of the whole corpus over one decade
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CorpusTotals {
    /// Total number of 1-gram matches
    pub tf: u64,

    /// Total number of pages
    pub pages: u64,
}

/// Corpus size per decade, from the dataset's `totalcounts` file
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecadeTotals(BTreeMap<Decade, CorpusTotals>);
//
impl DecadeTotals {
    /// Load a `totalcounts` file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading corpus totals from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing corpus totals from {}", path.display()))
    }

    /// Parse the content of a `totalcounts` file
    ///
    /// The file is a whitespace-separated list of
    /// `year,match_count,page_count,volume_count` entries.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut totals = BTreeMap::<Decade, CorpusTotals>::new();
        for entry in content.split_whitespace() {
            let fields = entry.split(',').collect::<Vec<_>>();
            let [year, matches, pages, _volumes] = fields[..] else {
                anyhow::bail!("expected 4 comma-separated fields in corpus total {entry:?}");
            };
            let year = year
                .parse::<Year>()
                .with_context(|| format!("parsing year of corpus total {entry:?}"))?;
            anyhow::ensure!(
                crate::VALID_YEARS.contains(&year),
                "year of corpus total {entry:?} is not a 4-digit year"
            );
            let matches = matches
                .parse::<u64>()
                .with_context(|| format!("parsing match count of corpus total {entry:?}"))?;
            let pages = pages
                .parse::<u64>()
                .with_context(|| format!("parsing page count of corpus total {entry:?}"))?;
            let decade = totals.entry(crate::decade_of(year)).or_default();
            decade.tf += matches;
            decade.pages += pages;
        }
        Ok(Self(totals))
    }

    /// Corpus size over a decade, if known
    pub fn get(&self, decade: Decade) -> Option<&CorpusTotals> {
        self.0.get(&decade)
    }

    /// Number of decades with known corpus size
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Truth that no decade has a known corpus size
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(data: &[(Decade, u64, u64)]) -> WordHistory {
        let mut history = WordHistory::new();
        for &(decade, tf, df) in data {
            history.add(decade, Counts { tf, df });
        }
        history
    }

    #[test]
    fn sums_and_peaks() {
        let record = history(&[(1980, 8, 3), (1990, 20, 2), (2000, 5, 9)])
            .summarize(&PeakWeighting::Raw)
            .unwrap();
        assert_eq!(
            record,
            FrequencyRecord {
                peak_tf: 1990,
                peak_df: 2000,
                sum_tf: 33,
                sum_df: 14,
            }
        );
    }

    #[test]
    fn ties_go_to_earliest_decade() {
        // Insertion order must not matter
        let record = history(&[(1990, 10, 4), (1980, 10, 4)])
            .summarize(&PeakWeighting::Raw)
            .unwrap();
        assert_eq!(record.peak_tf, 1980);
        assert_eq!(record.peak_df, 1980);
    }

    #[test]
    fn decades_are_merged() {
        let mut a = history(&[(1980, 3, 2), (2000, 1, 1)]);
        let b = history(&[(1980, 5, 1), (1990, 1, 1)]);
        a.merge(b);
        assert_eq!(
            a.decades().collect::<Vec<_>>(),
            vec![
                (1980, Counts { tf: 8, df: 3 }),
                (1990, Counts { tf: 1, df: 1 }),
                (2000, Counts { tf: 1, df: 1 }),
            ]
        );
    }

    #[test]
    fn empty_history_has_no_summary() {
        assert!(WordHistory::new().is_empty());
        assert_eq!(WordHistory::new().summarize(&PeakWeighting::Raw), None);
    }

    #[test]
    fn totals_parsing() {
        let totals = DecadeTotals::parse(
            " 1505,32059,231,1\t1507,49586,477,1\t1990,100,2000000,10\t1995,300,1000000,5\n",
        )
        .unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get(1500), Some(&CorpusTotals { tf: 81645, pages: 708 }));
        assert_eq!(totals.get(1990), Some(&CorpusTotals { tf: 400, pages: 3000000 }));
        assert_eq!(totals.get(1980), None);
        assert!(DecadeTotals::parse("1990,1,2").is_err());
        assert!(DecadeTotals::parse("year,1,2,3").is_err());
    }

    #[test]
    fn totals_years_must_have_four_digits() {
        assert!(DecadeTotals::parse("-32768,1,1,1").is_err());
        assert!(DecadeTotals::parse("1990,1,1,1 999,1,1,1").is_err());
        assert!(DecadeTotals::parse("10000,1,1,1").is_err());
        let totals = DecadeTotals::parse("1000,1,1,1 9999,2,2,2").unwrap();
        assert_eq!(totals.get(1000), Some(&CorpusTotals { tf: 1, pages: 1 }));
        assert_eq!(totals.get(9990), Some(&CorpusTotals { tf: 2, pages: 2 }));
    }

    #[test]
    fn normalized_peaks() {
        let totals = DecadeTotals::parse("1890,10,10,1 1980,1000,2000000,1 1990,100,2000000,1").unwrap();
        let weighting = PeakWeighting::Normalized {
            totals,
            min_corpus_pages: DEFAULT_MIN_CORPUS_PAGES,
        };
        // Raw peak in 1980, but 1990 has a much smaller corpus
        let record = history(&[(1980, 50, 10), (1990, 10, 20)])
            .summarize(&weighting)
            .unwrap();
        assert_eq!(record.peak_tf, 1990);
        assert_eq!(record.peak_df, 1990);
        assert_eq!(record.sum_tf, 60);
    }

    #[test]
    fn normalized_peaks_fall_back_to_raw() {
        let totals = DecadeTotals::parse("1880,10,10,1 1890,10,10,1").unwrap();
        let weighting = PeakWeighting::Normalized {
            totals,
            min_corpus_pages: DEFAULT_MIN_CORPUS_PAGES,
        };
        let record = history(&[(1880, 1, 1), (1890, 7, 2)])
            .summarize(&weighting)
            .unwrap();
        assert_eq!(record.peak_tf, 1890);
        assert_eq!(record.peak_df, 1890);
    }
}
