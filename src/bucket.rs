//! Hash-bucketed lookup tables
//!
//! The final dataset is split into 256 Parquet files named `00.parquet` to
//! `ff.parquet`. A word lives in the file named by the first two hex
//! characters of its MD5 hash, under the remaining 30 hex characters. Each
//! row holds the word's peak decades and total counts:
//!
//! | hash (utf8) | peak_tf (int16) | peak_df (int16) | sum_tf (uint64) | sum_df (uint64) |
//!
//! Rows are sorted by hash so that rebuilding from the same input yields the
//! same files.

use crate::{
    aggregate,
    config::BucketizeConfig,
    hash::{BucketPrefix, HashSuffix, WordHash, NUM_BUCKETS},
    progress::{ProgressConfig, ProgressReport, Work},
    stats::{PeakWeighting, WordHistory},
    table::{self, BATCH_ROWS},
    Error, FrequencyRecord, Result, Word,
};
use anyhow::Context;
use arrow::{
    array::{ArrayRef, Int16Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Int16Type, Schema, SchemaRef, UInt64Type},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use std::{
    collections::{hash_map, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;

/// Row of a bucket table
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BucketEntry {
    /// Key of the word within its bucket
    pub suffix: HashSuffix,

    /// Statistics of the word
    pub record: FrequencyRecord,
}

/// Schema of bucket tables
pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("hash", DataType::Utf8, false),
        Field::new("peak_tf", DataType::Int16, false),
        Field::new("peak_df", DataType::Int16, false),
        Field::new("sum_tf", DataType::UInt64, false),
        Field::new("sum_df", DataType::UInt64, false),
    ]))
}

/// Words of one bucket, collected during the build
#[derive(Debug, Default)]
pub struct BucketBuilder {
    /// Words keyed by hash suffix, along with their decade history
    words: HashMap<HashSuffix, (Word, WordHistory)>,
}
//
impl BucketBuilder {
    /// Record usage history for a word with a certain hash suffix
    ///
    /// Histories of the same word are merged. If another word already uses
    /// this suffix, the bucket cannot hold both and the build must stop.
    fn add(
        &mut self,
        prefix: BucketPrefix,
        suffix: HashSuffix,
        word: Word,
        history: WordHistory,
    ) -> Result<()> {
        match self.words.entry(suffix) {
            hash_map::Entry::Occupied(o) => {
                let (known_word, known_history) = o.into_mut();
                if *known_word != word {
                    return Err(Error::HashCollision {
                        prefix: prefix.to_string(),
                        suffix: suffix.to_string(),
                        first: known_word.clone(),
                        second: word,
                    });
                }
                known_history.merge(history);
            }
            hash_map::Entry::Vacant(v) => {
                v.insert((word, history));
            }
        }
        Ok(())
    }

    /// Number of distinct words in this bucket
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Truth that no word landed in this bucket
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Summarize every word into a table entry, sorted by suffix
    pub fn finish(self, weighting: &PeakWeighting) -> Vec<BucketEntry> {
        let mut entries = (self.words.into_iter())
            .filter_map(|(suffix, (word, history))| {
                let record = history.summarize(weighting);
                if record.is_none() {
                    log::warn!("Dropped word {word:?} which has no recorded usage");
                }
                Some(BucketEntry {
                    suffix,
                    record: record?,
                })
            })
            .collect::<Vec<_>>();
        entries.sort_unstable_by_key(|entry| entry.suffix);
        entries
    }
}

/// Words of the whole dataset, partitioned into the 256 buckets
#[derive(Debug)]
pub struct BucketSet {
    /// One builder per bucket, indexed by prefix
    buckets: Vec<BucketBuilder>,
}
//
impl BucketSet {
    /// Start with 256 empty buckets
    pub fn new() -> Self {
        Self {
            buckets: (0..NUM_BUCKETS).map(|_| BucketBuilder::default()).collect(),
        }
    }

    /// Record usage history for a word
    pub fn add(&mut self, word: Word, history: WordHistory) -> Result<()> {
        let hash = WordHash::of(&word);
        self.add_hashed(word, hash, history)
    }

    /// Record usage history for a word whose hash is already known
    pub fn add_hashed(&mut self, word: Word, hash: WordHash, history: WordHistory) -> Result<()> {
        let (prefix, suffix) = hash.split();
        self.buckets[prefix.index()].add(prefix, suffix, word, history)
    }

    /// Merge words collected from other inputs
    pub fn merge(&mut self, other: BucketSet) -> Result<()> {
        for ((prefix, bucket), other) in BucketPrefix::all()
            .zip(&mut self.buckets)
            .zip(other.buckets)
        {
            for (suffix, (word, history)) in other.words {
                bucket.add(prefix, suffix, word, history)?;
            }
        }
        Ok(())
    }

    /// Number of distinct words across all buckets
    pub fn num_words(&self) -> usize {
        self.buckets.iter().map(BucketBuilder::len).sum()
    }

    /// Split into the individual buckets, in prefix order
    pub fn into_buckets(self) -> impl Iterator<Item = (BucketPrefix, BucketBuilder)> {
        BucketPrefix::all().zip(self.buckets)
    }
}
//
impl Default for BucketSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the words of a decade-aggregated table into buckets
///
/// Only words whose bucket is accepted by `keep` are collected.
pub fn read_aggregated(path: &Path, keep: impl Fn(BucketPrefix) -> bool) -> Result<BucketSet> {
    let mut set = BucketSet::new();
    let mut flush = |word: Word, history: WordHistory| {
        let hash = WordHash::of(&word);
        if keep(hash.prefix()) {
            set.add_hashed(word, hash, history)
        } else {
            Ok(())
        }
    };
    let mut current: Option<(Word, WordHistory)> = None;
    aggregate::read_table(path, |word, decade, counts| {
        // Rows of the same word are normally contiguous, merge them before
        // paying for a hash computation
        if let Some((current_word, history)) = &mut current {
            if **current_word == *word {
                history.add(decade, counts);
                return Ok(());
            }
        }
        let mut history = WordHistory::new();
        history.add(decade, counts);
        if let Some((former_word, former_history)) = current.replace((word.into(), history)) {
            flush(former_word, former_history)?;
        }
        Ok(())
    })?;
    if let Some((word, history)) = current {
        flush(word, history)?;
    }
    Ok(set)
}

/// Write a bucket table
///
/// The table is first written to a temporary file, then moved into place, so
/// that a bucket file is either complete or absent.
pub fn write_bucket(dir: &Path, prefix: BucketPrefix, entries: &[BucketEntry]) -> Result<PathBuf> {
    let path = dir.join(prefix.file_name());
    let tmp = NamedTempFile::new_in(dir)?;
    table::write_batches(
        tmp.as_file(),
        schema(),
        entries.chunks(BATCH_ROWS).map(entries_batch),
    )?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

/// Convert bucket entries into an Arrow record batch
fn entries_batch(entries: &[BucketEntry]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(StringArray::from_iter_values(
                entries.iter().map(|e| e.suffix.to_string()),
            )) as ArrayRef,
            Arc::new(Int16Array::from_iter_values(entries.iter().map(|e| e.record.peak_tf))),
            Arc::new(Int16Array::from_iter_values(entries.iter().map(|e| e.record.peak_df))),
            Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.record.sum_tf))),
            Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.record.sum_df))),
        ],
    )?)
}

/// Read all entries of a bucket table, in file order
pub fn read_bucket(path: &Path) -> Result<Vec<BucketEntry>> {
    let mut entries = Vec::new();
    table::for_each_batch(path, |batch| {
        let hashes = table::string_column(batch, "hash", path)?;
        let peak_tf = table::primitive_column::<Int16Type>(batch, "peak_tf", path)?;
        let peak_df = table::primitive_column::<Int16Type>(batch, "peak_df", path)?;
        let sum_tf = table::primitive_column::<UInt64Type>(batch, "sum_tf", path)?;
        let sum_df = table::primitive_column::<UInt64Type>(batch, "sum_df", path)?;
        for row in 0..batch.num_rows() {
            let hash = hashes.value(row);
            let suffix = HashSuffix::parse(hash).ok_or_else(|| Error::CorruptTable {
                path: path.to_owned(),
                reason: format!("{hash:?} is not a 30-character hex hash suffix"),
            })?;
            entries.push(BucketEntry {
                suffix,
                record: FrequencyRecord {
                    peak_tf: peak_tf.value(row),
                    peak_df: peak_df.value(row),
                    sum_tf: sum_tf.value(row),
                    sum_df: sum_df.value(row),
                },
            });
        }
        Ok(())
    })?;
    Ok(entries)
}

/// In-memory bucket table, indexed by hash suffix
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BucketTable {
    records: HashMap<HashSuffix, FrequencyRecord>,
}
//
impl BucketTable {
    /// Load a bucket table from disk
    pub fn read(path: &Path) -> Result<Self> {
        let mut records = HashMap::new();
        for BucketEntry { suffix, record } in read_bucket(path)? {
            if records.insert(suffix, record).is_some() {
                return Err(Error::CorruptTable {
                    path: path.to_owned(),
                    reason: format!("hash suffix {suffix} appears more than once"),
                });
            }
        }
        Ok(Self { records })
    }

    /// Statistics of the word with a certain hash suffix, if present
    pub fn get(&self, suffix: &HashSuffix) -> Option<&FrequencyRecord> {
        self.records.get(suffix)
    }

    /// Number of words in this bucket
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Truth that this bucket holds no word
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
//
impl FromIterator<BucketEntry> for BucketTable {
    fn from_iter<I: IntoIterator<Item = BucketEntry>>(iter: I) -> Self {
        Self {
            records: (iter.into_iter())
                .map(|entry| (entry.suffix, entry.record))
                .collect(),
        }
    }
}

/// Build the 256 bucket tables from a directory of decade-aggregated tables
///
/// Every `*.parquet` file of the input directory is read. The output
/// directory receives exactly 256 files, some of which may be empty. Input
/// tables are read once per pass, see [`BucketizeConfig::passes`].
pub fn build_buckets(
    input_dir: &Path,
    output_dir: &Path,
    config: &BucketizeConfig,
    report: &ProgressReport,
) -> anyhow::Result<BucketizeSummary> {
    let inputs = list_tables(input_dir)?;
    anyhow::ensure!(
        !inputs.is_empty(),
        "no decade-aggregated tables found in {}",
        input_dir.display()
    );
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    // Process the buckets in groups of consecutive prefixes, so that only
    // one group's word histories are in memory at any given time
    let group_size = NUM_BUCKETS.div_ceil(config.passes.clamp(1, NUM_BUCKETS));
    let groups = (0..NUM_BUCKETS)
        .step_by(group_size)
        .map(|first| first..(first + group_size).min(NUM_BUCKETS))
        .collect::<Vec<_>>();
    let reading = report.add(
        "Reading decade-aggregated tables",
        ProgressConfig::new(Work::Steps(inputs.len() * groups.len())),
    );
    let writing = report.add(
        "Writing hash buckets",
        ProgressConfig::new(Work::PercentSteps(NUM_BUCKETS)),
    );
    let mut num_words = 0;
    let mut bucket_sizes = Vec::with_capacity(NUM_BUCKETS);
    for (pass, prefixes) in groups.iter().enumerate() {
        let in_group = |prefix: BucketPrefix| prefixes.contains(&prefix.index());

        // Read the aggregated tables in parallel, then merge their contents
        let set = (inputs.par_iter())
            .map(|path| {
                let set = read_aggregated(path, in_group)
                    .with_context(|| format!("reading decade-aggregated table {}", path.display()))?;
                log::debug!("Read {} words from {}", set.num_words(), path.display());
                reading.make_progress(1);
                Ok::<_, anyhow::Error>(set)
            })
            .try_reduce(BucketSet::new, |mut set1, set2| {
                set1.merge(set2)?;
                Ok(set1)
            })?;
        num_words += set.num_words();
        log::info!(
            "Pass {}/{}: collected {} distinct words for buckets {}..{}",
            pass + 1,
            groups.len(),
            set.num_words(),
            BucketPrefix::from(prefixes.start as u8),
            BucketPrefix::from((prefixes.end - 1) as u8),
        );

        // Summarize and write down each bucket of the group
        let group_buckets = (set.into_buckets())
            .filter(|(prefix, _)| in_group(*prefix))
            .collect::<Vec<_>>();
        let group_sizes = (group_buckets.into_par_iter())
            .map(|(prefix, bucket)| -> anyhow::Result<usize> {
                let entries = bucket.finish(&config.peak_weighting);
                write_bucket(output_dir, prefix, &entries)
                    .with_context(|| format!("writing bucket {prefix}"))?;
                log::debug!("Wrote bucket {prefix} with {} words", entries.len());
                writing.make_progress(1);
                Ok(entries.len())
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        bucket_sizes.extend(group_sizes);
    }

    let summary = BucketizeSummary {
        input_tables: inputs.len(),
        words: bucket_sizes.iter().sum(),
        empty_buckets: bucket_sizes.iter().filter(|&&size| size == 0).count(),
    };
    debug_assert!(summary.words <= num_words);
    log::info!("Built {NUM_BUCKETS} buckets: {summary:?}");
    Ok(summary)
}

/// List the Parquet tables of a directory, sorted by name
pub fn list_tables(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let context = || format!("listing tables in {}", dir.display());
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(context)? {
        let path = entry.with_context(context)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            tables.push(path);
        }
    }
    tables.sort();
    Ok(tables)
}

/// What happened during bucketization
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BucketizeSummary {
    /// Number of decade-aggregated tables read
    pub input_tables: usize,

    /// Number of distinct words written
    pub words: usize,

    /// Number of buckets that received no word
    pub empty_buckets: usize,
}
