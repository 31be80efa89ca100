//! Decade aggregation of the raw dataset
//!
//! Raw files record each (POS-tagged, case-sensitive) ngram's usage year by
//! year. This stage normalizes ngrams into plain lowercase words and sums
//! their usage per decade, producing one decade-aggregated Parquet table per
//! raw input file, with columns `word`, `decade`, `tf` and `df`.

use crate::{
    decade_of,
    normalize::normalize_ngram,
    progress::{ProgressConfig, ProgressReport, ProgressTracker, Work},
    stats::WordHistory,
    table::{self, BATCH_ROWS},
    tsv::{self, RawRecord},
    Counts, Decade, Result, Word,
};
use anyhow::Context;
use arrow::{
    array::{ArrayRef, Int16Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Int16Type, Schema, SchemaRef, UInt64Type},
    record_batch::RecordBatch,
};
use parquet::arrow::AsyncArrowWriter;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use tokio::task::JoinSet;

/// Accumulator of decade statistics for the records of one raw file
#[derive(Debug, Default)]
pub struct DecadeAggregator {
    /// Last seen raw ngram, if any, and its normalized form if accepted
    ///
    /// Raw files are sorted by ngram, then by year, so consecutive records
    /// usually share an ngram and can share its normalization.
    current_ngram: Option<(Box<str>, Option<Word>)>,

    /// Decade history of every accepted word
    words: HashMap<Word, WordHistory>,

    /// Number of records that were merged into the statistics
    accepted: u64,

    /// Number of records whose ngram is not a plain word
    rejected: u64,
}
//
impl DecadeAggregator {
    /// Set up the accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate a raw dataset record
    ///
    /// The record is dropped if its ngram does not normalize into a word.
    pub fn add_record(&mut self, record: RawRecord) {
        let counts = record.counts();
        let decade = decade_of(record.year);
        let word = match &self.current_ngram {
            Some((ngram, word)) if *ngram == record.ngram => word.clone(),
            _ => {
                let word = normalize_ngram(&record.ngram);
                self.current_ngram = Some((record.ngram, word.clone()));
                word
            }
        };
        let Some(word) = word else {
            self.rejected += 1;
            return;
        };
        self.accepted += 1;
        self.words.entry(word).or_default().add(decade, counts);
    }

    /// Number of records that were accepted and rejected so far
    pub fn record_counts(&self) -> (u64, u64) {
        (self.accepted, self.rejected)
    }

    /// Export the aggregated statistics, sorted by word
    pub fn finish(self) -> DecadeTable {
        let mut words = self.words.into_iter().collect::<Vec<_>>();
        words.sort_unstable_by(|(w1, _), (w2, _)| w1.cmp(w2));
        DecadeTable { words }
    }
}

/// Decade statistics of a set of words
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecadeTable {
    /// Words and their history, sorted by word
    words: Vec<(Word, WordHistory)>,
}
//
impl DecadeTable {
    /// Iterate over (word, decade, counts) rows in (word, decade) order
    pub fn rows(&self) -> impl Iterator<Item = (&str, Decade, Counts)> + '_ {
        self.words.iter().flat_map(|(word, history)| {
            history
                .decades()
                .map(move |(decade, counts)| (&**word, decade, counts))
        })
    }

    /// Number of distinct words
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// Number of (word, decade) rows
    pub fn num_rows(&self) -> usize {
        self.words.iter().map(|(_, history)| history.decades().count()).sum()
    }

    /// Write down as a Parquet table
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.stage(path).await?.persist()
    }

    /// Write down as a Parquet table in a temporary file next to `path`
    ///
    /// The table only appears at `path` once [`StagedTable::persist`] is
    /// called. Dropping the staged table deletes the temporary file.
    pub async fn stage(&self, path: &Path) -> anyhow::Result<StagedTable> {
        let context = || format!("writing decade-aggregated table {}", path.display());
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).with_context(context)?;
        let file = tokio::fs::File::from_std(tmp.reopen().with_context(context)?);
        let schema = schema();
        let mut writer = AsyncArrowWriter::try_new(file, schema.clone(), Some(table::writer_properties()?))
            .with_context(context)?;
        let rows = self.rows().collect::<Vec<_>>();
        for chunk in rows.chunks(BATCH_ROWS) {
            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from_iter_values(chunk.iter().map(|(word, _, _)| *word))) as ArrayRef,
                    Arc::new(Int16Array::from_iter_values(chunk.iter().map(|(_, decade, _)| *decade))),
                    Arc::new(UInt64Array::from_iter_values(chunk.iter().map(|(_, _, counts)| counts.tf))),
                    Arc::new(UInt64Array::from_iter_values(chunk.iter().map(|(_, _, counts)| counts.df))),
                ],
            )
            .with_context(context)?;
            writer.write(&batch).await.with_context(context)?;
        }
        writer.close().await.with_context(context)?;
        Ok(StagedTable {
            tmp,
            path: path.to_owned(),
        })
    }
}

/// Fully written decade-aggregated table that is not yet at its final path
#[derive(Debug)]
pub struct StagedTable {
    tmp: NamedTempFile,
    path: PathBuf,
}
//
impl StagedTable {
    /// Final path of the table
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the table to its final path
    pub fn persist(self) -> anyhow::Result<()> {
        let Self { tmp, path } = self;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("moving decade-aggregated table to {}", path.display()))?;
        Ok(())
    }
}

/// Schema of decade-aggregated tables
pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("word", DataType::Utf8, false),
        Field::new("decade", DataType::Int16, false),
        Field::new("tf", DataType::UInt64, false),
        Field::new("df", DataType::UInt64, false),
    ]))
}

/// Feed every row of a decade-aggregated table to a callback
///
/// Stops at the first error returned by the callback.
pub fn read_table(path: &Path, mut visit: impl FnMut(&str, Decade, Counts) -> Result<()>) -> Result<()> {
    table::for_each_batch(path, |batch| {
        let words = table::string_column(batch, "word", path)?;
        let decades = table::primitive_column::<Int16Type>(batch, "decade", path)?;
        let tfs = table::primitive_column::<UInt64Type>(batch, "tf", path)?;
        let dfs = table::primitive_column::<UInt64Type>(batch, "df", path)?;
        for row in 0..batch.num_rows() {
            let counts = Counts {
                tf: tfs.value(row),
                df: dfs.value(row),
            };
            visit(words.value(row), decades.value(row), counts)?;
        }
        Ok(())
    })
}

/// Aggregate one raw data file
pub async fn aggregate_file(path: &Path) -> anyhow::Result<(DecadeTable, AggregateSummary)> {
    let mut aggregator = DecadeAggregator::new();
    let num_records = tsv::for_each_record(path, |record| aggregator.add_record(record))
        .await
        .with_context(|| format!("aggregating {}", path.display()))?;
    let (accepted, rejected) = aggregator.record_counts();
    let table = aggregator.finish();
    let summary = AggregateSummary {
        files: 1,
        records: num_records,
        accepted,
        rejected,
        rows: table.num_rows() as u64,
    };
    log::debug!(
        "Aggregated {} into {} words: {summary:?}",
        path.display(),
        table.num_words()
    );
    Ok((table, summary))
}

/// Aggregate every raw data file from a directory
///
/// Each input file `<name>` yields an output table `<name>.parquet` in the
/// output directory. Files are processed concurrently, and any malformed
/// input aborts the whole operation. Tables are only moved into the output
/// directory once every file has been aggregated, so an aborted run leaves
/// no table behind.
pub async fn aggregate_dir(
    input_dir: &Path,
    output_dir: &Path,
    report: &ProgressReport,
) -> anyhow::Result<AggregateSummary> {
    let inputs = list_files(input_dir).await?;
    anyhow::ensure!(!inputs.is_empty(), "no input files found in {}", input_dir.display());
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    // Track file processing
    let progress = report.add(
        "Aggregating raw files by decade",
        ProgressConfig::new(Work::Steps(inputs.len())),
    );

    // Start processing all the files
    let mut tasks = JoinSet::new();
    for input in inputs {
        let mut file_name = input.file_name().unwrap_or_default().to_owned();
        file_name.push(".parquet");
        let output = output_dir.join(file_name);
        tasks.spawn(aggregate_and_stage(input, output, progress.clone()));
    }

    // Collect results as files are done
    let mut summary = AggregateSummary::default();
    let mut staged = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let (table, file_summary) = result.context("collecting results from one raw file")??;
        summary.merge(file_summary);
        staged.push(table);
    }

    // Publish the tables
    for table in staged {
        log::trace!("Persisting {}", table.path().display());
        table.persist()?;
    }
    log::info!("Aggregated {} raw files: {summary:?}", summary.files);
    Ok(summary)
}

/// Aggregate one raw file and write the result to a temporary file
async fn aggregate_and_stage(
    input: PathBuf,
    output: PathBuf,
    progress: ProgressTracker,
) -> anyhow::Result<(StagedTable, AggregateSummary)> {
    let (table, summary) = aggregate_file(&input).await?;
    let staged = table.stage(&output).await?;
    progress.make_progress(1);
    Ok((staged, summary))
}

/// List the regular files of a directory, sorted by name
async fn list_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let context = || format!("listing input files in {}", dir.display());
    let mut entries = tokio::fs::read_dir(dir).await.with_context(context)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.with_context(context)? {
        if entry.file_type().await.with_context(context)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// What happened during decade aggregation
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AggregateSummary {
    /// Number of raw files processed
    pub files: usize,

    /// Number of raw records read
    pub records: u64,

    /// Number of records merged into the statistics
    pub accepted: u64,

    /// Number of records rejected because the ngram is not a plain word
    pub rejected: u64,

    /// Number of (word, decade) rows written
    pub rows: u64,
}
//
impl AggregateSummary {
    /// Merge the summary of other files into this one
    pub fn merge(&mut self, other: Self) {
        self.files += other.files;
        self.records += other.records;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.rows += other.rows;
    }
}
