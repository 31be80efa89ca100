//! Summary statistics of the intermediate and final tables

use crate::{
    aggregate,
    bucket::{list_tables, read_bucket},
    hash::{BucketPrefix, NUM_BUCKETS},
    Word,
};
use anyhow::Context;
use rayon::prelude::*;
use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
};

/// Contents of one decade-aggregated table
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableStats {
    /// Location of the table
    pub path: PathBuf,

    /// Number of (word, decade) rows
    pub rows: usize,

    /// Number of distinct words
    pub unique_words: usize,
}

/// Contents of a directory of decade-aggregated tables
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregateReport {
    /// Per-table statistics, sorted by path
    pub tables: Vec<TableStats>,

    /// Total number of rows
    pub total_rows: usize,

    /// Number of distinct words across all tables
    pub unique_words: usize,
}

/// Summarize a directory of decade-aggregated tables
pub fn aggregate_report(dir: &Path) -> anyhow::Result<AggregateReport> {
    let paths = list_tables(dir)?;
    let per_table = (paths.into_par_iter())
        .map(|path| -> anyhow::Result<_> {
            let mut rows = 0;
            let mut words = HashSet::<Word>::new();
            aggregate::read_table(&path, |word, _decade, _counts| {
                rows += 1;
                if !words.contains(word) {
                    words.insert(word.into());
                }
                Ok(())
            })
            .with_context(|| format!("reading {}", path.display()))?;
            Ok((path, rows, words))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut report = AggregateReport::default();
    let mut all_words = HashSet::new();
    for (path, rows, words) in per_table {
        report.tables.push(TableStats {
            path,
            rows,
            unique_words: words.len(),
        });
        report.total_rows += rows;
        all_words.extend(words);
    }
    report.unique_words = all_words.len();
    Ok(report)
}
//
impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(
                f,
                "{}: {} rows, {} unique words",
                table.path.display(),
                table.rows,
                table.unique_words
            )?;
        }
        writeln!(f, "Tables: {}", self.tables.len())?;
        writeln!(f, "Total rows: {}", self.total_rows)?;
        write!(f, "Unique words: {}", self.unique_words)
    }
}

/// Contents of a directory of bucket tables
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BucketReport {
    /// Number of words in each bucket that is present
    pub buckets: Vec<(BucketPrefix, usize)>,

    /// Buckets whose table is missing
    pub missing: Vec<BucketPrefix>,

    /// Total number of words
    pub total_words: usize,
}

/// Summarize a directory of bucket tables
pub fn bucket_report(dir: &Path) -> anyhow::Result<BucketReport> {
    let sizes = (BucketPrefix::all().collect::<Vec<_>>().into_par_iter())
        .map(|prefix| -> anyhow::Result<_> {
            let path = dir.join(prefix.file_name());
            if !path.is_file() {
                return Ok((prefix, None));
            }
            let entries = read_bucket(&path).with_context(|| format!("reading {}", path.display()))?;
            Ok((prefix, Some(entries.len())))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut report = BucketReport::default();
    for (prefix, size) in sizes {
        match size {
            Some(size) => {
                report.buckets.push((prefix, size));
                report.total_words += size;
            }
            None => report.missing.push(prefix),
        }
    }
    Ok(report)
}
//
impl fmt::Display for BucketReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (prefix, size) in &self.buckets {
            writeln!(f, "{}: {size} words", prefix.file_name())?;
        }
        if !self.missing.is_empty() {
            let missing = self.missing.iter().map(|p| p.to_string()).collect::<Vec<_>>();
            writeln!(f, "Missing buckets: {}", missing.join(", "))?;
        }
        writeln!(f, "Buckets: {}/{}", self.buckets.len(), NUM_BUCKETS)?;
        write!(f, "Total words: {}", self.total_words)
    }
}
