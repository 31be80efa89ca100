//! Reading of raw tab-separated 1-gram files from Google
//!
//! Each line holds one ngram's usage over one year:
//! `ngram <TAB> year <TAB> term_frequency <TAB> document_frequency`.
//! Files whose name ends in `.gz` are transparently decompressed.

use crate::{Counts, Error, Year};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::AsyncReaderBuilder;
use futures::stream::StreamExt;
use serde::Deserialize;
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncRead, BufReader},
};

/// Entry from the dataset
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct RawRecord {
    /// Case-sensitive, possibly POS-tagged ngram, e.g. "accrued_VERB"
    pub ngram: Box<str>,

    /// Year on which the data was recorded
    pub year: Year,

    /// Number of recorded occurences
    pub term_frequency: u64,

    /// Number of documents across which occurences were recorded
    pub document_frequency: u64,
}
//
impl RawRecord {
    /// Usage counts from this record
    pub fn counts(&self) -> Counts {
        Counts {
            tf: self.term_frequency,
            df: self.document_frequency,
        }
    }

    /// Check that the record is well-formed
    pub fn validate(&self) -> Result<(), String> {
        if !crate::VALID_YEARS.contains(&self.year) {
            return Err(format!(
                "year {} of ngram {:?} is not a 4-digit year",
                self.year, self.ngram
            ));
        }
        Ok(())
    }
}

/// Open a raw data file, decompressing it if needed
pub async fn open(path: &Path) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let file = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzipDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Feed every record of a raw data file to a callback
///
/// Any malformed record aborts the whole file with [`Error::InputFormat`].
/// Returns the number of records that were read.
pub async fn for_each_record(path: &Path, mut visit: impl FnMut(RawRecord)) -> anyhow::Result<u64> {
    let input = open(path).await?;
    let records = AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .create_deserializer(input)
        .into_deserialize::<RawRecord>();
    let mut records = std::pin::pin!(records);
    let input_error = |reason: String| Error::InputFormat {
        path: path.to_owned(),
        reason,
    };
    let mut num_records = 0;
    while let Some(record) = records.next().await {
        let record = record.map_err(|e| input_error(e.to_string()))?;
        record.validate().map_err(input_error)?;
        visit(record);
        num_records += 1;
    }
    Ok(num_records)
}
