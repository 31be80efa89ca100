//! Word frequency queries against the installed bucket tables
//!
//! A query word is normalized, hashed, and looked up in the single bucket
//! table named by its hash prefix. Batch queries group words by bucket first,
//! so that each bucket table is read at most once per call no matter how
//! many of the requested words it holds.

use crate::{
    bucket::BucketTable,
    config::DataConfig,
    hash::{BucketPrefix, HashSuffix, WordHash},
    normalize::lookup_candidates,
    Error, Frequency, Result,
};
use std::{
    collections::{hash_map, BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

/// Name of the subdirectory that the release archive extracts into
pub const NESTED_DIR: &str = "parquet-hash";

/// Provider of bucket tables
pub trait BucketSource {
    /// Fail with [`Error::DataNotInstalled`] if no data is available at all
    fn check_installed(&self) -> Result<()>;

    /// Load the table of one bucket
    ///
    /// A missing bucket is reported as [`Error::DataNotInstalled`].
    fn load_bucket(&self, prefix: BucketPrefix) -> Result<Arc<BucketTable>>;
}
//
impl<S: BucketSource + ?Sized> BucketSource for &S {
    fn check_installed(&self) -> Result<()> {
        (**self).check_installed()
    }

    fn load_bucket(&self, prefix: BucketPrefix) -> Result<Arc<BucketTable>> {
        (**self).load_bucket(prefix)
    }
}

/// Bucket tables stored in a local directory
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DataDir {
    root: PathBuf,
}
//
impl DataDir {
    /// Read bucket tables from some directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory from which tables are read
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a bucket table, if it exists
    ///
    /// Tables may sit directly in the data directory, or in the
    /// `parquet-hash` subdirectory created by extracting the release archive.
    pub fn bucket_path(&self, prefix: BucketPrefix) -> Option<PathBuf> {
        let file_name = prefix.file_name();
        [
            self.root.join(&file_name),
            self.root.join(NESTED_DIR).join(&file_name),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }
}
//
impl From<&DataConfig> for DataDir {
    fn from(config: &DataConfig) -> Self {
        Self::new(config.data_dir())
    }
}
//
impl BucketSource for DataDir {
    fn check_installed(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::DataNotInstalled {
                path: self.root.clone(),
            })
        }
    }

    fn load_bucket(&self, prefix: BucketPrefix) -> Result<Arc<BucketTable>> {
        let path = self
            .bucket_path(prefix)
            .ok_or_else(|| Error::DataNotInstalled {
                path: self.root.join(prefix.file_name()),
            })?;
        log::debug!("Loading bucket table {}", path.display());
        Ok(Arc::new(BucketTable::read(&path)?))
    }
}

/// Bucket source that keeps every table it loads in memory
#[derive(Debug, Default)]
pub struct CachedSource<S> {
    inner: S,
    tables: Mutex<HashMap<BucketPrefix, Arc<BucketTable>>>,
}
//
impl<S: BucketSource> CachedSource<S> {
    /// Cache the tables of another source
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tables currently in memory
    pub fn num_cached(&self) -> usize {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop all cached tables
    pub fn clear(&self) {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
//
impl<S: BucketSource> BucketSource for CachedSource<S> {
    fn check_installed(&self) -> Result<()> {
        self.inner.check_installed()
    }

    fn load_bucket(&self, prefix: BucketPrefix) -> Result<Arc<BucketTable>> {
        if let Some(table) = self
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&prefix)
        {
            return Ok(table.clone());
        }
        // The lock is released during I/O, concurrent loads of one bucket
        // keep the first table inserted
        let table = self.inner.load_bucket(prefix)?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.entry(prefix).or_insert(table).clone())
    }
}

/// Query engine
#[derive(Debug)]
pub struct Lookup<S = DataDir> {
    source: S,
}
//
impl Lookup<DataDir> {
    /// Query the tables of the configured data directory
    pub fn open(config: &DataConfig) -> Self {
        Self::new(DataDir::from(config))
    }
}
//
impl<S: BucketSource> Lookup<S> {
    /// Query the tables of some bucket source
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Underlying bucket source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Truth that a word is in the corpus
    pub fn exists(&self, word: &str) -> Result<bool> {
        Ok(self.frequency(word)?.is_found())
    }

    /// Statistics of a word, or [`Frequency::Absent`] if it is not in the
    /// corpus
    ///
    /// Contractions like "don't" that are absent as a whole are looked up by
    /// their stem.
    pub fn frequency(&self, word: &str) -> Result<Frequency> {
        self.source.check_installed()?;
        for candidate in lookup_candidates(word) {
            let (prefix, suffix) = WordHash::of(&candidate).split();
            let table = self.source.load_bucket(prefix)?;
            if let Some(record) = table.get(&suffix) {
                return Ok(Frequency::Found(*record));
            }
        }
        Ok(Frequency::Absent)
    }

    /// Statistics of many words, reading each bucket table at most once
    ///
    /// The result has one entry per distinct input word, with the same
    /// meaning as [`frequency()`](Self::frequency).
    pub fn batch_frequency<'w>(
        &self,
        words: impl IntoIterator<Item = &'w str>,
    ) -> Result<HashMap<&'w str, Frequency>> {
        let mut results = HashMap::new();
        let mut pending = BatchQueries::default();
        for word in words {
            let hash_map::Entry::Vacant(entry) = results.entry(word) else {
                continue;
            };
            entry.insert(Frequency::Absent);
            let mut candidates = lookup_candidates(word).into_iter();
            if let Some(normalized) = candidates.next() {
                pending.push(word, &normalized, candidates.next());
            }
        }
        if results.is_empty() {
            return Ok(results);
        }
        self.source.check_installed()?;

        // Full words first, then stems of the contractions that were not
        // found, reusing the tables of the first pass
        let mut tables = HashMap::new();
        let mut stems = BatchQueries::default();
        for (prefix, queries) in pending.by_bucket {
            let table = self.load_once(&mut tables, prefix)?;
            for query in queries {
                match table.get(&query.suffix) {
                    Some(record) => {
                        results.insert(query.word, Frequency::Found(*record));
                    }
                    None => {
                        if let Some(stem) = query.stem {
                            stems.push(query.word, &stem, None);
                        }
                    }
                }
            }
        }
        for (prefix, queries) in stems.by_bucket {
            let table = self.load_once(&mut tables, prefix)?;
            for query in queries {
                let frequency = Frequency::from(table.get(&query.suffix).copied());
                results.insert(query.word, frequency);
            }
        }
        Ok(results)
    }

    /// Load a bucket table unless this batch already did
    fn load_once(
        &self,
        tables: &mut HashMap<BucketPrefix, Arc<BucketTable>>,
        prefix: BucketPrefix,
    ) -> Result<Arc<BucketTable>> {
        match tables.entry(prefix) {
            hash_map::Entry::Occupied(o) => Ok(o.get().clone()),
            hash_map::Entry::Vacant(v) => Ok(v.insert(self.source.load_bucket(prefix)?).clone()),
        }
    }
}

/// Words of a batch query, grouped by bucket
#[derive(Debug, Default)]
struct BatchQueries<'w> {
    by_bucket: BTreeMap<BucketPrefix, Vec<BatchQuery<'w>>>,
}
//
impl<'w> BatchQueries<'w> {
    /// Schedule the lookup of a normalized form of some input word
    fn push(&mut self, word: &'w str, normalized: &str, stem: Option<String>) {
        let (prefix, suffix) = WordHash::of(normalized).split();
        self.by_bucket.entry(prefix).or_default().push(BatchQuery {
            word,
            suffix,
            stem,
        });
    }
}

/// One word of a batch query
#[derive(Debug)]
struct BatchQuery<'w> {
    /// Word as provided by the caller
    word: &'w str,

    /// Key of the normalized word in its bucket
    suffix: HashSuffix,

    /// Stem to fall back to if the word is not found
    stem: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bucket::BucketEntry, FrequencyRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source which counts table loads
    #[derive(Default)]
    struct MemorySource {
        tables: HashMap<BucketPrefix, Arc<BucketTable>>,
        loads: AtomicUsize,
    }
    //
    impl MemorySource {
        fn with_words(words: &[(&str, u64)]) -> Self {
            let mut entries = HashMap::<BucketPrefix, Vec<BucketEntry>>::new();
            for &(word, sum_tf) in words {
                let (prefix, suffix) = WordHash::of(word).split();
                entries.entry(prefix).or_default().push(BucketEntry {
                    suffix,
                    record: record(sum_tf),
                });
            }
            Self {
                tables: (entries.into_iter())
                    .map(|(prefix, entries)| (prefix, Arc::new(entries.into_iter().collect::<BucketTable>())))
                    .collect(),
                loads: AtomicUsize::new(0),
            }
        }
    }
    //
    impl BucketSource for MemorySource {
        fn check_installed(&self) -> Result<()> {
            Ok(())
        }

        fn load_bucket(&self, prefix: BucketPrefix) -> Result<Arc<BucketTable>> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            Ok(self.tables.get(&prefix).cloned().unwrap_or_default())
        }
    }

    fn record(sum_tf: u64) -> FrequencyRecord {
        FrequencyRecord {
            peak_tf: 1990,
            peak_df: 1980,
            sum_tf,
            sum_df: 1,
        }
    }

    #[test]
    fn single_lookup() {
        let lookup = Lookup::new(MemorySource::with_words(&[("the", 100), ("dog", 8)]));
        assert_eq!(lookup.frequency("dog").unwrap(), Frequency::Found(record(8)));
        assert_eq!(lookup.frequency("  DOG ").unwrap(), Frequency::Found(record(8)));
        assert_eq!(lookup.frequency("cat").unwrap(), Frequency::Absent);
        assert!(lookup.exists("THE").unwrap());
        assert!(!lookup.exists("zzzzqx").unwrap());
    }

    #[test]
    fn empty_words_are_absent_without_io() {
        let lookup = Lookup::new(MemorySource::with_words(&[("the", 100)]));
        assert_eq!(lookup.frequency("   ").unwrap(), Frequency::Absent);
        assert_eq!(lookup.source().loads.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn contractions_fall_back_to_their_stem() {
        let lookup = Lookup::new(MemorySource::with_words(&[("do", 50), ("it", 70), ("cat", 3)]));
        assert_eq!(lookup.frequency("don't").unwrap(), Frequency::Found(record(50)));
        assert_eq!(lookup.frequency("Don\u{2019}t").unwrap(), Frequency::Found(record(50)));
        assert_eq!(lookup.frequency("it's").unwrap(), Frequency::Found(record(70)));
        // Possessives are not contractions
        assert_eq!(lookup.frequency("cat's").unwrap(), Frequency::Absent);

        let batch = lookup.batch_frequency(["don't", "it's", "cat's", "cat"]).unwrap();
        assert_eq!(batch["don't"], Frequency::Found(record(50)));
        assert_eq!(batch["it's"], Frequency::Found(record(70)));
        assert_eq!(batch["cat's"], Frequency::Absent);
        assert_eq!(batch["cat"], Frequency::Found(record(3)));
    }

    #[test]
    fn batch_matches_single_lookups() {
        let lookup = Lookup::new(MemorySource::with_words(&[
            ("the", 100),
            ("dog", 8),
            ("running", 12),
            ("a", 1000),
        ]));
        let words = ["dog", "Dog", "cat", "the", "", "running", "dog", "a", "we'll"];
        let batch = lookup.batch_frequency(words).unwrap();
        assert_eq!(batch.len(), 8);
        for word in words {
            assert_eq!(batch[word], lookup.frequency(word).unwrap(), "{word:?}");
        }
        assert!(lookup.batch_frequency(Vec::<&str>::new()).unwrap().is_empty());
    }

    #[test]
    fn batch_reads_each_bucket_once() {
        let lookup = Lookup::new(MemorySource::with_words(&[("the", 100), ("dog", 8)]));
        let words = ["the", "dog", "the", "THE", "dog", "cat", "cat"];
        lookup.batch_frequency(words).unwrap();
        let distinct_buckets = ["the", "dog", "cat"]
            .into_iter()
            .map(|w| WordHash::of(w).prefix())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(
            lookup.source().loads.load(Ordering::Relaxed),
            distinct_buckets.len()
        );
    }

    #[test]
    fn cached_source_loads_once() {
        let lookup = Lookup::new(CachedSource::new(MemorySource::with_words(&[("dog", 8)])));
        for _ in 0..3 {
            assert!(lookup.exists("dog").unwrap());
        }
        assert_eq!(lookup.source().num_cached(), 1);
        assert_eq!(lookup.source().inner.loads.load(Ordering::Relaxed), 1);
        lookup.source().clear();
        assert_eq!(lookup.source().num_cached(), 0);
    }

    #[test]
    fn missing_data_dir_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = Lookup::new(DataDir::new(dir.path().join("nowhere")));
        assert!(matches!(
            lookup.exists("the"),
            Err(Error::DataNotInstalled { .. })
        ));
        assert!(matches!(
            lookup.batch_frequency(["the"]),
            Err(Error::DataNotInstalled { .. })
        ));

        // The directory exists, but the bucket does not
        let lookup = Lookup::new(DataDir::new(dir.path()));
        assert!(matches!(
            lookup.frequency("the"),
            Err(Error::DataNotInstalled { .. })
        ));
    }

    #[test]
    fn nested_layout_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join(NESTED_DIR);
        std::fs::create_dir(&nested).unwrap();
        let (prefix, suffix) = WordHash::of("dog").split();
        crate::bucket::write_bucket(
            &nested,
            prefix,
            &[BucketEntry {
                suffix,
                record: record(8),
            }],
        )
        .unwrap();
        let data = DataDir::new(dir.path());
        assert_eq!(data.bucket_path(prefix), Some(nested.join(prefix.file_name())));
        let lookup = Lookup::new(data);
        assert_eq!(lookup.frequency("dog").unwrap(), Frequency::Found(record(8)));
        let table = lookup.source().load_bucket(prefix).unwrap();
        assert_eq!(table.get(&suffix), Some(&record(8)));
    }
}
