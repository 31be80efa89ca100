//! Build and query configuration

use crate::stats::PeakWeighting;
use anyhow::Context;
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory location
pub const DATA_DIR_ENV: &str = "GNGRAM_DATA_DIR";

/// Location of the installed lookup tables
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DataConfig {
    /// Directory holding the 256 bucket files
    pub data_dir: PathBuf,
}
//
impl DataConfig {
    /// Use an explicit data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Use the data directory from the environment, if set, or the default
    /// per-user data directory `~/.gngram-counter/data` otherwise
    pub fn from_env() -> anyhow::Result<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(Self::new(dir));
        }
        let dirs = BaseDirs::new().context("determining the home directory")?;
        Ok(Self::new(dirs.home_dir().join(".gngram-counter").join("data")))
    }

    /// Data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Default number of passes of the hash bucketizer
pub const DEFAULT_BUCKETIZE_PASSES: usize = 16;

/// Hash bucketizer configuration
#[derive(Clone, Debug, PartialEq)]
pub struct BucketizeConfig {
    /// How peak decades are determined
    pub peak_weighting: PeakWeighting,

    /// Number of passes over the decade-aggregated tables
    ///
    /// Each pass only keeps the words of 1/passes of the buckets in memory,
    /// trading extra reads of the input for a lower memory footprint. Values
    /// are clamped to `1..=256`.
    pub passes: usize,
}
//
impl Default for BucketizeConfig {
    fn default() -> Self {
        Self {
            peak_weighting: PeakWeighting::default(),
            passes: DEFAULT_BUCKETIZE_PASSES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir() {
        let config = DataConfig::new("/tmp/somewhere");
        assert_eq!(config.data_dir(), Path::new("/tmp/somewhere"));
    }

    #[test]
    fn default_bucketizer_uses_raw_peaks() {
        assert_eq!(BucketizeConfig::default().peak_weighting, PeakWeighting::Raw);
        assert_eq!(BucketizeConfig::default().passes, DEFAULT_BUCKETIZE_PASSES);
    }
}
