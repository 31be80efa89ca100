//! Packaging of the bucket tables into a single distributable archive
//!
//! The archive is a gzipped tarball holding the 256 bucket tables under a
//! `parquet-hash/` directory, which is the layout that the installer and the
//! lookup engine expect.

use crate::{
    hash::{BucketPrefix, NUM_BUCKETS},
    lookup::NESTED_DIR,
    Error,
};
use anyhow::Context;
use flate2::{write::GzEncoder, Compression};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Locate the 256 bucket tables of a directory
///
/// Fails with [`Error::IncompletePackage`] if any of them is missing.
pub fn collect_buckets(bucket_dir: &Path) -> crate::Result<Vec<(BucketPrefix, PathBuf)>> {
    let mut found = Vec::with_capacity(NUM_BUCKETS);
    let mut missing = Vec::new();
    for prefix in BucketPrefix::all() {
        let path = bucket_dir.join(prefix.file_name());
        if path.is_file() {
            found.push((prefix, path));
        } else {
            missing.push(prefix.file_name());
        }
    }
    if !missing.is_empty() {
        return Err(Error::IncompletePackage {
            dir: bucket_dir.to_owned(),
            missing,
        });
    }
    Ok(found)
}

/// Bundle the bucket tables of a directory into a `.tar.gz` archive
///
/// Nothing is written unless all 256 tables are present. The archive is
/// assembled in a temporary file next to its destination, then moved into
/// place.
pub fn package_buckets(bucket_dir: &Path, output: &Path) -> anyhow::Result<u64> {
    let buckets = collect_buckets(bucket_dir)?;

    let output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let tmp = NamedTempFile::new_in(output_dir)
        .with_context(|| format!("creating temporary archive in {}", output_dir.display()))?;

    let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
    let mut archive = tar::Builder::new(encoder);
    for (prefix, path) in &buckets {
        let name = Path::new(NESTED_DIR).join(prefix.file_name());
        archive
            .append_path_with_name(path, &name)
            .with_context(|| format!("adding {} to the archive", path.display()))?;
    }
    let encoder = archive.into_inner().context("finishing the tar archive")?;
    encoder.finish().context("finishing gzip compression")?;
    tmp.as_file().sync_all().context("flushing the archive")?;

    let size = tmp.as_file().metadata()?.len();
    tmp.persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("moving the archive to {}", output.display()))?;
    log::info!(
        "Packaged {} bucket tables into {} ({size} bytes)",
        buckets.len(),
        output.display()
    );
    Ok(size)
}
