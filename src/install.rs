//! Installation of the published bucket tables
//!
//! Releases of the dataset are published as a `parquet-hash.tar.gz` archive
//! (see [`package`](crate::package)), which is downloaded and extracted into
//! the data directory.

use crate::{
    config::DataConfig,
    hash::BucketPrefix,
    lookup::DataDir,
    progress::{ProgressConfig, ProgressReport, Work},
    Error,
};
use anyhow::Context;
use flate2::read::GzDecoder;
use futures::stream::StreamExt;
use reqwest::Response;
use std::{
    io::{self, ErrorKind},
    path::Path,
};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Release of the dataset that is installed by default
pub const DATA_VERSION: &str = "v1.0.0";

/// Name of the release archive
pub const ARCHIVE_NAME: &str = "parquet-hash.tar.gz";

/// Download location of a release archive
pub fn download_url(version: &str) -> String {
    format!("https://github.com/craigtrim/gngram-counter/releases/download/{version}/{ARCHIVE_NAME}")
}

/// Truth that all 256 bucket tables are present in the data directory
pub fn is_complete(config: &DataConfig) -> bool {
    let data = DataDir::from(config);
    BucketPrefix::all().all(|prefix| data.bucket_path(prefix).is_some())
}

/// Download a release archive and install it into the data directory
///
/// Returns the number of bucket tables that were installed.
pub async fn install(
    config: &DataConfig,
    version: &str,
    client: reqwest::Client,
    report: &ProgressReport,
) -> anyhow::Result<usize> {
    let url = download_url(version);
    let archive = download(&client, &url, report).await?;
    let data_dir = config.data_dir().to_owned();
    tokio::task::spawn_blocking(move || extract(archive.path(), &data_dir))
        .await
        .context("extracting the release archive")?
}

/// Install an archive that is already on the local filesystem
pub fn install_archive(config: &DataConfig, archive: &Path) -> anyhow::Result<usize> {
    extract(archive, config.data_dir())
}

/// Download a file into a temporary location
async fn download(
    client: &reqwest::Client,
    url: &str,
    report: &ProgressReport,
) -> anyhow::Result<NamedTempFile> {
    let context = || format!("initiating download of {url}");
    log::info!("Downloading {url}");
    let response = client
        .get(url)
        .send()
        .await
        .and_then(Response::error_for_status)
        .with_context(context)?;

    // Servers may not announce the size of the download
    let bytes = report.add(
        "Downloading bucket tables",
        ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
    );
    if let Some(length) = response.content_length() {
        bytes.add_work(length);
    }
    let known_length = response.content_length().is_some();
    let progress = bytes.clone();
    let body = StreamReader::new(response.bytes_stream().map(move |res| {
        res.inspect(|block| {
            if !known_length {
                progress.add_work(block.len() as u64);
            }
            progress.make_progress(block.len() as u64);
        })
        .map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))
    }));
    let mut body = std::pin::pin!(body);

    let tmp = NamedTempFile::new().context("creating temporary download file")?;
    let mut file = tokio::fs::File::from_std(tmp.reopen()?);
    let num_bytes = tokio::io::copy(&mut body, &mut file)
        .await
        .with_context(|| format!("downloading {url}"))?;
    file.flush().await?;
    file.sync_all().await?;
    bytes.done_adding_work();
    log::info!("Downloaded {num_bytes} bytes from {url}");
    Ok(tmp)
}

/// Extract the bucket tables of a release archive into a data directory
fn extract(archive: &Path, data_dir: &Path) -> anyhow::Result<usize> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let file = std::fs::File::open(archive)
        .with_context(|| format!("opening archive {}", archive.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut num_tables = 0;
    for entry in archive.entries().context("reading archive entries")? {
        let mut entry = entry.context("reading archive entry")?;
        let path = entry.path()?.into_owned();
        // Entries that would land outside of the data directory are skipped
        if !entry.unpack_in(data_dir)? {
            log::warn!("Skipped suspicious archive entry {}", path.display());
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "parquet") {
            log::debug!("Installed {}", path.display());
            num_tables += 1;
        }
    }

    let data = DataDir::new(data_dir);
    let missing = BucketPrefix::all()
        .filter(|prefix| data.bucket_path(*prefix).is_none())
        .map(BucketPrefix::file_name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(Error::IncompletePackage {
            dir: data_dir.to_owned(),
            missing,
        }
        .into());
    }
    log::info!("Installed {num_tables} bucket tables into {}", data_dir.display());
    Ok(num_tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::package_buckets;

    #[test]
    fn release_url() {
        assert_eq!(
            download_url(DATA_VERSION),
            "https://github.com/craigtrim/gngram-counter/releases/download/v1.0.0/parquet-hash.tar.gz"
        );
    }

    #[test]
    fn local_archive_install() {
        let buckets = tempfile::tempdir().unwrap();
        for prefix in BucketPrefix::all() {
            crate::bucket::write_bucket(buckets.path(), prefix, &[]).unwrap();
        }
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join(ARCHIVE_NAME);
        package_buckets(buckets.path(), &archive).unwrap();

        let config = DataConfig::new(out.path().join("data"));
        assert!(!is_complete(&config));
        assert_eq!(install_archive(&config, &archive).unwrap(), 256);
        assert!(is_complete(&config));
        assert!(config.data_dir().join("parquet-hash").join("7f.parquet").is_file());
    }
}
