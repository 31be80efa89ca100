//! Command-line interface: output and exit status of the query commands

use gngram_counter::{
    aggregate::aggregate_dir, bucket::build_buckets, config::BucketizeConfig,
    progress::ProgressReport,
};
use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};
use tempfile::TempDir;

const RAW: &str = "\
dog\t1985\t3\t2
dog\t1988\t5\t1
dog_NOUN\t1995\t2\t2
Dog\t2001\t1\t1
the\t1980\t10\t5
";

/// Build bucket tables from a small raw file
async fn build() -> (TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("raw");
    std::fs::create_dir(&raw).unwrap();
    std::fs::write(raw.join("1-00000-of-00001"), RAW).unwrap();
    let aggregated = root.path().join("aggregated");
    let buckets = root.path().join("buckets");
    let report = ProgressReport::hidden();
    aggregate_dir(&raw, &aggregated, &report).await.unwrap();
    build_buckets(&aggregated, &buckets, &BucketizeConfig::default(), &report).unwrap();
    (root, buckets)
}

fn run(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gngram-counter"))
        .arg("--quiet")
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[tokio::test]
async fn exists_reports_through_exit_status() {
    let (_root, buckets) = build().await;
    assert!(run(&buckets, &["exists", "dog"]).status.success());
    assert!(run(&buckets, &["exists", "DOG"]).status.success());
    assert_eq!(run(&buckets, &["exists", "cat"]).status.code(), Some(1));
}

#[tokio::test]
async fn freq_prints_one_line_per_word() {
    let (_root, buckets) = build().await;

    let output = run(&buckets, &["freq", "dog", "the"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "dog\t1980\t1980\t11\t6\nthe\t1980\t1980\t10\t5\n");

    let output = run(&buckets, &["freq", "cat", "dog"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "cat\tnot found\ndog\t1980\t1980\t11\t6\n");
}

#[tokio::test]
async fn bucket_report_goes_to_stdout() {
    let (_root, buckets) = build().await;
    let output = run(&buckets, &["report", "buckets", buckets.to_str().unwrap()]);
    assert!(output.status.success());
    let report = stdout(&output);
    assert!(report.contains("Buckets: 256/256"));
    assert!(report.ends_with("Total words: 2\n"));
}

#[test]
fn queries_fail_without_data() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("nowhere");
    let output = run(&missing, &["exists", "dog"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let output = run(&missing, &["freq", "dog"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
