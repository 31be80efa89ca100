//! Command-line front-end to the gngram-counter build pipeline and lookup
//! tables.
//!
//! The build pipeline is run once, by whoever publishes the dataset:
//! `aggregate`, then `bucketize`, then `package`. Users then `install` the
//! published tables and query them with `exists` and `freq`.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use gngram_counter::{
    aggregate,
    bucket,
    config::{BucketizeConfig, DataConfig, DEFAULT_BUCKETIZE_PASSES},
    install, package,
    progress::ProgressReport,
    report,
    stats::{DecadeTotals, PeakWeighting, DEFAULT_MIN_CORPUS_PAGES},
    Frequency, Lookup,
};
use log::LevelFilter;
use std::{path::PathBuf, process::ExitCode};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Offline word frequencies from the Google Books Ngram dataset
///
/// Words are looked up in 256 hash-bucketed tables, which are either built
/// locally from the raw 1-gram files or installed from a published release.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Directory holding the installed bucket tables
    ///
    /// Defaults to the GNGRAM_DATA_DIR environment variable if set, and to
    /// ~/.gngram-counter/data otherwise.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not display progress bars
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}
//
impl Args {
    /// Data directory configuration
    fn data_config(&self) -> anyhow::Result<DataConfig> {
        match &self.data_dir {
            Some(dir) => Ok(DataConfig::new(dir)),
            None => DataConfig::from_env(),
        }
    }

    /// Progress report matching the requested verbosity
    fn progress_report(&self) -> ProgressReport {
        if self.quiet {
            ProgressReport::hidden()
        } else {
            ProgressReport::new()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate raw tab-separated 1-gram files into per-decade tables
    ///
    /// Every file of the input directory (optionally gzipped) yields one
    /// `<name>.parquet` table in the output directory.
    Aggregate {
        /// Directory of raw 1-gram files
        input_dir: PathBuf,

        /// Directory that receives the decade-aggregated tables
        output_dir: PathBuf,
    },

    /// Build the 256 hash-bucketed lookup tables
    Bucketize {
        /// Directory of decade-aggregated tables
        input_dir: PathBuf,

        /// Directory that receives the bucket tables
        output_dir: PathBuf,

        /// Google Books "totalcounts" file
        ///
        /// If specified, peak decades are computed on frequencies relative to
        /// the size of the corpus during each decade, rather than on
        /// absolute occurence counts.
        #[arg(long)]
        total_counts: Option<PathBuf>,

        /// Ignore decades whose corpus has fewer pages than this when
        /// computing relative peak decades
        #[arg(long, default_value_t = DEFAULT_MIN_CORPUS_PAGES, requires = "total_counts")]
        min_corpus_pages: u64,

        /// Number of passes over the input tables
        ///
        /// Each pass builds 1/passes of the buckets. More passes use less
        /// memory but read the input more often.
        #[arg(long, default_value_t = DEFAULT_BUCKETIZE_PASSES)]
        passes: usize,
    },

    /// Bundle the bucket tables into a distributable archive
    Package {
        /// Directory holding all 256 bucket tables
        bucket_dir: PathBuf,

        /// Output archive
        #[arg(default_value = install::ARCHIVE_NAME)]
        output: PathBuf,
    },

    /// Summarize a directory of tables
    Report {
        /// Kind of tables in the directory
        kind: TableKind,

        /// Directory of tables
        dir: PathBuf,
    },

    /// Download and install the published bucket tables
    Install {
        /// Release of the dataset
        #[arg(long, default_value = install::DATA_VERSION)]
        version: String,

        /// Overwrite an existing installation without asking
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },

    /// Check if a word is in the corpus (exit status 0 if so, 1 otherwise)
    Exists {
        /// Word to look up
        word: String,
    },

    /// Display the frequency statistics of words
    ///
    /// Prints one line per word with its peak decades by term and document
    /// frequency, then its total term and document frequencies. Exits with
    /// status 1 if any word is not in the corpus.
    Freq {
        /// Words to look up
        #[arg(required = true)]
        words: Vec<String>,
    },
}

/// Kind of tables that can be summarized
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TableKind {
    /// Decade-aggregated tables
    Aggregated,

    /// Hash-bucketed lookup tables
    Buckets,
}
//
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Set up logging
    if let Err(e) = setup_logging() {
        eprintln!("Logging is disabled: {e}");
    }

    // Decode CLI arguments
    let args = Args::parse();
    let progress = args.progress_report();

    match &args.command {
        Command::Aggregate {
            input_dir,
            output_dir,
        } => {
            let summary = aggregate::aggregate_dir(input_dir, output_dir, &progress).await?;
            eprintln!(
                "Aggregated {} files: {} records accepted, {} rejected, {} rows written",
                summary.files, summary.accepted, summary.rejected, summary.rows
            );
        }
        Command::Bucketize {
            input_dir,
            output_dir,
            total_counts,
            min_corpus_pages,
            passes,
        } => {
            let peak_weighting = match total_counts {
                Some(path) => PeakWeighting::Normalized {
                    totals: DecadeTotals::load(path)?,
                    min_corpus_pages: *min_corpus_pages,
                },
                None => PeakWeighting::Raw,
            };
            let config = BucketizeConfig {
                peak_weighting,
                passes: *passes,
            };
            let (input_dir, output_dir) = (input_dir.clone(), output_dir.clone());
            let summary = tokio::task::spawn_blocking(move || {
                bucket::build_buckets(&input_dir, &output_dir, &config, &progress)
            })
            .await
            .context("building hash buckets")??;
            eprintln!(
                "Wrote {} words from {} tables into 256 buckets ({} empty)",
                summary.words, summary.input_tables, summary.empty_buckets
            );
        }
        Command::Package { bucket_dir, output } => {
            let size = package::package_buckets(bucket_dir, output)?;
            eprintln!("Wrote {} ({size} bytes)", output.display());
        }
        Command::Report { kind, dir } => {
            let summary = match kind {
                TableKind::Aggregated => report::aggregate_report(dir)?.to_string(),
                TableKind::Buckets => report::bucket_report(dir)?.to_string(),
            };
            write_stdout(&summary).await?;
        }
        Command::Install { version, force } => {
            let config = args.data_config()?;
            if install::is_complete(&config) && !*force {
                let overwrite = Confirm::new()
                    .with_prompt(format!(
                        "Bucket tables are already installed in {}. Overwrite them?",
                        config.data_dir().display()
                    ))
                    .default(false)
                    .interact()
                    .context("asking whether to overwrite the installed tables")?;
                if !overwrite {
                    return Ok(ExitCode::SUCCESS);
                }
            }
            let client = reqwest::Client::new();
            let num_tables = install::install(&config, version, client, &progress).await?;
            eprintln!(
                "Installed {num_tables} bucket tables into {}",
                config.data_dir().display()
            );
        }
        Command::Exists { word } => {
            let lookup = Lookup::open(&args.data_config()?);
            if !lookup.exists(word)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Freq { words } => {
            let lookup = Lookup::open(&args.data_config()?);
            let results = lookup.batch_frequency(words.iter().map(String::as_str))?;
            let mut output = String::new();
            let mut all_found = true;
            for word in words {
                match results.get(word.as_str()) {
                    Some(Frequency::Found(record)) => output.push_str(&format!(
                        "{word}\t{}\t{}\t{}\t{}\n",
                        record.peak_tf, record.peak_df, record.sum_tf, record.sum_df
                    )),
                    _ => {
                        all_found = false;
                        output.push_str(&format!("{word}\tnot found\n"));
                    }
                }
            }
            write_stdout(output.trim_end()).await?;
            if !all_found {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Write some text and a trailing newline to stdout
async fn write_stdout(text: &str) -> anyhow::Result<()> {
    let mut stdout = BufWriter::new(tokio::io::stdout());
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
