//! Command-line arguments

use crate::config::{IndexConfig, IngestConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
use clap::Parser;
use edr_common::logging::{LogConfig, LogLevel, LogOutput};
use std::path::PathBuf;

/// Prefix of the per-run log file.
pub const LOG_FILE_PREFIX: &str = "edr-ingest";

/// Load an EDR flat file into Elasticsearch
#[derive(Parser, Debug, Clone)]
#[command(name = "edr-ingest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Records per bulk submission
    #[arg(short = 'b', long = "batchSize", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Batch scale, carried through for bookkeeping
    #[arg(short = 's', long = "batchScale", value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_scale: u32,

    /// Log level: DEBUG, INFO or WARN (anything else means DEBUG)
    #[arg(short = 'l', long = "logLevel")]
    pub log_level: String,

    /// EDR file to load
    #[arg(short = 'f', long = "inputFilename")]
    pub input_filename: PathBuf,

    /// Elasticsearch host, or a full base URL
    #[arg(short = 'e', long = "esEndpoint")]
    pub es_endpoint: String,

    /// Timeout for each request to the cluster, in seconds
    #[arg(
        long = "requestTimeout",
        env = "EDR_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout: u64,

    /// Directory for the run log file
    #[arg(long = "logDir", env = "EDR_LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,
}

impl Args {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::new(
            self.input_filename.clone(),
            usize::try_from(self.batch_size).unwrap_or(usize::MAX),
            self.batch_scale,
        )
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.es_endpoint.clone()).with_timeout(self.request_timeout)
    }

    /// Logging for this run.
    ///
    /// `LOG_*` variables may tune format, filters and decorations. Level,
    /// file output, directory and prefix always come from the arguments.
    pub fn log_config(&self) -> edr_common::Result<LogConfig> {
        let mut config = LogConfig::new().with_env_overrides()?;
        config.level = LogLevel::from_cli_lenient(&self.log_level);
        config.output = LogOutput::File;
        config.log_dir = self.log_dir.clone();
        config.log_file_prefix = LOG_FILE_PREFIX.to_string();
        Ok(config)
    }
}
