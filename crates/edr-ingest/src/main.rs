//! EDR Ingest - load an EDR flat file into Elasticsearch

use clap::Parser;
use edr_common::logging::init_logging;
use edr_ingest::cli::Args;
use edr_ingest::runner;
use std::process;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // .env is optional; real environment variables take precedence
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let logging = match args.log_config().and_then(|c| init_logging(&c)) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            process::exit(2);
        },
    };

    if let Some(path) = logging.log_file() {
        info!(log_file = %path.display(), "Logging to file");
    }

    let result = runner::run(&args.ingest_config(), &args.index_config()).await;

    let code = match result {
        Ok(stats) => {
            info!(
                batches = stats.batches_submitted,
                records = stats.records_read,
                indexed = stats.documents_indexed,
                rejected = stats.item_errors,
                "EDR load finished"
            );
            0
        },
        Err(failure) => {
            let code = failure.exit_code();
            let report = anyhow::Error::new(failure);
            error!(error = %format!("{:#}", report), "EDR load failed");
            eprintln!("Error: {:#}", report);
            code
        },
    };

    logging.flush();
    process::exit(code);
}
