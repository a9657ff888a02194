//! EDR Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the EDR loader workspace.
//!
//! # Overview
//!
//! - **Logging**: tracing subscriber setup with console, per-run file or both
//! - **Error Handling**: shared error type and result alias
//!
//! # Example
//!
//! ```no_run
//! use edr_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
//!
//! fn main() -> edr_common::Result<()> {
//!     let config = LogConfig::builder()
//!         .level(LogLevel::Info)
//!         .output(LogOutput::File)
//!         .log_file_prefix("edr-ingest")
//!         .build();
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
