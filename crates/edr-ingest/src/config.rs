//! Ingestion and index configuration

use crate::error::{IngestError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Field delimiter of EDR files.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Index the records are loaded into.
pub const DEFAULT_INDEX_NAME: &str = "bl_edr";

/// Legacy mapping type name sent with every action.
pub const DEFAULT_DOC_TYPE: &str = "edr";

/// Column whose value becomes the document id.
pub const DEFAULT_ID_FIELD: &str = "TRANSACTION_ID";

/// Default timeout for every request to the indexing service, in seconds.
/// Can be overridden via the EDR_REQUEST_TIMEOUT_SECS environment variable.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Scheme and port used when the endpoint is given as a bare host name.
pub const DEFAULT_ENDPOINT_SCHEME: &str = "https";
pub const DEFAULT_ENDPOINT_PORT: u16 = 443;

/// Settings for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// File to load
    pub input_path: PathBuf,

    /// Records per bulk submission
    pub batch_size: usize,

    /// Carried through for bookkeeping only
    pub batch_scale: u32,

    /// Field delimiter
    pub delimiter: u8,
}

impl IngestConfig {
    pub fn new(input_path: impl Into<PathBuf>, batch_size: usize, batch_scale: u32) -> Self {
        Self {
            input_path: input_path.into(),
            batch_size,
            batch_scale,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Name recorded in `ZZ_FILENAME`: the path exactly as it was given.
    pub fn file_name(&self) -> String {
        self.input_path.display().to_string()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::config("batch size must be greater than 0"));
        }

        if self.batch_scale == 0 {
            return Err(IngestError::config("batch scale must be greater than 0"));
        }

        if self.input_path.as_os_str().is_empty() {
            return Err(IngestError::config("input file name cannot be empty"));
        }

        Ok(())
    }
}

/// Where and how documents are indexed
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Host name, or a full base URL when it contains a scheme
    pub endpoint: String,

    /// Target index
    pub index_name: String,

    /// Legacy mapping type; `None` for typeless clusters
    pub doc_type: Option<String>,

    /// Column holding the document id
    pub id_field: String,

    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
}

impl IndexConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            doc_type: Some(DEFAULT_DOC_TYPE.to_string()),
            id_field: DEFAULT_ID_FIELD.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn with_doc_type(mut self, doc_type: Option<String>) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = Duration::from_secs(seconds);
        self
    }

    /// Base URL of the indexing service, without a trailing slash.
    ///
    /// `search-foo.us-east-1.es.amazonaws.com` becomes
    /// `https://search-foo.us-east-1.es.amazonaws.com:443`; anything that
    /// already names a scheme is used as is.
    pub fn base_url(&self) -> Result<reqwest::Url> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');

        if endpoint.is_empty() {
            return Err(IngestError::config("indexing endpoint cannot be empty"));
        }

        let raw = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!(
                "{}://{}:{}",
                DEFAULT_ENDPOINT_SCHEME, endpoint, DEFAULT_ENDPOINT_PORT
            )
        };

        reqwest::Url::parse(&raw)
            .map_err(|e| IngestError::config(format!("invalid endpoint '{}': {}", self.endpoint, e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.index_name.is_empty() {
            return Err(IngestError::config("index name cannot be empty"));
        }

        if self.id_field.is_empty() {
            return Err(IngestError::config("id field cannot be empty"));
        }

        if self.request_timeout.is_zero() {
            return Err(IngestError::config("request timeout must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_config() {
        let config = IndexConfig::new("search-edr.us-east-1.es.amazonaws.com");

        assert_eq!(config.index_name, "bl_edr");
        assert_eq!(config.doc_type.as_deref(), Some("edr"));
        assert_eq!(config.id_field, "TRANSACTION_ID");
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bare_host_becomes_https_443() {
        let config = IndexConfig::new("search-edr.us-east-1.es.amazonaws.com");
        let url = config.base_url().unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("search-edr.us-east-1.es.amazonaws.com"));
        // 443 is the https default, so the URL does not spell it out
        assert_eq!(url.port(), None);
        assert_eq!(url.port_or_known_default(), Some(443));
    }

    #[test]
    fn test_full_url_is_used_verbatim() {
        let config = IndexConfig::new("http://127.0.0.1:9200/");
        let url = config.base_url().unwrap();

        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(9200));
    }

    #[test]
    fn test_empty_endpoint_is_rejected() {
        assert!(IndexConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = IndexConfig::new("localhost")
            .with_index_name("edr_test")
            .with_doc_type(None)
            .with_id_field("SESSION_ID")
            .with_timeout(5);

        assert_eq!(config.index_name, "edr_test");
        assert_eq!(config.doc_type, None);
        assert_eq!(config.id_field, "SESSION_ID");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ingest_config_validation() {
        assert!(IngestConfig::new("edr.csv", 100, 2).validate().is_ok());
        assert!(IngestConfig::new("edr.csv", 0, 2).validate().is_err());
        assert!(IngestConfig::new("edr.csv", 100, 0).validate().is_err());
        assert!(IngestConfig::new("", 100, 2).validate().is_err());
    }

    #[test]
    fn test_file_name_is_path_as_given() {
        let config = IngestConfig::new("data/in/edr_20170101.csv", 10, 1).with_delimiter(b';');

        assert_eq!(config.file_name(), "data/in/edr_20170101.csv");
        assert_eq!(config.delimiter, b';');
    }
}
