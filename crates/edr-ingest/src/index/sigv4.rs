//! AWS Signature Version 4 request signing
//!
//! Amazon OpenSearch Service domains authenticate every HTTP request with
//! SigV4 under the `es` service name.

use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Service name for Elasticsearch / OpenSearch domains.
pub const ES_SERVICE: &str = "es";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const AMZ_DATE_FORMAT: &str = "%Y%m%d";
const SHA256_BLOCK_LEN: usize = 64;

/// Credentials used to sign requests
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signs requests for one region and service.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
}

impl RequestSigner {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: ES_SERVICE.to_string(),
        }
    }

    /// Load credentials and region from the environment.
    ///
    /// Reads `AWS_ACCESS_KEY`, `AWS_SECRET_KEY` and `AWS_DEFAULT_REGION`
    /// (falling back to `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
    /// `AWS_REGION`), plus an optional `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let missing = |name: &str| IngestError::config(format!("environment variable {} is not set", name));

        let access_key_id =
            env_any(&["AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]).ok_or_else(|| missing("AWS_ACCESS_KEY"))?;
        let secret_access_key = env_any(&["AWS_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"])
            .ok_or_else(|| missing("AWS_SECRET_KEY"))?;
        let region =
            env_any(&["AWS_DEFAULT_REGION", "AWS_REGION"]).ok_or_else(|| missing("AWS_DEFAULT_REGION"))?;

        Ok(Self::new(
            AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: env_any(&["AWS_SESSION_TOKEN"]),
            },
            region,
        ))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Headers to attach to a request so that it carries a valid signature.
    ///
    /// Signs `host`, `x-amz-content-sha256`, `x-amz-date` and, for temporary
    /// credentials, `x-amz-security-token`.
    pub fn sign(
        &self,
        method: &str,
        url: &reqwest::Url,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let datetime = now.format(AMZ_DATETIME_FORMAT).to_string();
        let date = now.format(AMZ_DATE_FORMAT).to_string();
        let payload_hash = hex::encode(Sha256::digest(body));

        let mut headers = vec![
            ("host".to_string(), host_header(url)),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), datetime.clone()),
        ];
        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            uri_encode(url.path(), false),
            canonical_query(url),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            datetime,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.credentials.secret_access_key, &date, &self.region, &self.service);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        );

        // reqwest derives Host from the URL itself
        headers.retain(|(name, _)| name != "host");
        headers.push(("authorization".to_string(), authorization));
        headers
    }
}

/// Value of the Host header reqwest will send for `url`.
fn host_header(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// RFC 3986 encoding as AWS expects it; `/` is kept in paths.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut encoded = String::with_capacity(input.len() * 2);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            },
            b'/' if !encode_slash => encoded.push('/'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, true), uri_encode(&v, true)))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> [u8; 32] {
    let k_secret = format!("AWS4{}", secret);
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// HMAC-SHA256 (RFC 2104).
fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut key_block = [0u8; SHA256_BLOCK_LEN];
    if key.len() > SHA256_BLOCK_LEN {
        key_block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let ipad: Vec<u8> = key_block.iter().map(|b| b ^ 0x36).collect();
    let opad: Vec<u8> = key_block.iter().map(|b| b ^ 0x5c).collect();

    let inner = Sha256::new().chain_update(&ipad).chain_update(data).finalize();
    Sha256::new()
        .chain_update(&opad)
        .chain_update(inner)
        .finalize()
        .into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer(token: Option<&str>) -> RequestSigner {
        RequestSigner::new(
            AwsCredentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                session_token: token.map(String::from),
            },
            "us-east-1",
        )
    }

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signing_key_derivation() {
        // Published SigV4 example key
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20150830",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("/bl_edr/_bulk", false), "/bl_edr/_bulk");
        assert_eq!(uri_encode("/a b", false), "/a%20b");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
    }

    #[test]
    fn test_sign_produces_authorization() {
        let url = reqwest::Url::parse("https://search-edr.us-east-1.es.amazonaws.com/_bulk").unwrap();
        let now = Utc.with_ymd_and_hms(2017, 1, 1, 12, 0, 0).unwrap();

        let headers = signer(None).sign("POST", &url, b"{}\n", now);
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("x-amz-date"), "20170101T120000Z");
        assert_eq!(get("x-amz-content-sha256").len(), 64);
        let authorization = get("authorization");
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20170101/us-east-1/es/aws4_request"
        ));
        assert!(authorization.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date,"));
        assert!(!headers.iter().any(|(k, _)| k == "host"));
    }

    #[test]
    fn test_session_token_is_signed() {
        let url = reqwest::Url::parse("http://127.0.0.1:9200/").unwrap();
        let now = Utc.with_ymd_and_hms(2017, 1, 1, 12, 0, 0).unwrap();

        let headers = signer(Some("token")).sign("GET", &url, b"", now);

        assert!(headers
            .iter()
            .any(|(k, v)| k == "x-amz-security-token" && v == "token"));
        let authorization = &headers.iter().find(|(k, _)| k == "authorization").unwrap().1;
        assert!(authorization.contains("x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn test_host_header_includes_explicit_port() {
        let url = reqwest::Url::parse("http://127.0.0.1:9200/").unwrap();
        assert_eq!(host_header(&url), "127.0.0.1:9200");

        let url = reqwest::Url::parse("https://search-edr.es.amazonaws.com:443/").unwrap();
        assert_eq!(host_header(&url), "search-edr.es.amazonaws.com");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let rendered = format!("{:?}", signer(Some("token")));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(rendered.contains("AKIDEXAMPLE"));
    }
}
