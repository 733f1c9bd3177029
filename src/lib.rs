//!
//! Library for exporting the audit trail of a Harbor registry.
//!
//! ## Client
//! A [`Client`] is created from a [`ClientBuilder`], no request is made until
//! records are fetched.
//! ```no_run
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), audit_log_export::Error> {
//!     use audit_log_export::ClientBuilder;
//!
//!     let client = ClientBuilder::new()
//!         // Registry uses a self-signed certificate
//!         .danger_accept_invalid_certs()
//!         .build("https://10.202.250.197", "admin", "Harbor12345")?;
//!
//!     let records = client.audit_logs("operation=delete,resource=~nginx").await?;
//!     audit_log_export::exporter::write_csv(&records, audit_log_export::exporter::OUTPUT_FILE)?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
use base64::Engine;

pub mod audit_log;
pub mod exporter;
pub mod fetcher;

pub use audit_log::AuditRecord;

/// Records fetched per request unless overridden with [`ClientBuilder::page_size`]
pub const PAGE_SIZE: u64 = 15;

/// Error returned by client functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or empty configuration value
    #[error("{0}")]
    Config(String),

    /// Failed returned by the HTTP server
    #[error("HTTP failed {0}, {1}")]
    WebServer(u16, String),

    /// JSON serialization/deserialization error
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL: {0}")]
    URL(#[from] url::ParseError),

    /// HTTP client error
    #[error("Reqwest: {0}")]
    HTTPClient(#[from] reqwest::Error),

    /// The total count header could not be parsed
    #[error("Invalid X-Total-Count header {0:?}")]
    TotalCount(String),

    /// The number of records fetched differs from the count the server reported
    #[error("Server reported {expected} audit logs, fetched {actual}")]
    CountMismatch {
        /// Count from the first response
        expected: u64,
        /// Records actually returned
        actual: u64,
    },

    /// CSV errors
    #[error("CSV error {0}")]
    Csv(#[from] csv::Error),

    /// IO Errors
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn config(err: &str) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Encode `username:password` as used in a basic `Authorization` header.
#[must_use]
pub fn basic_auth(username: &str, password: &str) -> String {
    let auth = format!("{username}:{password}");
    base64::engine::general_purpose::STANDARD.encode(auth)
}

/// Builder for a [`Client`]
#[derive(Clone)]
pub struct ClientBuilder {
    reqwest_ca: Vec<reqwest::Certificate>,
    disable_cert_verification: bool,
    timeout: Option<std::time::Duration>,
    page_size: u64,
}

impl ClientBuilder {
    /// Create a new builder instance
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reqwest_ca: Vec::new(),
            disable_cert_verification: false,
            timeout: None,
            page_size: PAGE_SIZE,
        }
    }

    /// Add a root certificate for API certificate verification
    pub fn add_root_certificate(mut self, cert: &[u8]) -> Result<Self> {
        let r_ca = reqwest::Certificate::from_pem(cert)?;
        self.reqwest_ca.push(r_ca);
        Ok(self)
    }

    /// Disable certificate verification, self-signed registry certificates are accepted
    #[must_use]
    pub fn danger_accept_invalid_certs(self) -> Self {
        Self {
            disable_cert_verification: true,
            ..self
        }
    }

    /// Timeout for each page request, the reqwest default applies when unset
    #[must_use]
    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Records requested per page, at least one
    #[must_use]
    pub fn page_size(self, page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            ..self
        }
    }

    /// Create a client for the registry at `host`, e.g. `https://1.2.3.4`
    pub fn build(&self, host: &str, username: &str, password: &str) -> Result<Client> {
        if username.is_empty() {
            return Err(Error::config("Username is required"));
        }
        if password.is_empty() {
            return Err(Error::config("Password is required"));
        }

        let base_url = url::Url::parse(host)?;
        let client = reqwest::Client::builder();

        // Add CA certificates
        let client = self
            .reqwest_ca
            .iter()
            .fold(client, |client, ca| client.add_root_certificate(ca.clone()));

        let client = client.danger_accept_invalid_certs(self.disable_cert_verification);

        let client = match self.timeout {
            Some(timeout) => client.timeout(timeout),
            None => client,
        };

        Ok(Client {
            base_url,
            client: client.build()?,
            authorization: format!("Basic {}", basic_auth(username, password)),
            page_size: self.page_size,
            disable_cert_verification: self.disable_cert_verification,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A page of results and the total count header of its response
#[derive(Debug)]
pub(crate) struct Page<T> {
    pub items: Vec<T>,
    pub total_count: Option<reqwest::header::HeaderValue>,
}

/// The `Client` is used for all requests to the registry.
#[derive(Clone)]
pub struct Client {
    base_url: url::Url,
    client: reqwest::Client,
    authorization: String,
    page_size: u64,
    disable_cert_verification: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("client", &self.client)
            .field("page_size", &self.page_size)
            .field("disable_cert_verification", &self.disable_cert_verification)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a Client builder
    #[must_use]
    pub const fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Base URL of the registry
    #[must_use]
    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    /// Records requested per page
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// True if certificates are not verified
    #[must_use]
    pub fn accepts_invalid_certs(&self) -> bool {
        self.disable_cert_verification
    }

    /// GET one page of a json list. `url` is used as is.
    pub(crate) async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Page<T>> {
        tracing::debug!("GET {}", url);

        let result = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if result.status().is_success() {
            let total_count = result.headers().get(fetcher::TOTAL_COUNT_HEADER).cloned();
            let body = result.bytes().await?;
            let items = serde_json::from_slice(&body)?;
            Ok(Page { items, total_count })
        } else {
            tracing::error!("GET {} failed: {}", url, result.status());
            Err(Error::WebServer(
                result.status().as_u16(),
                result.status().to_string(),
            ))
        }
    }

    /// Fetch every audit log matching `filter`, an empty filter returns all
    pub async fn audit_logs(&self, filter: &str) -> Result<Vec<AuditRecord>> {
        fetcher::audit_logs(self, filter).await
    }
}

/// Fetch all audit logs matching `filter` and write them as CSV to `path`.
/// Nothing is written unless every page was fetched.
pub async fn export_audit_logs<P: AsRef<std::path::Path>>(
    client: &Client,
    filter: &str,
    path: P,
) -> Result<usize> {
    let records = client.audit_logs(filter).await?;
    exporter::write_csv(&records, path)?;
    Ok(records.len())
}

#[cfg(test)]
mod test {
    use super::{basic_auth, export_audit_logs, ClientBuilder, Error, PAGE_SIZE};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn basic_auth_header() {
        assert_eq!(basic_auth("admin", "Harbor12345"), "YWRtaW46SGFyYm9yMTIzNDU=");
        assert_eq!(basic_auth("alice", "s3cret"), "YWxpY2U6czNjcmV0");
    }

    #[test]
    fn builder_defaults() {
        let client = ClientBuilder::new()
            .build("https://1.2.3.4", "admin", "Harbor12345")
            .unwrap();
        assert_eq!(client.page_size(), PAGE_SIZE);
        assert!(!client.accepts_invalid_certs());
        assert_eq!(client.base_url().host_str(), Some("1.2.3.4"));
    }

    #[test]
    fn builder_trust_modes() {
        let client = ClientBuilder::new()
            .danger_accept_invalid_certs()
            .timeout(std::time::Duration::from_secs(5))
            .page_size(0)
            .build("https://registry.local:8443", "admin", "Harbor12345")
            .unwrap();
        assert!(client.accepts_invalid_certs());
        assert_eq!(client.page_size(), 1);
    }

    #[test]
    fn builder_requires_credentials() {
        let err = ClientBuilder::new()
            .build("https://1.2.3.4", "", "Harbor12345")
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "Username is required"));

        let err = ClientBuilder::new()
            .build("https://1.2.3.4", "admin", "")
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "Password is required"));
    }

    #[test]
    fn builder_rejects_bad_url() {
        let err = ClientBuilder::new()
            .build("not a url", "admin", "Harbor12345")
            .unwrap_err();
        assert!(matches!(err, Error::URL(_)));
    }

    async fn mount_page(server: &MockServer, page: u64, body: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api/v2.0/audit-logs"))
            .and(query_param("page", page.to_string()))
            .respond_with(body)
            .mount(server)
            .await;
    }

    fn page(ids: &[i64]) -> ResponseTemplate {
        let body: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "operation": "delete",
                    "username": "admin",
                    "resource": "library/nginx:1.25",
                    "resource_type": "artifact",
                    "op_time": "2023-01-02T15:04:05+08:00",
                })
            })
            .collect();
        ResponseTemplate::new(200)
            .insert_header("X-Total-Count", "3")
            .set_body_json(body)
    }

    #[tokio::test]
    async fn export_two_pages() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page(&[1, 2])).await;
        mount_page(&server, 2, page(&[3])).await;

        let client = ClientBuilder::new()
            .page_size(2)
            .build(&server.uri(), "admin", "Harbor12345")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("audit_logs.csv");

        let count = export_audit_logs(&client, "", &output).await.unwrap();
        assert_eq!(count, 3);

        let content = std::fs::read_to_string(&output).unwrap();
        let ids: Vec<&str> = content
            .lines()
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["ID", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page(&[1, 2])).await;
        mount_page(
            &server,
            2,
            ResponseTemplate::new(200).set_body_string("[{\"id\": 3, \"operation\""),
        )
        .await;

        let client = ClientBuilder::new()
            .page_size(2)
            .build(&server.uri(), "admin", "Harbor12345")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("audit_logs.csv");

        let err = export_audit_logs(&client, "", &output).await.unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
        assert!(!output.exists());
    }

    #[test]
    fn debug_hides_credentials() {
        let client = ClientBuilder::new()
            .build("https://1.2.3.4", "admin", "Harbor12345")
            .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("YWRtaW46SGFyYm9yMTIzNDU="));
    }
}
