//! Search-cluster HTTP client.
//!
//! # Responsibilities
//! - Resolve the node URL from a URI or a cloud id
//! - Apply exactly one authentication strategy
//! - Apply request timeout and certificate policy
//! - Issue the liveness ping (`HEAD /`)
//!
//! Building a client performs no network I/O; the first ping opens the
//! connection.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::checks::elasticsearch::options::{
    CertificateValidation, ConnectionMode, ElasticsearchAuth, ElasticsearchOptions,
};
use crate::net::tls;

/// Node used when neither a URI nor a cloud id is configured.
pub const DEFAULT_NODE: &str = "http://localhost:9200";

/// Errors raised while building or using a search client.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("invalid cloud id: {0}")]
    InvalidCloudId(String),

    #[error("cannot load {path:?}: {source}")]
    Pem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials cannot be sent as a header")]
    InvalidCredentials(#[from] reqwest::header::InvalidHeaderValue),

    #[error("client configuration rejected: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{0}")]
    Http(#[source] reqwest::Error),
}

/// A reusable client for one search cluster.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SearchClient {
    /// Build a client from options.
    pub fn from_options(options: &ElasticsearchOptions) -> Result<Self, SearchError> {
        let base_url = match options.mode() {
            ConnectionMode::Address(uri) => Url::parse(uri)?,
            ConnectionMode::Cloud(cloud_id) => decode_cloud_id(cloud_id)?,
            ConnectionMode::Default => Url::parse(DEFAULT_NODE)?,
        };

        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "health-probes/",
            env!("CARGO_PKG_VERSION")
        ));

        let mut headers = HeaderMap::new();
        match &options.auth {
            ElasticsearchAuth::None => {}
            ElasticsearchAuth::Basic { username, password } => {
                let token = STANDARD.encode(format!("{}:{}", username, password));
                headers.insert(AUTHORIZATION, sensitive(&format!("Basic {}", token))?);
            }
            ElasticsearchAuth::ApiKey { api_key } => {
                headers.insert(AUTHORIZATION, sensitive(&format!("ApiKey {}", api_key))?);
            }
            ElasticsearchAuth::Certificate {
                cert_path,
                key_path,
            } => {
                let mut pem = tls::load_certificate_pem(cert_path).map_err(|source| {
                    SearchError::Pem {
                        path: cert_path.clone(),
                        source,
                    }
                })?;
                let key = tls::load_private_key_pem(key_path).map_err(|source| SearchError::Pem {
                    path: key_path.clone(),
                    source,
                })?;
                pem.push(b'\n');
                pem.extend_from_slice(&key);
                let identity = reqwest::Identity::from_pem(&pem).map_err(SearchError::Build)?;
                builder = builder.identity(identity);
            }
        }
        builder = builder.default_headers(headers);

        if let Some(timeout) = options.request_timeout() {
            builder = builder.timeout(timeout);
        }

        match &options.certificate_validation {
            CertificateValidation::Default => {}
            CertificateValidation::AcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            CertificateValidation::TrustedRoots { ca_path } => {
                let pem = tls::load_certificate_pem(ca_path).map_err(|source| SearchError::Pem {
                    path: ca_path.clone(),
                    source,
                })?;
                let roots =
                    reqwest::Certificate::from_pem_bundle(&pem).map_err(SearchError::Build)?;
                for cert in roots {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        let http = builder.build().map_err(SearchError::Build)?;

        Ok(Self { http, base_url })
    }

    /// The node URL pings are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a liveness ping and return the HTTP status code.
    pub async fn ping(&self) -> Result<u16, SearchError> {
        let response = self
            .http
            .head(self.base_url.clone())
            .send()
            .await
            .map_err(SearchError::Http)?;
        Ok(response.status().as_u16())
    }
}

fn sensitive(value: &str) -> Result<HeaderValue, SearchError> {
    let mut header = HeaderValue::from_str(value)?;
    header.set_sensitive(true);
    Ok(header)
}

/// Decode a hosted deployment id (`name:base64(host[:port]$es_uuid$...)`)
/// into the HTTPS URL of its search nodes.
pub fn decode_cloud_id(cloud_id: &str) -> Result<Url, SearchError> {
    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| SearchError::InvalidCloudId("missing ':' separator".into()))?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SearchError::InvalidCloudId(e.to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| SearchError::InvalidCloudId("payload is not UTF-8".into()))?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|h| !h.is_empty());
    let es_uuid = parts.next().filter(|u| !u.is_empty());
    let (host, es_uuid) = match (host, es_uuid) {
        (Some(host), Some(es_uuid)) => (host, es_uuid),
        _ => {
            return Err(SearchError::InvalidCloudId(
                "payload must contain host and cluster id".into(),
            ))
        }
    };

    let (host, port) = match host.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (host, "443"),
    };

    Ok(Url::parse(&format!("https://{}.{}:{}", es_uuid, host, port))?)
}
