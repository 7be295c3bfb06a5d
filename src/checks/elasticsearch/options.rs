//! Search-cluster check options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::duration_serde;
use crate::config::validation::ValidationError;

/// How the client authenticates. The variants are mutually exclusive.
#[derive(Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ElasticsearchAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// Client certificate and key, both PEM. Address mode only.
    Certificate { cert_path: PathBuf, key_path: PathBuf },
    /// Base64 `id:key` credential. Cloud mode only.
    ApiKey { api_key: String },
}

impl fmt::Debug for ElasticsearchAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElasticsearchAuth::None => f.write_str("None"),
            ElasticsearchAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            ElasticsearchAuth::Certificate {
                cert_path,
                key_path,
            } => f
                .debug_struct("Certificate")
                .field("cert_path", cert_path)
                .field("key_path", key_path)
                .finish(),
            ElasticsearchAuth::ApiKey { .. } => f
                .debug_struct("ApiKey")
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Server certificate validation policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CertificateValidation {
    /// Platform trust roots.
    #[default]
    Default,
    /// Accept any server certificate.
    AcceptInvalid,
    /// Trust the certificates in `ca_path` in addition to the defaults.
    TrustedRoots { ca_path: PathBuf },
}

/// Options for a search-cluster check.
///
/// `uri` selects address mode, `cloud_id` selects cloud mode; when both are
/// absent the client targets the local default node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct ElasticsearchOptions {
    pub uri: Option<String>,
    pub cloud_id: Option<String>,
    pub auth: ElasticsearchAuth,
    /// Per-request bound, in (possibly fractional) seconds on the wire.
    #[serde(rename = "request_timeout_secs", with = "duration_serde::option")]
    pub request_timeout: Option<Duration>,
    pub certificate_validation: CertificateValidation,
}

/// Connection mode chosen from the configured target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode<'a> {
    Address(&'a str),
    Cloud(&'a str),
    Default,
}

impl ElasticsearchOptions {
    /// Options targeting a node URI.
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Options targeting a hosted deployment by cloud id.
    pub fn with_cloud_id(cloud_id: impl Into<String>) -> Self {
        Self {
            cloud_id: Some(cloud_id.into()),
            ..Self::default()
        }
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = ElasticsearchAuth::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth = ElasticsearchAuth::ApiKey {
            api_key: api_key.into(),
        };
        self
    }

    pub fn client_certificate(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.auth = ElasticsearchAuth::Certificate {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_certificate_validation(mut self, policy: CertificateValidation) -> Self {
        self.certificate_validation = policy;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Address mode wins over cloud mode; empty strings count as absent.
    pub fn mode(&self) -> ConnectionMode<'_> {
        match (non_empty(&self.uri), non_empty(&self.cloud_id)) {
            (Some(uri), _) => ConnectionMode::Address(uri),
            (None, Some(cloud_id)) => ConnectionMode::Cloud(cloud_id),
            (None, None) => ConnectionMode::Default,
        }
    }

    /// Label identifying the target, used in cache keys and descriptions.
    ///
    /// Userinfo embedded in the URI is stripped.
    pub fn target(&self) -> String {
        match self.mode() {
            ConnectionMode::Address(uri) => format!("uri:{}", without_userinfo(uri)),
            ConnectionMode::Cloud(cloud_id) => format!("cloud:{}", cloud_id),
            ConnectionMode::Default => "default".to_string(),
        }
    }

    /// Semantic checks applied at check construction.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mode = self.mode();

        if let ConnectionMode::Address(uri) = mode {
            if let Err(e) = url::Url::parse(uri) {
                errors.push(ValidationError::new("uri", format!("'{}' is not a URL: {}", uri, e)));
            }
        }

        match (&self.auth, mode) {
            (ElasticsearchAuth::Basic { username, .. }, _) if username.is_empty() => {
                errors.push(ValidationError::new(
                    "auth.username",
                    "basic authentication needs a username",
                ));
            }
            (
                ElasticsearchAuth::Certificate { .. },
                ConnectionMode::Cloud(_) | ConnectionMode::Default,
            ) => {
                errors.push(ValidationError::new(
                    "auth.mode",
                    "certificate authentication is only supported with a uri",
                ));
            }
            (
                ElasticsearchAuth::Certificate {
                    cert_path,
                    key_path,
                },
                _,
            ) if cert_path.as_os_str().is_empty() || key_path.as_os_str().is_empty() => {
                errors.push(ValidationError::new(
                    "auth.cert_path",
                    "certificate authentication needs cert_path and key_path",
                ));
            }
            (
                ElasticsearchAuth::ApiKey { .. },
                ConnectionMode::Address(_) | ConnectionMode::Default,
            ) => {
                errors.push(ValidationError::new(
                    "auth.mode",
                    "api key authentication is only supported with a cloud_id",
                ));
            }
            (ElasticsearchAuth::ApiKey { api_key }, _) if api_key.is_empty() => {
                errors.push(ValidationError::new("auth.api_key", "api key must not be empty"));
            }
            _ => {}
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            errors.push(ValidationError::new(
                "request_timeout_secs",
                "must be greater than zero",
            ));
        }

        if let CertificateValidation::TrustedRoots { ca_path } = &self.certificate_validation {
            if ca_path.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "certificate_validation.ca_path",
                    "must not be empty",
                ));
            }
        }

        errors
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn without_userinfo(uri: &str) -> String {
    match url::Url::parse(uri) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            // Both setters only fail for hostless URLs, which carry no userinfo.
            let _ = url.set_password(None);
            let _ = url.set_username("");
            url.to_string()
        }
        _ => uri.to_string(),
    }
}
