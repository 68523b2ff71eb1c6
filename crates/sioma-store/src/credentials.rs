//! Service-account credential resolution for the event store.
//!
//! Three deployment styles are supported behind one [`CredentialProvider`]
//! contract: a key file on local disk, a structured TOML table in a secrets
//! file, and the same key serialized as a JSON string (either a secrets entry
//! or an environment variable). [`resolve_credential_provider`] inspects the
//! runtime environment in that order and returns the first match. Failure here
//! is the one fatal initialization error of the pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_LOCAL_KEY_PATH: &str = "service-account-key.json";
pub const DEFAULT_SECRETS_PATH: &str = ".streamlit/secrets.toml";
pub const DEFAULT_SECRETS_KEY: &str = "firebase_service_account";
pub const JSON_SECRET_ENV: &str = "SIOMA_FIREBASE_SERVICE_ACCOUNT_JSON";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no service-account credential found (searched: {searched})")]
    NotFound { searched: String },
    #[error("failed to read credential source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential from {origin} is not a valid service-account JSON document: {source}")]
    InvalidJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("secrets file {path} is not valid TOML: {source}")]
    InvalidToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("secrets entry '{key}' must be a table or a JSON string, found {found}")]
    SecretShape { key: String, found: &'static str },
    #[error("credential from {origin} does not declare a project_id")]
    MissingProjectId { origin: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    LocalFile,
    StructuredSecret,
    JsonStringSecret,
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalFile => "local_file",
            Self::StructuredSecret => "structured_secret",
            Self::JsonStringSecret => "json_string_secret",
        }
    }
}

/// Resolved service-account identity. The private key is retained for callers
/// that mint tokens themselves and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountCredential {
    pub kind: CredentialKind,
    pub origin: String,
    pub project_id: String,
    pub client_email: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: Option<String>,
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
}

impl ServiceAccountKey {
    fn into_credential(
        self,
        kind: CredentialKind,
        origin: String,
    ) -> Result<ServiceAccountCredential, CredentialError> {
        let project_id = self
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CredentialError::MissingProjectId {
                origin: origin.clone(),
            })?;
        Ok(ServiceAccountCredential {
            kind,
            origin,
            project_id,
            client_email: self.client_email,
            private_key_id: self.private_key_id,
            private_key: self.private_key,
        })
    }
}

/// Produces a service-account credential or fails with [`CredentialError`].
pub trait CredentialProvider: Send + Sync {
    fn kind(&self) -> CredentialKind;
    fn load(&self) -> Result<ServiceAccountCredential, CredentialError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileCredential {
    pub path: PathBuf,
}

impl CredentialProvider for LocalFileCredential {
    fn kind(&self) -> CredentialKind {
        CredentialKind::LocalFile
    }

    fn load(&self) -> Result<ServiceAccountCredential, CredentialError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| CredentialError::Read {
            path: self.path.clone(),
            source,
        })?;
        let origin = self.path.display().to_string();
        let key = serde_json::from_str::<ServiceAccountKey>(&raw).map_err(|source| {
            CredentialError::InvalidJson {
                origin: origin.clone(),
                source,
            }
        })?;
        key.into_credential(self.kind(), origin)
    }
}

/// Service-account key stored as a TOML table inside a secrets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredSecretCredential {
    pub secrets_path: PathBuf,
    pub key: String,
}

impl CredentialProvider for StructuredSecretCredential {
    fn kind(&self) -> CredentialKind {
        CredentialKind::StructuredSecret
    }

    fn load(&self) -> Result<ServiceAccountCredential, CredentialError> {
        let secrets = read_secrets_table(&self.secrets_path)?;
        let origin = format!("{}#{}", self.secrets_path.display(), self.key);
        let entry = match secrets.get(&self.key) {
            Some(toml::Value::Table(table)) => table,
            Some(other) => {
                return Err(CredentialError::SecretShape {
                    key: self.key.clone(),
                    found: other.type_str(),
                })
            }
            None => {
                return Err(CredentialError::NotFound {
                    searched: origin.clone(),
                })
            }
        };
        let as_json = serde_json::to_value(entry).map_err(|source| {
            CredentialError::InvalidJson {
                origin: origin.clone(),
                source,
            }
        })?;
        let key = serde_json::from_value::<ServiceAccountKey>(as_json).map_err(|source| {
            CredentialError::InvalidJson {
                origin: origin.clone(),
                source,
            }
        })?;
        key.into_credential(self.kind(), origin)
    }
}

/// Service-account key serialized as a JSON string.
#[derive(Clone, PartialEq, Eq)]
pub struct JsonStringSecretCredential {
    pub origin: String,
    pub payload: String,
}

impl fmt::Debug for JsonStringSecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStringSecretCredential")
            .field("origin", &self.origin)
            .field("payload_bytes", &self.payload.len())
            .finish()
    }
}

impl CredentialProvider for JsonStringSecretCredential {
    fn kind(&self) -> CredentialKind {
        CredentialKind::JsonStringSecret
    }

    fn load(&self) -> Result<ServiceAccountCredential, CredentialError> {
        let key = serde_json::from_str::<ServiceAccountKey>(&self.payload).map_err(|source| {
            CredentialError::InvalidJson {
                origin: self.origin.clone(),
                source,
            }
        })?;
        key.into_credential(self.kind(), self.origin.clone())
    }
}

/// Inputs for environment probing. `json_secret` carries the value of
/// `SIOMA_FIREBASE_SERVICE_ACCOUNT_JSON` when the caller read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialLookupOptions {
    pub local_key_path: PathBuf,
    pub secrets_path: PathBuf,
    pub secrets_key: String,
    pub json_secret: Option<String>,
}

impl Default for CredentialLookupOptions {
    fn default() -> Self {
        Self {
            local_key_path: PathBuf::from(DEFAULT_LOCAL_KEY_PATH),
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            secrets_key: DEFAULT_SECRETS_KEY.to_string(),
            json_secret: None,
        }
    }
}

/// Picks the credential provider matching the runtime environment: local key
/// file, then the secrets file table, then a JSON string (the secrets file
/// entry holding a string, or the environment value).
pub fn resolve_credential_provider(
    options: &CredentialLookupOptions,
) -> Result<Box<dyn CredentialProvider>, CredentialError> {
    if options.local_key_path.is_file() {
        tracing::debug!(path = %options.local_key_path.display(), "using local credential file");
        return Ok(Box::new(LocalFileCredential {
            path: options.local_key_path.clone(),
        }));
    }

    let secret_entry = if options.secrets_path.is_file() {
        read_secrets_table(&options.secrets_path)?.remove(&options.secrets_key)
    } else {
        None
    };

    let shape_error = match secret_entry {
        Some(toml::Value::Table(_)) => {
            tracing::debug!(
                path = %options.secrets_path.display(),
                key = %options.secrets_key,
                "using structured secrets credential"
            );
            return Ok(Box::new(StructuredSecretCredential {
                secrets_path: options.secrets_path.clone(),
                key: options.secrets_key.clone(),
            }));
        }
        Some(toml::Value::String(payload)) => {
            tracing::debug!(
                path = %options.secrets_path.display(),
                key = %options.secrets_key,
                "using JSON string secrets credential"
            );
            return Ok(Box::new(JsonStringSecretCredential {
                origin: format!(
                    "{}#{}",
                    options.secrets_path.display(),
                    options.secrets_key
                ),
                payload,
            }));
        }
        Some(other) => Some(CredentialError::SecretShape {
            key: options.secrets_key.clone(),
            found: other.type_str(),
        }),
        None => None,
    };

    if let Some(payload) = options
        .json_secret
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        tracing::debug!(env = JSON_SECRET_ENV, "using JSON string credential");
        return Ok(Box::new(JsonStringSecretCredential {
            origin: format!("env:{JSON_SECRET_ENV}"),
            payload: payload.to_string(),
        }));
    }

    if let Some(error) = shape_error {
        return Err(error);
    }
    Err(CredentialError::NotFound {
        searched: format!(
            "{}, {}#{}, env:{}",
            options.local_key_path.display(),
            options.secrets_path.display(),
            options.secrets_key,
            JSON_SECRET_ENV
        ),
    })
}

fn read_secrets_table(path: &Path) -> Result<toml::Table, CredentialError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    raw.parse::<toml::Table>()
        .map_err(|source| CredentialError::InvalidToml {
            path: path.to_path_buf(),
            source,
        })
}
