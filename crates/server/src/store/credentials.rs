//! Store credential resolution.
//!
//! Production processes with `STORE_CREDENTIALS` set parse that blob; every
//! other process reads the local bundle at
//! [`crate::config::LOCAL_CREDENTIALS_PATH`].

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::config::ProcessConfig;

/// Errors produced while resolving store credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The externally supplied blob is not a valid credential document.
    #[error("STORE_CREDENTIALS is not a valid credential document: {0}")]
    MalformedBlob(#[source] serde_json::Error),

    /// The local bundle could not be read.
    #[error("failed to read credential bundle {}: {source}", path.display())]
    ReadBundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local bundle is not a valid credential document.
    #[error("credential bundle {} is malformed: {source}", path.display())]
    MalformedBundle {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required credential field is empty.
    #[error("credential field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Where the credential for this process comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// The `STORE_CREDENTIALS` environment variable.
    Blob,
    /// A JSON bundle on the local filesystem.
    File(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Blob => f.write_str("STORE_CREDENTIALS"),
            CredentialSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Static credentials for the document store.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Overrides `STORE_REGION` when present.
    #[serde(default)]
    pub region: Option<String>,
    /// Overrides `STORE_ENDPOINT` when present.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl StoreCredentials {
    fn validate(self) -> Result<Self, CredentialError> {
        if self.access_key_id.trim().is_empty() {
            return Err(CredentialError::EmptyField("accessKeyId"));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(CredentialError::EmptyField("secretAccessKey"));
        }
        Ok(self)
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key id is not secret; the rest is.
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Choose the credential source for `cfg`.
pub fn select_source(cfg: &ProcessConfig) -> CredentialSource {
    if cfg.is_production() && cfg.credential_blob.is_some() {
        CredentialSource::Blob
    } else {
        CredentialSource::File(cfg.local_credentials_path.clone())
    }
}

/// Resolve and parse the store credential for `cfg`.
///
/// # Errors
///
/// Returns an error if the blob is malformed, or if the local bundle is
/// missing, unreadable, or malformed.
pub async fn resolve(
    cfg: &ProcessConfig,
) -> Result<(StoreCredentials, CredentialSource), CredentialError> {
    let source = select_source(cfg);
    let blob = cfg
        .credential_blob
        .as_deref()
        .filter(|_| source == CredentialSource::Blob);
    let credentials = match blob {
        Some(blob) => {
            serde_json::from_str::<StoreCredentials>(blob).map_err(CredentialError::MalformedBlob)?
        }
        None => {
            let path = &cfg.local_credentials_path;
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| CredentialError::ReadBundle {
                    path: path.clone(),
                    source,
                })?;
            serde_json::from_str::<StoreCredentials>(&text).map_err(|source| {
                CredentialError::MalformedBundle {
                    path: path.clone(),
                    source,
                }
            })?
        }
    };
    Ok((credentials.validate()?, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const VALID: &str = r#"{"accessKeyId":"AKIDEXAMPLE","secretAccessKey":"s3cr3t","region":"eu-west-1"}"#;

    fn cfg(pairs: &[(&str, &str)]) -> ProcessConfig {
        ProcessConfig::from_vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn production_with_blob_selects_blob() {
        let c = cfg(&[("APP_ENV", "production"), ("STORE_CREDENTIALS", VALID)]);
        assert_eq!(select_source(&c), CredentialSource::Blob);
    }

    #[test]
    fn development_ignores_blob() {
        let c = cfg(&[("APP_ENV", "development"), ("STORE_CREDENTIALS", VALID)]);
        assert!(matches!(select_source(&c), CredentialSource::File(_)));
    }

    #[test]
    fn production_without_blob_selects_file() {
        let c = cfg(&[("APP_ENV", "production")]);
        assert_eq!(
            select_source(&c),
            CredentialSource::File(PathBuf::from(crate::config::LOCAL_CREDENTIALS_PATH))
        );
    }

    #[tokio::test]
    async fn parses_blob() {
        let c = cfg(&[("APP_ENV", "production"), ("STORE_CREDENTIALS", VALID)]);
        let (creds, source) = resolve(&c).await.unwrap();
        assert_eq!(source, CredentialSource::Blob);
        assert_eq!(creds.access_key_id, "AKIDEXAMPLE");
        assert_eq!(creds.region.as_deref(), Some("eu-west-1"));
        assert!(creds.session_token.is_none());
    }

    #[tokio::test]
    async fn rejects_malformed_blob() {
        let c = cfg(&[("APP_ENV", "production"), ("STORE_CREDENTIALS", "{not json")]);
        let err = resolve(&c).await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedBlob(_)));
    }

    #[tokio::test]
    async fn rejects_empty_secret() {
        let c = cfg(&[
            ("APP_ENV", "production"),
            ("STORE_CREDENTIALS", r#"{"accessKeyId":"AKID","secretAccessKey":" "}"#),
        ]);
        let err = resolve(&c).await.unwrap_err();
        assert!(matches!(err, CredentialError::EmptyField("secretAccessKey")));
    }

    #[tokio::test]
    async fn reads_local_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store-credentials.json");
        std::fs::write(&path, VALID).unwrap();

        let mut c = cfg(&[]);
        c.local_credentials_path = path.clone();
        let (creds, source) = resolve(&c).await.unwrap();
        assert_eq!(source, CredentialSource::File(path));
        assert_eq!(creds.secret_access_key, "s3cr3t");
    }

    #[tokio::test]
    async fn missing_local_bundle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = cfg(&[]);
        c.local_credentials_path = dir.path().join("absent.json");
        let err = resolve(&c).await.unwrap_err();
        assert!(matches!(err, CredentialError::ReadBundle { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[tokio::test]
    async fn malformed_local_bundle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store-credentials.json");
        std::fs::write(&path, "[]").unwrap();
        let mut c = cfg(&[]);
        c.local_credentials_path = path;
        let err = resolve(&c).await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedBundle { .. }));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds: StoreCredentials = serde_json::from_str(VALID).unwrap();
        let printed = format!("{creds:?}");
        assert!(!printed.contains("s3cr3t"));
        assert!(printed.contains("AKIDEXAMPLE"));
    }
}
