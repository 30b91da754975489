//! Process configuration loading.
//!
//! All values are read from environment variables at startup; outside
//! production a local `.env` file is loaded first. Loading never fails:
//! missing values take documented defaults, unparseable values are replaced
//! by their default and recorded in [`ProcessConfig::warnings`] so they can
//! be logged once telemetry is running.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Environment name that switches the process into production mode.
pub const PRODUCTION: &str = "production";

/// Fixed relative path of the local credential bundle.
pub const LOCAL_CREDENTIALS_PATH: &str = "config/store-credentials.json";

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STORE_REGION: &str = "us-east-1";
const DEFAULT_TABLE_PREFIX: &str = "sleepleague_";
const DEFAULT_ALLOWED_ORIGINS: &str = "https://sleepleague.app,https://www.sleepleague.app";
const DEFAULT_DEV_ALLOWED_ORIGINS: &str =
    "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173";

/// Environment variables as read by the `config` crate, before defaults.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    app_env: Option<String>,
    port: Option<String>,
    store_credentials: Option<String>,
    allowed_origins: Option<String>,
    dev_allowed_origins: Option<String>,
    blocking_threads: Option<String>,
    memory_limit_mb: Option<String>,
    log_level: Option<String>,
    otel_exporter_otlp_endpoint: Option<String>,
    store_region: Option<String>,
    store_endpoint: Option<String>,
    store_table_prefix: Option<String>,
}

/// Resolved, immutable process configuration.
#[derive(Clone)]
pub struct ProcessConfig {
    /// Environment name (`APP_ENV`).
    pub environment: String,
    /// Port the HTTP listener binds (`PORT`).
    pub port: u16,
    /// Externally supplied credential blob (`STORE_CREDENTIALS`).
    pub credential_blob: Option<String>,
    /// Path of the local credential bundle.
    pub local_credentials_path: PathBuf,
    /// Origin allow-list for the configured environment.
    pub allowed_origins: Vec<String>,
    /// Blocking thread-pool size hint (`BLOCKING_THREADS`).
    pub blocking_threads: Option<usize>,
    /// Memory ceiling hint in MiB (`MEMORY_LIMIT_MB`). Reported only.
    pub memory_limit_mb: Option<u64>,
    /// Tracing filter (`LOG_LEVEL`).
    pub log_level: String,
    /// OTLP collector endpoint (`OTEL_EXPORTER_OTLP_ENDPOINT`).
    pub otlp_endpoint: Option<String>,
    /// Store region used when the credential does not name one.
    pub store_region: String,
    /// Store endpoint override, e.g. a local emulator.
    pub store_endpoint: Option<String>,
    /// Prefix prepended to every collection's table name.
    pub table_prefix: String,
    /// Problems found while loading; values fell back to defaults.
    pub warnings: Vec<String>,
}

impl ProcessConfig {
    /// Load configuration for this process.
    ///
    /// Outside production a `.env` file in the working directory is read
    /// first; variables already present in the environment take precedence.
    pub fn load() -> Self {
        let production = std::env::var("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case(PRODUCTION))
            .unwrap_or(false);

        let mut dotenv_warning = None;
        if !production {
            if let Err(e) = dotenvy::dotenv() {
                if !e.not_found() {
                    dotenv_warning = Some(format!("ignoring unreadable .env file: {e}"));
                }
            }
        }

        let mut cfg = Self::from_env();
        cfg.warnings.extend(dotenv_warning);
        cfg
    }

    /// Read configuration from the process environment only.
    pub fn from_env() -> Self {
        Self::from_source(config::Environment::default())
    }

    /// Read configuration from an explicit variable map instead of the
    /// process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self::from_source(config::Environment::default().source(Some(vars.into_iter().collect())))
    }

    fn from_source(source: config::Environment) -> Self {
        let mut warnings = Vec::new();

        let raw = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize::<RawConfig>())
            .unwrap_or_else(|e| {
                warnings.push(format!("failed to read environment, using defaults: {e}"));
                RawConfig::default()
            });

        Self::resolve(raw, warnings)
    }

    fn resolve(raw: RawConfig, mut warnings: Vec<String>) -> Self {
        let environment =
            non_blank(raw.app_env).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let production = environment.eq_ignore_ascii_case(PRODUCTION);

        let port = parse_or(raw.port, "PORT", DEFAULT_PORT, &mut warnings);

        let allowed_origins = if production {
            parse_origins(
                non_blank(raw.allowed_origins)
                    .as_deref()
                    .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
            )
        } else {
            parse_origins(
                non_blank(raw.dev_allowed_origins)
                    .as_deref()
                    .unwrap_or(DEFAULT_DEV_ALLOWED_ORIGINS),
            )
        };

        let blocking_threads =
            match parse_opt::<usize>(raw.blocking_threads, "BLOCKING_THREADS", &mut warnings) {
                Some(0) => {
                    warnings.push("BLOCKING_THREADS must be > 0; using runtime default".into());
                    None
                }
                other => other,
            };

        Self {
            environment,
            port,
            credential_blob: non_blank(raw.store_credentials),
            local_credentials_path: PathBuf::from(LOCAL_CREDENTIALS_PATH),
            allowed_origins,
            blocking_threads,
            memory_limit_mb: parse_opt(raw.memory_limit_mb, "MEMORY_LIMIT_MB", &mut warnings),
            log_level: non_blank(raw.log_level).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            otlp_endpoint: non_blank(raw.otel_exporter_otlp_endpoint),
            store_region: non_blank(raw.store_region)
                .unwrap_or_else(|| DEFAULT_STORE_REGION.to_string()),
            store_endpoint: non_blank(raw.store_endpoint),
            table_prefix: raw
                .store_table_prefix
                .map(|p| p.trim().to_string())
                .unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string()),
            warnings,
        }
    }

    /// Whether the process runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }

    /// Whether `origin` is on the allow-list.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Socket address the listener binds.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field(
                "credential_blob",
                &self.credential_blob.as_ref().map(|_| "[REDACTED]"),
            )
            .field("local_credentials_path", &self.local_credentials_path)
            .field("allowed_origins", &self.allowed_origins)
            .field("blocking_threads", &self.blocking_threads)
            .field("memory_limit_mb", &self.memory_limit_mb)
            .field("log_level", &self.log_level)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("store_region", &self.store_region)
            .field("store_endpoint", &self.store_endpoint)
            .field("table_prefix", &self.table_prefix)
            .finish_non_exhaustive()
    }
}

/// Split a comma-separated origin list, dropping blanks and duplicates.
pub fn parse_origins(list: &str) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    for origin in list.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        if !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_opt<T: FromStr>(value: Option<String>, name: &str, warnings: &mut Vec<String>) -> Option<T> {
    let value = non_blank(value)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warnings.push(format!("{name}={value:?} is not valid; ignoring"));
            None
        }
    }
}

fn parse_or<T: FromStr + fmt::Display>(
    value: Option<String>,
    name: &str,
    default: T,
    warnings: &mut Vec<String>,
) -> T {
    let Some(value) = non_blank(value) else {
        return default;
    };
    match value.parse() {
        Ok(v) => v,
        Err(_) => {
            warnings.push(format!("{name}={value:?} is not valid; using {default}"));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_correct() {
        let cfg = ProcessConfig::from_vars(HashMap::new());
        assert_eq!(cfg.environment, "development");
        assert!(!cfg.is_production());
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.store_region, "us-east-1");
        assert_eq!(cfg.table_prefix, "sleepleague_");
        assert_eq!(cfg.local_credentials_path, PathBuf::from(LOCAL_CREDENTIALS_PATH));
        assert!(cfg.credential_blob.is_none());
        assert!(cfg.warnings.is_empty());
        assert_eq!(
            cfg.allowed_origins,
            vec![
                "http://localhost:5173",
                "http://localhost:3000",
                "http://127.0.0.1:5173"
            ]
        );
    }

    #[test]
    fn production_uses_production_allow_list() {
        let cfg = ProcessConfig::from_vars(vars(&[
            ("APP_ENV", "production"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("DEV_ALLOWED_ORIGINS", "http://localhost:1234"),
        ]));
        assert!(cfg.is_production());
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn development_uses_development_allow_list() {
        let cfg = ProcessConfig::from_vars(vars(&[
            ("APP_ENV", "staging"),
            ("ALLOWED_ORIGINS", "https://a.example"),
            ("DEV_ALLOWED_ORIGINS", "http://localhost:1234"),
        ]));
        assert!(!cfg.is_production());
        assert_eq!(cfg.allowed_origins, vec!["http://localhost:1234"]);
    }

    #[test]
    fn production_default_allow_list_differs_from_development() {
        let prod = ProcessConfig::from_vars(vars(&[("APP_ENV", "production")]));
        let dev = ProcessConfig::from_vars(HashMap::new());
        assert_ne!(prod.allowed_origins, dev.allowed_origins);
        assert!(prod.allows_origin("https://sleepleague.app"));
    }

    #[test]
    fn invalid_port_falls_back_with_warning() {
        let cfg = ProcessConfig::from_vars(vars(&[("PORT", "eighty")]));
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.warnings.len(), 1);
        assert!(cfg.warnings[0].contains("PORT"));
    }

    #[test]
    fn zero_blocking_threads_is_ignored() {
        let cfg = ProcessConfig::from_vars(vars(&[("BLOCKING_THREADS", "0")]));
        assert_eq!(cfg.blocking_threads, None);
        assert_eq!(cfg.warnings.len(), 1);

        let cfg = ProcessConfig::from_vars(vars(&[("BLOCKING_THREADS", "16")]));
        assert_eq!(cfg.blocking_threads, Some(16));
    }

    #[test]
    fn blank_credential_blob_counts_as_absent() {
        let cfg = ProcessConfig::from_vars(vars(&[("STORE_CREDENTIALS", "   ")]));
        assert!(cfg.credential_blob.is_none());
    }

    #[test]
    fn loading_twice_yields_same_values() {
        let input = vars(&[("APP_ENV", "production"), ("PORT", "8080")]);
        let a = ProcessConfig::from_vars(input.clone());
        let b = ProcessConfig::from_vars(input);
        assert_eq!(a.port, b.port);
        assert_eq!(a.allowed_origins, b.allowed_origins);
        assert_eq!(a.environment, b.environment);
    }

    #[test]
    fn debug_redacts_credential_blob() {
        let cfg = ProcessConfig::from_vars(vars(&[(
            "STORE_CREDENTIALS",
            r#"{"accessKeyId":"AKIA","secretAccessKey":"hunter2"}"#,
        )]));
        let printed = format!("{cfg:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn parse_origins_trims_and_dedupes() {
        assert_eq!(
            parse_origins(" http://a , ,http://b,http://a,"),
            vec!["http://a", "http://b"]
        );
        assert!(parse_origins("").is_empty());
    }
}
