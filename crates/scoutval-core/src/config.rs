// Configuration loading and parsing (server.toml, credentials.toml).

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Environment variable naming the directory that holds `config/` and
/// `defaults/`.
pub const HOME_ENV: &str = "SCOUTVAL_HOME";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub db_path: String,
    pub storage: StorageConfig,
    pub import: ImportConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire server.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    server: ServerConfig,
    database: DatabaseSection,
    storage: StorageConfig,
    #[serde(default)]
    import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which blob store implementation serves uploaded CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files on the local filesystem under `root/<bucket>/`.
    Local,
    /// A storage REST API reached over HTTP.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// How the importer decides whether a row carries a statistics sub-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsPolicy {
    /// Any of goals/assists/appearances has a non-empty raw value, including "0".
    #[default]
    Present,
    /// Any of goals/assists/appearances parses to a non-zero number.
    NonZero,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub statistics_policy: StatisticsPolicy,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub storage_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/server.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not seed missing files; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- server.toml (required) ---
    let server_path = config_dir.join("server.toml");
    let server_text = read_config_text(&server_path)?;
    let server_file: ServerFile =
        toml::from_str(&server_text).map_err(|e| ConfigError::ParseError {
            path: server_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_config_text(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        server: server_file.server,
        db_path: server_file.database.path,
        storage: server_file.storage,
        import: server_file.import,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/`: every file in `defaults/` that is not an
/// `.example` template and is absent from `config/` is copied over. Existing
/// config files are left untouched. Returns the paths written, sorted.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(seed_error(format!(
                "no defaults/ or config/ directory under {}",
                base_dir.display()
            )))
        };
    }

    let list_error = |e: io::Error| seed_error(format!("cannot list {}: {e}", defaults_dir.display()));
    let mut seeds = Vec::new();
    for entry in fs::read_dir(&defaults_dir).map_err(list_error)? {
        let source = entry.map_err(list_error)?.path();
        let is_template = source.extension().is_some_and(|ext| ext == "example");
        if source.is_file() && !is_template {
            seeds.push(source);
        }
    }
    seeds.sort();

    fs::create_dir_all(&config_dir)
        .map_err(|e| seed_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for source in seeds {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_absent(&source, &target)? {
            info!("Seeded {} from defaults", target.display());
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Load configuration for the running server. The base directory is
/// `$SCOUTVAL_HOME` when set, otherwise the working directory; `config/` is
/// seeded from `defaults/` before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let base_dir = match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
            path: PathBuf::from("."),
        })?,
    };
    ensure_config_files(&base_dir)?;
    load_config_from(&base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Create `target` with the contents of `source` unless it already exists.
/// Returns whether a file was written.
fn copy_if_absent(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match fs::OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(seed_error(format!("cannot create {}: {e}", target.display()))),
    };
    let mut src = fs::File::open(source)
        .map_err(|e| seed_error(format!("cannot read {}: {e}", source.display())))?;
    io::copy(&mut src, &mut dest)
        .map_err(|e| seed_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }

    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    let storage = &config.storage;
    if storage.bucket.trim().is_empty() {
        return Err(invalid("storage.bucket", "must not be empty"));
    }

    match storage.backend {
        StorageBackend::Local => {
            if storage.root.as_deref().is_none_or(|r| r.trim().is_empty()) {
                return Err(invalid("storage.root", "required for the local backend"));
            }
        }
        StorageBackend::Http => {
            let Some(url) = storage.base_url.as_deref() else {
                return Err(invalid("storage.base_url", "required for the http backend"));
            };
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError {
                    field: "storage.base_url".into(),
                    message: format!("must be an http(s) URL, got {url}"),
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VALID_SERVER_TOML: &str = r#"
[server]
host = "127.0.0.1"
port = 8787

[database]
path = "scoutval.db"

[storage]
backend = "local"
bucket = "csv-imports"
root = "storage"
"#;

    /// Helper: create an isolated base directory with a `config/` subdirectory
    /// holding the given server.toml text.
    fn temp_base(name: &str, server_toml: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(format!("scoutval_config_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/server.toml"), server_toml).unwrap();
        tmp
    }

    #[test]
    fn load_valid_config() {
        let tmp = temp_base("valid", VALID_SERVER_TOML);
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.db_path, "scoutval.db");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.bucket, "csv-imports");
        assert_eq!(config.storage.root.as_deref(), Some("storage"));
        assert_eq!(config.import.statistics_policy, StatisticsPolicy::Present);
        assert!(config.credentials.storage_api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn statistics_policy_parses_non_zero() {
        let text = format!("{VALID_SERVER_TOML}\n[import]\nstatistics_policy = \"non_zero\"\n");
        let tmp = temp_base("policy", &text);
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.import.statistics_policy, StatisticsPolicy::NonZero);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_api_key() {
        let tmp = temp_base("creds", VALID_SERVER_TOML);
        fs::write(
            tmp.join("config/credentials.toml"),
            "storage_api_key = \"service-role-test\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(
            config.credentials.storage_api_key.as_deref(),
            Some("service-role-test")
        );
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_server_toml_is_file_not_found() {
        let tmp = std::env::temp_dir().join(format!("scoutval_config_missing_{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = temp_base("malformed", "[server\nport = ");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_port_zero() {
        let tmp = temp_base("port_zero", &VALID_SERVER_TOML.replace("8787", "0"));
        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "server.port"),
            other => panic!("expected ValidationError, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_http_backend_without_base_url() {
        let text = VALID_SERVER_TOML.replace("backend = \"local\"", "backend = \"http\"");
        let tmp = temp_base("http_no_url", &text);
        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "storage.base_url"),
            other => panic!("expected ValidationError, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_bucket() {
        let text = VALID_SERVER_TOML.replace("\"csv-imports\"", "\"\"");
        let tmp = temp_base("empty_bucket", &text);
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_examples() {
        let tmp = std::env::temp_dir().join(format!("scoutval_config_seed_{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/server.toml"), VALID_SERVER_TOML).unwrap();
        fs::write(
            tmp.join("defaults/credentials.toml.example"),
            "storage_api_key = \"\"\n",
        )
        .unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/server.toml")]);
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // Second run copies nothing and keeps local edits.
        fs::write(tmp.join("config/server.toml"), "edited").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        assert_eq!(fs::read_to_string(tmp.join("config/server.toml")).unwrap(), "edited");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_without_any_directory() {
        let tmp = std::env::temp_dir().join(format!("scoutval_config_empty_{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        let err = ensure_config_files(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_seeds_in_name_order_and_ignores_directories() {
        let tmp = std::env::temp_dir().join(format!("scoutval_config_order_{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults/nested")).unwrap();
        fs::write(tmp.join("defaults/server.toml"), VALID_SERVER_TOML).unwrap();
        fs::write(tmp.join("defaults/credentials.toml"), "storage_api_key = \"k\"\n").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(
            copied,
            vec![tmp.join("config/credentials.toml"), tmp.join("config/server.toml")]
        );
        assert!(!tmp.join("config/nested").exists());

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.credentials.storage_api_key.as_deref(), Some("k"));

        let _ = fs::remove_dir_all(&tmp);
    }
}
