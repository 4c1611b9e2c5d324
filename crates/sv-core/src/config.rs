use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration (loaded from safevault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub storage: StorageConfig,
    pub secrets: SecretsConfig,
    pub auth: AuthConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON record store path
    pub records_path: PathBuf,
}

/// Where the credential namespace lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefsBackendKind {
    /// Platform keychain, one entry per key
    Keychain,
    /// JSON file; its at-rest protection is the platform's job
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub prefs_backend: PrefsBackendKind,
    /// Used when `prefs_backend = "file"`
    pub prefs_path: PathBuf,
    /// Keychain service name for both the master key and prefs
    pub service_name: String,
    /// Alias of the master key inside the secure key store
    pub key_alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Minimum length of a newly created unlock password (default: 4)
    pub min_password_len: usize,
}

/// Case policy for title search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchCase {
    /// ASCII letters compare case-insensitively, like a SQL `LIKE`
    #[default]
    AsciiInsensitive,
    /// Exact byte-for-byte substring match
    Sensitive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub search_case: SearchCase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from("~/.local/share/safevault/records.json"),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            prefs_backend: PrefsBackendKind::Keychain,
            prefs_path: PathBuf::from("~/.local/share/safevault/prefs.json"),
            service_name: "safevault".into(),
            key_alias: "safevault_master_key".into(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { min_password_len: 4 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(rest)
        }
        Err(_) => path.to_path_buf(),
    }
}
