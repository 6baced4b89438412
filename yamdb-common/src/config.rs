//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file; anything missing falls
//! back to compiled defaults so a fresh install starts without a config.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "YAMDB_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "yamdb.db";

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file found; compiled defaults apply
    Defaults,
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database and the mail outbox
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    pub port: u16,

    /// Interface to bind
    pub bind_address: String,

    /// Items per page on list endpoints
    pub page_size: i64,

    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: 8000,
            bind_address: "127.0.0.1".to_string(),
            page_size: 10,
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Token and confirmation code settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Access token lifetime
    pub token_lifetime_minutes: i64,

    /// Number of characters in a confirmation code
    pub confirmation_code_length: usize,

    /// How long an issued confirmation code stays valid
    pub confirmation_code_lifetime_minutes: i64,

    /// Token signing secret; generated and stored in the database when absent
    pub signing_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_lifetime_minutes: 24 * 60,
            confirmation_code_length: 16,
            confirmation_code_lifetime_minutes: 60,
            signing_secret: None,
        }
    }
}

/// Which mail backend delivers confirmation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailBackendKind {
    /// Write messages to the log
    #[default]
    Console,
    /// Write one file per message into the outbox directory
    File,
}

/// Mail delivery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub backend: MailBackendKind,

    /// Sender address on outgoing messages
    pub from_address: String,

    /// Outbox for the file backend; relative paths resolve against the root folder
    pub outbox_dir: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackendKind::Console,
            from_address: "noreply@yamdb.local".to_string(),
            outbox_dir: PathBuf::from("sent_emails"),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration and report where it came from
    ///
    /// An explicitly requested file must exist. Without one, the platform
    /// config locations are tried and a missing file yields defaults.
    /// Nothing is logged here; the caller reports the source once its
    /// subscriber is installed.
    pub fn load_with_source(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
            })?;
            let config = Self::from_toml_str(&content)?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        match default_config_file() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                let config = Self::from_toml_str(&content)?;
                Ok((config, ConfigSource::File(path)))
            }
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    /// Validate values that serde cannot constrain
    pub fn validate(&self) -> Result<()> {
        if self.page_size < 1 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.auth.token_lifetime_minutes < 1 {
            return Err(Error::Config(
                "auth.token_lifetime_minutes must be at least 1".to_string(),
            ));
        }
        if self.auth.confirmation_code_length < 6 {
            return Err(Error::Config(
                "auth.confirmation_code_length must be at least 6".to_string(),
            ));
        }
        if self.auth.confirmation_code_lifetime_minutes < 1 {
            return Err(Error::Config(
                "auth.confirmation_code_lifetime_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Outbox directory with relative paths anchored at the root folder
    pub fn outbox_dir(&self, root_folder: &Path) -> PathBuf {
        if self.mail.outbox_dir.is_absolute() {
            self.mail.outbox_dir.clone()
        } else {
            root_folder.join(&self.mail.outbox_dir)
        }
    }
}

/// Resolve the root folder following the priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_root: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database file location for a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Create the root folder if missing
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}

/// First existing platform config file, if any
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("yamdb").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/yamdb/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/yamdb (or /var/lib/yamdb for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("yamdb"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/yamdb"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/yamdb
        dirs::data_dir()
            .map(|d| d.join("yamdb"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/yamdb"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\yamdb
        dirs::data_local_dir()
            .map(|d| d.join("yamdb"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\yamdb"))
    } else {
        PathBuf::from("./yamdb_data")
    }
}
