//! Configuration system for the `SmartTask` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/smarttask/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use smarttask_proto::task::TaskStatus;

use crate::gateway::supabase::SupabaseConfig;
use crate::tasks::page::DEFAULT_ROWS_PER_PAGE;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    backend: BackendFileConfig,
    session: SessionFileConfig,
    dashboard: DashboardFileConfig,
    auth: AuthFileConfig,
}

/// `[backend]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BackendFileConfig {
    url: Option<String>,
    anon_key: Option<String>,
    connect_timeout_secs: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    file: Option<PathBuf>,
    persist: Option<bool>,
}

/// `[dashboard]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DashboardFileConfig {
    rows_per_page: Option<usize>,
}

/// `[auth]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileConfig {
    site_url: Option<String>,
    reset_redirect_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Backend --
    /// Base URL of the Supabase project.
    pub backend_url: Option<String>,
    /// Public (anon) API key of the project.
    pub anon_key: Option<String>,
    /// Timeout for establishing a connection to the backend.
    pub connect_timeout: Duration,

    // -- Session --
    /// Where the session is persisted between runs.
    pub session_file: Option<PathBuf>,
    /// Whether to persist the session at all.
    pub persist_session: bool,

    // -- Dashboard --
    /// Initial page size of the task list.
    pub rows_per_page: usize,

    // -- Auth --
    /// Public address of the application, used to build email links.
    pub site_url: String,
    /// Where password-recovery links land. Defaults to
    /// `<site_url>/reset-password`.
    pub reset_redirect_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            connect_timeout: Duration::from_secs(10),
            session_file: default_session_file(),
            persist_session: true,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            site_url: "http://localhost:3000".to_string(),
            reset_redirect_url: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/smarttask/config.toml`) is
    /// tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// CLI args and env vars over compiled defaults, with no config file.
    ///
    /// Used when the config file can't be loaded so flags still apply.
    #[must_use]
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self::resolve(cli, &ConfigFile::default())
    }

    /// Priority: CLI > file > default. Kept apart from `load()` so it can
    /// be tested without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            backend_url: cli.url.clone().or_else(|| file.backend.url.clone()),
            anon_key: cli
                .anon_key
                .clone()
                .or_else(|| file.backend.anon_key.clone()),
            connect_timeout: file
                .backend
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            session_file: cli
                .session_file
                .clone()
                .or_else(|| file.session.file.clone())
                .or(defaults.session_file),
            persist_session: file.session.persist.unwrap_or(defaults.persist_session),
            rows_per_page: cli
                .rows_per_page
                .or(file.dashboard.rows_per_page)
                .unwrap_or(defaults.rows_per_page),
            site_url: file
                .auth
                .site_url
                .clone()
                .unwrap_or(defaults.site_url),
            reset_redirect_url: file.auth.reset_redirect_url.clone(),
        }
    }

    /// Redirect target for password-recovery emails.
    #[must_use]
    pub fn reset_redirect(&self) -> String {
        self.reset_redirect_url.clone().unwrap_or_else(|| {
            format!("{}/reset-password", self.site_url.trim_end_matches('/'))
        })
    }

    /// Build a [`SupabaseConfig`] from this configuration, if the backend
    /// URL and anon key are both present.
    ///
    /// Returns `None` when either is missing or empty.
    #[must_use]
    pub fn to_backend_config(&self) -> Option<SupabaseConfig> {
        let url = self.backend_url.clone().filter(|u| !u.is_empty())?;
        let anon_key = self.anon_key.clone().filter(|k| !k.is_empty())?;

        Some(SupabaseConfig {
            url,
            anon_key,
            connect_timeout: self.connect_timeout,
            session_file: if self.persist_session {
                self.session_file.clone()
            } else {
                None
            },
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task tracker client for a Supabase backend")]
pub struct CliArgs {
    /// Base URL of the Supabase project.
    #[arg(long, env = "SMARTTASK_URL")]
    pub url: Option<String>,

    /// Public (anon) API key of the project.
    #[arg(long, env = "SMARTTASK_ANON_KEY", hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Path to config file (default: `~/.config/smarttask/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to keep the session between runs.
    #[arg(long, env = "SMARTTASK_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Page size for `tasks list` (10, 20 or 50).
    #[arg(long)]
    pub rows_per_page: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SMARTTASK_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/smarttask.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account.
    Signup {
        email: String,
        #[arg(long, env = "SMARTTASK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and keep the session for later commands.
    Login {
        email: String,
        #[arg(long, env = "SMARTTASK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the current session.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Manage your tasks.
    Tasks {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// List users that tasks can be assigned to.
    Users,
    /// Email a password-recovery link.
    ForgotPassword { email: String },
    /// Set a new password for the logged-in account.
    ResetPassword {
        #[arg(long, env = "SMARTTASK_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show where a route leads for the current session.
    Open { path: String },
}

/// `tasks` subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Show one page of your tasks.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Create a task assigned to you.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Replace a task's title and description.
    Edit {
        id: String,
        title: String,
        /// New description; the current one is kept when omitted.
        #[arg(long)]
        description: Option<String>,
        /// Reassign to this user id.
        #[arg(long)]
        assign: Option<String>,
    },
    /// Change a task's status.
    Status { id: String, status: TaskStatus },
    /// Delete a task.
    Rm { id: String },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn default_session_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("smarttask").join("session.bin"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("smarttask").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
