//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before the service runs.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    local_paths, DEFAULT_CONTAINER_MEMORY_LIMIT_MB, DEFAULT_EXECUTION_TIMEOUT_SECONDS,
    DEFAULT_LLM_TIMEOUT_SECONDS, DEFAULT_POOL_SIZE, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    LLM_API_KEY_ENV,
};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub grader: GraderConfig,
    pub docker: DockerConfig,
    pub local: LocalConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

/// Which execution backend grades submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Warm Docker containers, pooled per language
    #[default]
    Docker,
    /// Tools run directly on the host as subprocesses
    Subprocess,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "docker" | "container" => Ok(Self::Docker),
            "subprocess" | "local" => Ok(Self::Subprocess),
            _ => Err(ConfigError::InvalidValue("GRADER_BACKEND".to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => f.write_str("docker"),
            Self::Subprocess => f.write_str("subprocess"),
        }
    }
}

/// Grading engine configuration shared by both backends
#[derive(Debug, Clone)]
pub struct GraderConfig {
    pub backend: BackendKind,
    /// Warm units per language (container backend)
    pub pool_size: usize,
    /// Default per-call timeout
    pub execution_timeout: Duration,
    /// Per-call timeout for the LLM language
    pub llm_timeout: Duration,
    /// Upstream API key handed to the LLM environment
    pub llm_api_key: Option<String>,
}

/// Docker configuration for grading containers
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Explicit socket path; the platform default is used when unset
    pub socket_path: Option<String>,
    pub memory_limit_mb: u64,
}

/// Paths used by the subprocess backend
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Pristine copy of the lesson database
    pub sql_source: PathBuf,
    /// Working copy the learner queries
    pub sql_database: PathBuf,
    pub git_repo: PathBuf,
    pub workspace: PathBuf,
    pub user_input: PathBuf,
    pub user_script: PathBuf,
    pub llm_mode: PathBuf,
    /// Directory holding the validator and dispatcher scripts
    pub scripts_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            grader: GraderConfig::from_env()?,
            docker: DockerConfig::from_env()?,
            local: LocalConfig::from_env(),
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl GraderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("GRADER_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => BackendKind::default(),
        };

        let pool_size: usize = parse_var("POOL_SIZE", DEFAULT_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue("POOL_SIZE".to_string()));
        }

        Ok(Self {
            backend,
            pool_size,
            execution_timeout: Duration::from_secs(parse_var(
                "EXECUTION_TIMEOUT_SECONDS",
                DEFAULT_EXECUTION_TIMEOUT_SECONDS,
            )?),
            llm_timeout: Duration::from_secs(parse_var(
                "LLM_TIMEOUT_SECONDS",
                DEFAULT_LLM_TIMEOUT_SECONDS,
            )?),
            llm_api_key: env::var(LLM_API_KEY_ENV).ok().filter(|key| !key.is_empty()),
        })
    }
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            pool_size: DEFAULT_POOL_SIZE,
            execution_timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECONDS),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECONDS),
            llm_api_key: None,
        }
    }
}

impl DockerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            socket_path: env::var("DOCKER_SOCKET").ok(),
            memory_limit_mb: parse_var(
                "CONTAINER_MEMORY_LIMIT_MB",
                DEFAULT_CONTAINER_MEMORY_LIMIT_MB,
            )?,
        })
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            memory_limit_mb: DEFAULT_CONTAINER_MEMORY_LIMIT_MB,
        }
    }
}

impl LocalConfig {
    fn from_env() -> Self {
        let path = |key: &str, default: &str| {
            PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
        };

        Self {
            sql_source: path("GRADER_SQL_SOURCE", local_paths::SQL_SOURCE),
            sql_database: path("GRADER_SQL_DB", local_paths::SQL_DATABASE),
            git_repo: path("GRADER_GIT_REPO", local_paths::GIT_REPO),
            workspace: path("GRADER_WORKSPACE", local_paths::WORKSPACE),
            user_input: path("GRADER_USER_INPUT", local_paths::USER_INPUT),
            user_script: path("GRADER_USER_SCRIPT", local_paths::USER_SCRIPT),
            llm_mode: path("GRADER_LLM_MODE", local_paths::LLM_MODE),
            scripts_dir: path("GRADER_SCRIPTS_DIR", local_paths::SCRIPTS_DIR),
        }
    }

    /// Place every piece of shared state under one root directory
    pub fn rooted_at(root: &std::path::Path) -> Self {
        Self {
            sql_source: root.join("company.db.original"),
            sql_database: root.join("company.db"),
            git_repo: root.join("git-repo"),
            workspace: root.join("workspace"),
            user_input: root.join("user-input"),
            user_script: root.join("user-script.sh"),
            llm_mode: root.join("llm_mode"),
            scripts_dir: root.join("scripts"),
        }
    }
}

/// Parse an environment variable, falling back to a default when unset
fn parse_var<T: FromStr + ToString>(key: &str, default: T) -> Result<T, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            rust_log: "info".to_string(),
        };
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let grader = GraderConfig::default();
        assert_eq!(grader.backend, BackendKind::Docker);
        assert_eq!(grader.pool_size, 3);
        assert_eq!(grader.execution_timeout, Duration::from_secs(10));
        assert_eq!(grader.llm_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("docker".parse::<BackendKind>().unwrap(), BackendKind::Docker);
        assert_eq!(" Subprocess ".parse::<BackendKind>().unwrap(), BackendKind::Subprocess);
        assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Subprocess);
        assert!(matches!(
            "kubernetes".parse::<BackendKind>(),
            Err(ConfigError::InvalidValue(key)) if key == "GRADER_BACKEND"
        ));
    }

    #[test]
    fn test_rooted_local_config_stays_under_root() {
        let root = std::path::Path::new("/srv/grader");
        let local = LocalConfig::rooted_at(root);
        for path in [
            &local.sql_source,
            &local.sql_database,
            &local.git_repo,
            &local.workspace,
            &local.user_input,
            &local.user_script,
            &local.llm_mode,
            &local.scripts_dir,
        ] {
            assert!(path.starts_with(root), "{} escapes root", path.display());
        }
    }
}
