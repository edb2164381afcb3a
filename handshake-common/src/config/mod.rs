//! Configuration system for the handshake sync agent.
//!
//! Every setting comes from a `HANDSHAKE_*` environment variable or a
//! built-in default; command-line flags may override a few of them.
//! All parse failures are collected and reported together.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use serde::Serialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::identifier::DEFAULT_ALLOWED_HOST;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_GIT_BINARY: &str = "git";
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CONCURRENT_GIT: u64 = 6;

/// How the graph walk reacts to a dependency that cannot be resolved or loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort the whole handshake on the first failure.
    #[default]
    FailFast,
    /// Record the failure for that dependency and keep walking.
    CollectPartial,
}

impl FailureMode {
    pub const CHOICES: &'static [&'static str] = &["fail_fast", "collect_partial"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fail_fast" => Some(Self::FailFast),
            "collect_partial" => Some(Self::CollectPartial),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail_fast"),
            Self::CollectPartial => write!(f, "collect_partial"),
        }
    }
}

/// Console log rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Fully resolved process configuration.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeConfig {
    /// Root under which every working copy lives. Created on first use,
    /// never pruned.
    pub work_dir: Sourced<PathBuf>,
    pub port: Sourced<u16>,
    pub bind_addr: Sourced<IpAddr>,
    pub git_binary: Sourced<String>,
    pub git_timeout_secs: Sourced<u64>,
    pub max_concurrent_git: Sourced<u64>,
    pub failure_mode: Sourced<FailureMode>,
    pub allowed_hosts: Sourced<Vec<String>>,
    pub log_level: Sourced<String>,
    pub log_format: Sourced<LogFormat>,
    pub log_file: Sourced<Option<PathBuf>>,
}

/// All configuration errors found in one pass.
#[derive(Debug)]
pub struct ConfigErrors(pub Vec<EnvError>);

impl std::fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} invalid configuration value(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

impl HandshakeConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigErrors> {
        let mut parser = EnvParser::new();

        let work_dir = parser.get_path("WORK_DIR", default_work_dir());
        let port = parser.get_u16_range("PORT", DEFAULT_PORT, 1, u16::MAX);
        let bind_raw = parser.get_string("BIND_ADDR", DEFAULT_BIND_ADDR);
        let git_binary = parser.get_string("GIT_BINARY", DEFAULT_GIT_BINARY);
        let git_timeout_secs =
            parser.get_u64_range("GIT_TIMEOUT_SECS", DEFAULT_GIT_TIMEOUT_SECS, 1, 3600);
        let max_concurrent_git =
            parser.get_u64_range("MAX_CONCURRENT_GIT", DEFAULT_MAX_CONCURRENT_GIT, 1, 64);
        let failure_raw = parser.get_choice("FAILURE_MODE", "fail_fast", FailureMode::CHOICES);
        let allowed_hosts =
            parser.get_string_list("ALLOWED_HOSTS", vec![DEFAULT_ALLOWED_HOST.to_string()]);
        let log_level = parser.get_log_level("LOG_LEVEL", "info");
        let format_raw = parser.get_choice("LOG_FORMAT", "pretty", &["pretty", "json"]);
        let log_file = parser.get_optional_path("LOG_FILE");

        let bind_addr = match bind_raw.value.trim().parse::<IpAddr>() {
            Ok(addr) => Some(Sourced {
                value: addr,
                source: bind_raw.source,
                var: bind_raw.var,
            }),
            Err(_) => {
                parser.record(EnvError::InvalidValue {
                    var: "HANDSHAKE_BIND_ADDR".to_string(),
                    expected: "IP address".to_string(),
                    value: bind_raw.value,
                });
                None
            }
        };

        let (false, Some(bind_addr)) = (parser.has_errors(), bind_addr) else {
            return Err(ConfigErrors(parser.take_errors()));
        };

        Ok(Self {
            work_dir,
            port,
            bind_addr,
            git_binary,
            git_timeout_secs,
            max_concurrent_git,
            failure_mode: Sourced {
                value: FailureMode::parse(&failure_raw.value).unwrap_or_default(),
                source: failure_raw.source,
                var: failure_raw.var,
            },
            allowed_hosts,
            log_level,
            log_format: Sourced {
                value: if format_raw.value == "json" {
                    LogFormat::Json
                } else {
                    LogFormat::Pretty
                },
                source: format_raw.source,
                var: format_raw.var,
            },
            log_file,
        })
    }

    /// Per-operation git timeout.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs.value)
    }

    /// Override the working-copy root from the command line.
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = Sourced::from_cli(work_dir);
        self
    }

    /// Override the listen port from the command line.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Sourced::from_cli(port);
        self
    }
}

fn default_work_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("handshake")
        .join("work")
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
