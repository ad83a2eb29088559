//! Client configuration and service factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examsession_core::controller::{SessionConfig, DEFAULT_DURATION_SECS};
use examsession_core::submission::SubmissionConfig;

use crate::http::{HttpExamService, DEFAULT_BASE_URL};

/// Top-level examsession configuration.
///
/// Note: Custom Debug impl masks the API token to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Root of the exam platform API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token for the platform, if it requires one.
    #[serde(default)]
    pub api_token: Option<String>,
    /// HTTP timeout for every request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound for one subject's scoring request (unset = no bound).
    #[serde(default)]
    pub submit_timeout_secs: Option<u64>,
    /// Default exam length when the plan does not set one.
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    /// Length of one countdown unit in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// The acting user.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Where completed outcomes are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl std::fmt::Debug for ExamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("submit_timeout_secs", &self.submit_timeout_secs)
            .field("duration_secs", &self.duration_secs)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("user_id", &self.user_id)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_duration() -> u64 {
    DEFAULT_DURATION_SECS
}
fn default_tick_interval() -> u64 {
    1000
}
fn default_user_id() -> String {
    "anonymous".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./examsession-results")
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout(),
            submit_timeout_secs: None,
            duration_secs: default_duration(),
            tick_interval_ms: default_tick_interval(),
            user_id: default_user_id(),
            output_dir: default_output_dir(),
        }
    }
}

impl ExamConfig {
    /// Session settings derived from this configuration.
    ///
    /// `duration_override` comes from the plan or the command line.
    pub fn session_config(&self, duration_override: Option<u64>) -> SessionConfig {
        SessionConfig {
            user_id: self.user_id.clone(),
            duration_secs: duration_override.unwrap_or(self.duration_secs),
            tick: Duration::from_millis(self.tick_interval_ms.max(1)),
            submission: SubmissionConfig {
                request_timeout: self.submit_timeout_secs.map(Duration::from_secs),
            },
        }
    }

    /// Build the HTTP client for both content and scoring.
    pub fn http_service(&self) -> Result<HttpExamService> {
        HttpExamService::new(
            &self.base_url,
            self.api_token.clone(),
            Some(Duration::from_secs(self.request_timeout_secs)),
        )
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examsession.toml` in the current directory
/// 2. `~/.config/examsession/config.toml`
///
/// Environment variable overrides: `EXAMSESSION_API_TOKEN`, `EXAMSESSION_BASE_URL`.
pub fn load_config() -> Result<ExamConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examsession.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamConfig::default(),
    };

    // Apply env var overrides
    if let Ok(token) = std::env::var("EXAMSESSION_API_TOKEN") {
        config.api_token = Some(token);
    }
    if let Ok(url) = std::env::var("EXAMSESSION_BASE_URL") {
        config.base_url = url;
    }

    config.base_url = resolve_env_vars(&config.base_url);
    config.api_token = config
        .api_token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.is_empty());

    Ok(config)
}

fn parse_config(content: &str) -> Result<ExamConfig> {
    let config: ExamConfig = toml::from_str(content)?;
    if config.tick_interval_ms == 0 {
        anyhow::bail!("tick_interval_ms must be positive");
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examsession"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMSESSION_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMSESSION_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMSESSION_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no_close_${X"), "no_close_${X");
        std::env::remove_var("_EXAMSESSION_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.duration_secs, 10_800);
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
base_url = "https://exams.example.test/api/v1"
api_token = "tok"
submit_timeout_secs = 20
user_id = "42"
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://exams.example.test/api/v1");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.user_id, "42");

        let session = config.session_config(Some(60));
        assert_eq!(session.duration_secs, 60);
        assert_eq!(session.user_id, "42");
        assert_eq!(session.tick, Duration::from_secs(1));
        assert_eq!(
            session.submission.request_timeout,
            Some(Duration::from_secs(20))
        );
        assert_eq!(config.session_config(None).duration_secs, 10_800);
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(parse_config("tick_interval_ms = 0").is_err());
    }

    #[test]
    fn debug_masks_token() {
        let config = ExamConfig {
            api_token: Some("super-secret".into()),
            ..ExamConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn explicit_missing_path_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/examsession.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examsession.toml");
        std::fs::write(&path, "duration_secs = 900\noutput_dir = \"out\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.duration_secs, 900);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }
}
