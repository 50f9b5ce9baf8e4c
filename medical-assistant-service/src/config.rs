use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConfigError;

const BUILTIN_CONFIG: &str = include_str!("../assistant.yaml");

/// Startup configuration for the assistant.
///
/// The term list and follow-up questions are data, not code: they are read
/// once at startup, validated, and then shared immutably behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub valid_terms: Vec<String>,
    pub followup_questions: Vec<String>,
    #[serde(default = "default_label")]
    pub assistant_label: String,
    #[serde(default = "default_consultation_log")]
    pub consultation_log: PathBuf,
    #[serde(default = "default_analysis_log")]
    pub analysis_log: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum number of cached generations. `None` keeps every entry.
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
    /// Sessions with no activity for this long are dropped.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_label() -> String {
    "AIMCA: ".to_string()
}

fn default_consultation_log() -> PathBuf {
    PathBuf::from("logs/medical_consultation_log.txt")
}

fn default_analysis_log() -> PathBuf {
    PathBuf::from("logs/pathology_analysis_log.txt")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_upload() -> usize {
    20 * 1024 * 1024
}

fn default_session_idle() -> u64 {
    30 * 60
}

fn default_max_sessions() -> usize {
    10_000
}

impl AssistantConfig {
    /// The configuration compiled into the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CONFIG)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AssistantConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the file named by `ASSISTANT_CONFIG`, or fall back to the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("ASSISTANT_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => {
                info!("ASSISTANT_CONFIG not set, using built-in configuration");
                Self::builtin()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.valid_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "valid_terms must contain at least one term".to_string(),
            ));
        }
        if self.followup_questions.iter().any(|q| q.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "followup_questions must not contain blank entries".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.session_idle_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_idle_secs must be positive".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "max_sessions must be positive".to_string(),
            ));
        }
        if self.cache_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "cache_capacity must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_has_original_terms_and_questions() {
        let config = AssistantConfig::builtin().unwrap();
        assert_eq!(config.valid_terms.len(), 90);
        assert_eq!(config.followup_questions.len(), 5);
        assert_eq!(config.assistant_label, "AIMCA: ");
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.cache_capacity.is_none());
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = AssistantConfig::from_yaml(
            "valid_terms: [fever]\nfollowup_questions: [\"Anything else?\"]\n",
        )
        .unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(
            config.analysis_log,
            PathBuf::from("logs/pathology_analysis_log.txt")
        );
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.session_idle_secs, 1800);
        assert_eq!(config.max_sessions, 10_000);
    }

    #[test]
    fn rejects_empty_term_list() {
        let result = AssistantConfig::from_yaml("valid_terms: []\nfollowup_questions: []\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_blank_followup_question() {
        let result =
            AssistantConfig::from_yaml("valid_terms: [cough]\nfollowup_questions: [\"  \"]\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = AssistantConfig::from_yaml(
            "valid_terms: [cough]\nfollowup_questions: []\nrequest_timeout_secs: 0\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_session_limits() {
        let idle = AssistantConfig::from_yaml(
            "valid_terms: [cough]\nfollowup_questions: []\nsession_idle_secs: 0\n",
        );
        assert!(matches!(idle, Err(ConfigError::Invalid(_))));

        let cap = AssistantConfig::from_yaml(
            "valid_terms: [cough]\nfollowup_questions: []\nmax_sessions: 0\n",
        );
        assert!(matches!(cap, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = AssistantConfig::from_file(Path::new("/definitely/not/here.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
