//! Runtime configuration: where the JSON stores live, HTTP client settings
//! and whether OCR is attempted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

const ENV_DATA_DIR: &str = "PACS_AUTOMATION_DATA_DIR";
const ENV_HTTP_TIMEOUT_MS: &str = "PACS_AUTOMATION_HTTP_TIMEOUT_MS";
const ENV_USER_AGENT: &str = "PACS_AUTOMATION_USER_AGENT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutomationConfig {
    pub data_dir: PathBuf,
    pub bookmarks_file: String,
    pub procedures_file: String,
    pub http: HttpConfig,
    pub ocr_enabled: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bookmarks_file: "ui-bookmarks.json".to_string(),
            procedures_file: "ui-procedures.json".to_string(),
            http: HttpConfig::default(),
            ocr_enabled: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pacs-automation")
}

impl AutomationConfig {
    /// Defaults overlaid with `PACS_AUTOMATION_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup; `from_env` passes the
    /// process environment.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.http.timeout_ms = ms,
                Err(e) => warn!("ignoring {}={:?}: {}", ENV_HTTP_TIMEOUT_MS, raw, e),
            }
        }
        if let Some(ua) = lookup(ENV_USER_AGENT).filter(|v| !v.trim().is_empty()) {
            self.http.user_agent = ua;
        }
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn bookmarks_path(&self) -> PathBuf {
        self.data_dir.join(&self.bookmarks_file)
    }

    pub fn procedures_path(&self) -> PathBuf {
        self.data_dir.join(&self.procedures_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_apply_and_bad_numbers_are_ignored() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/pacs"),
            (ENV_HTTP_TIMEOUT_MS, "not-a-number"),
            (ENV_USER_AGENT, "test-agent"),
        ]
        .into_iter()
        .collect();

        let cfg = AutomationConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/pacs"));
        assert_eq!(cfg.http.timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);
        assert_eq!(cfg.http.user_agent, "test-agent");
        assert_eq!(cfg.bookmarks_path(), PathBuf::from("/tmp/pacs/ui-bookmarks.json"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AutomationConfig =
            serde_json::from_str(r#"{"ocr_enabled": false, "http": {"timeout_ms": 500}}"#).unwrap();
        assert!(!cfg.ocr_enabled);
        assert_eq!(cfg.http.timeout_ms, 500);
        assert_eq!(cfg.http.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.procedures_file, "ui-procedures.json");
    }
}
