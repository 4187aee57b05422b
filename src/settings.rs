//! Settings file for papercoder.
//!
//! Settings are layered: `papercoder.toml` → environment (`.env` is loaded
//! first) → CLI flags. Every section is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! reasoning_effort = "high"
//! reasoning_models = ["o3-mini", "o4-mini"]
//! timeout_secs = 600
//!
//! [context]
//! limit = "100%"
//! model_window_chars = 800000
//!
//! [pricing."o3-mini"]
//! input_per_million = 1.10
//! cached_input_per_million = 0.55
//! output_per_million = 4.40
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::budget::{DEFAULT_MODEL_WINDOW_CHARS, parse_context_limit};
use crate::cost::{ModelPrice, PriceTable};
use crate::errors::ConfigError;

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "papercoder.toml";

/// Official endpoint used when neither the settings file nor the environment
/// names one.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Reasoning effort sent to reasoning-capable models
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,
    /// Model name fragments that accept a reasoning effort
    #[serde(default = "default_reasoning_models")]
    pub reasoning_models: Vec<String>,
    /// Request timeout enforced by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_reasoning_effort() -> String {
    "high".to_string()
}

fn default_reasoning_models() -> Vec<String> {
    vec!["o3-mini".to_string(), "o4-mini".to_string()]
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_api_key_env(),
            reasoning_effort: default_reasoning_effort(),
            reasoning_models: default_reasoning_models(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Prompt size budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// Percentage of the model window (e.g. "80%") or absolute characters
    #[serde(default = "default_context_limit")]
    pub limit: String,
    /// Model input window in characters
    #[serde(default = "default_model_window_chars")]
    pub model_window_chars: usize,
}

fn default_context_limit() -> String {
    "100%".to_string()
}

fn default_model_window_chars() -> usize {
    DEFAULT_MODEL_WINDOW_CHARS
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            limit: default_context_limit(),
            model_window_chars: default_model_window_chars(),
        }
    }
}

/// The complete papercoder.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub context: ContextSection,
    /// Per-model prices, merged over the built-in table
    #[serde(default)]
    pub pricing: BTreeMap<String, ModelPrice>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse(&content).map_err(|e| {
            ConfigError::InvalidSettings {
                path: path.to_path_buf(),
                message: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Parse settings from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("Failed to parse papercoder.toml")?;
        parse_context_limit(&settings.context.limit)?;
        Ok(settings)
    }

    /// Load an explicit settings file, or `./papercoder.toml` when present,
    /// or defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingInput {
                        what: "settings file",
                        path: path.to_path_buf(),
                    }
                    .into());
                }
                Self::load(path)
            }
            None => {
                let default_path = PathBuf::from(SETTINGS_FILE);
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Base URL, normalized to end with `/v1`.
    ///
    /// Resolution order: settings file, `OPENAI_API_BASE`, official endpoint.
    pub fn api_base(&self) -> String {
        let raw = self
            .gateway
            .base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_API_BASE").ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        normalize_api_base(&raw)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.gateway.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.gateway.api_key_env.clone()))
    }

    /// Reasoning effort for `model`, if it is reasoning-capable.
    pub fn reasoning_effort_for(&self, model: &str) -> Option<String> {
        self.gateway
            .reasoning_models
            .iter()
            .any(|fragment| model.contains(fragment.as_str()))
            .then(|| self.gateway.reasoning_effort.clone())
    }

    /// Effective prompt budget in characters.
    pub fn context_budget(&self) -> Result<usize> {
        let limit = parse_context_limit(&self.context.limit)?;
        Ok(limit.effective_limit(self.context.model_window_chars))
    }

    /// Built-in prices overlaid with the `[pricing]` section.
    pub fn price_table(&self) -> PriceTable {
        let mut table = PriceTable::builtin();
        for (model, price) in &self.pricing {
            table.insert(model, *price);
        }
        table
    }
}

/// Trim trailing slashes and make sure the URL ends with `/v1`.
pub fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.gateway.api_key_env, "OPENAI_API_KEY");
        assert_eq!(settings.gateway.reasoning_effort, "high");
        assert_eq!(settings.context.limit, "100%");
        assert_eq!(
            settings.context_budget().unwrap(),
            DEFAULT_MODEL_WINDOW_CHARS
        );
    }

    #[test]
    fn test_parse_full_file() {
        let content = r#"
[gateway]
base_url = "http://localhost:3000"
reasoning_effort = "medium"
reasoning_models = ["o1"]

[context]
limit = "50%"
model_window_chars = 1000

[pricing."my-model"]
input_per_million = 2.0
cached_input_per_million = 1.0
output_per_million = 8.0
"#;
        let settings = Settings::parse(content).unwrap();
        assert_eq!(settings.api_base(), "http://localhost:3000/v1");
        assert_eq!(settings.context_budget().unwrap(), 500);
        assert_eq!(settings.reasoning_effort_for("o1-preview").as_deref(), Some("medium"));
        assert_eq!(settings.reasoning_effort_for("gpt-4o"), None);
        assert!(settings.price_table().lookup("my-model").is_some());
    }

    #[test]
    fn test_parse_rejects_bad_context_limit() {
        let content = "[context]\nlimit = \"150%\"\n";
        assert!(Settings::parse(content).is_err());
    }

    #[test]
    fn test_reasoning_effort_for_default_models() {
        let settings = Settings::default();
        assert_eq!(settings.reasoning_effort_for("o3-mini").as_deref(), Some("high"));
        assert_eq!(
            settings.reasoning_effort_for("o4-mini-2025-04-16").as_deref(),
            Some("high")
        );
        assert_eq!(settings.reasoning_effort_for("gpt-4.1"), None);
    }

    #[test]
    fn test_normalize_api_base() {
        assert_eq!(normalize_api_base("http://host:3000"), "http://host:3000/v1");
        assert_eq!(normalize_api_base("http://host:3000/"), "http://host:3000/v1");
        assert_eq!(normalize_api_base("http://host/v1/"), "http://host/v1");
    }

    #[test]
    fn test_load_or_default_missing_explicit_is_config_error() {
        let dir = tempdir().unwrap();
        let err = Settings::load_or_default(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(crate::errors::find_config_error(&err).is_some());
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("papercoder.toml");
        std::fs::write(&path, "[gateway\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(
            crate::errors::find_config_error(&err),
            Some(ConfigError::InvalidSettings { .. })
        ));
    }
}
