//! Configuration file handling.
//!
//! This module loads the `ctigen.toml` configuration. Every key the
//! pipeline reads is required: a missing key is a configuration bug and
//! fails the load instead of falling back to a default.

use crate::models::ModelSettings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "ctigen.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the environment variable holding the API key.
    pub api_key_env_var: String,

    /// Base URL of the generative language API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Where the analysis scripts live.
    pub input: InputConfig,

    /// Where the reports are written.
    pub output: OutputConfig,

    /// Pacing and size settings for report generation.
    pub report_settings: ReportSettings,

    /// Model identifiers per role.
    pub models: ModelsConfig,

    /// Harm category to block threshold.
    pub safety_settings: BTreeMap<String, String>,

    /// Sampling parameters per role.
    pub generation_configs: GenerationConfigs,

    /// Prompt template file paths.
    pub prompts: PromptsConfig,
}

/// Input script settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory scanned for analysis scripts.
    pub directory: PathBuf,

    /// Glob pattern, relative to `directory`.
    pub file_pattern: String,
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, created if missing.
    pub directory: PathBuf,

    /// Base filename; parts are written as `<base>_<part>.md`.
    pub base_filename: String,

    /// Title used in each report heading.
    #[serde(default = "default_title")]
    pub title: String,
}

/// Report pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Pause between part 1 and part 2, in seconds.
    pub interval_seconds: u64,

    /// Soft limit on the estimated prompt size. Exceeding it only warns.
    #[serde(default)]
    pub max_input_tokens: Option<u64>,
}

/// Model identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for both report parts.
    pub report_model: String,

    /// Model used for the diagram and the chat session.
    pub other_model: String,
}

/// Generation parameter tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfigs {
    pub report_generation: GenerationParams,
    pub other_generation: GenerationParams,
}

/// Parameter name to value, passed through to the service.
pub type GenerationParams = BTreeMap<String, Value>;

/// Prompt template locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    pub part1_file: PathBuf,
    pub part2_file: PathBuf,
    pub mermaid_file: PathBuf,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_title() -> String {
    "Cyber Threat Intelligence Report".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_key_env_var", self.api_key_env_var.as_str()),
            ("input.file_pattern", self.input.file_pattern.as_str()),
            ("output.base_filename", self.output.base_filename.as_str()),
            ("models.report_model", self.models.report_model.as_str()),
            ("models.other_model", self.models.other_model.as_str()),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("Configuration key '{}' must not be empty", key);
            }
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            bail!("api_base must start with 'http://' or 'https://'");
        }

        Ok(())
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(
                "Environment variable '{}' is not set or is empty. Set it to your API key.",
                self.api_key_env_var
            ),
        }
    }

    /// Settings for both report parts.
    pub fn report_model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.models.report_model.clone(),
            generation: self.generation_configs.report_generation.clone(),
            safety: self.safety_settings.clone(),
        }
    }

    /// Settings for the diagram and the chat session.
    pub fn other_model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.models.other_model.clone(),
            generation: self.generation_configs.other_generation.clone(),
            safety: self.safety_settings.clone(),
        }
    }

    /// Override settings from command-line arguments.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_base) = args.api_base {
            self.api_base = api_base.clone();
        }
    }

    /// Sample configuration written by `--init-config`.
    pub fn sample_toml() -> &'static str {
        SAMPLE_CONFIG
    }
}

const SAMPLE_CONFIG: &str = r#"# ctigen configuration

# Environment variable that holds the Gemini API key
api_key_env_var = "GOOGLE_API_KEY"

[input]
directory = "scripts"
file_pattern = "*.py"

[output]
directory = "reports"
base_filename = "cti_report"
title = "Cyber Threat Intelligence Report"

[report_settings]
interval_seconds = 60
# max_input_tokens = 900000

[models]
report_model = "gemini-1.5-pro-latest"
other_model = "gemini-1.5-flash-latest"

[safety_settings]
HARM_CATEGORY_HARASSMENT = "BLOCK_NONE"
HARM_CATEGORY_HATE_SPEECH = "BLOCK_NONE"
HARM_CATEGORY_SEXUALLY_EXPLICIT = "BLOCK_NONE"
HARM_CATEGORY_DANGEROUS_CONTENT = "BLOCK_NONE"

[generation_configs.report_generation]
temperature = 0.4
top_p = 0.95
top_k = 40
max_output_tokens = 8192

[generation_configs.other_generation]
temperature = 0.2
max_output_tokens = 4096

[prompts]
part1_file = "prompts/part1.txt"
part2_file = "prompts/part2.txt"
mermaid_file = "prompts/mermaid.txt"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config = Config::parse(Config::sample_toml()).unwrap();
        assert_eq!(config.api_key_env_var, "GOOGLE_API_KEY");
        assert_eq!(config.input.file_pattern, "*.py");
        assert_eq!(config.report_settings.interval_seconds, 60);
        assert_eq!(config.report_settings.max_input_tokens, None);
        assert_eq!(
            config.safety_settings.get("HARM_CATEGORY_HARASSMENT").map(String::as_str),
            Some("BLOCK_NONE")
        );
        assert_eq!(
            config.generation_configs.report_generation["max_output_tokens"],
            serde_json::json!(8192)
        );
        assert!(config.api_base.contains("generativelanguage"));

        let other = config.other_model_settings();
        assert_eq!(other.model, "gemini-1.5-flash-latest");
        assert_eq!(other.safety.len(), 4);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let without_models = Config::sample_toml()
            .replace("report_model = \"gemini-1.5-pro-latest\"\n", "");
        let err = Config::parse(&without_models).unwrap_err();
        assert!(format!("{err:#}").contains("report_model"));
    }

    #[test]
    fn test_missing_section_fails() {
        let without_prompts = Config::sample_toml()
            .split("[prompts]")
            .next()
            .unwrap()
            .to_string();
        assert!(Config::parse(&without_prompts).is_err());
    }

    #[test]
    fn test_empty_value_fails_validation() {
        let empty_pattern = Config::sample_toml().replace("\"*.py\"", "\"\"");
        let err = Config::parse(&empty_pattern).unwrap_err();
        assert!(err.to_string().contains("input.file_pattern"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/ctigen.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_api_key_missing_env_var() {
        let mut config = Config::parse(Config::sample_toml()).unwrap();
        config.api_key_env_var = "CTIGEN_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let err = config.api_key().unwrap_err();
        assert!(err.to_string().contains("CTIGEN_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
