//! Configuration file support for cleaning runs

use anyhow::{Context, Result};
use reviewclean_core::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete run configuration: file locations plus pipeline settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

/// Input configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Raw review file (CSV or JSONL, optionally gzipped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Cleaned dataset; format follows the extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Restrict and order output columns. All columns when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Quality reports are appended here as JSON lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
}

fn config_format(path: &Path) -> Result<ConfigFormat> {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match extension {
        "yaml" | "yml" => Ok(ConfigFormat::Yaml),
        "toml" => Ok(ConfigFormat::Toml),
        _ => Err(anyhow::anyhow!(
            "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
            extension
        )),
    }
}

impl RunConfig {
    /// Load configuration from a file (YAML or TOML)
    pub fn load(path: &Path) -> Result<Self> {
        let format = config_format(path)?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
        };

        config
            .pipeline
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match config_format(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Default settings with example file locations filled in
    pub fn example() -> Self {
        Self {
            input: InputConfig {
                path: Some(PathBuf::from("data/amazon_reviews.csv")),
            },
            output: OutputConfig {
                path: Some(PathBuf::from("data/amazon_reviews.clean.csv")),
                columns: None,
                history: Some(PathBuf::from("data/quality_history.jsonl")),
            },
            pipeline: PipelineConfig::default(),
        }
    }

    /// Command-line paths win over the file
    pub fn with_overrides(
        mut self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        history: Option<PathBuf>,
    ) -> Self {
        if input.is_some() {
            self.input.path = input;
        }
        if output.is_some() {
            self.output.path = output;
        }
        if history.is_some() {
            self.output.history = history;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewclean_core::quality::{EnforcementMode, Threshold};
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reviewclean.yaml");
        let config = RunConfig::example();

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reviewclean.toml");
        let config = RunConfig::example();

        config.save(&path).unwrap();
        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(config.input, loaded.input);
        assert_eq!(config.pipeline.sentiment, loaded.pipeline.sentiment);
        assert_eq!(config.pipeline.quality, loaded.pipeline.quality);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.yml");
        std::fs::write(
            &path,
            "input:\n  path: reviews.csv\nquality:\n  policy:\n    unknown_sentiment_pct:\n      max_pct: 30\n      mode: block\n",
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.input.path, Some(PathBuf::from("reviews.csv")));
        assert_eq!(
            config.pipeline.quality.policy.unknown_sentiment_pct,
            Threshold::block(30.0)
        );
        assert_eq!(
            config.pipeline.quality.policy.dedup_key_null_pct.mode,
            EnforcementMode::Block
        );
        assert_eq!(config.pipeline.language.allowed_languages, vec!["eng".to_string()]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[dedup]\nkey_columns = []\n").unwrap();
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        assert!(RunConfig::example().save(&path).is_err());
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = RunConfig::example().with_overrides(Some(PathBuf::from("in.csv")), None, None);
        assert_eq!(config.input.path, Some(PathBuf::from("in.csv")));
        assert_eq!(
            config.output.path,
            Some(PathBuf::from("data/amazon_reviews.clean.csv"))
        );
    }
}
