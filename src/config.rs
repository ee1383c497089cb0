//! Configuration file support
//!
//! Supports TOML configuration files with the following search order:
//! 1. `--config <path>` - explicitly specified path
//! 2. `./bookscan.toml` - current directory
//! 3. `~/.config/bookscan-ocr/config.toml` - user config
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [general]
//! book_type = "ancient"
//! languages = ["es", "en"]
//!
//! [engine]
//! command = "/opt/ocr/engine"
//! timeout_secs = 120
//!
//! [processing]
//! save_preprocessed = true
//! ```

use crate::pipeline::DEFAULT_EXTENSIONS;
use crate::profile::BookType;
use crate::recognize::ComputeDevice;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// General configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Book type tag (`modern` or `ancient`)
    #[serde(default)]
    pub book_type: Option<String>,

    /// Recognition language codes
    #[serde(default)]
    pub languages: Option<Vec<String>>,

    /// Verbosity level (0-2)
    #[serde(default)]
    pub verbose: Option<u8>,
}

/// Recognition engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Engine executable path
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// GPU device id; CPU when absent
    #[serde(default)]
    pub gpu_id: Option<u32>,

    /// Per-page recognition timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Processing configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingConfig {
    /// Run the preprocessing chain
    #[serde(default)]
    pub preprocess: Option<bool>,

    /// Persist preprocessed images
    #[serde(default)]
    pub save_preprocessed: Option<bool>,

    /// Page file extensions to pick up
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output directory for reports and artifacts
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// CLI-provided overrides; every set field takes precedence over the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub book_type: Option<String>,
    pub languages: Option<Vec<String>>,
    pub engine_command: Option<PathBuf>,
    pub gpu_id: Option<u32>,
    pub preprocess: Option<bool>,
    pub save_preprocessed: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub verbose: Option<u8>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub book_type: BookType,
    pub languages: Vec<String>,
    pub engine_command: PathBuf,
    pub device: ComputeDevice,
    pub timeout: Duration,
    pub preprocess: bool,
    pub save_preprocessed: bool,
    pub extensions: Vec<String>,
    pub output_dir: PathBuf,
    pub verbose: u8,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            book_type: BookType::Modern,
            languages: vec!["es".to_string(), "en".to_string()],
            engine_command: PathBuf::from("ocr-engine"),
            device: ComputeDevice::Cpu,
            timeout: Duration::from_secs(300),
            preprocess: true,
            save_preprocessed: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("./output"),
            verbose: 0,
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default search path
    pub fn load() -> Result<Self, ConfigError> {
        let current_dir_config = PathBuf::from("bookscan.toml");
        if current_dir_config.exists() {
            return Self::load_from_path(&current_dir_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bookscan-ocr").join("config.toml");
            if user_config.exists() {
                return Self::load_from_path(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Resolve run settings, applying CLI overrides on top of the file values
    /// (CLI takes precedence, defaults fill the rest)
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> RunSettings {
        let defaults = RunSettings::default();

        let book_tag = cli
            .book_type
            .clone()
            .or_else(|| self.general.book_type.clone());
        let book_type = book_tag
            .map(|tag| BookType::resolve(&tag))
            .unwrap_or(defaults.book_type);

        let gpu_id = cli.gpu_id.or(self.engine.gpu_id);

        RunSettings {
            book_type,
            languages: cli
                .languages
                .clone()
                .or_else(|| self.general.languages.clone())
                .unwrap_or(defaults.languages),
            engine_command: cli
                .engine_command
                .clone()
                .or_else(|| self.engine.command.clone())
                .unwrap_or(defaults.engine_command),
            device: gpu_id.map(ComputeDevice::Gpu).unwrap_or(ComputeDevice::Cpu),
            timeout: self
                .engine
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            preprocess: cli
                .preprocess
                .or(self.processing.preprocess)
                .unwrap_or(defaults.preprocess),
            save_preprocessed: cli
                .save_preprocessed
                .or(self.processing.save_preprocessed)
                .unwrap_or(defaults.save_preprocessed),
            extensions: self
                .processing
                .extensions
                .clone()
                .unwrap_or(defaults.extensions),
            output_dir: cli
                .output_dir
                .clone()
                .or_else(|| self.output.dir.clone())
                .unwrap_or(defaults.output_dir),
            verbose: cli
                .verbose
                .or(self.general.verbose)
                .unwrap_or(defaults.verbose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_resolves_to_defaults() {
        let settings = Config::default().merge_with_cli(&CliOverrides::default());
        assert_eq!(settings, RunSettings::default());
    }

    #[test]
    fn test_from_toml_full() {
        let config = Config::from_toml(
            r#"
            [general]
            book_type = "ancient"
            languages = ["fr"]
            verbose = 2

            [engine]
            command = "/opt/ocr/engine"
            gpu_id = 0
            timeout_secs = 120

            [processing]
            preprocess = false
            save_preprocessed = true
            extensions = ["png"]

            [output]
            dir = "/data/out"
            "#,
        )
        .unwrap();

        let settings = config.merge_with_cli(&CliOverrides::default());
        assert_eq!(settings.book_type, BookType::Ancient);
        assert_eq!(settings.languages, vec!["fr"]);
        assert_eq!(settings.engine_command, PathBuf::from("/opt/ocr/engine"));
        assert_eq!(settings.device, ComputeDevice::Gpu(0));
        assert_eq!(settings.timeout, Duration::from_secs(120));
        assert!(!settings.preprocess);
        assert!(settings.save_preprocessed);
        assert_eq!(settings.extensions, vec!["png"]);
        assert_eq!(settings.output_dir, PathBuf::from("/data/out"));
        assert_eq!(settings.verbose, 2);
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = Config::from_toml("[general]\nbook_type = \"ancient\"\n").unwrap();
        let settings = config.merge_with_cli(&CliOverrides::default());

        assert_eq!(settings.book_type, BookType::Ancient);
        assert_eq!(settings.languages, vec!["es", "en"]);
        assert_eq!(settings.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = Config::from_toml("general = nonsense [");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_cli_overrides_beat_file_values() {
        let config = Config::from_toml(
            r#"
            [general]
            book_type = "ancient"
            languages = ["fr"]

            [output]
            dir = "/from/file"
            "#,
        )
        .unwrap();

        let cli = CliOverrides {
            book_type: Some("modern".to_string()),
            languages: Some(vec!["de".to_string()]),
            output_dir: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };

        let settings = config.merge_with_cli(&cli);
        assert_eq!(settings.book_type, BookType::Modern);
        assert_eq!(settings.languages, vec!["de"]);
        assert_eq!(settings.output_dir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_unknown_book_type_in_config_falls_back_to_modern() {
        let config = Config::from_toml("[general]\nbook_type = \"parchment\"\n").unwrap();
        let settings = config.merge_with_cli(&CliOverrides::default());
        assert_eq!(settings.book_type, BookType::Modern);
    }

    #[test]
    fn test_load_from_path_not_found() {
        let result = Config::load_from_path(Path::new("/nonexistent/bookscan.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_path_reads_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bookscan.toml");
        std::fs::write(&path, "[engine]\ntimeout_secs = 42\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.engine.timeout_secs, Some(42));
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = Config::from_toml(
            "[general]\nbook_type = \"ancient\"\n[processing]\nsave_preprocessed = true\n",
        )
        .unwrap();

        let rendered = config.to_toml().unwrap();
        let back = Config::from_toml(&rendered).unwrap();
        assert_eq!(back, config);
    }
}
