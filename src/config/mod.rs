//! Application Configuration
//!
//! Bridge, recognizer and logging settings stored in TOML format.
//! Every section falls back to its defaults, so a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bridge adapter settings
    pub bridge: BridgeSettings,
    /// Text recognizer settings
    pub recognizer: RecognizerSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Settings for the recognition bridge adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Format hint assumed when a call carries no `imageFormat`
    pub default_image_format: String,
    /// How long a call waits for the recognizer, in milliseconds (0 = forever)
    pub recognition_timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            default_image_format: "jpeg".to_string(),
            recognition_timeout_ms: 30_000,
        }
    }
}

impl BridgeSettings {
    /// Wait bound for one recognition, `None` when unbounded
    pub fn recognition_timeout(&self) -> Option<Duration> {
        (self.recognition_timeout_ms > 0)
            .then(|| Duration::from_millis(self.recognition_timeout_ms))
    }
}

/// Settings for the tesseract-backed recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Directory holding the `tessdata` language files (library default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datapath: Option<String>,
    /// Language pack(s), e.g. "eng" or "eng+deu"
    pub language: String,
    /// Tesseract page segmentation mode, 0-13 as in `--psm`
    pub page_segmentation_mode: u8,
    /// Number of inference worker threads
    pub workers: usize,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            datapath: None,
            language: "eng".to_string(),
            page_segmentation_mode: 3,
            workers: 2,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs =
        directories::ProjectDirs::from("com", "textrecognition", "TextRecognitionBridge")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file, creating its directory if needed
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.bridge.default_image_format, "jpeg");
        assert_eq!(config.bridge.recognition_timeout_ms, 30_000);

        assert_eq!(config.recognizer.datapath, None);
        assert_eq!(config.recognizer.language, "eng");
        assert_eq!(config.recognizer.page_segmentation_mode, 3);
        assert_eq!(config.recognizer.workers, 2);

        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_recognition_timeout() {
        let mut settings = BridgeSettings::default();
        assert_eq!(settings.recognition_timeout(), Some(Duration::from_secs(30)));

        settings.recognition_timeout_ms = 0;
        assert_eq!(settings.recognition_timeout(), None);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.recognizer.language = "eng+deu".to_string();
        config.recognizer.workers = 4;
        config.recognizer.datapath = Some("/usr/share/tesseract-ocr/5/tessdata".to_string());
        config.bridge.recognition_timeout_ms = 0;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [recognizer]
            language = "fra"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.recognizer.language, "fra");
        assert_eq!(parsed.recognizer.datapath, None);
        assert_eq!(parsed.bridge, BridgeSettings::default());
        assert_eq!(parsed.logging, LoggingConfig::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AppConfig::default();

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
