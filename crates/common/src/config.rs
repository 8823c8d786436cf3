//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default stabilization parameters.
    #[serde(default)]
    pub stabilization: StabilizationDefaults,

    /// Default output encoding parameters.
    #[serde(default)]
    pub encoding: EncodingDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default stabilization parameters, used when the command line omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizationDefaults {
    /// Stabilization mode name (e.g., "generic", "h-pan", "still").
    pub mode: String,

    /// Smoothing window in whole seconds.
    pub window_secs: u32,

    /// Crop policy: "auto" or a fixed percentage such as "5" / "5%".
    pub crop: String,

    /// What to do when motion cannot be estimated: "zero" or "hold-last".
    pub missing_motion: String,
}

/// Default output encoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingDefaults {
    /// Video codec name ("h264", "h265", "mjpeg").
    pub codec: String,

    /// Constant rate factor for h264/h265.
    pub crf: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "steadyframe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StabilizationDefaults {
    fn default() -> Self {
        Self {
            mode: "generic".to_string(),
            window_secs: 2,
            crop: "auto".to_string(),
            missing_motion: "zero".to_string(),
        }
    }
}

impl Default for EncodingDefaults {
    fn default() -> Self {
        Self {
            codec: "h264".to_string(),
            crf: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("steadyframe").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.stabilization.mode, "generic");
        assert_eq!(config.stabilization.window_secs, 2);
        assert_eq!(config.stabilization.crop, "auto");
        assert_eq!(config.encoding.codec, "h264");
    }

    #[test]
    fn test_partial_config_fills_missing_sections() {
        let config: AppConfig =
            serde_json::from_str(r#"{"logging":{"level":"debug","json":true,"file":null}}"#)
                .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.stabilization.window_secs, 2);
        assert_eq!(config.encoding.crf, 20);
    }
}
