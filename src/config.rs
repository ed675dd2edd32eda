use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Engine tuning knobs.
///
/// The engine itself is timer-free; `debounce_ms` is the window the
/// embedding application should wait before calling
/// [`FormEngine::flush`](crate::FormEngine::flush) after a keystroke.
/// Navigation and save must flush immediately regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_max_expression_depth")]
    pub max_expression_depth: usize,

    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_expression_depth: default_max_expression_depth(),
            max_rows: default_max_rows(),
            default_language: default_language(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }
}

fn default_debounce_ms() -> u64 {
    400
}

pub fn default_max_expression_depth() -> usize {
    64
}

fn default_max_rows() -> usize {
    1000
}

fn default_language() -> String {
    "nb".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_apply_to_partial_config() {
        let config = EngineConfig::parse(r#"{"debounce_ms": 100}"#).unwrap();
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.max_expression_depth, default_max_expression_depth());
        assert_eq!(config.default_language, "nb");
    }

    #[test]
    fn test_invalid_config_is_error() {
        assert!(EngineConfig::parse("not json").is_err());
    }
}
