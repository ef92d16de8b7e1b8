//! Extraction configuration
//!
//! Grouping thresholds are expressed in page-model units (see
//! [`crate::structural::LopdfParser::points_per_unit`]).

use std::env;
use std::time::Duration;

/// Environment variable overriding [`ExtractionConfig::max_file_size`]
pub const ENV_MAX_FILE_SIZE: &str = "SEGMENTER_MAX_FILE_SIZE";
/// Environment variable overriding [`ExtractionConfig::parse_timeout`] (milliseconds, 0 = none)
pub const ENV_PARSE_TIMEOUT_MS: &str = "SEGMENTER_PARSE_TIMEOUT_MS";

/// Configuration for the extraction pipeline
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Runs whose y differs by less than this are ordered left-to-right (default: 0.5)
    pub same_row_tolerance: f32,
    /// A vertical step larger than this starts a new line (default: 1.0)
    pub line_tolerance: f32,
    /// A gap between consecutive lines larger than this starts a new paragraph (default: 2.0)
    pub paragraph_gap: f32,
    /// Font size used when a run reports none (default: 12.0)
    pub default_font_size: f32,
    /// Upper bound on the structural parse; `None` waits indefinitely (default: 30s)
    pub parse_timeout: Option<Duration>,
    /// Largest file accepted, in bytes (default: 100 MiB)
    pub max_file_size: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            same_row_tolerance: 0.5,
            line_tolerance: 1.0,
            paragraph_gap: 2.0,
            default_font_size: 12.0,
            parse_timeout: Some(Duration::from_secs(30)),
            max_file_size: 104_857_600,
        }
    }
}

impl ExtractionConfig {
    /// Defaults overlaid with `SEGMENTER_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup; unparsable values are ignored
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_FILE_SIZE) {
            match raw.trim().parse::<u64>() {
                Ok(size) => self.max_file_size = size,
                Err(_) => log::warn!("Ignoring invalid {}={:?}", ENV_MAX_FILE_SIZE, raw),
            }
        }

        if let Some(raw) = lookup(ENV_PARSE_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.parse_timeout = None,
                Ok(ms) => self.parse_timeout = Some(Duration::from_millis(ms)),
                Err(_) => log::warn!("Ignoring invalid {}={:?}", ENV_PARSE_TIMEOUT_MS, raw),
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.same_row_tolerance, 0.5);
        assert_eq!(config.line_tolerance, 1.0);
        assert_eq!(config.paragraph_gap, 2.0);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.parse_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_overrides_applied() {
        let config = ExtractionConfig::default().with_overrides(lookup(&[
            (ENV_MAX_FILE_SIZE, "2048"),
            (ENV_PARSE_TIMEOUT_MS, "250"),
        ]));
        assert_eq!(config.max_file_size, 2048);
        assert_eq!(config.parse_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config =
            ExtractionConfig::default().with_overrides(lookup(&[(ENV_PARSE_TIMEOUT_MS, "0")]));
        assert_eq!(config.parse_timeout, None);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let config = ExtractionConfig::default().with_overrides(lookup(&[
            (ENV_MAX_FILE_SIZE, "lots"),
            (ENV_PARSE_TIMEOUT_MS, "-5"),
        ]));
        assert_eq!(config.max_file_size, 104_857_600);
        assert_eq!(config.parse_timeout, Some(Duration::from_secs(30)));
    }
}
