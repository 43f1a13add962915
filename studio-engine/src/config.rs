//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use studio_renderer::{ExportFormat, ExportSettings};

/// Default image-editor service base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/";

/// Where users are sent to unpublish a live image by hand.
pub const DEFAULT_UNPUBLISH_GUIDE_URL: &str = "https://help.catalog.studio/unpublish-images";

/// Name of the persisted review-ask state inside the data directory.
pub const FEEDBACK_FILE: &str = "review-ask.json";

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first try included.
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retrying after the given attempt (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(base.min(self.max_delay_ms as f64) as u64)
    }
}

/// Runtime configuration of the studio engine.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Base URL of the image-editor service.
    pub api_url: String,
    /// Bearer token for the service.
    pub api_token: Option<String>,
    /// First word of exported file names.
    pub app_prefix: String,
    /// Export encoding.
    pub export_format: ExportFormat,
    /// Export quality, 1-100.
    pub export_quality: u8,
    /// Double small exports before sending them for generation.
    pub auto_upscale: bool,
    /// On-screen canvas container width.
    pub container_width: f64,
    /// On-screen canvas container height.
    pub container_height: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retry policy for generation requests.
    pub retry: RetryConfig,
    /// Link handed out instead of unpublishing in-app.
    pub unpublish_guide_url: String,
    /// Directory for persisted preferences.
    pub data_dir: Option<PathBuf>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StudioConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            app_prefix: "Studio".to_string(),
            export_format: ExportFormat::Jpeg,
            export_quality: 90,
            auto_upscale: true,
            container_width: 800.0,
            container_height: 600.0,
            request_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
            unpublish_guide_url: DEFAULT_UNPUBLISH_GUIDE_URL.to_string(),
            data_dir: None,
        }
    }

    /// Encoding settings for exports.
    #[must_use]
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            format: self.export_format,
            quality: self.export_quality.clamp(1, 100),
            app_prefix: self.app_prefix.clone(),
            ..ExportSettings::default()
        }
    }

    /// Path of the persisted review-ask state, if a data directory is set.
    #[must_use]
    pub fn feedback_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(FEEDBACK_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1_000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(5_000));
    }

    #[test]
    fn test_export_settings_clamp_quality() {
        let config = StudioConfig {
            export_quality: 0,
            export_format: ExportFormat::WebP,
            app_prefix: "Shop".into(),
            ..StudioConfig::new()
        };
        let settings = config.export_settings();
        assert_eq!(settings.quality, 1);
        assert_eq!(settings.format, ExportFormat::WebP);
        assert_eq!(settings.app_prefix, "Shop");
    }

    #[test]
    fn test_feedback_path() {
        assert!(StudioConfig::new().feedback_path().is_none());
        let config = StudioConfig {
            data_dir: Some(PathBuf::from("/tmp/studio")),
            ..StudioConfig::new()
        };
        assert_eq!(
            config.feedback_path(),
            Some(PathBuf::from("/tmp/studio/review-ask.json"))
        );
    }
}
