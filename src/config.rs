//! Engine configuration loaded from TOML
//!
//! Every key is optional. Missing sections fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markers::{MarkerStoreOptions, ResolveOptions};
use crate::playback::LoopEngineOptions;
use crate::review::{NewCardPlacement, QueueOptions, ReviewSessionOptions, Sm2Policy, SortOption};

/// Polls at or above this would let loops overrun noticeably
const MAX_POLL_INTERVAL_MS: u64 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub merge_tolerance_secs: f64,
    pub nearest_tolerance_secs: f64,
    pub fallback_window_secs: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            merge_tolerance_secs: 0.1,
            nearest_tolerance_secs: 1.0,
            fallback_window_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub poll_interval_ms: u64,
    pub loop_exit_tolerance_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            loop_exit_tolerance_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub sort: SortOption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_cards_limit: Option<usize>,
    pub new_card_placement: NewCardPlacement,
    pub countdown_tick_ms: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            sort: SortOption::default(),
            new_cards_limit: None,
            new_card_placement: NewCardPlacement::default(),
            countdown_tick_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub learning_steps_mins: Vec<u32>,
    pub relearning_steps_mins: Vec<u32>,
    pub graduating_interval_days: i32,
    pub easy_interval_days: i32,
    pub mastered_interval_days: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_steps_mins: vec![1, 10],
            relearning_steps_mins: vec![10],
            graduating_interval_days: 1,
            easy_interval_days: 4,
            mastered_interval_days: 21,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub markers: MarkerConfig,
    pub playback: PlaybackConfig,
    pub review: ReviewConfig,
    pub scheduler: SchedulerConfig,
}

/// Default config file (e.g. ~/.config/echoloop/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("echoloop").join("config.toml"))
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        let poll = self.playback.poll_interval_ms;
        if poll == 0 || poll >= MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "playback.poll_interval_ms must be between 1 and {}, got {}",
                MAX_POLL_INTERVAL_MS - 1,
                poll
            )));
        }
        if self.review.countdown_tick_ms == 0 {
            return Err(ConfigError::Invalid("review.countdown_tick_ms must be positive".to_string()));
        }

        let markers = &self.markers;
        for (name, value) in [
            ("markers.merge_tolerance_secs", markers.merge_tolerance_secs),
            ("markers.nearest_tolerance_secs", markers.nearest_tolerance_secs),
            ("markers.fallback_window_secs", markers.fallback_window_secs),
            ("playback.loop_exit_tolerance_secs", self.playback.loop_exit_tolerance_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be a non-negative number", name)));
            }
        }

        if markers.fallback_window_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "markers.fallback_window_secs must be greater than zero".to_string(),
            ));
        }

        let scheduler = &self.scheduler;
        if scheduler.graduating_interval_days < 1 || scheduler.easy_interval_days < 1 {
            return Err(ConfigError::Invalid(
                "scheduler intervals must be at least one day".to_string(),
            ));
        }
        Ok(())
    }

    pub fn marker_options(&self) -> MarkerStoreOptions {
        MarkerStoreOptions {
            merge_tolerance: self.markers.merge_tolerance_secs,
            resolve: ResolveOptions {
                nearest_tolerance: self.markers.nearest_tolerance_secs,
                fallback_window: self.markers.fallback_window_secs,
            },
        }
    }

    pub fn loop_options(&self) -> LoopEngineOptions {
        LoopEngineOptions {
            poll_interval: Duration::from_millis(self.playback.poll_interval_ms),
            loop_exit_tolerance: self.playback.loop_exit_tolerance_secs,
        }
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            sort: self.review.sort,
            new_cards_limit: self.review.new_cards_limit,
            new_card_placement: self.review.new_card_placement,
        }
    }

    pub fn session_options(&self) -> ReviewSessionOptions {
        ReviewSessionOptions {
            queue: self.queue_options(),
            countdown_tick: Duration::from_millis(self.review.countdown_tick_ms),
        }
    }

    pub fn policy(&self) -> Sm2Policy {
        let steps = |mins: &[u32]| {
            mins.iter()
                .map(|m| chrono::Duration::minutes(i64::from(*m)))
                .collect()
        };
        Sm2Policy {
            learning_steps: steps(&self.scheduler.learning_steps_mins),
            relearning_steps: steps(&self.scheduler.relearning_steps_mins),
            graduating_interval_days: self.scheduler.graduating_interval_days,
            easy_interval_days: self.scheduler.easy_interval_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_built_in_options() {
        let config = EngineConfig::default();
        assert_eq!(config.marker_options(), MarkerStoreOptions::default());
        assert_eq!(config.loop_options(), LoopEngineOptions::default());
        assert_eq!(config.queue_options(), QueueOptions::default());
        assert_eq!(config.session_options(), ReviewSessionOptions::default());
        assert_eq!(config.policy(), Sm2Policy::default());
    }

    #[test]
    fn test_partial_file() {
        let config = EngineConfig::from_toml(
            r#"
            [review]
            sort = "random"
            new_cards_limit = 5

            [scheduler]
            learning_steps_mins = [2]
            "#,
        )
        .unwrap();

        assert_eq!(config.review.sort, SortOption::Random);
        assert_eq!(config.queue_options().new_cards_limit, Some(5));
        assert_eq!(config.review.new_card_placement, NewCardPlacement::AfterDue);
        assert_eq!(config.policy().learning_steps, vec![chrono::Duration::minutes(2)]);
        assert_eq!(config.playback.poll_interval_ms, 50);
    }

    #[test]
    fn test_poll_interval_bounds() {
        for bad in ["poll_interval_ms = 0", "poll_interval_ms = 100", "poll_interval_ms = 250"] {
            let content = format!("[playback]\n{}\n", bad);
            assert!(matches!(
                EngineConfig::from_toml(&content),
                Err(ConfigError::Invalid(_))
            ));
        }
        assert!(EngineConfig::from_toml("[playback]\npoll_interval_ms = 99\n").is_ok());
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let result = EngineConfig::from_toml("[markers]\nmerge_tolerance_secs = -1.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_fallback_window() {
        let result = EngineConfig::from_toml("[markers]\nfallback_window_secs = 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml("[review]\nsort = \"sideways\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        assert_eq!(EngineConfig::load_or_default(&path).unwrap(), EngineConfig::default());

        fs::write(&path, "[markers]\nfallback_window_secs = 3.5\n").unwrap();
        let config = EngineConfig::load_or_default(&path).unwrap();
        assert_eq!(config.marker_options().resolve.fallback_window, 3.5);

        assert!(matches!(
            EngineConfig::load(&temp_dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
