//! Configuration for the scheduling core.

use crate::models::MAX_INTERVAL_DAYS;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest window in which a just-added card jumps the queue.
pub const MAX_RECENT_WINDOW_MINUTES: i64 = 7 * 24 * 60;
/// Longest wait after a failed review.
pub const MAX_RELEARN_DELAY_MINUTES: i64 = MAX_INTERVAL_DAYS as i64 * 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub leech: LeechConfig,
}

impl Config {
    /// Load from the platform config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparseable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(self)?;
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "srs-core")
            .map(|d| d.config_dir().join("config.toml"))
    }

    pub fn db_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "srs-core")
            .map(|d| d.data_dir().join("reviews.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_new_cards")]
    pub daily_new_card_cap: usize,
    #[serde(default = "default_due_cap")]
    pub due_cap: usize,
    #[serde(default = "default_recent_window")]
    pub recently_added_window_minutes: i64,
    #[serde(default)]
    pub exclude_leeches: bool,
}

fn default_new_cards() -> usize { 10 }
fn default_due_cap() -> usize { 30 }
fn default_recent_window() -> i64 { 120 }

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            daily_new_card_cap: default_new_cards(),
            due_cap: default_due_cap(),
            recently_added_window_minutes: default_recent_window(),
            exclude_leeches: false,
        }
    }
}

impl StudyConfig {
    pub fn recently_added_window(&self) -> Duration {
        Duration::minutes(self.recently_added_window_minutes.clamp(0, MAX_RECENT_WINDOW_MINUTES))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_initial_ease")]
    pub initial_ease: f64,
    #[serde(default = "default_fail_penalty")]
    pub fail_penalty: f64,
    #[serde(default = "default_relearn_delay")]
    pub relearn_delay_minutes: i64,
    #[serde(default = "default_max_interval")]
    pub max_interval_days: u32,
}

fn default_initial_ease() -> f64 { 2.5 }
fn default_fail_penalty() -> f64 { 0.2 }
fn default_relearn_delay() -> i64 { 24 * 60 }
fn default_max_interval() -> u32 { 3650 }

impl SchedulerConfig {
    pub fn relearn_delay(&self) -> Duration {
        Duration::minutes(self.relearn_delay_minutes.clamp(1, MAX_RELEARN_DELAY_MINUTES))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: default_initial_ease(),
            fail_penalty: default_fail_penalty(),
            relearn_delay_minutes: default_relearn_delay(),
            max_interval_days: default_max_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeechConfig {
    #[serde(default = "default_total_fails")]
    pub total_fail_threshold: u32,
    #[serde(default = "default_window_fails")]
    pub window_fail_threshold: u32,
}

fn default_total_fails() -> u32 { 12 }
fn default_window_fails() -> u32 { 8 }

impl Default for LeechConfig {
    fn default() -> Self {
        Self {
            total_fail_threshold: default_total_fails(),
            window_fail_threshold: default_window_fails(),
        }
    }
}
