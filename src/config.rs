use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::Tone;
use crate::game::Action;

/// Everything tunable about a game run, loaded from TOML.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub tones: ToneConfig,
    pub audio: AudioConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Spacing between beats during playback.
    pub beat_period_ms: u64,
    /// Extra wait after the last beat before playback counts as finished.
    pub settle_ms: u64,
    /// Delay from entering a watch stage to the demo playback.
    pub demo_delay_ms: u64,
    /// Delay from entering a watch stage to opening practice. Fixed, not
    /// derived from the pattern length.
    pub practice_after_ms: u64,
    pub success_delay_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            beat_period_ms: 600,
            settle_ms: 600,
            demo_delay_ms: 1000,
            practice_after_ms: 5000,
            success_delay_ms: 2000,
            retry_delay_ms: 1500,
        }
    }
}

impl TimingConfig {
    pub fn beat_period(&self) -> Duration {
        Duration::from_millis(self.beat_period_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo_delay_ms)
    }

    pub fn practice_after(&self) -> Duration {
        Duration::from_millis(self.practice_after_ms)
    }

    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub clap_hz: f32,
    pub clap_secs: f32,
    pub stamp_hz: f32,
    pub stamp_secs: f32,
    /// Onset level of every tone, 0.0 - 1.0.
    pub volume: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            clap_hz: 800.0,
            clap_secs: 0.15,
            stamp_hz: 200.0,
            stamp_secs: 0.2,
            volume: 0.3,
        }
    }
}

impl ToneConfig {
    pub fn tone_for(&self, action: Action) -> Tone {
        match action {
            Action::Clap => Tone::with_duration(self.clap_hz, self.clap_secs),
            Action::Stamp => Tone::with_duration(self.stamp_hz, self.stamp_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Where completion events are appended as JSON lines.
    pub events_path: Option<PathBuf>,
}

impl GameConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing game config")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_game_pacing() {
        let config = GameConfig::default();
        assert_eq!(config.timing.beat_period(), Duration::from_millis(600));
        assert_eq!(config.timing.settle(), Duration::from_millis(600));
        assert_eq!(config.timing.demo_delay(), Duration::from_millis(1000));
        assert_eq!(config.timing.practice_after(), Duration::from_millis(5000));
        assert_eq!(config.timing.success_delay(), Duration::from_millis(2000));
        assert_eq!(config.timing.retry_delay(), Duration::from_millis(1500));
        assert!(config.audio.enabled);
        assert!(config.completion.events_path.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(GameConfig::from_toml_str("").unwrap(), GameConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = GameConfig::from_toml_str(
            r#"
            [timing]
            practice_after_ms = 6500

            [tones]
            volume = 0.5

            [completion]
            events_path = "events.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.timing.practice_after_ms, 6500);
        assert_eq!(config.timing.beat_period_ms, 600);
        assert_eq!(config.tones.volume, 0.5);
        assert_eq!(config.tones.clap_hz, 800.0);
        assert_eq!(
            config.completion.events_path,
            Some(PathBuf::from("events.jsonl"))
        );
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(GameConfig::from_toml_str("[timing]\nbeat_period_ms = \"fast\"").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = GameConfig::load("definitely/not/here.toml").unwrap_err();
        assert!(format!("{err:#}").contains("definitely/not/here.toml"));
    }

    #[test]
    fn test_tone_for_action() {
        let tones = ToneConfig::default();
        assert_eq!(
            tones.tone_for(Action::Clap),
            Tone::with_duration(800.0, 0.15)
        );
        assert_eq!(
            tones.tone_for(Action::Stamp),
            Tone::with_duration(200.0, 0.2)
        );
    }
}
