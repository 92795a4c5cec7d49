use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_PATH: &str = "config.yml";
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default)]
    pub audio: AudioFormat,

    #[serde(default = "default_themes")]
    pub themes: Vec<String>,

    #[serde(default = "default_settings")]
    pub settings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_story_model")]
    pub story: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_audio_model")]
    pub audio: String,
}

/// Layout of the raw PCM returned by the speech model.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            story: default_story_model(),
            image: default_image_model(),
            audio: default_audio_model(),
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            output_folder: default_output(),
            models: ModelConfig::default(),
            voice: default_voice(),
            audio: AudioFormat::default(),
            themes: default_themes(),
            settings: default_settings(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_output() -> String {
    "output".to_string()
}
fn default_story_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_audio_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_voice() -> String {
    "Kore".to_string()
}
fn default_sample_rate() -> u32 {
    24000
}
fn default_channels() -> u16 {
    1
}
fn default_themes() -> Vec<String> {
    [
        "Magic Forest",
        "Underwater Kingdom",
        "Space Adventure",
        "Friendly Monsters",
        "Talking Animals",
        "Lost Island",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_settings() -> Vec<String> {
    [
        "Under the glowing moon",
        "Inside a giant mushroom house",
        "On a floating cloud",
        "In a candy castle",
        "Deep within a coral reef",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    /// Reads `config.yml` when present, otherwise falls back to the defaults.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_PATH);
        if !path.exists() {
            log::info!("{} not found, using default configuration", CONFIG_PATH);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml_ng::from_str(content).context("Failed to parse config.yml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.themes.is_empty() {
            anyhow::bail!("config.yml: 'themes' must list at least one option");
        }
        if self.settings.is_empty() {
            anyhow::bail!("config.yml: 'settings' must list at least one option");
        }
        if self.audio.channels == 0 {
            anyhow::bail!("config.yml: 'audio.channels' must be at least 1");
        }
        Ok(())
    }

    /// Provider credential from the process environment.
    pub fn api_key() -> Result<String> {
        Self::api_key_from(|name| std::env::var(name).ok())
    }

    fn api_key_from<F>(lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(*name))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key found. Set {} in the environment.",
                    API_KEY_ENV_VARS.join(" or ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "voice: Puck\nmodels:\n  story: gemini-2.5-flash\naudio:\n  sample_rate: 16000\n",
        )
        .unwrap();

        assert_eq!(config.voice, "Puck");
        assert_eq!(config.models.story, "gemini-2.5-flash");
        assert_eq!(config.models.image, "gemini-2.5-flash-image");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.themes.len(), 6);
        assert_eq!(config.settings[0], "Under the glowing moon");
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = Config::from_yaml(include_str!("../../config.example.yml")).unwrap();
        let defaults = Config::default();

        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.models.audio, defaults.models.audio);
        assert_eq!(config.audio, defaults.audio);
        assert_eq!(config.themes, defaults.themes);
        assert_eq!(config.settings, defaults.settings);
    }

    #[test]
    fn test_empty_option_lists_are_rejected() {
        assert!(Config::from_yaml("themes: []\n").is_err());
        assert!(Config::from_yaml("audio:\n  channels: 0\n").is_err());
    }

    #[test]
    fn test_api_key_prefers_gemini_variable() {
        let key = Config::api_key_from(|name| match name {
            "GEMINI_API_KEY" => Some("gemini-key".to_string()),
            "API_KEY" => Some("fallback".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "gemini-key");
    }

    #[test]
    fn test_api_key_skips_blank_values() {
        let key = Config::api_key_from(|name| match name {
            "GEMINI_API_KEY" => Some("  ".to_string()),
            "API_KEY" => Some("fallback".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "fallback");
        assert!(Config::api_key_from(|_| None).is_err());
    }
}
