use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

pub const CONFIG_PATH_ENV: &str = "ASTROLABE_CONFIG";
pub const DEBUG_ENV: &str = "ASTROLABE_DEBUG";
pub const API_KEY_ENVS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureThresholds {
    /// A closed fist must score strictly above this to count.
    pub closed_fist: f32,
    pub open_palm: f32,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            closed_fist: 0.5,
            open_palm: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub acquire_attempts: u32,
    /// First retry delay; doubles after every failed attempt.
    pub acquire_backoff_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            acquire_attempts: 4,
            acquire_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiSettings {
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Never written back out; supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.into(),
            model: DEFAULT_GEMINI_MODEL.into(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GameSettings {
    pub arena_width: f32,
    pub arena_height: f32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            arena_width: 1280.0,
            arena_height: 720.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OracleConfig {
    pub thresholds: GestureThresholds,
    /// Dramatic pause applied after the reading settles, before the reveal.
    pub reveal_delay_ms: u64,
    pub explosion_ms: u64,
    pub poll_interval_ms: u64,
    pub camera: CameraSettings,
    pub gemini: GeminiSettings,
    pub game: GameSettings,
    pub debug: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            thresholds: GestureThresholds::default(),
            reveal_delay_ms: 1200,
            explosion_ms: 3000,
            poll_interval_ms: 16,
            camera: CameraSettings::default(),
            gemini: GeminiSettings::default(),
            game: GameSettings::default(),
            debug: false,
        }
    }
}

impl OracleConfig {
    /// Reads the optional config file named by `ASTROLABE_CONFIG`, then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Environment lookups go through `lookup` so tests never touch the real process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = API_KEY_ENVS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
        {
            self.gemini.api_key = Some(key);
        }

        if let Some(value) = lookup(DEBUG_ENV) {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn explosion_duration(&self) -> Duration {
        Duration::from_millis(self.explosion_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would panic inside tokio::time::interval.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
