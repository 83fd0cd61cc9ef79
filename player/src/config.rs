use crate::error::PlayerError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the player
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub abr: AbrSettings,
    #[serde(default)]
    pub simulation: Simulation,
}

impl Settings {
    pub fn from_toml(data: &str) -> Result<Self, PlayerError> {
        let settings: Settings = toml::from_str(data)
            .map_err(|e| PlayerError::ConfigError(format!("Invalid configuration: {}", e)))?;
        settings.abr.validate()?;
        Ok(settings)
    }
}

/// Catalog endpoint configuration
#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default = "Catalog::default_url")]
    pub url: String,
}

impl Catalog {
    fn default_url() -> String {
        "http://localhost:8080/videos".to_string()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Network {
    /// Upper bound for a single catalog or manifest request.
    #[serde(default = "Network::default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

impl Network {
    fn default_fetch_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self {
            fetch_timeout: Self::default_fetch_timeout(),
        }
    }
}

/// Tuning of the adaptive bitrate loop.
#[derive(Debug, Clone, Deserialize)]
pub struct AbrSettings {
    /// Throughput strictly below this switches the top quality down.
    #[serde(default = "AbrSettings::default_down_threshold")]
    pub down_threshold_kbps: u64,
    /// Throughput strictly above this switches back to the top quality.
    #[serde(default = "AbrSettings::default_up_threshold")]
    pub up_threshold_kbps: u64,
    /// Minimum time between two automatic switches.
    #[serde(default = "AbrSettings::default_cooldown", with = "humantime_serde")]
    pub cooldown: Duration,
    #[serde(default = "AbrSettings::default_sample_period", with = "humantime_serde")]
    pub sample_period: Duration,
    #[serde(default = "AbrSettings::default_safety_factor")]
    pub safety_factor: f64,
}

impl AbrSettings {
    fn default_down_threshold() -> u64 {
        3000
    }

    fn default_up_threshold() -> u64 {
        3500
    }

    fn default_cooldown() -> Duration {
        Duration::from_millis(3000)
    }

    fn default_sample_period() -> Duration {
        Duration::from_secs(1)
    }

    fn default_safety_factor() -> f64 {
        0.7
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.down_threshold_kbps == 0 || self.up_threshold_kbps == 0 {
            return Err(PlayerError::ConfigError(
                "abr thresholds must be positive".to_string(),
            ));
        }
        if self.down_threshold_kbps > self.up_threshold_kbps {
            return Err(PlayerError::ConfigError(format!(
                "abr down threshold {} kbps is above up threshold {} kbps",
                self.down_threshold_kbps, self.up_threshold_kbps
            )));
        }
        if !(self.safety_factor > 0.0 && self.safety_factor <= 1.0) {
            return Err(PlayerError::ConfigError(format!(
                "abr safety factor must be in (0, 1], got {}",
                self.safety_factor
            )));
        }
        if self.sample_period.is_zero() {
            return Err(PlayerError::ConfigError(
                "abr sample period must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AbrSettings {
    fn default() -> Self {
        Self {
            down_threshold_kbps: Self::default_down_threshold(),
            up_threshold_kbps: Self::default_up_threshold(),
            cooldown: Self::default_cooldown(),
            sample_period: Self::default_sample_period(),
            safety_factor: Self::default_safety_factor(),
        }
    }
}

/// Network profile replayed by the simulated playback engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    #[serde(default = "Simulation::default_segment_duration", with = "humantime_serde")]
    pub segment_duration: Duration,
    #[serde(default = "Simulation::default_steps")]
    pub steps: Vec<ProfileStep>,
}

impl Simulation {
    fn default_segment_duration() -> Duration {
        Duration::from_secs(2)
    }

    fn default_steps() -> Vec<ProfileStep> {
        vec![ProfileStep {
            kbps: 5000,
            duration: None,
        }]
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            segment_duration: Self::default_segment_duration(),
            steps: Self::default_steps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileStep {
    pub kbps: u64,
    /// Open-ended when absent.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
}
