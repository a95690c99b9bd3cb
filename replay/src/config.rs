use std::time::Duration;

use shared_types::{PlaybackSpeed, DEFAULT_BASE_INTERVAL_MS, STEP_LINK_PARAM};

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Autoplay tick interval at 1x speed
    pub base_interval: Duration,
    /// Speed a freshly opened run view starts at
    pub default_speed: PlaybackSpeed,
    /// Base URL of the dashboard REST API
    pub api_base_url: String,
    /// API key sent as `X-API-Key` when fetching runs
    pub api_key: Option<String>,
    /// Query parameter carrying the step index in shareable links
    pub step_param: String,
    /// Timeout for run fetches
    pub http_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(DEFAULT_BASE_INTERVAL_MS),
            default_speed: PlaybackSpeed::Normal,
            api_base_url: "http://localhost:8000/api".to_string(),
            api_key: None,
            step_param: STEP_LINK_PARAM.to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl ReplayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let base_interval_ms: u64 = env_parse("REPLAY_BASE_INTERVAL_MS", DEFAULT_BASE_INTERVAL_MS)?;
        if base_interval_ms == 0 {
            return Err(anyhow::anyhow!("REPLAY_BASE_INTERVAL_MS must be greater than 0"));
        }
        let speed_multiplier: f64 = env_parse("REPLAY_DEFAULT_SPEED", 1.0)?;
        let default_speed = PlaybackSpeed::from_multiplier(speed_multiplier).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid REPLAY_DEFAULT_SPEED '{speed_multiplier}'. Expected 0.25, 0.5, 1, 2 or 4"
            )
        })?;

        Ok(Self {
            base_interval: Duration::from_millis(base_interval_ms),
            default_speed,
            api_base_url: env_str("REPLAY_API_BASE_URL", &defaults.api_base_url),
            api_key: std::env::var("REPLAY_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            step_param: env_str("REPLAY_STEP_PARAM", &defaults.step_param),
            http_timeout: Duration::from_secs(env_parse(
                "REPLAY_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid replay setting {key}='{val}': {e}")),
        Err(_) => Ok(default),
    }
}
