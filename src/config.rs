//! Application-level configuration loading for race tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::race::RouteSettings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ORIENTEER_BACK_CONFIG_PATH";

/// Default arrival threshold in meters for proximity candidates.
const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 25.0;
/// Default flat penalty in seconds charged for a hint.
const DEFAULT_HINT_PENALTY_SECS: u64 = 60;
/// Default wrong-answer penalty in minutes for routes without settings.
const DEFAULT_PENALTY_MINUTES: u32 = 3;
/// Default attempt count at which a team is force-advanced past a point.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    arrival_threshold_m: f64,
    hint_penalty_secs: u64,
    default_penalty_minutes: u32,
    default_max_attempts: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or malformed. Startup never fails on
    /// configuration.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        arrival_threshold_m = app_config.arrival_threshold_m,
                        hint_penalty_secs = app_config.hint_penalty_secs,
                        "loaded race tuning from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Distance in meters under which an unvisited point counts as an
    /// arrival candidate.
    pub fn arrival_threshold_m(&self) -> f64 {
        self.arrival_threshold_m
    }

    /// Flat penalty charged for every hint grant.
    pub fn hint_penalty(&self) -> Duration {
        Duration::from_secs(self.hint_penalty_secs)
    }

    /// Settings applied to routes that do not carry their own.
    pub fn default_route_settings(&self) -> RouteSettings {
        RouteSettings {
            penalty_minutes: self.default_penalty_minutes,
            max_attempts: self.default_max_attempts,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            hint_penalty_secs: DEFAULT_HINT_PENALTY_SECS,
            default_penalty_minutes: DEFAULT_PENALTY_MINUTES,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    arrival_threshold_m: Option<f64>,
    hint_penalty_secs: Option<u64>,
    penalty_minutes: Option<u32>,
    max_attempts: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            arrival_threshold_m: value
                .arrival_threshold_m
                .unwrap_or(defaults.arrival_threshold_m),
            hint_penalty_secs: value
                .hint_penalty_secs
                .unwrap_or(defaults.hint_penalty_secs),
            default_penalty_minutes: value
                .penalty_minutes
                .unwrap_or(defaults.default_penalty_minutes),
            default_max_attempts: value.max_attempts.unwrap_or(defaults.default_max_attempts),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"arrival_threshold_m": 40.0}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.arrival_threshold_m(), 40.0);
        assert_eq!(config.hint_penalty(), Duration::from_secs(60));
        assert_eq!(config.default_route_settings().penalty_minutes, 3);
        assert_eq!(config.default_route_settings().max_attempts, 3);
    }
}
