use std::{path::{Path, PathBuf}, str::FromStr, time::Duration};

use route_tracker_lib::units::UnitSystem;

use crate::{tracker::ReroutingStrategy, ConfigError};

pub const DEFAULT_RECORDINGS_DIR: &str = "data/gpx";
pub const DEFAULT_SIMULATION_TRACK: &str = "home2park";

/// What a session does when its feed reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationErrorPolicy {
    /// Report the error and keep waiting for the feed to recover.
    #[default]
    KeepAlive,
    /// Report the error, and cancel the session if the error is unrecoverable.
    CancelOnUnrecoverable,
}

impl FromStr for LocationErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_alive" => Ok(LocationErrorPolicy::KeepAlive),
            "cancel_on_unrecoverable" => Ok(LocationErrorPolicy::CancelOnUnrecoverable),
            other => Err(format!("Unknown location error policy: {}", other)),
        }
    }
}

/// What teardown does with the feed once the session is finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Stop the feed as part of teardown.
    #[default]
    StopFeed,
    /// Only detach the feed. It keeps running until the session is dropped.
    KeepFeed,
}

impl FromStr for TeardownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_feed" => Ok(TeardownPolicy::StopFeed),
            "keep_feed" => Ok(TeardownPolicy::KeepFeed),
            other => Err(format!("Unknown teardown policy: {}", other)),
        }
    }
}

/// Everything a navigation session needs to know up front. Passed by value into the session.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    pub simulate_gps: bool,
    pub simulation_track_name: Option<String>,
    pub recordings_dir: PathBuf,
    pub simulation_interval: Duration,

    pub voice_guidance_unit_system: UnitSystem,

    pub rerouting_enabled: bool,
    pub rerouting_strategy: ReroutingStrategy,
    pub visit_first_stop_on_start: bool,

    pub geometry_update_delay: Duration,
    pub location_error_policy: LocationErrorPolicy,
    pub teardown_policy: TeardownPolicy,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            simulate_gps: false,
            simulation_track_name: Some(DEFAULT_SIMULATION_TRACK.to_string()),
            recordings_dir: PathBuf::from(DEFAULT_RECORDINGS_DIR),
            simulation_interval: Duration::from_secs(1),
            voice_guidance_unit_system: UnitSystem::Imperial,
            rerouting_enabled: true,
            rerouting_strategy: ReroutingStrategy::ToNextStop,
            visit_first_stop_on_start: false,
            geometry_update_delay: Duration::from_millis(800),
            location_error_policy: LocationErrorPolicy::KeepAlive,
            teardown_policy: TeardownPolicy::StopFeed,
        }
    }
}

impl NavigationConfig {
    /// Parses `key = value` lines. Blank lines and lines starting with `#` are skipped,
    /// keys that are not given keep their default.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine(line.to_string()));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "simulate_gps" => config.simulate_gps = parse_value(key, value)?,
                "simulation_track_name" => {
                    config.simulation_track_name = if value.is_empty() { None } else { Some(value.to_string()) }
                }
                "recordings_dir" => config.recordings_dir = PathBuf::from(value),
                "simulation_interval_ms" => {
                    let millis: u64 = parse_value(key, value)?;
                    if millis == 0 {
                        return Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() });
                    }
                    config.simulation_interval = Duration::from_millis(millis);
                }
                "voice_guidance_unit_system" => config.voice_guidance_unit_system = parse_value(key, value)?,
                "rerouting_enabled" => config.rerouting_enabled = parse_value(key, value)?,
                "rerouting_strategy" => config.rerouting_strategy = parse_value(key, value)?,
                "visit_first_stop_on_start" => config.visit_first_stop_on_start = parse_value(key, value)?,
                "geometry_update_delay_ms" => config.geometry_update_delay = Duration::from_millis(parse_value(key, value)?),
                "location_error_policy" => config.location_error_policy = parse_value(key, value)?,
                "teardown_policy" => config.teardown_policy = parse_value(key, value)?,
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Path of the recording replayed when GPS is simulated, if simulation is on and a track is named.
    pub fn simulation_track_path(&self) -> Option<PathBuf> {
        if !self.simulate_gps {
            return None;
        }

        self.simulation_track_name.as_ref()
            .map(|name| self.recordings_dir.join(format!("{}.gpx", name)))
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
