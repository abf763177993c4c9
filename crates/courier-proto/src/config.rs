//! Game and agent configuration.
//!
//! The simulator announces its parameters once per session (`GameConfig`);
//! the operator supplies the agent's own settings from a JSON file
//! (`AgentConfig`, see `start-agent --config`).

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid interval {0:?}: expected \\d+(ms|s|m|h)? or \"infinite\"")]
    InvalidInterval(String),
}

/// A duration in the simulator's compact encoding: `\d+(ms|s|m|h)?` with a
/// default unit of milliseconds, or the literal `infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IntervalRepr", into = "String")]
pub enum Interval {
    Millis(u64),
    Infinite,
}

impl Interval {
    /// The interval in milliseconds, or `None` when infinite.
    pub fn as_millis(self) -> Option<u64> {
        match self {
            Interval::Millis(ms) => Some(ms),
            Interval::Infinite => None,
        }
    }

    pub fn millis_or(self, default: u64) -> u64 {
        self.as_millis().unwrap_or(default)
    }
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("infinite") {
            return Ok(Interval::Infinite);
        }
        let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
            Some(split) => s.split_at(split),
            None => (s, ""),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| ConfigError::InvalidInterval(s.to_string()))?;
        let factor = match unit {
            "" | "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => return Err(ConfigError::InvalidInterval(s.to_string())),
        };
        Ok(Interval::Millis(value * factor))
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> String {
        match interval {
            Interval::Millis(ms) => format!("{ms}ms"),
            Interval::Infinite => "infinite".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntervalRepr {
    Millis(u64),
    Text(String),
}

impl TryFrom<IntervalRepr> for Interval {
    type Error = ConfigError;

    fn try_from(repr: IntervalRepr) -> Result<Self, Self::Error> {
        match repr {
            IntervalRepr::Millis(ms) => Ok(Interval::Millis(ms)),
            IntervalRepr::Text(s) => s.parse(),
        }
    }
}

/// Session parameters announced by the simulator via `onConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct GameConfig {
    pub map_file: String,
    pub parcels_generation_interval: Interval,
    pub parcels_max: u32,
    pub movement_steps: u32,
    pub movement_duration: Interval,
    pub agents_observation_distance: u32,
    pub parcels_observation_distance: u32,
    pub agent_timeout: Interval,
    pub parcel_reward_avg: f64,
    pub parcel_reward_variance: f64,
    pub parcel_decading_interval: Interval,
    pub randomly_moving_agents: u32,
    pub agent_speed: f64,
    pub clock: Interval,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_file: String::new(),
            parcels_generation_interval: Interval::Millis(2_000),
            parcels_max: 5,
            movement_steps: 1,
            movement_duration: Interval::Millis(500),
            agents_observation_distance: 10,
            parcels_observation_distance: 10,
            agent_timeout: Interval::Millis(10_000),
            parcel_reward_avg: 30.0,
            parcel_reward_variance: 10.0,
            parcel_decading_interval: Interval::Infinite,
            randomly_moving_agents: 0,
            agent_speed: 1.0,
            clock: Interval::Millis(50),
        }
    }
}

impl GameConfig {
    /// Milliseconds one primitive move takes.
    pub fn movement_duration_ms(&self) -> u64 {
        self.movement_duration.millis_or(500)
    }

    /// Milliseconds between one-unit reward decays, `None` when rewards do
    /// not decay.
    pub fn decay_interval_ms(&self) -> Option<u64> {
        self.parcel_decading_interval.as_millis()
    }
}

/// Single-agent or cooperating pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    #[default]
    SingleAgent,
    CoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Operator-supplied agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Simulator endpoint. `local://` hosts run the in-process harness.
    pub api_host: String,
    pub client_token: String,
    /// Shared secret identifying the cooperating pair. Required in co-op
    /// mode.
    pub team_key: Option<String>,
    pub mode: AgentMode,
    /// Accepted for compatibility; planning always uses the built-in A*.
    pub use_pddl: bool,
    /// Intention-loop tick, milliseconds.
    pub loop_interval_ms: u64,
    /// Periodic status log interval, milliseconds.
    pub log_interval_ms: u64,
    pub log_level: LogLevel,
    /// Utility margin a challenger option must exceed to pre-empt the
    /// current intention.
    pub preemption_margin: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_host: String::new(),
            client_token: String::new(),
            team_key: None,
            mode: AgentMode::SingleAgent,
            use_pddl: false,
            loop_interval_ms: 50,
            log_interval_ms: 5_000,
            log_level: LogLevel::Info,
            preemption_margin: 0.05,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn cooperative(&self) -> bool {
        self.mode == AgentMode::CoOp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_compact_encoding() {
        assert_eq!("250".parse::<Interval>().unwrap(), Interval::Millis(250));
        assert_eq!("250ms".parse::<Interval>().unwrap(), Interval::Millis(250));
        assert_eq!("1s".parse::<Interval>().unwrap(), Interval::Millis(1_000));
        assert_eq!("2m".parse::<Interval>().unwrap(), Interval::Millis(120_000));
        assert_eq!(
            "1h".parse::<Interval>().unwrap(),
            Interval::Millis(3_600_000)
        );
        assert_eq!("infinite".parse::<Interval>().unwrap(), Interval::Infinite);
        assert!("10x".parse::<Interval>().is_err());
        assert!("".parse::<Interval>().is_err());
    }

    #[test]
    fn game_config_accepts_wire_fields() {
        let cfg: GameConfig = serde_json::from_str(
            r#"{
                "MAP_FILE": "default_map",
                "PARCEL_DECADING_INTERVAL": "1s",
                "MOVEMENT_DURATION": 100,
                "PARCELS_MAX": 7
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.map_file, "default_map");
        assert_eq!(cfg.decay_interval_ms(), Some(1_000));
        assert_eq!(cfg.movement_duration_ms(), 100);
        assert_eq!(cfg.parcels_max, 7);
    }

    #[test]
    fn agent_config_defaults_are_filled_in() {
        let cfg: AgentConfig =
            serde_json::from_str(r#"{"api_host": "local://demo", "mode": "co_op"}"#).unwrap();
        assert_eq!(cfg.mode, AgentMode::CoOp);
        assert_eq!(cfg.loop_interval_ms, 50);
        assert!((cfg.preemption_margin - 0.05).abs() < f64::EPSILON);
    }
}
