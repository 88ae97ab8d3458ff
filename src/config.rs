//! Engine configuration and default slot policy.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-slot policy defaults applied when a request leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotPolicy {
    pub session_type: String,
    pub time_zone: String,
    pub buffer_time_minutes: i32,
    pub preparation_time_minutes: i32,
    pub allow_rescheduling: bool,
    pub max_rescheduling_hours: i32,
    pub require_confirmation: bool,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            session_type: "Video Call".to_string(),
            time_zone: "UTC".to_string(),
            buffer_time_minutes: 5,
            preparation_time_minutes: 10,
            allow_rescheduling: true,
            max_rescheduling_hours: 24,
            require_confirmation: false,
        }
    }
}

/// Limits and defaults for a [`BookingOrchestrator`](crate::BookingOrchestrator).
///
/// ```
/// use trial_sessions_seaorm::SchedulingConfig;
///
/// let config = SchedulingConfig::default()
///     .with_max_candidates_per_request(200)
///     .with_default_duration_minutes(45);
/// assert_eq!(config.max_candidates_per_request, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Upper bound on candidates a single generation request may produce.
    pub max_candidates_per_request: usize,
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
    pub max_buffer_minutes: i32,
    /// Widest date range, in days, a single request may cover.
    pub max_horizon_days: i64,
    pub default_duration_minutes: i32,
    pub default_policy: SlotPolicy,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_candidates_per_request: 500,
            min_duration_minutes: 15,
            max_duration_minutes: 480,
            max_buffer_minutes: 240,
            max_horizon_days: 366,
            default_duration_minutes: 30,
            default_policy: SlotPolicy::default(),
        }
    }
}

impl SchedulingConfig {
    /// Defaults overridden by `SCHEDULING_MAX_CANDIDATES`,
    /// `SCHEDULING_MAX_DURATION_MINUTES`, `SCHEDULING_MAX_BUFFER_MINUTES`
    /// and `SCHEDULING_MAX_HORIZON_DAYS`.
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "SCHEDULING_MAX_CANDIDATES") {
            config.max_candidates_per_request = v;
        }
        if let Some(v) = parse_var(&lookup, "SCHEDULING_MAX_DURATION_MINUTES") {
            config.max_duration_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "SCHEDULING_MAX_BUFFER_MINUTES") {
            config.max_buffer_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "SCHEDULING_MAX_HORIZON_DAYS") {
            config.max_horizon_days = v;
        }
        config
    }

    pub fn with_max_candidates_per_request(mut self, max: usize) -> Self {
        self.max_candidates_per_request = max;
        self
    }

    pub fn with_duration_bounds(mut self, min_minutes: i32, max_minutes: i32) -> Self {
        self.min_duration_minutes = min_minutes;
        self.max_duration_minutes = max_minutes;
        self
    }

    pub fn with_max_buffer_minutes(mut self, max: i32) -> Self {
        self.max_buffer_minutes = max;
        self
    }

    pub fn with_max_horizon_days(mut self, days: i64) -> Self {
        self.max_horizon_days = days;
        self
    }

    pub fn with_default_duration_minutes(mut self, minutes: i32) -> Self {
        self.default_duration_minutes = minutes;
        self
    }

    pub fn with_default_policy(mut self, policy: SlotPolicy) -> Self {
        self.default_policy = policy;
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
