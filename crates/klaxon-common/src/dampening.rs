//! Dampening definitions. A dampening decides how many matching evaluations
//! a trigger mode needs before it fires; the runtime counters live in the
//! engine crate, this is only the stored configuration.

use crate::types::Mode;
use serde::{Deserialize, Serialize};

/// # Examples
///
/// ```
/// use klaxon_common::dampening::DampeningType;
///
/// assert_eq!("relaxed_count".parse::<DampeningType>().unwrap(), DampeningType::RelaxedCount);
/// assert_eq!(DampeningType::Strict.to_string(), "strict");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DampeningType {
    /// N consecutive matching evaluations.
    Strict,
    /// N matching out of the last M evaluations.
    RelaxedCount,
    /// N matching evaluations within a trailing time window.
    RelaxedTime,
}

impl std::fmt::Display for DampeningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DampeningType::Strict => write!(f, "strict"),
            DampeningType::RelaxedCount => write!(f, "relaxed_count"),
            DampeningType::RelaxedTime => write!(f, "relaxed_time"),
        }
    }
}

impl std::str::FromStr for DampeningType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(DampeningType::Strict),
            "relaxed_count" => Ok(DampeningType::RelaxedCount),
            "relaxed_time" => Ok(DampeningType::RelaxedTime),
            _ => Err(format!("unknown dampening type: {s}")),
        }
    }
}

/// Stored dampening configuration for one (trigger, mode).
///
/// Only the settings relevant to `dampening_type` are meaningful; the others
/// stay zero. Use the constructors rather than filling fields by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dampening {
    pub tenant_id: String,
    pub trigger_id: String,
    pub trigger_mode: Mode,
    pub dampening_type: DampeningType,
    /// Matching evaluations required to fire.
    pub eval_true_setting: u32,
    /// Window length in evaluations (RelaxedCount only).
    pub eval_total_setting: u32,
    /// Window length in milliseconds (RelaxedTime only).
    pub eval_time_setting: i64,
}

impl Dampening {
    pub fn strict(tenant_id: &str, trigger_id: &str, mode: Mode, eval_true: u32) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            trigger_mode: mode,
            dampening_type: DampeningType::Strict,
            eval_true_setting: eval_true,
            eval_total_setting: 0,
            eval_time_setting: 0,
        }
    }

    pub fn relaxed_count(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        eval_true: u32,
        eval_total: u32,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            trigger_mode: mode,
            dampening_type: DampeningType::RelaxedCount,
            eval_true_setting: eval_true,
            eval_total_setting: eval_total,
            eval_time_setting: 0,
        }
    }

    pub fn relaxed_time(
        tenant_id: &str,
        trigger_id: &str,
        mode: Mode,
        eval_true: u32,
        eval_time_ms: i64,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            trigger_mode: mode,
            dampening_type: DampeningType::RelaxedTime,
            eval_true_setting: eval_true,
            eval_total_setting: 0,
            eval_time_setting: eval_time_ms,
        }
    }

    /// Derived identifier, unique per (trigger, mode): `{trigger_id}-{mode}`.
    pub fn dampening_id(&self) -> String {
        format!("{}-{}", self.trigger_id, self.trigger_mode)
    }

    /// Checks the settings are coherent for `dampening_type`.
    pub fn validate(&self) -> Result<(), String> {
        if self.eval_true_setting < 1 {
            return Err("evalTrueSetting must be >= 1".to_string());
        }
        match self.dampening_type {
            DampeningType::Strict => Ok(()),
            DampeningType::RelaxedCount => {
                if self.eval_total_setting <= self.eval_true_setting {
                    Err("evalTotalSetting must be greater than evalTrueSetting".to_string())
                } else {
                    Ok(())
                }
            }
            DampeningType::RelaxedTime => {
                if self.eval_time_setting <= 0 {
                    Err("evalTimeSetting must be > 0".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}
