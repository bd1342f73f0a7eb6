//! Global configuration types for MyMind.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls plan
//! lengths, chat room sizing, the expiry poll interval, and the side-effect
//! worker's retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::order::Plan;

/// Top-level configuration for the MyMind platform.
///
/// Loaded from `~/.mymind/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub plans: PlanConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub effects: EffectsConfig,
}

/// Session length per plan, in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "default_free_plan")]
    pub free_plan: u32,
    #[serde(default = "default_month_plan")]
    pub month_plan: u32,
    #[serde(default = "default_three_month_plan")]
    pub three_month_plan: u32,
    #[serde(default = "default_year_plan")]
    pub year_plan: u32,
}

fn default_free_plan() -> u32 {
    3
}

fn default_month_plan() -> u32 {
    5
}

fn default_three_month_plan() -> u32 {
    10
}

fn default_year_plan() -> u32 {
    15
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            free_plan: default_free_plan(),
            month_plan: default_month_plan(),
            three_month_plan: default_three_month_plan(),
            year_plan: default_year_plan(),
        }
    }
}

impl PlanConfig {
    /// Session length in minutes for a plan.
    pub fn minutes(&self, plan: Plan) -> u32 {
        match plan {
            Plan::FreeTrial => self.free_plan,
            Plan::Month => self.month_plan,
            Plan::ThreeMonth => self.three_month_plan,
            Plan::Year => self.year_plan,
        }
    }

    /// Expiry offset applied at confirmation time.
    pub fn duration(&self, plan: Plan) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.minutes(plan)))
    }
}

/// Real-time chat settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Per-room broadcast buffer. A slow connection that falls further
    /// behind than this skips events.
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,

    /// How often the expiry monitor re-fetches entitlement state.
    #[serde(default = "default_poll_interval_ms")]
    pub expiry_poll_interval_ms: u64,
}

fn default_room_capacity() -> usize {
    64
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            room_capacity: default_room_capacity(),
            expiry_poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ChatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_poll_interval_ms.max(1))
    }
}

/// Background side-effect worker settings (notifications, session counters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectsConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Total attempts per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts; doubled after each failure.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}
