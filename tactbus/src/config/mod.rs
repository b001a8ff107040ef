/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Stack configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! scheduler:
//!   period_s: 0.002
//!   priority: 50            # optional
//!   backend: auto           # auto | hard_realtime | timer_fd
//! bus:
//!   receive_timeout_ms: 100 # optional
//! tactile:
//!   tact_property: 106
//!   tactid_property: 107
//!   format: full            # full | top10
//!   devices: [11, 12, 13, 14]
//! safety:
//!   poll_period_s: 0.1
//! ```
//!
//! Every section and field is optional. Values are range-checked at load so
//! the rest of the stack only ever sees validated ids and durations.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::bus::loopback::LoopbackBus;
use crate::periodic::BackendPreference;
use crate::protocol::{DeviceId, PropertyId};
use crate::tactile::{TactFormat, TactProperties, DEFAULT_TACTID_PROPERTY, DEFAULT_TACT_PROPERTY};

/// 500 Hz control loop.
pub const DEFAULT_PERIOD_S: f64 = 0.002;
pub const DEFAULT_SAFETY_POLL_S: f64 = 0.1;
/// Finger pucks F1..F3 and the palm puck of a hand.
pub const DEFAULT_DEVICES: [u8; 4] = [11, 12, 13, 14];

const MAX_RT_PRIORITY: i32 = 99;

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StackConfigFile {
    scheduler: SchedulerSection,
    bus: BusSection,
    tactile: TactileSection,
    safety: SafetySection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SchedulerSection {
    period_s: f64,
    priority: Option<i32>,
    backend: BackendPreference,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            period_s: DEFAULT_PERIOD_S,
            priority: None,
            backend: BackendPreference::Auto,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BusSection {
    receive_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TactileSection {
    tact_property: u8,
    tactid_property: u8,
    format: TactFormat,
    devices: Vec<u8>,
}

impl Default for TactileSection {
    fn default() -> Self {
        Self {
            tact_property: DEFAULT_TACT_PROPERTY,
            tactid_property: DEFAULT_TACTID_PROPERTY,
            format: TactFormat::Full,
            devices: DEFAULT_DEVICES.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SafetySection {
    poll_period_s: f64,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            poll_period_s: DEFAULT_SAFETY_POLL_S,
        }
    }
}

// ── Public data structures ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Loop period in seconds, always `> 0`.
    pub period_s: f64,
    /// Real-time priority hint for the hard-RT backend.
    pub priority: Option<i32>,
    pub backend: BackendPreference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig {
    /// Bound for best-effort receives. `None` blocks indefinitely.
    pub receive_timeout: Option<Duration>,
}

impl BusConfig {
    /// In-process bus with this receive bound. The send log stays off, so a
    /// long-running loop keeps no per-frame history.
    pub fn loopback(&self) -> LoopbackBus {
        LoopbackBus::with_options(self.receive_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TactileConfig {
    pub properties: TactProperties,
    pub format: TactFormat,
    pub devices: Vec<DeviceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
    pub poll_period: Duration,
}

/// Validated configuration of the whole stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub scheduler: SchedulerConfig,
    pub bus: BusConfig,
    pub tactile: TactileConfig,
    pub safety: SafetyConfig,
}

impl Default for StackConfig {
    /// Same values an empty configuration file produces.
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig {
                period_s: DEFAULT_PERIOD_S,
                priority: None,
                backend: BackendPreference::Auto,
            },
            bus: BusConfig {
                receive_timeout: None,
            },
            tactile: TactileConfig {
                properties: TactProperties::default(),
                format: TactFormat::Full,
                devices: DEFAULT_DEVICES.iter().filter_map(|&id| DeviceId::new(id).ok()).collect(),
            },
            safety: SafetyConfig {
                poll_period: Duration::from_secs_f64(DEFAULT_SAFETY_POLL_S),
            },
        }
    }
}

impl StackConfig {
    /// Parse and validate `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is malformed or
    /// has unknown keys, or any value is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading stack configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;
        let cfg = Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))?;

        info!(
            period_s = cfg.scheduler.period_s,
            backend = ?cfg.scheduler.backend,
            devices = cfg.tactile.devices.len(),
            format = ?cfg.tactile.format,
            "Configuration loaded"
        );
        Ok(cfg)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // an empty document deserializes as unit, not as an empty map
        let file: StackConfigFile = if content.trim().is_empty() {
            StackConfigFile::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML")?
        };
        Self::validate(file)
    }

    fn validate(file: StackConfigFile) -> Result<Self> {
        let s = file.scheduler;
        ensure!(
            s.period_s.is_finite() && s.period_s > 0.0,
            "scheduler.period_s must be > 0 (got {})",
            s.period_s
        );
        if let Some(p) = s.priority {
            ensure!(
                (1..=MAX_RT_PRIORITY).contains(&p),
                "scheduler.priority must be in 1..={MAX_RT_PRIORITY} (got {p})"
            );
        }

        let t = file.tactile;
        let tact = PropertyId::new(t.tact_property).context("tactile.tact_property")?;
        let tactid = PropertyId::new(t.tactid_property).context("tactile.tactid_property")?;
        ensure!(tact != tactid, "tactile.tact_property and tactile.tactid_property must differ");

        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(t.devices.len());
        for id in t.devices {
            let device = DeviceId::new(id).context("tactile.devices")?;
            if !seen.insert(device) {
                bail!("tactile.devices lists device {id} more than once");
            }
            devices.push(device);
        }

        let poll = file.safety.poll_period_s;
        ensure!(
            poll.is_finite() && poll > 0.0,
            "safety.poll_period_s must be > 0 (got {poll})"
        );
        let poll_period = Duration::try_from_secs_f64(poll)
            .with_context(|| format!("safety.poll_period_s is out of range (got {poll})"))?;

        debug!(?devices, tact = tact.get(), tactid = tactid.get(), "tactile configuration");

        Ok(Self {
            scheduler: SchedulerConfig {
                period_s: s.period_s,
                priority: s.priority,
                backend: s.backend,
            },
            bus: BusConfig {
                receive_timeout: file.bus.receive_timeout_ms.map(Duration::from_millis),
            },
            tactile: TactileConfig {
                properties: TactProperties { tact, tactid },
                format: t.format,
                devices,
            },
            safety: SafetyConfig {
                poll_period,
            },
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
