/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! tactbus – bus, timing and tactile telemetry core for a robot arm
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── clock          – monotonic time, relative / absolute sleeps
//! ├── periodic/      – PeriodicLoopTimer on hard-RT or timerfd backends
//! ├── bus/           – bus addresses, frames, transport trait, loopback bus
//! ├── protocol/      – property get/set and the reply-decoder seam
//! ├── tactile/       – 24-cell sensor codecs, driver and simulated device
//! ├── safety         – safety-mode / fault polling thread
//! └── config/        – YAML stack configuration
//! ```
//!
//! Control code runs one [`periodic::PeriodicLoopTimer`] per loop and one
//! [`tactile::TactilePuck`] per attached sensor. The bus transport is the
//! only object shared between devices.

pub mod bus;
pub mod clock;
pub mod config;
pub mod periodic;
pub mod protocol;
pub mod safety;
pub mod tactile;
