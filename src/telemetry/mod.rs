// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing and metrics infrastructure.
//!
//! - **Tracing**: structured logging through `tracing`, installed by the host
//!   with [`init_telemetry`]
//! - **Metrics**: counters and latency histograms for session construction,
//!   challenges and identity resolution
//!
//! # Usage
//!
//! ```rust,ignore
//! use devlink::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Log fields name the organization, auth type and status. Tokens and PATs
//! are never logged.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Counter, Histogram, Metrics, MetricsSnapshot, OperationMetrics, GLOBAL_METRICS};
