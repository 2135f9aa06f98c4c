//! CPU temperature monitor for single-board computers.
//!
//! Samples the thermal zone, moves the cpufreq bounds when the temperature
//! crosses a threshold, blinks the tri-colour status LED to show the band,
//! and keeps a capped plain-text event log.

pub mod config;
pub mod controller;
pub mod error;
pub mod eventlog;
pub mod history;
pub mod indicator;
pub mod monitor;
pub mod report;
pub mod sensors;
pub mod stats;
