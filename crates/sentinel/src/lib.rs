//! perf-sentinel daemon: configuration and HTTP API around the monitor

pub mod api;
pub mod config;
