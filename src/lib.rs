//! Core library for the `loadlens` CLI.
//!
//! The engine lives in [`load`], [`metrics`] and [`engine`]: a load profile
//! (flat virtual users x iterations, or a phased warmup/ramp-up/sustain/
//! ramp-down timeline) drives concurrent timed HTTP requests whose
//! measurements are folded into percentiles, time buckets, cache and
//! cold/warm statistics, then checked against assertions. [`chain`] runs
//! sequential requests with variable extraction on the same primitives.
mod app;
pub mod args;
pub mod assertions;
pub mod chain;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod http;
pub mod load;
pub mod metrics;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod system;

#[cfg(test)]
mod test_support;
