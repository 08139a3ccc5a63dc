//! # Steward Gateway
//!
//! Governance gateway that sits between client applications and a set of
//! third-party LLM providers. For every chat-completion request it
//! authenticates the caller, admits it under a per-key token bucket,
//! routes it deterministically from task/budget/latency hints, drives a
//! sequential fallback chain across the provider adapters, and records
//! cost and telemetry for the winning attempt.
//!
//! The provider adapters, router and pricing table live in the
//! `steward-providers` crate; this crate owns the HTTP surface and all
//! shared mutable state (token buckets, auth cache, metrics registry,
//! persistence pool).

pub mod auth;
pub mod config;
pub mod fallback;
pub mod gateway_error;
pub mod handlers;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod storage;

pub use config::Settings;
pub use gateway_error::GatewayError;
pub use server::{create_server, AppState};
