//! Turnstile - In-Process Rate Limiting
//!
//! This crate implements per-key request rate limiting with fixed counting
//! windows. Each named limiter instance tracks request counts independently;
//! a single shared eviction sweep removes expired tracking entries across
//! every registered instance to bound memory under key churn.

pub mod config;
pub mod error;
pub mod ratelimit;
