//! Weeproxy is a path-based reverse proxy with per-backend rate limiting
//! and circuit breaking.
//!
//! Each incoming request is matched against configured path prefixes and
//! sent to one of the route's backends, round-robin. Every outbound request
//! passes through an intercepting transport that counts requests and
//! failures per backend host. Once a second the counters are compared to
//! the configured limits: hosts over a limit are banned (their circuit
//! opens) and the router stops sending them traffic until the counters
//! decay back under the limits.
//!
//! # Architecture
//!
//! - [`breaker`] -- The circuit breaker: backend registry, per-host traffic
//!   accounting, the intercepting transport and the epoch sanitizer.
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- JSON configuration loading and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint with per-backend traffic state.
//! - [`metrics`] -- `GET /metrics` request outcome and per-host counters.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Request forwarding: route matching, backend selection and
//!   header construction.
//! - [`server`] -- Axum server setup, shared application state, HTTP client,
//!   and graceful shutdown.

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod breaker;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod server;
