//! # packtest-runtime
//!
//! Owns the instances launched from built images.
//!
//! - **Backend**: the [`backend::ContainerRuntime`] seam and its docker CLI
//!   implementation.
//! - **Readiness**: a periodic health poll raced against a one-shot
//!   deadline.
//! - **Instance**: the `created → started → ready | unhealthy | timed-out`
//!   state machine with idempotent teardown.
//! - **Probe**: a small blocking HTTP client for checking a ready instance.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod instance;
pub mod probe;
pub mod readiness;
