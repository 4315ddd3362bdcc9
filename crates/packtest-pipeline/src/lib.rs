//! # packtest-pipeline
//!
//! Drives the external detect/build lifecycle for one harness session.
//!
//! - **Descriptors**: typed forms of the TOML files exchanged with the
//!   lifecycle (order, group, plan, launch and layer metadata).
//! - **Components**: staging component definitions into the sandbox so the
//!   lifecycle can mount them.
//! - **Lifecycle**: the detect and build stages, each one blocking
//!   container run with a fixed argument contract.
//! - **Output**: lazy accessors over what the build stage left behind.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod component;
pub mod descriptor;
pub mod lifecycle;
pub mod output;
