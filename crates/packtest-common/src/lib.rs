//! # packtest-common
//!
//! Shared error taxonomy, configuration model, constants, and the external
//! tool invocation primitive used across the packtest workspace.
//!
//! This crate is the leaf of the dependency graph: every other packtest
//! crate builds on the types defined here.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod fs;
pub mod process;
pub mod tag;
pub mod types;
