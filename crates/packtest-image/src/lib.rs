//! # packtest-image
//!
//! Produces runnable application images for a harness session.
//!
//! - **Descriptor**: the declarative builder description (components, their
//!   source locations, and groups) handed to the packaging tool.
//! - **Pack**: creating the intermediate builder image, the optional
//!   permission fix-up, and building the application image under a freshly
//!   generated tag.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod descriptor;
pub mod options;
pub mod pack;
