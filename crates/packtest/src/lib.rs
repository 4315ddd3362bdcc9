//! # packtest
//!
//! Builds throwaway application images through an external buildpack
//! pipeline, runs them, and tears everything down again.
//!
//! A [`Session`](session::Session) owns one sandbox, one tag generator, and
//! the instances launched from the images it builds.
//!
//! # Example
//!
//! ```rust,no_run
//! use packtest::common::config::HarnessConfig;
//! use packtest::image::descriptor::BuilderDescriptor;
//! use packtest::pipeline::descriptor::ComponentInfo;
//! use packtest::session::Session;
//!
//! # fn main() -> packtest::common::error::Result<()> {
//! let mut session = Session::open(HarnessConfig::from_env())?;
//! let descriptor = BuilderDescriptor::new()
//!     .component("org.example.node", "/fixtures/node-buildpack")
//!     .group(vec![ComponentInfo::new("org.example.node", "0.0.1")]);
//! let packed = session.pack("/fixtures/simple_app".as_ref(), &descriptor)?;
//!
//! let mut app = session.instance(packed.image().clone(), "simple_app");
//! let endpoint = app.start_and_wait_blocking()?;
//! println!("serving on {endpoint}");
//! app.destroy()?;
//! session.teardown()
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod logging;
pub mod session;

pub use packtest_common as common;
pub use packtest_image as image;
pub use packtest_pipeline as pipeline;
pub use packtest_runtime as runtime;
pub use packtest_sandbox as sandbox;
