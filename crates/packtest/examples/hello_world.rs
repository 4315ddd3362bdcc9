//! Builds a fixture app with a local component, runs it, and checks it
//! answers over HTTP.
//!
//! ```text
//! CNB_RUN_IMAGE=cfbuildpacks/cflinuxfs3-cnb-experimental:run \
//!     cargo run -p packtest --example hello_world -- <component dir> <app dir>
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use packtest::common::config::HarnessConfig;
use packtest::image::descriptor::{BuilderComponent, BuilderDescriptor};
use packtest::pipeline::component;
use packtest::runtime::probe::HttpProbe;
use packtest::session::Session;

fn main() -> anyhow::Result<()> {
    packtest::logging::init();

    let mut args = std::env::args().skip(1).map(PathBuf::from);
    let (Some(component_dir), Some(app_dir)) = (args.next(), args.next()) else {
        bail!("usage: hello_world <component dir> <app dir>");
    };

    let info = component::load_descriptor(&component_dir)
        .with_context(|| format!("reading component at {}", component_dir.display()))?
        .buildpack;

    let mut session = Session::open(HarnessConfig::from_env()).context("opening session")?;
    let mut descriptor = BuilderDescriptor::new().group(vec![info.clone()]);
    descriptor
        .buildpacks
        .push(BuilderComponent::local(info.id.clone(), &component_dir));

    let packed = session.pack(&app_dir, &descriptor).context("packing app")?;
    tracing::info!(image = %packed.image(), "packed");

    let mut app = session.instance(packed.image().clone(), "hello_world");
    let result = app
        .start_and_wait_blocking()
        .and_then(HttpProbe::new)
        .and_then(|probe| probe.expect_success("/"));

    let destroyed = app.destroy();
    let torn_down = session.teardown();

    let response = result.context("checking app")?;
    tracing::info!(status = response.status, body = %response.body, "app answered");
    destroyed.context("destroying instance")?;
    torn_down.context("tearing down session")?;
    Ok(())
}
