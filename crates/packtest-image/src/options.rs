//! Options for building an application image directly against a builder.

use std::collections::BTreeMap;
use std::path::Path;

/// Settings for one `pack build` invocation.
///
/// Unset fields fall back to what the [`crate::pack::ImageBuilder`] was
/// configured with: a freshly generated tag and the default builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    image: Option<String>,
    builder: Option<String>,
    run_image: Option<String>,
    buildpacks: Vec<String>,
    offline: bool,
    no_pull: bool,
    env: BTreeMap<String, String>,
}

impl BuildOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags the image with `name` instead of a generated tag.
    #[must_use]
    pub fn image(mut self, name: impl Into<String>) -> Self {
        self.image = Some(name.into());
        self
    }

    /// Builds with `builder` instead of the default builder.
    #[must_use]
    pub fn builder(mut self, builder: impl Into<String>) -> Self {
        self.builder = Some(builder.into());
        self
    }

    /// Overrides the run image.
    #[must_use]
    pub fn run_image(mut self, image: impl Into<String>) -> Self {
        self.run_image = Some(image.into());
        self
    }

    /// Adds a component to use instead of the builder's detection.
    #[must_use]
    pub fn buildpack(mut self, reference: impl Into<String>) -> Self {
        self.buildpacks.push(reference.into());
        self
    }

    /// Adds several components, in order.
    #[must_use]
    pub fn buildpacks<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buildpacks.extend(references.into_iter().map(Into::into));
        self
    }

    /// Builds without network access. Implies [`BuildOptions::no_pull`].
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Uses only locally present images.
    #[must_use]
    pub const fn no_pull(mut self, no_pull: bool) -> Self {
        self.no_pull = no_pull;
        self
    }

    /// Sets a build-time environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.env.insert(key.into(), value.into());
        self
    }

    /// Returns the explicitly requested image name, if any.
    #[must_use]
    pub fn image_name(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Assembles the `pack build` argument list for `image`.
    #[must_use]
    pub fn args(&self, image: &str, source: &Path, default_builder: &str) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            image.to_string(),
            "--path".to_string(),
            source.display().to_string(),
            "--builder".to_string(),
            self.builder.as_deref().unwrap_or(default_builder).to_string(),
        ];
        if let Some(run_image) = &self.run_image {
            args.push("--run-image".into());
            args.push(run_image.clone());
        }
        for buildpack in &self.buildpacks {
            args.push("--buildpack".into());
            args.push(buildpack.clone());
        }
        if self.offline {
            args.push("--network".into());
            args.push("none".into());
        }
        if self.offline || self.no_pull {
            args.push("--no-pull".into());
        }
        for (key, value) in &self.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "/fixtures/app";

    #[test]
    fn minimal_build_uses_default_builder() {
        let args = BuildOptions::new().args("abc", Path::new(SOURCE), "cloudfoundry/cnb:cflinuxfs3");
        assert_eq!(
            args,
            ["build", "abc", "--path", SOURCE, "--builder", "cloudfoundry/cnb:cflinuxfs3"]
        );
    }

    #[test]
    fn offline_build_with_buildpack_and_env() {
        let args = BuildOptions::new()
            .buildpack("a")
            .offline(true)
            .env("some-key", "some-val")
            .args("some-image", Path::new(SOURCE), "cloudfoundry/cnb:cflinuxfs3")
            .join(" ");
        assert_eq!(
            args,
            format!(
                "build some-image --path {SOURCE} --builder cloudfoundry/cnb:cflinuxfs3 \
                 --buildpack a --network none --no-pull -e some-key=some-val"
            )
        );
    }

    #[test]
    fn explicit_builder_and_run_image_win() {
        let args = BuildOptions::new()
            .builder("example/builder")
            .run_image("example/run")
            .no_pull(true)
            .args("img", Path::new(SOURCE), "ignored");
        assert!(args.windows(2).any(|w| w == ["--builder", "example/builder"]));
        assert!(args.windows(2).any(|w| w == ["--run-image", "example/run"]));
        assert!(args.contains(&"--no-pull".to_string()));
        assert!(!args.contains(&"--network".to_string()));
    }

    #[test]
    fn env_is_emitted_in_key_order() {
        let args = BuildOptions::new()
            .env("ZED", "1")
            .env("ALPHA", "2")
            .args("img", Path::new(SOURCE), "b");
        let env: Vec<_> = args.iter().filter(|a| a.contains('=')).cloned().collect();
        assert_eq!(env, ["ALPHA=2", "ZED=1"]);
    }

    #[test]
    fn buildpacks_keep_order() {
        let options = BuildOptions::new().buildpacks(["first", "second"]).buildpack("third");
        let args = options.args("img", Path::new(SOURCE), "b");
        let bps: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "--buildpack")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(bps, ["first", "second", "third"]);
        assert_eq!(options.image_name(), None);
    }
}
