use bilat_device::BuildOptions;

/// Dispatch configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Options appended after the type definitions of every build.
    pub extra_build_options: BuildOptions,
}

impl RuntimeConfig {
    /// Read configuration from `BILAT_BUILD_OPTIONS`.
    pub fn from_env() -> Self {
        Self::from_options_line(std::env::var("BILAT_BUILD_OPTIONS").ok().as_deref())
    }

    /// Configuration from an optional compiler option line.
    ///
    /// A malformed line is ignored with a warning.
    pub fn from_options_line(line: Option<&str>) -> Self {
        let extra_build_options = match line {
            Some(line) => BuildOptions::parse(line).unwrap_or_else(|token| {
                tracing::warn!(%token, "ignoring malformed BILAT_BUILD_OPTIONS");
                BuildOptions::new()
            }),
            None => BuildOptions::new(),
        };
        Self { extra_build_options }
    }
}
