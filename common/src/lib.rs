//! Types, tracing and metric definitions shared by the template trigger components.
pub mod metrics;
pub mod tracer;

pub use tracer::{TracerEngine, TracerError};

/// Raw ADC reading of one trace sample.
pub type Intensity = i32;
/// Index of a detector channel (e.g. one antenna polarisation).
pub type Channel = u32;
/// Sampling rate, in MHz.
pub type SampleRate = u32;

/// Builds the version string reported by `--version`.
///
/// The calling crate must depend on `const_format` and `git-version`.
#[macro_export]
macro_rules! version {
    () => {
        const_format::concatcp!(
            env!("CARGO_PKG_VERSION"),
            " (",
            git_version::git_version!(fallback = "unknown"),
            ")"
        )
    };
}

/// Should be called once at the start of each component.
/// Installs the stdout subscriber, filtered by the `RUST_LOG` environment variable.
#[macro_export]
macro_rules! init_tracer {
    () => {
        $crate::TracerEngine::new(env!("CARGO_BIN_NAME"), module_path!())
    };
}
