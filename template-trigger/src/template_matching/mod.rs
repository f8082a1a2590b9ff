//! The template matching engine.
//!
//! A [TemplateLibrary] holds reference waveforms at the simulated sampling rate together
//! with their desamplings to the ADC rate. [fit] correlates a trace segment around the
//! trace maximum with every desampled template, and [trigger] thresholds the best
//! correlation found.
pub mod correlation;
pub mod error;
pub mod fit;
pub mod library;
pub mod trigger;

pub use correlation::{Normalisation, correlate, max_correlation, normalize, rms};
pub use error::{ConfigError, FitError, LibraryError, LoadError, ShapeError, StateError, TriggerError};
pub use fit::{CorrelationWindow, FitResult, SegmentBounds, SegmentPolicy, fit};
pub use library::{SamplingRates, Template, TemplateGeometry, TemplateLibrary, write_templates};
pub use trigger::{CorrelationThreshold, Decision, LastFit, TemplateTrigger, trigger};

pub type Real = f64;
