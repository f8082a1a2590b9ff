//! Errors raised by the template matching engine.
use super::Real;
use flt_common::SampleRate;
use std::{
    io,
    num::{ParseFloatError, ParseIntError},
    path::PathBuf,
};
use thiserror::Error;

/// Invalid rate, window, threshold or template geometry values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ADC sampling rate must be positive")]
    ZeroAdcSamplingRate,
    #[error(
        "Simulation sampling rate ({sim} MHz) must be at least as large as ADC sampling rate ({adc} MHz)"
    )]
    SimulationRateBelowAdcRate { adc: SampleRate, sim: SampleRate },
    #[error("Desampling factor {0} has to be >= 1")]
    DesamplingFactor(usize),
    #[error("Template size must be positive")]
    ZeroTemplateSize,
    #[error("Template peak sample {peak} must lie within the template of {size} samples")]
    PeakOutsideTemplate { peak: usize, size: usize },
    #[error("Template of {size} samples cannot be desampled by a factor of {factor}")]
    TemplateShorterThanDesamplingFactor { size: usize, factor: usize },
    #[error("Template peak sample {peak} lies outside the template of {size} samples once desampled by a factor of {factor}")]
    PeakOutsideDesampledTemplate {
        peak: usize,
        size: usize,
        factor: usize,
    },
    #[error("Correlation window start {0} must be <= 0, it is the number of samples BEFORE the trace maximum")]
    WindowStartPositive(isize),
    #[error("Correlation window end {0} must be >= 0, it is the number of samples AFTER the trace maximum")]
    WindowEndNegative(isize),
    #[error("Correlation threshold {0} must be between [0,1]")]
    ThresholdOutOfRange(Real),
    #[error("Peak search range {start},{end} is empty")]
    EmptyPeakSearchRange { start: usize, end: usize },
    #[error("Incorrect number of parameters in '{0}', expected pattern 'start,end'")]
    RangeFormat(String),
    #[error("Invalid integer in '{0}': {1}")]
    RangeValue(String, ParseIntError),
    #[error("Invalid correlation threshold '{0}': {1}")]
    ThresholdValue(String, ParseFloatError),
}

/// The template source could not be read, or contains malformed records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Error opening template file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Error reading template source: {0}")]
    Read(#[from] io::Error),
    #[error("Invalid template value '{value}' on line {line}: {source}")]
    Parse {
        line: usize,
        value: String,
        source: ParseFloatError,
    },
    #[error("Template value '{value}' on line {line} is not finite")]
    NonFiniteValue { line: usize, value: String },
    #[error("Template on line {line} has {found} samples, expected {expected}")]
    RecordLength {
        line: usize,
        found: usize,
        expected: usize,
    },
}

/// Correlation inputs are incompatibly sized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Template is empty")]
    EmptyTemplate,
    #[error("Trace segment of {segment} samples must be >= template of {template} samples")]
    SegmentShorterThanTemplate { segment: usize, template: usize },
    #[error("Trace maximum {t_max} lies outside the trace of {trace_len} samples")]
    TraceMaximumOutsideTrace { t_max: usize, trace_len: usize },
}

/// An operation was attempted before its required prior step.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("No templates have been loaded yet")]
    NoTemplatesLoaded,
    #[error("No template fit has been performed yet")]
    NoFitPerformed,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FitError {
    #[error("Template library is empty")]
    EmptyLibrary,
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Umbrella error for the [TemplateTrigger](super::TemplateTrigger) façade.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    State(#[from] StateError),
}
