//! Defines the command line parameters of the template trigger.
use crate::template_matching::{
    CorrelationThreshold, CorrelationWindow, Normalisation, SamplingRates, TemplateGeometry,
    TemplateTrigger, TriggerError, error::ConfigError, fit::parse_pair,
};
use clap::Args;
use flt_common::SampleRate;
use std::{ops::Range, path::Path, str::FromStr};

/// Encapsulates the parameters of the template matching engine.
#[derive(Clone, Debug, Args)]
pub struct TriggerOptions {
    /// Sampling rate of the ADC, in MHz.
    #[clap(long, env, default_value = "500")]
    pub adc_sampling_rate: SampleRate,

    /// Sampling rate at which the templates were simulated, in MHz.
    /// Must be an integer multiple of the ADC sampling rate.
    #[clap(long, env, default_value = "2000")]
    pub sim_sampling_rate: SampleRate,

    /// Number of samples in each template, at the simulated sampling rate.
    #[clap(long, env, default_value = "400")]
    pub size_template: usize,

    /// Sample at which each template peaks, at the simulated sampling rate.
    #[clap(long, env, default_value = "120")]
    pub sample_peak_template: usize,

    /// Window, relative to the trace maximum, in which the template peak is searched for, as `start,end`.
    #[clap(long, env, default_value = "-10,10", allow_hyphen_values = true)]
    pub corr_window: CorrelationWindow,

    /// Correlation which must be exceeded for a trace to trigger, between 0 and 1.
    #[clap(long, env, default_value = "0")]
    pub corr_thresh: CorrelationThreshold,

    /// Determines how correlations are normalised.
    #[clap(long, env, default_value = "full")]
    pub normalisation: Normalisation,
}

impl TriggerOptions {
    /// Creates the trigger and loads its templates.
    pub fn build(&self, template_file: &Path) -> Result<TemplateTrigger, TriggerError> {
        let rates = SamplingRates::new(self.adc_sampling_rate, self.sim_sampling_rate)?;
        let geometry = TemplateGeometry::new(self.size_template, self.sample_peak_template)?;
        let mut template_trigger =
            TemplateTrigger::new(rates, self.corr_window, self.corr_thresh, self.normalisation);
        template_trigger.load_templates(template_file, geometry)?;
        Ok(template_trigger)
    }
}

/// Range of samples, as `start,end`, in which the trace maximum is searched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeakSearchRange {
    start: usize,
    end: usize,
}

impl PeakSearchRange {
    pub fn new(start: usize, end: usize) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::EmptyPeakSearchRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The range restricted to a trace of `trace_len` samples.
    pub fn within(&self, trace_len: usize) -> Range<usize> {
        self.start.min(trace_len)..self.end.min(trace_len)
    }
}

impl FromStr for PeakSearchRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = parse_pair::<usize>(s)?;
        Self::new(start, end)
    }
}
