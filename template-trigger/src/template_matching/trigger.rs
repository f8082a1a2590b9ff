//! Turns the best correlation of a fit into a trigger decision.
use super::{
    Real,
    correlation::Normalisation,
    error::{ConfigError, StateError, TriggerError},
    fit::{CorrelationWindow, FitResult, fit},
    library::{SamplingRates, TemplateGeometry, TemplateLibrary},
};
use flt_common::{Intensity, SampleRate};
use serde::Serialize;
use std::{io::BufRead, path::Path, str::FromStr};
use tracing::{debug, instrument};

/// The correlation a fit must exceed for a trace to trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CorrelationThreshold(Real);

impl CorrelationThreshold {
    pub fn new(value: Real) -> Result<Self, ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::ThresholdOutOfRange(value))
        }
    }

    pub fn value(&self) -> Real {
        self.0
    }
}

impl FromStr for CorrelationThreshold {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse()
            .map_err(|e| ConfigError::ThresholdValue(s.to_owned(), e))?;
        Self::new(value)
    }
}

/// Returns true iff the best correlation of `result` strictly exceeds `threshold`.
pub fn trigger(result: &FitResult, threshold: CorrelationThreshold) -> bool {
    result.corr_max_best > threshold.value()
}

/// Holds the most recent fit of a caller, for callers which fit and trigger in separate steps.
#[derive(Clone, Debug, Default)]
pub struct LastFit {
    last: Option<FitResult>,
}

impl LastFit {
    pub fn record(&mut self, result: FitResult) {
        self.last = Some(result);
    }

    pub fn get(&self) -> Option<&FitResult> {
        self.last.as_ref()
    }

    /// Triggers on the most recent fit, or fails if no fit has been recorded.
    pub fn trigger(&self, threshold: CorrelationThreshold) -> Result<bool, StateError> {
        self.last
            .as_ref()
            .map(|result| trigger(result, threshold))
            .ok_or(StateError::NoFitPerformed)
    }
}

/// The fit of a trace and whether it triggered.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decision {
    #[serde(flatten)]
    pub fit: FitResult,
    pub triggered: bool,
}

/// The template matching trigger, combining a [TemplateLibrary] with the fit and trigger settings.
///
/// The library is only read during [TemplateTrigger::evaluate], so a single instance may be
/// shared between threads evaluating different traces.
#[derive(Clone, Debug, Default)]
pub struct TemplateTrigger {
    library: TemplateLibrary,
    window: CorrelationWindow,
    threshold: CorrelationThreshold,
    normalisation: Normalisation,
}

impl TemplateTrigger {
    pub fn new(
        rates: SamplingRates,
        window: CorrelationWindow,
        threshold: CorrelationThreshold,
        normalisation: Normalisation,
    ) -> Self {
        Self {
            library: TemplateLibrary::new(rates),
            window,
            threshold,
            normalisation,
        }
    }

    pub fn set_sampling_rates(
        &mut self,
        adc_sampling_rate: SampleRate,
        sim_sampling_rate: SampleRate,
    ) -> Result<(), TriggerError> {
        let rates = SamplingRates::new(adc_sampling_rate, sim_sampling_rate)?;
        self.library.set_sampling_rates(rates)?;
        Ok(())
    }

    pub fn set_corr_window(&mut self, start: isize, end: isize) -> Result<(), TriggerError> {
        self.window = CorrelationWindow::new(start, end)?;
        Ok(())
    }

    pub fn set_corr_thresh(&mut self, corr_thresh: Real) -> Result<(), TriggerError> {
        self.threshold = CorrelationThreshold::new(corr_thresh)?;
        Ok(())
    }

    pub fn set_normalisation(&mut self, normalisation: Normalisation) {
        self.normalisation = normalisation;
    }

    pub fn load_templates(
        &mut self,
        path: &Path,
        geometry: TemplateGeometry,
    ) -> Result<(), TriggerError> {
        self.library.load(path, geometry)?;
        Ok(())
    }

    pub fn load_templates_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        geometry: TemplateGeometry,
    ) -> Result<(), TriggerError> {
        self.library.load_from_reader(reader, geometry)?;
        Ok(())
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    pub fn corr_window(&self) -> CorrelationWindow {
        self.window
    }

    pub fn corr_thresh(&self) -> CorrelationThreshold {
        self.threshold
    }

    pub fn normalisation(&self) -> Normalisation {
        self.normalisation
    }

    pub fn fit(&self, trace: &[Intensity], t_max: usize) -> Result<FitResult, TriggerError> {
        Ok(fit(
            &self.library,
            &self.window,
            self.normalisation,
            trace,
            t_max,
        )?)
    }

    pub fn trigger(&self, result: &FitResult) -> bool {
        trigger(result, self.threshold)
    }

    /// Fits the trace, then decides whether it triggers.
    #[instrument(skip_all, level = "trace", err(level = "debug"))]
    pub fn evaluate(&self, trace: &[Intensity], t_max: usize) -> Result<Decision, TriggerError> {
        let fit = self.fit(trace, t_max)?;
        let triggered = self.trigger(&fit);
        debug!(
            corr_max_best = fit.corr_max_best,
            triggered, "Evaluated trace"
        );
        Ok(Decision { fit, triggered })
    }
}
