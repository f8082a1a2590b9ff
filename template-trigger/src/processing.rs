//! Evaluates the template trigger on each channel of a trace event.
use crate::{
    parameters::PeakSearchRange,
    template_matching::{Decision, FitError, TemplateTrigger, TriggerError},
};
use flt_common::{
    Channel, Intensity,
    metrics::{
        failures::{self, FailureKind},
        names::{FAILURES, LAST_CORRELATION, TRACES_PROCESSED, TRACES_TRIGGERED},
    },
};
use itertools::Itertools;
use metrics::{counter, gauge};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{instrument, warn};

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Channel {channel} has no samples in which to search for the trace maximum")]
    NoSamplesInSearchRange { channel: Channel },
    #[error("Channel {channel}: {source}")]
    Trigger {
        channel: Channel,
        source: TriggerError,
    },
}

/// The outcome of evaluating one channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    /// The position of the trace maximum the fit was centred on.
    pub t_max: usize,
    #[serde(flatten)]
    pub decision: Decision,
}

/// Finds the position of the first global maximum of the trace.
/// # Parameters
/// - trace: the raw trace.
/// - range: if given, only samples in this range are searched.
pub fn find_t_max(trace: &[Intensity], range: Option<PeakSearchRange>) -> Option<usize> {
    let range = range.map_or(0..trace.len(), |range| range.within(trace.len()));
    let offset = range.start;
    trace
        .get(range)?
        .iter()
        .position_min_by_key(|&&v| Reverse(v))
        .map(|t| t + offset)
}

/// Evaluates the trigger on every channel in parallel.
///
/// Channels are numbered by their position in `traces`, and the reports are returned in the same order.
#[instrument(skip_all, fields(num_channels = traces.len()), err(level = "warn"))]
pub fn process_traces(
    template_trigger: &TemplateTrigger,
    traces: &[Vec<Intensity>],
    peak_search_range: Option<PeakSearchRange>,
) -> Result<Vec<ChannelReport>, ProcessingError> {
    traces
        .par_iter()
        .enumerate()
        .map(|(index, trace)| {
            process_channel(template_trigger, index as Channel, trace, peak_search_range)
        })
        .collect()
}

#[instrument(skip_all, level = "debug", fields(channel = channel))]
fn process_channel(
    template_trigger: &TemplateTrigger,
    channel: Channel,
    trace: &[Intensity],
    peak_search_range: Option<PeakSearchRange>,
) -> Result<ChannelReport, ProcessingError> {
    let t_max = find_t_max(trace, peak_search_range)
        .ok_or(ProcessingError::NoSamplesInSearchRange { channel })?;

    let decision = template_trigger
        .evaluate(trace, t_max)
        .inspect_err(|e| {
            warn!("Template fit failed: {e}");
            if let TriggerError::Fit(e) = e {
                let kind = match e {
                    FitError::EmptyLibrary => FailureKind::EmptyTemplateLibrary,
                    FitError::Shape(_) => FailureKind::TraceSegmentTooShort,
                };
                counter!(FAILURES, &[failures::get_label(kind)]).increment(1);
            }
        })
        .map_err(|source| ProcessingError::Trigger { channel, source })?;

    let channel_label = ("channel", channel.to_string());
    counter!(TRACES_PROCESSED, &[channel_label.clone()]).increment(1);
    if decision.triggered {
        counter!(TRACES_TRIGGERED, &[channel_label.clone()]).increment(1);
    }
    gauge!(LAST_CORRELATION, &[channel_label]).set(decision.fit.corr_max_best);

    Ok(ChannelReport {
        channel,
        t_max,
        decision,
    })
}
