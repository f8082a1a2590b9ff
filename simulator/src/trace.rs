//! Builds a synthetic ADC trace containing one desampled template.
use crate::noise::Noise;
use flt_common::Intensity;
use template_trigger::template_matching::{Real, TemplateLibrary};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TraceError {
    #[error("Template {index} does not exist, the library holds {num_templates} templates")]
    TemplateIndex { index: usize, num_templates: usize },
    #[error("Phase {phase} does not exist, the desampling factor is {factor}")]
    Phase { phase: usize, factor: usize },
    #[error("Template placed at sample {start} with {size} samples does not fit in a trace of {trace_len} samples")]
    OutsideTrace {
        start: usize,
        size: usize,
        trace_len: usize,
    },
    #[error("Template peak at sample {peak} precedes the template's own peak offset {offset}")]
    PeakTooEarly { peak: usize, offset: usize },
}

/// Where, and how large, the template appears in the trace.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    /// The trace sample at which the desampled template peaks.
    pub(crate) peak: usize,
    pub(crate) amplitude: Real,
    pub(crate) baseline: Real,
}

/// Looks up the desampled template for the given template and phase.
pub(crate) fn select_phase(
    library: &TemplateLibrary,
    index: usize,
    phase: usize,
) -> Result<&[Real], TraceError> {
    let phases = library
        .templates_desampled()
        .get(index)
        .ok_or(TraceError::TemplateIndex {
            index,
            num_templates: library.num_templates(),
        })?;
    phases.get(phase).map(Vec::as_slice).ok_or(TraceError::Phase {
        phase,
        factor: library.desampling_factor(),
    })
}

/// Creates a trace of `trace_len` samples holding `template`, scaled and offset by `placement`.
/// # Parameters
/// - trace_len: number of samples in the trace.
/// - template: the desampled template to embed.
/// - sample_peak: the sample at which `template` peaks.
/// - placement: where the template is placed and how it is scaled.
/// - noise: if given, is added to every sample.
pub(crate) fn simulate_trace(
    trace_len: usize,
    template: &[Real],
    sample_peak: usize,
    placement: Placement,
    mut noise: Option<&mut Noise>,
) -> Result<Vec<Intensity>, TraceError> {
    let start = placement
        .peak
        .checked_sub(sample_peak)
        .ok_or(TraceError::PeakTooEarly {
            peak: placement.peak,
            offset: sample_peak,
        })?;
    if start + template.len() > trace_len {
        return Err(TraceError::OutsideTrace {
            start,
            size: template.len(),
            trace_len,
        });
    }

    Ok((0..trace_len)
        .map(|t| {
            let signal = t
                .checked_sub(start)
                .and_then(|i| template.get(i))
                .map_or(0.0, |v| placement.amplitude * v);
            let value = placement.baseline + signal;
            let value = match noise.as_deref_mut() {
                Some(noise) => noise.noisify(value),
                None => value,
            };
            value.round() as Intensity
        })
        .collect())
}
