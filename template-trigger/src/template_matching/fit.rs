//! Searches every template and phase for the best alignment with a trace.
use super::{
    Real,
    correlation::{Normalisation, max_correlation},
    error::{ConfigError, FitError, ShapeError},
    library::TemplateLibrary,
};
use flt_common::Intensity;
use serde::Serialize;
use std::{num::ParseIntError, ops::Range, str::FromStr};
use tracing::{debug, instrument, trace};

/// Window, relative to the trace maximum, in which the template peak is searched for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CorrelationWindow {
    start: isize,
    end: isize,
}

impl CorrelationWindow {
    /// # Parameters
    /// - start: number of samples BEFORE the trace maximum, must be <= 0.
    /// - end: number of samples AFTER the trace maximum, must be >= 0.
    pub fn new(start: isize, end: isize) -> Result<Self, ConfigError> {
        if start > 0 {
            return Err(ConfigError::WindowStartPositive(start));
        }
        if end < 0 {
            return Err(ConfigError::WindowEndNegative(end));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> isize {
        self.start
    }

    pub fn end(&self) -> isize {
        self.end
    }

    pub fn span(&self) -> usize {
        self.end.abs_diff(self.start)
    }
}

impl Default for CorrelationWindow {
    fn default() -> Self {
        Self { start: -10, end: 10 }
    }
}

impl FromStr for CorrelationWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = parse_pair::<isize>(s)?;
        Self::new(start, end)
    }
}

/// Parses a string of the form `start,end` into a pair of integers.
pub(crate) fn parse_pair<T>(s: &str) -> Result<(T, T), ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    let vals: Vec<_> = s.split(',').map(str::trim).collect();
    if let [start, end] = vals.as_slice() {
        let parse = |v: &str| {
            v.parse::<T>()
                .map_err(|e| ConfigError::RangeValue(s.to_owned(), e))
        };
        Ok((parse(*start)?, parse(*end)?))
    } else {
        Err(ConfigError::RangeFormat(s.to_owned()))
    }
}

/// How the trace segment was fitted into the bounds of the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "policy")]
pub enum SegmentPolicy {
    /// The segment lies entirely within the trace.
    Full,
    /// The segment would have started before the trace, so it starts at sample zero
    /// and is shortened by the overhang.
    ClampedAtStart { shrunk_by: usize },
    /// The segment would have run past the trace, so it ends at the trace's last sample.
    TruncatedAtEnd { lost: usize },
}

/// The samples of the trace over which the templates are correlated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SegmentBounds {
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub policy: SegmentPolicy,
}

impl SegmentBounds {
    /// Determines the segment of `size_segment` samples starting at `sample_start_segment`,
    /// restricted to a trace of `trace_len` samples.
    pub fn new(trace_len: usize, sample_start_segment: isize, size_segment: usize) -> Self {
        if sample_start_segment < 0 {
            let shrunk_by = sample_start_segment.unsigned_abs();
            Self {
                start: 0,
                end: size_segment.saturating_sub(shrunk_by).min(trace_len),
                policy: SegmentPolicy::ClampedAtStart { shrunk_by },
            }
        } else {
            let start = sample_start_segment.unsigned_abs();
            let end = start + size_segment;
            if end > trace_len {
                Self {
                    start: start.min(trace_len),
                    end: trace_len,
                    policy: SegmentPolicy::TruncatedAtEnd {
                        lost: end - trace_len,
                    },
                }
            } else {
                Self {
                    start,
                    end,
                    policy: SegmentPolicy::Full,
                }
            }
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The outcome of a template fit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitResult {
    /// Index of the best-fit template.
    pub template_id_best: usize,
    /// Phase of the best-fit template's best desampling.
    pub idx_template_desampled_best: usize,
    /// Sample of the trace at which the best-fit template peaks.
    pub t_peak_best: usize,
    /// Magnitude of the correlation of the best-fit template.
    pub corr_max_best: Real,
    /// Number of (template, phase) pairs which were correlated.
    pub pairs_examined: usize,
    /// The trace segment the templates were correlated with.
    pub segment: SegmentBounds,
    /// The [TemplateLibrary::generation] the fit was performed against.
    pub library_generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct PairMatch {
    template_id: usize,
    phase: usize,
    offset: usize,
    magnitude: Real,
}

/// Performs the template fit of a trace.
///
/// The segment of the trace starts where a desampled template must begin for its peak to
/// line up with `t_max`, and is long enough to slide the template across the span of the
/// correlation window. For each template the
/// phase with the largest correlation is chosen, and the template with the largest of these
/// is the best fit. Ties are won by the earlier template or phase.
///
/// The best-fit peak is measured from where the segment would start before clamping to the
/// trace, so a segment clamped at the start of the trace reports the offset from `t_max`.
/// # Parameters
/// - library: the templates to search.
/// - window: the window around `t_max` to search.
/// - normalisation: how the correlations are scaled.
/// - trace: the raw ADC trace.
/// - t_max: position of the feature of interest, usually the trace maximum. It must lie in the trace.
#[instrument(
    skip_all,
    level = "debug",
    fields(t_max = t_max, corr_max_best = tracing::field::Empty),
    err(level = "debug")
)]
pub fn fit(
    library: &TemplateLibrary,
    window: &CorrelationWindow,
    normalisation: Normalisation,
    trace: &[Intensity],
    t_max: usize,
) -> Result<FitResult, FitError> {
    if library.is_empty() {
        return Err(FitError::EmptyLibrary);
    }
    if t_max >= trace.len() {
        return Err(ShapeError::TraceMaximumOutsideTrace {
            t_max,
            trace_len: trace.len(),
        }
        .into());
    }

    let size_template_desampled = library.size_template_desampled();
    let size_segment = window.span() + size_template_desampled;
    let sample_peak = library.sample_peak_template_desampled();
    let sample_start_segment = t_max as isize - sample_peak as isize;

    let segment = SegmentBounds::new(trace.len(), sample_start_segment, size_segment);
    if segment.policy != SegmentPolicy::Full {
        debug!("Trace segment restricted by trace bounds: {:?}", segment);
    }
    let trace_segment = trace.get(segment.range()).unwrap_or_default();
    if trace_segment.len() < size_template_desampled {
        return Err(ShapeError::SegmentShorterThanTemplate {
            segment: trace_segment.len(),
            template: size_template_desampled,
        }
        .into());
    }

    let mut best: Option<PairMatch> = None;
    let mut pairs_examined = 0;
    for (template_id, phases) in library.templates_desampled().iter().enumerate() {
        let mut template_best: Option<PairMatch> = None;
        for (phase, template) in phases.iter().enumerate() {
            let (offset, magnitude) = max_correlation(trace_segment, template, normalisation)?;
            pairs_examined += 1;
            trace!(template_id, phase, offset, magnitude);
            if template_best.is_none_or(|b| magnitude > b.magnitude) {
                template_best = Some(PairMatch {
                    template_id,
                    phase,
                    offset,
                    magnitude,
                });
            }
        }
        if let Some(template_best) =
            template_best.filter(|t| best.is_none_or(|b| t.magnitude > b.magnitude))
        {
            best = Some(template_best);
        }
    }
    let best = best.ok_or(FitError::EmptyLibrary)?;

    tracing::Span::current().record("corr_max_best", best.magnitude);

    Ok(FitResult {
        template_id_best: best.template_id,
        idx_template_desampled_best: best.phase,
        // sample_start_segment + sample_peak is t_max
        t_peak_best: t_max + best.offset,
        corr_max_best: best.magnitude,
        pairs_examined,
        segment,
        library_generation: library.generation(),
    })
}
