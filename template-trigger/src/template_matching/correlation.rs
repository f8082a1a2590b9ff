//! Valid-mode cross-correlation of trace segments against desampled templates.
use super::{Real, error::ShapeError};
use clap::ValueEnum;
use flt_common::Intensity;
use serde::Serialize;

/// Determines how the raw dot products of a correlation are scaled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalisation {
    /// The raw dot products.
    Raw,
    /// Each dot product is divided by the RMS of the trace sub-segment it was computed over.
    SegmentRms,
    /// As [Normalisation::SegmentRms], and further divided by the RMS and length of the template.
    /// This bounds the correlation to [-1,1].
    #[default]
    Full,
}

/// Computes the root mean square of a sequence of values, an empty sequence has an RMS of zero.
pub fn rms(values: &[Real]) -> Real {
    if values.is_empty() {
        return 0.0;
    }
    Real::sqrt(values.iter().map(|v| v * v).sum::<Real>() / values.len() as Real)
}

fn rms_of_segment(segment: &[Intensity]) -> Real {
    if segment.is_empty() {
        return 0.0;
    }
    let sum_of_squares = segment
        .iter()
        .map(|&v| v as Real * v as Real)
        .sum::<Real>();
    Real::sqrt(sum_of_squares / segment.len() as Real)
}

/// Scales a sequence to [-1,1] by its largest absolute value.
/// A sequence of zeros is returned unchanged.
pub fn normalize(values: &[Real]) -> Vec<Real> {
    let peak = values.iter().fold(0.0, |acc: Real, v| acc.max(v.abs()));
    if peak == 0.0 {
        values.to_vec()
    } else {
        values.iter().map(|v| v / peak).collect()
    }
}

/// Computes the cross correlation of a trace segment with a template in "valid" mode,
/// that is, only at offsets where the template lies entirely within the segment.
///
/// Where normalisation would divide by a zero RMS, the correlation is taken to be zero.
/// # Parameters
/// - segment: the trace samples of length `N`.
/// - template: the template of length `M <= N`, which is slid along the segment.
/// - normalisation: how each dot product is scaled.
/// # Return
/// The `N - M + 1` correlation values.
pub fn correlate(
    segment: &[Intensity],
    template: &[Real],
    normalisation: Normalisation,
) -> Result<Vec<Real>, ShapeError> {
    if template.is_empty() {
        return Err(ShapeError::EmptyTemplate);
    }
    if segment.len() < template.len() {
        return Err(ShapeError::SegmentShorterThanTemplate {
            segment: segment.len(),
            template: template.len(),
        });
    }

    let template_scale = match normalisation {
        Normalisation::Full => rms(template) * template.len() as Real,
        Normalisation::Raw | Normalisation::SegmentRms => 1.0,
    };

    let correlations = segment
        .windows(template.len())
        .map(|window| {
            let dot = window
                .iter()
                .zip(template)
                .map(|(&s, &t)| s as Real * t)
                .sum::<Real>();
            match normalisation {
                Normalisation::Raw => dot,
                Normalisation::SegmentRms | Normalisation::Full => {
                    let scale = rms_of_segment(window) * template_scale;
                    if scale == 0.0 { 0.0 } else { dot / scale }
                }
            }
        })
        .collect();
    Ok(correlations)
}

/// Finds the offset at which the correlation of the segment and template has greatest magnitude.
///
/// The sign of the correlation is discarded, so either polarity of a matching template counts.
/// If several offsets share the greatest magnitude, the earliest is returned.
/// # Return
/// The offset into `segment`, and the magnitude of the correlation at that offset.
pub fn max_correlation(
    segment: &[Intensity],
    template: &[Real],
    normalisation: Normalisation,
) -> Result<(usize, Real), ShapeError> {
    let correlations = correlate(segment, template, normalisation)?;

    let mut best = (0, 0.0);
    for (offset, correlation) in correlations.into_iter().enumerate() {
        let magnitude = correlation.abs();
        if offset == 0 || magnitude > best.1 {
            best = (offset, magnitude);
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn raw_valid_mode_dot_products() {
        let correlations = correlate(&[1, 2, 3, 4], &[1.0, 0.0], Normalisation::Raw).unwrap();
        assert_eq!(correlations, vec![1.0, 2.0, 3.0]);

        let (offset, magnitude) =
            max_correlation(&[1, 2, 3, 4], &[1.0, 0.0], Normalisation::Raw).unwrap();
        assert_eq!(offset, 2);
        assert_approx_eq!(magnitude, 3.0);
    }

    #[test]
    fn equal_lengths_give_single_value() {
        let correlations = correlate(&[2, -1, 3], &[1.0, 1.0, 1.0], Normalisation::Raw).unwrap();
        assert_eq!(correlations, vec![4.0]);
    }

    #[test]
    fn segment_shorter_than_template() {
        assert_eq!(
            correlate(&[1, 2], &[1.0, 2.0, 3.0], Normalisation::Full),
            Err(ShapeError::SegmentShorterThanTemplate {
                segment: 2,
                template: 3
            })
        );
        assert_eq!(
            max_correlation(&[], &[1.0], Normalisation::Raw),
            Err(ShapeError::SegmentShorterThanTemplate {
                segment: 0,
                template: 1
            })
        );
    }

    #[test]
    fn empty_template() {
        assert_eq!(
            correlate(&[1, 2], &[], Normalisation::Raw),
            Err(ShapeError::EmptyTemplate)
        );
    }

    #[test]
    fn segment_rms_normalisation() {
        // Window [3,4] has RMS sqrt(12.5).
        let correlations =
            correlate(&[0, 3, 4], &[1.0, 1.0], Normalisation::SegmentRms).unwrap();
        assert_approx_eq!(correlations[0], 3.0 / Real::sqrt(4.5));
        assert_approx_eq!(correlations[1], 7.0 / Real::sqrt(12.5));
    }

    #[test]
    fn zero_segment_gives_zero_correlation() {
        let correlations = correlate(&[0, 0, 0, 0], &[1.0, 2.0], Normalisation::Full).unwrap();
        assert_eq!(correlations, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn full_normalisation_of_exact_match_is_one() {
        let template = [0.5, 2.0, 4.0, 1.0];
        let segment = [0, 0, 1, 4, 8, 2, 0];
        let (offset, magnitude) =
            max_correlation(&segment, &template, Normalisation::Full).unwrap();
        assert_eq!(offset, 2);
        assert_approx_eq!(magnitude, 1.0);
    }

    #[test]
    fn sign_is_discarded() {
        let template = [1.0, 3.0, 1.0];
        let segment = [0, -2, -6, -2, 0];
        let (offset, magnitude) =
            max_correlation(&segment, &template, Normalisation::Full).unwrap();
        assert_eq!(offset, 1);
        assert_approx_eq!(magnitude, 1.0);
    }

    #[test]
    fn ties_resolve_to_earliest_offset() {
        let (offset, _) = max_correlation(&[5, 0, 5, 0], &[1.0], Normalisation::Raw).unwrap();
        assert_eq!(offset, 0);
    }

    #[test]
    fn full_normalisation_is_bounded() {
        let mut rng = StdRng::seed_from_u64(17);
        let segment: Vec<Intensity> = (0..60).map(|_| rng.random_range(-500..500)).collect();
        let template: Vec<Real> = (0..15).map(|_| rng.random_range(-1.0..1.0)).collect();
        for value in correlate(&segment, &template, Normalisation::Full).unwrap() {
            assert!(value.abs() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn normalised_correlation_is_scale_invariant() {
        let mut rng = StdRng::seed_from_u64(3);
        let segment: Vec<Intensity> = (0..40).map(|_| rng.random_range(-100..100)).collect();
        let scaled: Vec<Intensity> = segment.iter().map(|v| v * 7).collect();
        let template: Vec<Real> = (0..10).map(|_| rng.random_range(-1.0..1.0)).collect();

        for normalisation in [Normalisation::SegmentRms, Normalisation::Full] {
            let (offset, magnitude) = max_correlation(&segment, &template, normalisation).unwrap();
            let (scaled_offset, scaled_magnitude) =
                max_correlation(&scaled, &template, normalisation).unwrap();
            assert_eq!(offset, scaled_offset);
            assert_approx_eq!(magnitude, scaled_magnitude, 1e-9);
        }
    }

    #[test]
    fn rms_of_values() {
        assert_approx_eq!(rms(&[3.0, -4.0]), Real::sqrt(12.5));
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn normalize_by_peak_magnitude() {
        assert_eq!(normalize(&[1.0, -4.0, 2.0]), vec![0.25, -1.0, 0.5]);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
