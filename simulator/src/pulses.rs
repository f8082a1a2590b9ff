//! Analytic pulse shapes from which templates are generated.
//!
//! Times are in samples at the simulated sampling rate.
use serde::Deserialize;
use template_trigger::template_matching::{Real, Template, normalize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum PulseError {
    #[error("Pulse parameter {parameter} must be positive, found {value}")]
    NonPositive {
        parameter: &'static str,
        value: Real,
    },
    #[error("Triangular pulse peak time {0} must be a fraction of its width between 0 and 1")]
    PeakTimeFraction(Real),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    tag = "pulse-type"
)]
pub(crate) enum PulseShape {
    Flat {
        start: Real,
        width: Real,
        height: Real,
    },
    Triangular {
        start: Real,
        /// Fraction of the width, from the start, at which the pulse peaks.
        peak_time: Real,
        width: Real,
        height: Real,
    },
    Gaussian {
        height: Real,
        peak_time: Real,
        sd: Real,
    },
    BackToBackExp {
        peak_height: Real,
        peak_time: Real,
        spread: Real,
        falling: Real,
        rising: Real,
    },
}

/// A JSON file of pulse shapes, each of which becomes one template.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PulseLibrary {
    pub(crate) pulses: Vec<PulseShape>,
}

fn check_positive(parameter: &'static str, value: Real) -> Result<Real, PulseError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(PulseError::NonPositive { parameter, value })
    }
}

#[derive(Debug)]
pub(crate) enum Pulse {
    Flat {
        start: Real,
        stop: Real,
        amplitude: Real,
    },
    Triangular {
        start: Real,
        peak_time: Real,
        stop: Real,
        amplitude: Real,
    },
    Gaussian {
        mean: Real,
        sd: Real,
        peak_amplitude: Real,
    },
    BackToBackExp {
        peak_time: Real,
        falling: Real,
        rising: Real,
        normalising_factor: Real,
        rising_spread: Real,
        falling_spread: Real,
        frac_1_sqrt_2_spread: Real,
    },
}

impl Pulse {
    pub(crate) fn new(shape: &PulseShape) -> Result<Self, PulseError> {
        match *shape {
            PulseShape::Flat {
                start,
                width,
                height,
            } => Ok(Self::Flat {
                start,
                stop: start + check_positive("width", width)?,
                amplitude: height,
            }),
            PulseShape::Triangular {
                start,
                peak_time,
                width,
                height,
            } => {
                let width = check_positive("width", width)?;
                if !(0.0..=1.0).contains(&peak_time) {
                    return Err(PulseError::PeakTimeFraction(peak_time));
                }
                Ok(Self::Triangular {
                    start,
                    peak_time: start + peak_time * width,
                    stop: start + width,
                    amplitude: height,
                })
            }
            PulseShape::Gaussian {
                height,
                peak_time,
                sd,
            } => Ok(Self::Gaussian {
                mean: peak_time,
                sd: check_positive("sd", sd)?,
                peak_amplitude: height,
            }),
            PulseShape::BackToBackExp {
                peak_height,
                peak_time,
                spread,
                falling,
                rising,
            } => {
                let spread = check_positive("spread", spread)?;
                let falling = check_positive("falling", falling)?;
                let rising = check_positive("rising", rising)?;

                let rising_spread = rising * spread.powi(2);
                let falling_spread = falling * spread.powi(2);
                let frac_1_sqrt_2_spread = std::f64::consts::FRAC_1_SQRT_2 / spread;

                let normalising_factor = {
                    let rising_erfc = libm::erfc(rising_spread * frac_1_sqrt_2_spread);
                    let rising_exp = if rising_erfc == 0.0 {
                        0.0
                    } else {
                        Real::exp(0.5 * rising * rising_spread)
                    };
                    let falling_erfc = libm::erfc(falling_spread * frac_1_sqrt_2_spread);
                    let falling_exp = if falling_erfc == 0.0 {
                        0.0
                    } else {
                        Real::exp(0.5 * falling * falling_spread)
                    };
                    peak_height / (rising_exp * rising_erfc + falling_exp * falling_erfc)
                };

                Ok(Self::BackToBackExp {
                    peak_time,
                    falling,
                    rising,
                    normalising_factor,
                    rising_spread,
                    falling_spread,
                    frac_1_sqrt_2_spread,
                })
            }
        }
    }

    pub(crate) fn value_at(&self, time: Real) -> Real {
        match *self {
            Self::Flat {
                start,
                stop,
                amplitude,
            } => {
                if (start..stop).contains(&time) {
                    amplitude
                } else {
                    0.0
                }
            }
            Self::Triangular {
                start,
                peak_time,
                stop,
                amplitude,
            } => {
                if time < start || time > stop {
                    0.0
                } else if time < peak_time {
                    amplitude * (time - start) / (peak_time - start)
                } else if stop > peak_time {
                    amplitude * (stop - time) / (stop - peak_time)
                } else {
                    amplitude
                }
            }
            Self::Gaussian {
                mean,
                sd,
                peak_amplitude,
            } => peak_amplitude * Real::exp(-0.5 * Real::powi((time - mean) / sd, 2)),
            Self::BackToBackExp {
                peak_time,
                falling,
                rising,
                normalising_factor,
                rising_spread,
                falling_spread,
                frac_1_sqrt_2_spread,
            } => {
                let time_shift = time - peak_time;

                let rising_erfc = libm::erfc((rising_spread + time_shift) * frac_1_sqrt_2_spread);
                let rising_exp = (rising_erfc != 0.0) //  Guard against NaN
                    .then(|| Real::exp(rising * (0.5 * rising_spread + time_shift)))
                    .unwrap_or_default();

                let falling_erfc =
                    libm::erfc((falling_spread - time_shift) * frac_1_sqrt_2_spread);
                let falling_exp = (falling_erfc != 0.0) //  Guard against NaN
                    .then(|| Real::exp(falling * (0.5 * falling_spread - time_shift)))
                    .unwrap_or_default();

                normalising_factor * (rising_exp * rising_erfc + falling_exp * falling_erfc)
            }
        }
    }

    /// Samples the pulse at times `0..size_template`, normalised to a peak magnitude of one.
    pub(crate) fn template(&self, size_template: usize) -> Template {
        let samples = (0..size_template)
            .map(|t| self.value_at(t as Real))
            .collect::<Vec<_>>();
        normalize(&samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use flt_common::Intensity;

    const PULSE_LIBRARY: &str = r#"{
        "pulses": [
            { "pulse-type": "flat", "start": 2, "width": 3, "height": 5 },
            { "pulse-type": "triangular", "start": 1, "peak-time": 0.25, "width": 8, "height": 4 },
            { "pulse-type": "gaussian", "height": 10, "peak-time": 6, "sd": 2 },
            { "pulse-type": "back-to-back-exp", "peak-height": 2100, "peak-time": 2200, "spread": 3, "falling": 2.5, "rising": 1.5 }
        ]
    }"#;

    fn pulses() -> Vec<Pulse> {
        let library: PulseLibrary = serde_json::from_str(PULSE_LIBRARY).unwrap();
        library
            .pulses
            .iter()
            .map(|shape| Pulse::new(shape).unwrap())
            .collect()
    }

    #[test]
    fn flat() {
        let pulse = &pulses()[0];
        let values = (0..7).map(|t| pulse.value_at(t as Real)).collect::<Vec<_>>();
        assert_eq!(values, vec![0.0, 0.0, 5.0, 5.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn triangular() {
        let pulse = &pulses()[1];
        assert_eq!(pulse.value_at(0.0), 0.0);
        assert_approx_eq!(pulse.value_at(2.0), 2.0);
        assert_approx_eq!(pulse.value_at(3.0), 4.0);
        assert_approx_eq!(pulse.value_at(6.0), 2.0);
        assert_approx_eq!(pulse.value_at(9.0), 0.0);
        assert_eq!(pulse.value_at(10.0), 0.0);
    }

    #[test]
    fn gaussian() {
        let pulse = &pulses()[2];
        assert_approx_eq!(pulse.value_at(6.0), 10.0);
        assert_approx_eq!(pulse.value_at(4.0), 10.0 * Real::exp(-0.5));
        assert_approx_eq!(pulse.value_at(8.0), pulse.value_at(4.0));
    }

    #[test]
    fn back_to_back_exp_values() {
        let pulse = &pulses()[3];
        const VALUES: [Intensity; 27] = [
            0, 1, 5, 16, 41, 95, 199, 379, 651, 1011, 1418, 1793, 2044, 2100, 1942, 1616, 1211,
            816, 495, 270, 132, 58, 23, 8, 2, 0, 0,
        ];
        for (t, &v) in VALUES.iter().enumerate() {
            assert_eq!(pulse.value_at((2187 + t) as Real) as Intensity, v);
        }
    }

    #[test]
    fn template_is_normalised() {
        let template = pulses()[2].template(16);
        assert_eq!(template.len(), 16);
        assert_approx_eq!(template[6], 1.0);
        assert!(template.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn bundled_pulse_library() {
        let library: PulseLibrary =
            serde_json::from_str(include_str!("../configs/pulses.json")).unwrap();
        assert_eq!(library.pulses.len(), 6);
        for shape in &library.pulses {
            let template = Pulse::new(shape).unwrap().template(400);
            assert!(template.iter().all(|v| v.is_finite()));
            assert_approx_eq!(template.iter().fold(0.0, |acc: Real, v| acc.max(v.abs())), 1.0);
        }
    }

    #[test]
    fn invalid_shapes() {
        assert_eq!(
            Pulse::new(&PulseShape::Gaussian {
                height: 1.0,
                peak_time: 0.0,
                sd: 0.0
            })
            .err(),
            Some(PulseError::NonPositive {
                parameter: "sd",
                value: 0.0
            })
        );
        assert_eq!(
            Pulse::new(&PulseShape::Triangular {
                start: 0.0,
                peak_time: 1.5,
                width: 4.0,
                height: 1.0
            })
            .err(),
            Some(PulseError::PeakTimeFraction(1.5))
        );
    }
}
