use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, NormalError};
use std::collections::VecDeque;
use template_trigger::template_matching::Real;

/// Gaussian noise, smoothed by a moving average.
pub(crate) struct Noise {
    distribution: Normal<Real>,
    rng: StdRng,
    /// Length of the moving average window to apply to the noise, one for no smoothing.
    smoothing_window_length: usize,
    prev: VecDeque<Real>,
}

impl Noise {
    pub(crate) fn new(
        mean: Real,
        sd: Real,
        smoothing_window_length: usize,
        seed: u64,
    ) -> Result<Self, NormalError> {
        Ok(Self {
            distribution: Normal::new(mean, sd)?,
            rng: StdRng::seed_from_u64(seed),
            smoothing_window_length: smoothing_window_length.max(1),
            prev: Default::default(),
        })
    }

    pub(crate) fn noisify(&mut self, value: Real) -> Real {
        if self.prev.len() == self.smoothing_window_length {
            self.prev.pop_front();
        }
        self.prev.push_back(self.distribution.sample(&mut self.rng));
        value + self.prev.iter().sum::<Real>() / self.prev.len() as Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn zero_deviation_adds_mean() {
        let mut noise = Noise::new(3.0, 0.0, 4, 0).unwrap();
        for value in [0.0, 10.0, -2.5] {
            assert_approx_eq!(noise.noisify(value), value + 3.0);
        }
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = Noise::new(0.0, 5.0, 1, 42).unwrap();
        let mut b = Noise::new(0.0, 5.0, 1, 42).unwrap();
        for _ in 0..10 {
            assert_eq!(a.noisify(0.0), b.noisify(0.0));
        }
    }

    #[test]
    fn smoothing_reduces_spread() {
        let spread = |window| {
            let mut noise = Noise::new(0.0, 10.0, window, 7).unwrap();
            let values = (0..2000).map(|_| noise.noisify(0.0)).collect::<Vec<_>>();
            Real::sqrt(values.iter().map(|v| v * v).sum::<Real>() / values.len() as Real)
        };
        assert!(spread(8) < spread(1));
    }

    #[test]
    fn invalid_deviation() {
        assert!(Noise::new(0.0, -1.0, 1, 0).is_err());
    }
}
