//! Seeded sampling from a [`DistributionSpec`], matching how the engine draws initial values.

use crate::distribution::{Distribution, DistributionSpec};
use crate::rng::{create_rng, derive_subtype_rng};
use rand::Rng;
use rand_chacha::ChaCha12Rng;

/// Rejection attempts for `non_neg` draws before falling back to zero.
const MAX_RESAMPLES: usize = 1_000;

#[derive(Clone, Debug)]
pub struct Randomizer {
    rng: ChaCha12Rng,
}

impl Randomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: create_rng(seed),
        }
    }

    /// Independent stream for the subtype registered at `subtype_index`.
    pub fn for_subtype(seed: u64, subtype_index: usize) -> Self {
        Self {
            rng: derive_subtype_rng(seed, subtype_index),
        }
    }

    pub fn sample(&mut self, spec: &DistributionSpec) -> f64 {
        match &spec.distribution {
            Distribution::Constant { mean } => *mean,
            Distribution::Normal { mean, stddev } => {
                self.non_negative(spec.non_neg, |rng| mean + stddev * standard_normal(rng))
            }
            Distribution::Uniform { low, high } => {
                self.non_negative(spec.non_neg, |rng| low + (high - low) * rng.random::<f64>())
            }
            Distribution::Bernoulli { mean } => {
                if self.rng.random::<f64>() < *mean {
                    1.0
                } else {
                    0.0
                }
            }
            Distribution::Obsvalues { mean, value_list } => self.observed(*mean, value_list),
        }
    }

    pub fn sample_n(&mut self, spec: &DistributionSpec, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample(spec)).collect()
    }

    fn non_negative(&mut self, enabled: bool, mut draw: impl FnMut(&mut ChaCha12Rng) -> f64) -> f64 {
        let value = draw(&mut self.rng);
        if !enabled || value >= 0.0 {
            return value;
        }
        for _ in 0..MAX_RESAMPLES {
            let value = draw(&mut self.rng);
            if value >= 0.0 {
                return value;
            }
        }
        0.0
    }

    /// Piecewise-linear draw over the ascending pool, rescaled so its expectation is `mean`.
    fn observed(&mut self, mean: f64, values: &[f64]) -> f64 {
        let n = values.len();
        if n < 2 {
            return mean;
        }
        let expected = (values[0] + values.windows(2).map(|w| (w[0] + w[1]) * 0.5).sum::<f64>())
            / n as f64;
        if expected == 0.0 {
            return mean;
        }
        let pos = self.rng.random::<f64>() * n as f64;
        let draw = if pos <= 1.0 {
            values[0]
        } else {
            let i = pos.floor() as usize;
            (values[i] - values[i - 1]) * (pos - i as f64) + values[i - 1]
        };
        draw / expected * mean
    }
}

/// Box-Muller transform.
fn standard_normal(rng: &mut ChaCha12Rng) -> f64 {
    let u1 = rng.random::<f64>().max(f64::EPSILON);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
