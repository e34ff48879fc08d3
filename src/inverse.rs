/// Inverse-transform samplers
/// Each maps one uniform draw to a draw from its target law through a closed-form
/// or tabulated inverse CDF

use crate::diagnostics::{clamp_unit, Diagnostics};
use crate::distribution::{Density, Draw, LinearSegment, Mass, Sampler};
use crate::error::{SimError, SimResult};
use crate::rng::UniformSource;
use crate::validate;

/// Tables up to this size are inverted by linear scan, larger ones by binary search.
pub const LINEAR_SCAN_LIMIT: usize = 40;

/// Mass deviation from 1 tolerated before a table is flagged.
pub const MASS_TOLERANCE: f64 = 1e-6;

pub const MAX_BINOMIAL_TRIALS: u64 = 100_000;

/// Density proportional to (x - center)^2 on [lower, upper]
#[derive(Clone, Debug, PartialEq)]
pub struct Parabolic {
    lower: f64,
    upper: f64,
}

impl Parabolic {
    pub fn new(lower: f64, upper: f64) -> SimResult<Self> {
        validate::increasing("lower < upper", &[lower, upper])?;
        Ok(Parabolic { lower, upper })
    }

    pub fn center(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    pub fn half_range(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn inverse(&self, u: f64, diag: &mut Diagnostics) -> f64 {
        let u = clamp_unit(u, diag);
        self.center() + self.half_range() * (2.0 * u - 1.0).cbrt()
    }
}

impl Sampler for Parabolic {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let u = source.next_uniform();
        Draw::direct(self.inverse(u, diag), u)
    }
}

impl Density for Parabolic {
    fn pdf(&self, x: f64) -> f64 {
        if x < self.lower || x > self.upper {
            return 0.0;
        }
        let h = self.half_range();
        1.5 * (x - self.center()).powi(2) / h.powi(3)
    }

    fn cdf(&self, x: f64) -> f64 {
        let z = ((x - self.center()) / self.half_range()).clamp(-1.0, 1.0);
        (z.powi(3) + 1.0) / 2.0
    }

    fn support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn mean(&self) -> f64 {
        self.center()
    }

    fn variance(&self) -> f64 {
        0.6 * self.half_range().powi(2)
    }
}

/// Two linear pieces through (x1,y1), (x2,y2), (x3,y3), normalised to unit area
#[derive(Clone, Debug, PartialEq)]
pub struct PiecewiseLinear {
    segments: [LinearSegment; 2],
}

impl PiecewiseLinear {
    pub fn new(points: [(f64, f64); 3]) -> SimResult<Self> {
        let [(x1, y1), (x2, y2), (x3, y3)] = points;
        validate::increasing("x1 < x2 < x3", &[x1, x2, x3])?;
        for (field, y) in [("y1", y1), ("y2", y2), ("y3", y3)] {
            validate::non_negative(field, y)?;
        }
        let raw = [
            LinearSegment::through(x1, y1, x2, y2),
            LinearSegment::through(x2, y2, x3, y3),
        ];
        let total = raw[0].area() + raw[1].area();
        if total <= 0.0 {
            return Err(SimError::invalid("y1, y2, y3", "must enclose a positive area"));
        }
        Ok(PiecewiseLinear {
            segments: [raw[0].scaled(1.0 / total), raw[1].scaled(1.0 / total)],
        })
    }

    /// Probability mass of each piece; the two always sum to 1.
    pub fn weights(&self) -> [f64; 2] {
        [self.segments[0].area(), self.segments[1].area()]
    }

    pub fn inverse(&self, u: f64, diag: &mut Diagnostics) -> f64 {
        let u = clamp_unit(u, diag);
        let first = self.segments[0].area();
        if u <= first {
            self.segments[0].invert_area(u, diag)
        } else {
            self.segments[1].invert_area(u - first, diag)
        }
    }
}

impl Sampler for PiecewiseLinear {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let u = source.next_uniform();
        Draw::direct(self.inverse(u, diag), u)
    }
}

impl Density for PiecewiseLinear {
    fn pdf(&self, x: f64) -> f64 {
        let [a, b] = &self.segments;
        if x < a.x0 || x > b.end() {
            0.0
        } else if x <= a.end() {
            a.height_at(x)
        } else {
            b.height_at(x)
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        let [a, b] = &self.segments;
        if x <= a.x0 {
            0.0
        } else if x <= a.end() {
            a.area_to(x)
        } else {
            (a.area() + b.area_to(x)).min(1.0)
        }
    }

    fn support(&self) -> (f64, f64) {
        (self.segments[0].x0, self.segments[1].end())
    }

    fn mean(&self) -> f64 {
        self.segments.iter().map(|s| s.first_moment()).sum()
    }

    fn variance(&self) -> f64 {
        let second: f64 = self.segments.iter().map(|s| s.second_moment()).sum();
        second - self.mean().powi(2)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Exponential {
    rate: f64,
}

impl Exponential {
    pub fn new(rate: f64) -> SimResult<Self> {
        validate::positive("rate", rate)?;
        Ok(Exponential { rate })
    }

    /// Parameterised by the mean instead of the rate.
    pub fn with_mean(mean: f64) -> SimResult<Self> {
        validate::positive("mean", mean)?;
        Ok(Exponential { rate: 1.0 / mean })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn inverse(&self, u: f64, diag: &mut Diagnostics) -> f64 {
        let u = clamp_unit(u, diag);
        -(1.0 - u).max(f64::MIN_POSITIVE).ln() / self.rate
    }
}

impl Sampler for Exponential {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let u = source.next_uniform();
        Draw::direct(self.inverse(u, diag), u)
    }
}

impl Density for Exponential {
    fn pdf(&self, x: f64) -> f64 {
        if x < 0.0 {
            0.0
        } else {
            self.rate * (-self.rate * x).exp()
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            0.0
        } else {
            1.0 - (-self.rate * x).exp()
        }
    }

    fn support(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn mean(&self) -> f64 {
        1.0 / self.rate
    }

    fn variance(&self) -> f64 {
        1.0 / (self.rate * self.rate)
    }
}

/// Empirical distribution over a finite list of outcomes, in domain order
#[derive(Clone, Debug, PartialEq)]
pub struct DiscreteDistribution<T> {
    outcomes: Vec<T>,
    probabilities: Vec<f64>,
    cumulative: Vec<f64>,
    mass: f64,
}

impl<T: Copy> DiscreteDistribution<T> {
    /// A table whose mass is off by more than `MASS_TOLERANCE` is accepted with a warning.
    pub fn new(table: &[(T, f64)]) -> SimResult<Self> {
        if table.is_empty() {
            return Err(SimError::invalid("distribution", "must list at least one outcome"));
        }
        for (_, p) in table {
            validate::probability("distribution probability", *p)?;
        }

        let mut running = 0.0;
        let mut cumulative = Vec::with_capacity(table.len());
        for (_, p) in table {
            running += p;
            cumulative.push(running);
        }
        let mass = running;
        if mass <= 0.0 {
            return Err(SimError::invalid("distribution", "must have positive total probability"));
        }
        if (mass - 1.0).abs() > MASS_TOLERANCE {
            log::warn!("distribution probabilities sum to {mass:.9}, expected 1");
        } else if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(DiscreteDistribution {
            outcomes: table.iter().map(|(v, _)| *v).collect(),
            probabilities: table.iter().map(|(_, p)| *p).collect(),
            cumulative,
            mass,
        })
    }

    pub fn outcomes(&self) -> &[T] {
        &self.outcomes
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Adds a mass warning to `diag` if the table does not sum to 1.
    pub fn check_mass(&self, diag: &mut Diagnostics) {
        if (self.mass - 1.0).abs() > MASS_TOLERANCE {
            diag.mass_warning(self.mass);
        }
    }

    /// First outcome whose cumulative probability reaches `u`.
    pub fn invert(&self, u: f64, diag: &mut Diagnostics) -> T {
        let u = clamp_unit(u, diag);
        let index = if self.cumulative.len() <= LINEAR_SCAN_LIMIT {
            self.cumulative.iter().position(|&c| u <= c)
        } else {
            let i = self.cumulative.partition_point(|&c| c < u);
            (i < self.cumulative.len()).then_some(i)
        };
        match index {
            Some(i) => self.outcomes[i],
            None => {
                diag.cumulative_fallback(u);
                self.outcomes[self.outcomes.len() - 1]
            }
        }
    }
}

impl Sampler for DiscreteDistribution<u64> {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let u = source.next_uniform();
        Draw::direct(self.invert(u, diag) as f64, u)
    }
}

impl Mass for DiscreteDistribution<u64> {
    fn pmf(&self, k: u64) -> f64 {
        self.outcomes
            .iter()
            .zip(&self.probabilities)
            .filter(|(v, _)| **v == k)
            .map(|(_, p)| p)
            .sum()
    }

    fn mass_points(&self) -> Vec<u64> {
        let mut outcomes = self.outcomes.clone();
        outcomes.sort_unstable();
        outcomes.dedup();
        outcomes
    }

    fn cdf(&self, k: u64) -> f64 {
        self.outcomes
            .iter()
            .zip(&self.probabilities)
            .filter(|(v, _)| **v <= k)
            .map(|(_, p)| p)
            .sum::<f64>()
            .min(1.0)
    }

    fn support(&self) -> (u64, u64) {
        let lo = self.outcomes.iter().copied().min().unwrap_or(0);
        let hi = self.outcomes.iter().copied().max().unwrap_or(0);
        (lo, hi)
    }

    fn mean(&self) -> f64 {
        self.outcomes
            .iter()
            .zip(&self.probabilities)
            .map(|(v, p)| *v as f64 * p)
            .sum()
    }

    fn variance(&self) -> f64 {
        let mean = Mass::mean(self);
        self.outcomes
            .iter()
            .zip(&self.probabilities)
            .map(|(v, p)| (*v as f64 - mean).powi(2) * p)
            .sum()
    }
}

/// Binomial(n, p) sampled by inversion of its tabulated CDF
#[derive(Clone, Debug, PartialEq)]
pub struct Binomial {
    trials: u64,
    p: f64,
    table: DiscreteDistribution<u64>,
}

impl Binomial {
    pub fn new(trials: u64, p: f64) -> SimResult<Self> {
        validate::probability("p", p)?;
        if trials > MAX_BINOMIAL_TRIALS {
            return Err(SimError::invalid("n", format!("must be <= {MAX_BINOMIAL_TRIALS}")));
        }
        let table: Vec<(u64, f64)> = (0..=trials).map(|k| (k, binomial_pmf(trials, p, k))).collect();
        Ok(Binomial {
            trials,
            p,
            table: DiscreteDistribution::new(&table)?,
        })
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn invert(&self, u: f64, diag: &mut Diagnostics) -> u64 {
        self.table.invert(u, diag)
    }
}

/// P(X = k) for X ~ Binomial(n, p), computed in log space.
pub fn binomial_pmf(n: u64, p: f64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    let k_small = k.min(n - k);
    let ln_choose: f64 = (1..=k_small)
        .map(|j| ((n - k_small + j) as f64).ln() - (j as f64).ln())
        .sum();
    (ln_choose + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

impl Sampler for Binomial {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let u = source.next_uniform();
        Draw::direct(self.invert(u, diag) as f64, u)
    }
}

impl Mass for Binomial {
    fn pmf(&self, k: u64) -> f64 {
        binomial_pmf(self.trials, self.p, k)
    }

    fn support(&self) -> (u64, u64) {
        (0, self.trials)
    }

    fn mean(&self) -> f64 {
        self.trials as f64 * self.p
    }

    fn variance(&self) -> f64 {
        self.trials as f64 * self.p * (1.0 - self.p)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_piecewise_round_trip(
            x1 in -50.0f64..50.0,
            w1 in 0.1f64..20.0,
            w2 in 0.1f64..20.0,
            y1 in 0.05f64..5.0,
            y2 in 0.05f64..5.0,
            y3 in 0.05f64..5.0,
            frac in 0.0f64..=1.0,
        ) {
            let dist = PiecewiseLinear::new([(x1, y1), (x1 + w1, y2), (x1 + w1 + w2, y3)]).unwrap();
            let x = x1 + frac * (w1 + w2);
            let mut diag = Diagnostics::new();
            let back = dist.inverse(dist.cdf(x), &mut diag);
            prop_assert!((back - x).abs() < 1e-6, "x = {}, recovered {}", x, back);
        }
    }
}
