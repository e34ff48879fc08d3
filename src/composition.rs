/// Composition-method samplers for mixture densities
/// A selector draw picks a component with probability equal to its weight, then a
/// second draw is inverted through that component's conditional CDF

use crate::diagnostics::{clamp_unit, Diagnostics};
use crate::distribution::{Density, Draw, LinearSegment, Mass, Sampler};
use crate::error::{SimError, SimResult};
use crate::inverse::{Binomial, Exponential, MASS_TOLERANCE};
use crate::rng::UniformSource;
use crate::validate;

/// Index of the component whose cumulative weight first reaches `u`.
pub fn select_component(weights: &[f64], u: f64, diag: &mut Diagnostics) -> usize {
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if u <= cumulative {
            return i;
        }
    }
    diag.cumulative_fallback(u);
    weights.len().saturating_sub(1)
}

/// Density made of adjoining linear pieces, each piece one mixture component
#[derive(Clone, Debug, PartialEq)]
pub struct LinearMixture {
    segments: Vec<LinearSegment>,
}

impl LinearMixture {
    /// Rises on [0, a], flat on [a, b], falls on [b, c].
    pub fn trapezoidal(a: f64, b: f64, c: f64) -> SimResult<Self> {
        validate::increasing("0 < a < b < c", &[0.0, a, b, c])?;
        let h = 2.0 / (c + b - a);
        Ok(LinearMixture {
            segments: vec![
                LinearSegment::through(0.0, 0.0, a, h),
                LinearSegment::through(a, h, b, h),
                LinearSegment::through(b, h, c, 0.0),
            ],
        })
    }

    /// Support [a, c] with mode b.
    pub fn triangular(a: f64, b: f64, c: f64) -> SimResult<Self> {
        validate::increasing("a < b < c", &[a, b, c])?;
        let h = 2.0 / (c - a);
        Ok(LinearMixture {
            segments: vec![
                LinearSegment::through(a, 0.0, b, h),
                LinearSegment::through(b, h, c, 0.0),
            ],
        })
    }

    /// Sub-area of each region; these are the mixture weights.
    pub fn weights(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.area()).collect()
    }

    pub fn segments(&self) -> &[LinearSegment] {
        &self.segments
    }
}

impl Sampler for LinearMixture {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let selector = source.next_uniform();
        let u = source.next_uniform();
        let weights = self.weights();
        let k = select_component(&weights, selector, diag);
        let x = self.segments[k].invert_area(clamp_unit(u, diag) * weights[k], diag);
        Draw::composed(x, k, selector, u)
    }

    fn components(&self) -> usize {
        self.segments.len()
    }
}

impl Density for LinearMixture {
    fn pdf(&self, x: f64) -> f64 {
        self.segments
            .iter()
            .find(|s| x >= s.x0 && x <= s.end())
            .map(|s| s.height_at(x))
            .unwrap_or(0.0)
    }

    fn cdf(&self, x: f64) -> f64 {
        self.segments
            .iter()
            .map(|s| s.area_to(x))
            .sum::<f64>()
            .min(1.0)
    }

    fn support(&self) -> (f64, f64) {
        let lo = self.segments.first().map(|s| s.x0).unwrap_or(0.0);
        let hi = self.segments.last().map(|s| s.end()).unwrap_or(0.0);
        (lo, hi)
    }

    fn mean(&self) -> f64 {
        self.segments.iter().map(|s| s.first_moment()).sum()
    }

    fn variance(&self) -> f64 {
        let second: f64 = self.segments.iter().map(|s| s.second_moment()).sum();
        second - self.mean().powi(2)
    }
}

/// p * Exp(mean beta1) + (1 - p) * Exp(mean beta2)
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialMixture {
    components: [Exponential; 2],
    p: f64,
}

impl ExponentialMixture {
    pub fn new(beta1: f64, beta2: f64, p: f64) -> SimResult<Self> {
        validate::positive("beta1", beta1)?;
        validate::positive("beta2", beta2)?;
        validate::probability("p", p)?;
        Ok(ExponentialMixture {
            components: [Exponential::with_mean(beta1)?, Exponential::with_mean(beta2)?],
            p,
        })
    }

    pub fn weights(&self) -> [f64; 2] {
        [self.p, 1.0 - self.p]
    }
}

impl Sampler for ExponentialMixture {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let selector = source.next_uniform();
        let u = source.next_uniform();
        let k = select_component(&self.weights(), selector, diag);
        Draw::composed(self.components[k].inverse(u, diag), k, selector, u)
    }

    fn components(&self) -> usize {
        2
    }
}

impl Density for ExponentialMixture {
    fn pdf(&self, x: f64) -> f64 {
        let [w1, w2] = self.weights();
        w1 * self.components[0].pdf(x) + w2 * self.components[1].pdf(x)
    }

    fn cdf(&self, x: f64) -> f64 {
        let [w1, w2] = self.weights();
        w1 * self.components[0].cdf(x) + w2 * self.components[1].cdf(x)
    }

    fn support(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn mean(&self) -> f64 {
        let [w1, w2] = self.weights();
        w1 * self.components[0].mean() + w2 * self.components[1].mean()
    }

    fn variance(&self) -> f64 {
        let [w1, w2] = self.weights();
        let second = |e: &Exponential| 2.0 * e.mean().powi(2);
        w1 * second(&self.components[0]) + w2 * second(&self.components[1]) - self.mean().powi(2)
    }
}

/// w * Binomial(n1, p1) + (1 - w) * Binomial(n2, p2)
#[derive(Clone, Debug, PartialEq)]
pub struct BinomialMixture {
    components: [Binomial; 2],
    weight: f64,
}

impl BinomialMixture {
    pub fn new(first: (u64, f64), second: (u64, f64), weight: f64) -> SimResult<Self> {
        validate::probability("weight", weight)?;
        Ok(BinomialMixture {
            components: [Binomial::new(first.0, first.1)?, Binomial::new(second.0, second.1)?],
            weight,
        })
    }

    pub fn weights(&self) -> [f64; 2] {
        [self.weight, 1.0 - self.weight]
    }
}

impl Sampler for BinomialMixture {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let selector = source.next_uniform();
        let u = source.next_uniform();
        let k = select_component(&self.weights(), selector, diag);
        Draw::composed(self.components[k].invert(u, diag) as f64, k, selector, u)
    }

    fn components(&self) -> usize {
        2
    }
}

impl Mass for BinomialMixture {
    fn pmf(&self, k: u64) -> f64 {
        let [w1, w2] = self.weights();
        w1 * self.components[0].pmf(k) + w2 * self.components[1].pmf(k)
    }

    fn support(&self) -> (u64, u64) {
        (0, self.components[0].trials().max(self.components[1].trials()))
    }

    fn mean(&self) -> f64 {
        let [w1, w2] = self.weights();
        w1 * self.components[0].mean() + w2 * self.components[1].mean()
    }

    fn variance(&self) -> f64 {
        let [w1, w2] = self.weights();
        let second = |b: &Binomial| b.variance() + b.mean().powi(2);
        w1 * second(&self.components[0]) + w2 * second(&self.components[1]) - self.mean().powi(2)
    }
}

/// Piecewise-uniform density given as `(lower, upper, probability)` intervals
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalMixture {
    intervals: Vec<(f64, f64)>,
    weights: Vec<f64>,
}

impl IntervalMixture {
    /// Weights are normalised; a table whose mass is off by more than
    /// `MASS_TOLERANCE` is accepted with a warning.
    pub fn new(table: &[(f64, f64, f64)]) -> SimResult<Self> {
        if table.is_empty() {
            return Err(SimError::invalid("intervals", "must list at least one interval"));
        }
        for &(lo, hi, p) in table {
            validate::increasing("interval bounds", &[lo, hi])?;
            validate::probability("interval probability", p)?;
        }
        let mass: f64 = table.iter().map(|t| t.2).sum();
        if mass <= 0.0 {
            return Err(SimError::invalid("intervals", "must have positive total probability"));
        }
        if (mass - 1.0).abs() > MASS_TOLERANCE {
            log::warn!("interval probabilities sum to {mass:.9}, expected 1");
        }
        Ok(IntervalMixture {
            intervals: table.iter().map(|&(lo, hi, _)| (lo, hi)).collect(),
            weights: table.iter().map(|t| t.2 / mass).collect(),
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }
}

impl Sampler for IntervalMixture {
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw {
        let selector = source.next_uniform();
        let u = source.next_uniform();
        let k = select_component(&self.weights, selector, diag);
        let (lo, hi) = self.intervals[k];
        Draw::composed(lo + clamp_unit(u, diag) * (hi - lo), k, selector, u)
    }

    fn components(&self) -> usize {
        self.intervals.len()
    }
}

impl Density for IntervalMixture {
    fn pdf(&self, x: f64) -> f64 {
        self.intervals
            .iter()
            .zip(&self.weights)
            .filter(|((lo, hi), _)| x >= *lo && x < *hi)
            .map(|((lo, hi), w)| w / (hi - lo))
            .sum()
    }

    fn cdf(&self, x: f64) -> f64 {
        self.intervals
            .iter()
            .zip(&self.weights)
            .map(|((lo, hi), w)| w * ((x - lo) / (hi - lo)).clamp(0.0, 1.0))
            .sum()
    }

    fn support(&self) -> (f64, f64) {
        let lo = self.intervals.iter().map(|i| i.0).fold(f64::INFINITY, f64::min);
        let hi = self.intervals.iter().map(|i| i.1).fold(f64::NEG_INFINITY, f64::max);
        (lo, hi)
    }

    fn mean(&self) -> f64 {
        self.intervals
            .iter()
            .zip(&self.weights)
            .map(|((lo, hi), w)| w * (lo + hi) / 2.0)
            .sum()
    }

    fn variance(&self) -> f64 {
        let second: f64 = self
            .intervals
            .iter()
            .zip(&self.weights)
            .map(|((lo, hi), w)| w * (lo * lo + lo * hi + hi * hi) / 3.0)
            .sum();
        second - self.mean().powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{Lcg, Scripted};

    #[test]
    fn test_trapezoid_weights_sum_to_one() {
        let dist = LinearMixture::trapezoidal(2.0, 5.0, 9.0).unwrap();
        let total: f64 = dist.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(dist.components(), 3);
        assert!((dist.cdf(9.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_triangular_weights() {
        let dist = LinearMixture::triangular(1.0, 3.0, 7.0).unwrap();
        let w = dist.weights();
        assert!((w[0] - 2.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 4.0 / 6.0).abs() < 1e-12);
        assert!((dist.mean() - 11.0 / 3.0).abs() < 1e-12);
        let expected_var = (1.0 + 9.0 + 49.0 - 3.0 - 7.0 - 21.0) / 18.0;
        assert!((dist.variance() - expected_var).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unordered_points() {
        assert!(LinearMixture::trapezoidal(5.0, 2.0, 9.0).is_err());
        assert!(LinearMixture::trapezoidal(0.0, 2.0, 9.0).is_err());
        assert!(LinearMixture::triangular(1.0, 1.0, 2.0).is_err());
    }

    #[test]
    fn test_selector_then_inversion_order() {
        let dist = LinearMixture::triangular(0.0, 1.0, 2.0).unwrap();
        let mut diag = Diagnostics::new();
        // selector 0.9 lands in the falling half, inversion 0.0 gives its left edge
        let mut source = Scripted::new(&[0.9, 0.0]);
        let draw = dist.draw(&mut source, &mut diag);
        assert_eq!(draw.component, Some(1));
        assert_eq!(draw.selector_u, Some(0.9));
        assert!((draw.x - 1.0).abs() < 1e-12);
        assert_eq!(source.consumed(), 2);
    }

    #[test]
    fn test_draws_stay_in_chosen_region() {
        let dist = LinearMixture::trapezoidal(1.0, 4.0, 6.0).unwrap();
        let mut diag = Diagnostics::new();
        let mut lcg = Lcg::new(5);
        for _ in 0..5_000 {
            let draw = dist.draw(&mut lcg, &mut diag);
            let seg = dist.segments()[draw.component.unwrap()];
            assert!(draw.x >= seg.x0 - 1e-12 && draw.x <= seg.end() + 1e-12);
        }
        assert!(diag.is_clean());
    }

    #[test]
    fn test_selection_fraction_converges() {
        let dist = ExponentialMixture::new(1.0, 2.0, 0.3).unwrap();
        let mut diag = Diagnostics::new();
        let mut lcg = Lcg::new(31337);
        let n = 100_000;
        let first = (0..n)
            .filter(|_| dist.draw(&mut lcg, &mut diag).component == Some(0))
            .count();
        assert!((first as f64 / n as f64 - 0.3).abs() < 0.01);
    }

    #[test]
    fn test_exponential_mixture_moments() {
        let dist = ExponentialMixture::new(1.0, 2.0, 0.5).unwrap();
        assert!((dist.mean() - 1.5).abs() < 1e-12);
        // E[X^2] = 0.5 * 2 + 0.5 * 8 = 5
        assert!((dist.variance() - (5.0 - 2.25)).abs() < 1e-12);
        assert!((dist.cdf(f64::MAX) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_binomial_mixture_pmf_sums_to_one() {
        let dist = BinomialMixture::new((10, 0.2), (20, 0.7), 0.4).unwrap();
        let (lo, hi) = dist.support();
        let total: f64 = (lo..=hi).map(|k| dist.pmf(k)).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((dist.mean() - (0.4 * 2.0 + 0.6 * 14.0)).abs() < 1e-12);
    }

    #[test]
    fn test_select_component_boundaries() {
        let mut diag = Diagnostics::new();
        assert_eq!(select_component(&[0.3, 0.7], 0.3, &mut diag), 0);
        assert_eq!(select_component(&[0.3, 0.7], 0.30001, &mut diag), 1);
        assert_eq!(select_component(&[0.3, 0.6], 0.95, &mut diag), 1);
        assert_eq!(diag.cumulative_fallbacks, 1);
    }

    #[test]
    fn test_interval_mixture_draws_inside_chosen_interval() {
        let mix = IntervalMixture::new(&[(6.0, 8.0, 0.25), (8.0, 10.0, 0.75)]).unwrap();
        let mut diag = Diagnostics::new();
        let draw = mix.draw(&mut Scripted::new(&[0.2, 0.5]), &mut diag);
        assert_eq!(draw.component, Some(0));
        assert!((draw.x - 7.0).abs() < 1e-12);
        let draw = mix.draw(&mut Scripted::new(&[0.9, 0.25]), &mut diag);
        assert_eq!(draw.component, Some(1));
        assert!((draw.x - 8.5).abs() < 1e-12);
        assert!(diag.is_clean());
    }

    #[test]
    fn test_interval_mixture_moments() {
        let mix = IntervalMixture::new(&[(0.0, 2.0, 0.5), (2.0, 4.0, 0.5)]).unwrap();
        // uniform on [0, 4]
        assert!((mix.mean() - 2.0).abs() < 1e-12);
        assert!((mix.variance() - 16.0 / 12.0).abs() < 1e-12);
        assert!((mix.cdf(3.0) - 0.75).abs() < 1e-12);
        assert!((mix.pdf(1.0) - 0.25).abs() < 1e-12);
        assert_eq!(mix.support(), (0.0, 4.0));
    }

    #[test]
    fn test_interval_mixture_rejects_reversed_bounds() {
        assert!(IntervalMixture::new(&[(2.0, 1.0, 1.0)]).is_err());
        assert!(IntervalMixture::new(&[]).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_trapezoid_mass_is_one(a in 0.01f64..10.0, gap1 in 0.01f64..10.0, gap2 in 0.01f64..10.0) {
            let dist = LinearMixture::trapezoidal(a, a + gap1, a + gap1 + gap2).unwrap();
            let total: f64 = dist.weights().iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_triangular_mass_is_one(a in -10.0f64..10.0, gap1 in 0.01f64..10.0, gap2 in 0.01f64..10.0) {
            let dist = LinearMixture::triangular(a, a + gap1, a + gap1 + gap2).unwrap();
            let total: f64 = dist.weights().iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
