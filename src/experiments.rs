/// Sampler validation runs
/// Draws `n` values from one sampler and sets histogram, ECDF, moments and the KS distance against
/// its theoretical law; composition samplers also report draws per component

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::composition::{BinomialMixture, ExponentialMixture, LinearMixture};
use crate::diagnostics::Diagnostics;
use crate::distribution::{Density, Draw, Mass, Sampler};
use crate::error::SimResult;
use crate::inverse::{Binomial, DiscreteDistribution, Exponential, Parabolic, PiecewiseLinear};
use crate::models::{BarPoint, ChartPoint, Metric, Report, Series};
use crate::rng::{resolve_seed, Lcg, UniformSource};
use crate::stats::{ecdf, histogram, ks_critical_value, ks_statistic, sorted_copy, RunningStats};
use crate::validate;

pub const MAX_SAMPLES: usize = 5_000_000;
pub const MAX_BINS: usize = 500;
/// ECDF series are thinned to at most this many points.
pub const CDF_POINTS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sampler", rename_all = "snake_case")]
pub enum SamplerSpec {
    Parabolic { lower: f64, upper: f64 },
    PiecewiseLinear { points: [(f64, f64); 3] },
    Exponential { rate: f64 },
    Empirical { table: Vec<(u64, f64)> },
    Binomial { trials: u64, p: f64 },
    Trapezoidal { a: f64, b: f64, c: f64 },
    Triangular { a: f64, b: f64, c: f64 },
    ExponentialMixture { beta1: f64, beta2: f64, p: f64 },
    BinomialMixture { n1: u64, p1: f64, n2: u64, p2: f64, weight: f64 },
}

impl SamplerSpec {
    pub fn name(&self) -> &'static str {
        match self {
            SamplerSpec::Parabolic { .. } => "parabolic",
            SamplerSpec::PiecewiseLinear { .. } => "piecewise_linear",
            SamplerSpec::Exponential { .. } => "exponential",
            SamplerSpec::Empirical { .. } => "empirical",
            SamplerSpec::Binomial { .. } => "binomial",
            SamplerSpec::Trapezoidal { .. } => "trapezoidal",
            SamplerSpec::Triangular { .. } => "triangular",
            SamplerSpec::ExponentialMixture { .. } => "exponential_mixture",
            SamplerSpec::BinomialMixture { .. } => "binomial_mixture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    #[serde(flatten)]
    pub spec: SamplerSpec,
    pub n: usize,
    pub bins: usize,
    pub seed: Option<u32>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            spec: SamplerSpec::Parabolic {
                lower: 0.0,
                upper: 6.0,
            },
            n: 10_000,
            bins: 30,
            seed: None,
        }
    }
}

impl SamplingParams {
    pub fn new(spec: SamplerSpec, n: usize, seed: Option<u32>) -> Self {
        SamplingParams {
            spec,
            n,
            seed,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        validate::count("n", self.n)?;
        validate::at_most("n", self.n, MAX_SAMPLES)?;
        validate::count("bins", self.bins)?;
        validate::at_most("bins", self.bins, MAX_BINS)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub index: usize,
    pub selector_u: Option<f64>,
    pub u: f64,
    pub x: f64,
    pub component: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub n: usize,
    pub mean: f64,
    pub variance: f64,
    pub theoretical_mean: f64,
    pub theoretical_variance: f64,
    pub ks_statistic: f64,
    pub ks_critical_value: f64,
    /// Draws routed to each mixture component; empty for plain samplers
    pub component_counts: Vec<usize>,
}

impl SampleSummary {
    pub fn component_fraction(&self, component: usize) -> f64 {
        match self.component_counts.get(component) {
            Some(&count) if self.n > 0 => count as f64 / self.n as f64,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingReport {
    pub sampler: String,
    pub seed: Option<u32>,
    pub summary: SampleSummary,
    pub report: Report<SampleRow>,
    pub diagnostics: Diagnostics,
}

/// Validate, resolve the seed, and run the experiment on a seeded LCG.
pub fn run_sampling(params: &SamplingParams) -> SimResult<SamplingReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let mut lcg = Lcg::new(seed);
    let mut report = sample_with(params, &mut lcg)?;
    report.seed = Some(seed);
    report.report.metrics.insert(1, Metric::new("seed", seed as f64));
    log::info!(
        "sampling {}: n={} seed={} mean={:.4} ks={:.4}",
        report.sampler,
        params.n,
        seed,
        report.summary.mean,
        report.summary.ks_statistic
    );
    Ok(report)
}

/// Run the experiment on any uniform source; the seed field is ignored.
pub fn sample_with<U: UniformSource + ?Sized>(
    params: &SamplingParams,
    source: &mut U,
) -> SimResult<SamplingReport> {
    params.validate()?;
    let (n, bins) = (params.n, params.bins);
    let outcome = match &params.spec {
        SamplerSpec::Parabolic { lower, upper } => {
            continuous(&Parabolic::new(*lower, *upper)?, n, bins, source)
        }
        SamplerSpec::PiecewiseLinear { points } => {
            continuous(&PiecewiseLinear::new(*points)?, n, bins, source)
        }
        SamplerSpec::Exponential { rate } => continuous(&Exponential::new(*rate)?, n, bins, source),
        SamplerSpec::Empirical { table } => {
            let dist = DiscreteDistribution::new(table)?;
            let mut outcome = discrete(&dist, n, source);
            dist.check_mass(&mut outcome.diagnostics);
            outcome
        }
        SamplerSpec::Binomial { trials, p } => discrete(&Binomial::new(*trials, *p)?, n, source),
        SamplerSpec::Trapezoidal { a, b, c } => {
            continuous(&LinearMixture::trapezoidal(*a, *b, *c)?, n, bins, source)
        }
        SamplerSpec::Triangular { a, b, c } => {
            continuous(&LinearMixture::triangular(*a, *b, *c)?, n, bins, source)
        }
        SamplerSpec::ExponentialMixture { beta1, beta2, p } => {
            continuous(&ExponentialMixture::new(*beta1, *beta2, *p)?, n, bins, source)
        }
        SamplerSpec::BinomialMixture { n1, p1, n2, p2, weight } => {
            discrete(&BinomialMixture::new((*n1, *p1), (*n2, *p2), *weight)?, n, source)
        }
    };
    Ok(outcome.into_report(params.spec.name()))
}

struct Outcome {
    draws: Vec<Draw>,
    summary: SampleSummary,
    series: Vec<Series>,
    diagnostics: Diagnostics,
}

impl Outcome {
    fn into_report(self, sampler: &str) -> SamplingReport {
        let s = &self.summary;
        let mut metrics = vec![
            Metric::new("n", s.n as f64),
            Metric::new("mean", s.mean),
            Metric::new("variance", s.variance),
            Metric::new("theoretical_mean", s.theoretical_mean),
            Metric::new("theoretical_variance", s.theoretical_variance),
            Metric::new("ks_statistic", s.ks_statistic),
            Metric::new("ks_critical_value", s.ks_critical_value),
        ];
        for (i, count) in s.component_counts.iter().enumerate() {
            metrics.push(Metric::new(format!("component_{}_count", i + 1), *count as f64));
            metrics.push(Metric::new(
                format!("component_{}_fraction", i + 1),
                s.component_fraction(i),
            ));
        }
        let rows: Vec<SampleRow> = self
            .draws
            .iter()
            .enumerate()
            .map(|(index, d)| SampleRow {
                index: index + 1,
                selector_u: d.selector_u,
                u: d.inversion_u,
                x: d.x,
                component: d.component.map(|c| c + 1),
            })
            .collect();

        SamplingReport {
            sampler: sampler.to_string(),
            seed: None,
            summary: self.summary,
            report: Report::new(metrics, &rows, self.series),
            diagnostics: self.diagnostics,
        }
    }
}

fn draw_all<S: Sampler, U: UniformSource + ?Sized>(
    sampler: &S,
    n: usize,
    source: &mut U,
    diag: &mut Diagnostics,
) -> (Vec<Draw>, Vec<usize>) {
    let mut counts = vec![0usize; sampler.components()];
    let draws: Vec<Draw> = (0..n)
        .map(|_| {
            let draw = sampler.draw(source, diag);
            if let Some(k) = draw.component {
                counts[k] += 1;
            }
            draw
        })
        .collect();
    (draws, counts)
}

fn continuous<S: Sampler + Density, U: UniformSource + ?Sized>(
    sampler: &S,
    n: usize,
    bins: usize,
    source: &mut U,
) -> Outcome {
    let mut diagnostics = Diagnostics::new();
    let (draws, component_counts) = draw_all(sampler, n, source, &mut diagnostics);
    let xs: Vec<f64> = draws.iter().map(|d| d.x).collect();
    let stats = RunningStats::from_values(&xs);
    let sorted = sorted_copy(&xs);

    let (lo, hi) = sampler.support();
    let range = (
        if lo.is_finite() { lo } else { stats.min() },
        if hi.is_finite() { hi } else { stats.max() },
    );
    let bins = histogram(&xs, bins, range);
    let empirical: Vec<ChartPoint> = bins
        .iter()
        .map(|b| ChartPoint { x: b.center, y: b.density })
        .collect();
    let theoretical: Vec<ChartPoint> = bins
        .iter()
        .map(|b| ChartPoint { x: b.center, y: sampler.pdf(b.center) })
        .collect();

    let step = (n / CDF_POINTS).max(1);
    let cdf_points: Vec<(f64, f64)> = ecdf(&xs).into_iter().step_by(step).collect();
    let ecdf_series = cdf_points.iter().map(|&(x, y)| ChartPoint { x, y }).collect();
    let cdf_series = cdf_points
        .iter()
        .map(|&(x, _)| ChartPoint { x, y: sampler.cdf(x) })
        .collect();

    let mut series = vec![
        Series::line("empirical_density", empirical),
        Series::line("theoretical_density", theoretical),
        Series::line("ecdf", ecdf_series),
        Series::line("cdf", cdf_series),
    ];
    push_component_bars(&mut series, &component_counts);

    Outcome {
        summary: SampleSummary {
            n,
            mean: stats.mean(),
            variance: stats.variance(),
            theoretical_mean: sampler.mean(),
            theoretical_variance: sampler.variance(),
            ks_statistic: ks_statistic(&sorted, |x| sampler.cdf(x)),
            ks_critical_value: ks_critical_value(n),
            component_counts,
        },
        draws,
        series,
        diagnostics,
    }
}

fn discrete<S: Sampler + Mass, U: UniformSource + ?Sized>(
    sampler: &S,
    n: usize,
    source: &mut U,
) -> Outcome {
    let mut diagnostics = Diagnostics::new();
    let (draws, component_counts) = draw_all(sampler, n, source, &mut diagnostics);
    let xs: Vec<f64> = draws.iter().map(|d| d.x).collect();
    let stats = RunningStats::from_values(&xs);

    // draw counts by value
    let mut frequencies: HashMap<u64, usize> = HashMap::new();
    for &x in &xs {
        *frequencies.entry(x.to_bits()).or_insert(0) += 1;
    }

    let outcomes = sampler.mass_points();
    let mut empirical = Vec::with_capacity(outcomes.len());
    let mut theoretical = Vec::with_capacity(outcomes.len());
    let mut ecdf_series = Vec::with_capacity(outcomes.len());
    let mut cdf_series = Vec::with_capacity(outcomes.len());
    let (mut running_emp, mut running_theory, mut gap) = (0.0, 0.0, 0.0f64);
    for k in outcomes {
        let x = k as f64;
        let count = frequencies.remove(&x.to_bits()).unwrap_or(0);
        let freq = count as f64 / n as f64;
        let pmf = sampler.pmf(k);
        running_emp += freq;
        running_theory += pmf;
        gap = gap.max((running_emp - running_theory).abs());
        empirical.push(ChartPoint { x, y: freq });
        theoretical.push(ChartPoint { x, y: pmf });
        ecdf_series.push(ChartPoint { x, y: running_emp });
        cdf_series.push(ChartPoint { x, y: running_theory.min(1.0) });
    }

    let mut series = vec![
        Series::line("empirical_pmf", empirical),
        Series::line("theoretical_pmf", theoretical),
        Series::line("ecdf", ecdf_series),
        Series::line("cdf", cdf_series),
    ];
    push_component_bars(&mut series, &component_counts);

    Outcome {
        summary: SampleSummary {
            n,
            mean: stats.mean(),
            variance: stats.variance(),
            theoretical_mean: sampler.mean(),
            theoretical_variance: sampler.variance(),
            ks_statistic: gap,
            ks_critical_value: ks_critical_value(n),
            component_counts,
        },
        draws,
        series,
        diagnostics,
    }
}

fn push_component_bars(series: &mut Vec<Series>, counts: &[usize]) {
    if counts.is_empty() {
        return;
    }
    let bars = counts
        .iter()
        .enumerate()
        .map(|(i, c)| BarPoint {
            label: format!("component {}", i + 1),
            value: *c as f64,
        })
        .collect();
    series.push(Series::bars("component_counts", bars));
}
