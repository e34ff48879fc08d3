/// Shared sampler vocabulary
/// A `Sampler` turns uniform draws into draws from its target law; continuous targets implement
/// `Density`, integer-valued ones `Mass`. `LinearSegment` inverts 0.5 * m * t^2 + h0 * t = target
/// on [0, width], picking the root that needs the least clamping

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::rng::UniformSource;

/// One draw together with the uniforms that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Draw {
    pub x: f64,
    /// Mixture component for composition samplers
    pub component: Option<usize>,
    pub selector_u: Option<f64>,
    pub inversion_u: f64,
}

impl Draw {
    pub fn direct(x: f64, u: f64) -> Self {
        Draw {
            x,
            component: None,
            selector_u: None,
            inversion_u: u,
        }
    }

    pub fn composed(x: f64, component: usize, selector_u: f64, inversion_u: f64) -> Self {
        Draw {
            x,
            component: Some(component),
            selector_u: Some(selector_u),
            inversion_u,
        }
    }
}

pub trait Sampler {
    /// Inverse-transform samplers consume one uniform, composition samplers two
    /// (selector first, then inversion).
    fn draw<U: UniformSource + ?Sized>(&self, source: &mut U, diag: &mut Diagnostics) -> Draw;

    /// Number of mixture components, 0 for plain samplers.
    fn components(&self) -> usize {
        0
    }
}

pub trait Density {
    fn pdf(&self, x: f64) -> f64;
    fn cdf(&self, x: f64) -> f64;
    /// Bounds of the support; the upper bound may be infinite.
    fn support(&self) -> (f64, f64);
    fn mean(&self) -> f64;
    fn variance(&self) -> f64;
}

pub trait Mass {
    fn pmf(&self, k: u64) -> f64;
    fn support(&self) -> (u64, u64);
    fn mean(&self) -> f64;
    fn variance(&self) -> f64;

    /// Outcomes carrying mass, ascending.
    fn mass_points(&self) -> Vec<u64> {
        let (lo, hi) = self.support();
        (lo..=hi).collect()
    }

    fn cdf(&self, k: u64) -> f64 {
        let (lo, hi) = self.support();
        if k < lo {
            return 0.0;
        }
        (lo..=k.min(hi)).map(|j| self.pmf(j)).sum::<f64>().min(1.0)
    }
}

/// A straight-line density piece starting at `x0` with height `h0` and slope `slope`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearSegment {
    pub x0: f64,
    pub width: f64,
    pub h0: f64,
    pub slope: f64,
}

/// Relative slack before a root outside [0, width] counts as clamped.
const ROOT_TOLERANCE: f64 = 1e-9;

impl LinearSegment {
    pub fn through(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let width = x1 - x0;
        LinearSegment {
            x0,
            width,
            h0: y0,
            slope: if width > 0.0 { (y1 - y0) / width } else { 0.0 },
        }
    }

    pub fn end(&self) -> f64 {
        self.x0 + self.width
    }

    pub fn height_at(&self, x: f64) -> f64 {
        if x < self.x0 || x > self.end() {
            return 0.0;
        }
        self.h0 + self.slope * (x - self.x0)
    }

    pub fn area(&self) -> f64 {
        self.area_to(self.end())
    }

    /// Area under the segment from its start up to `x`.
    pub fn area_to(&self, x: f64) -> f64 {
        let t = (x - self.x0).clamp(0.0, self.width);
        self.h0 * t + 0.5 * self.slope * t * t
    }

    /// Integral of x * f(x) over the segment.
    pub fn first_moment(&self) -> f64 {
        let w = self.width;
        self.x0 * self.area() + self.h0 * w * w / 2.0 + self.slope * w.powi(3) / 3.0
    }

    /// Integral of x^2 * f(x) over the segment.
    pub fn second_moment(&self) -> f64 {
        let w = self.width;
        let (h0, m, x0) = (self.h0, self.slope, self.x0);
        x0 * x0 * self.area()
            + 2.0 * x0 * (h0 * w * w / 2.0 + m * w.powi(3) / 3.0)
            + h0 * w.powi(3) / 3.0
            + m * w.powi(4) / 4.0
    }

    /// Same shape with every height multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        LinearSegment {
            h0: self.h0 * factor,
            slope: self.slope * factor,
            ..*self
        }
    }

    /// Point whose area from the segment start equals `target`.
    pub fn invert_area(&self, target: f64, diag: &mut Diagnostics) -> f64 {
        if target <= 0.0 || self.width <= 0.0 {
            return self.x0;
        }

        let linear = self.slope.abs() * self.width <= 1e-12 * self.h0.abs();
        let t = if linear {
            if self.h0 > 0.0 {
                target / self.h0
            } else {
                0.0
            }
        } else {
            let mut disc = self.h0 * self.h0 + 2.0 * self.slope * target;
            if disc < 0.0 {
                diag.negative_discriminant(disc);
                disc = 0.0;
            }
            let root = disc.sqrt();
            // (-h0 + root) / m rewritten to avoid cancellation
            let plus = if self.h0 + root > 0.0 {
                2.0 * target / (self.h0 + root)
            } else {
                -self.h0 / self.slope
            };
            let minus = (-self.h0 - root) / self.slope;
            if self.clamp_distance(minus) < self.clamp_distance(plus) {
                minus
            } else {
                plus
            }
        };

        let distance = self.clamp_distance(t);
        if distance > ROOT_TOLERANCE * self.width.max(1.0) {
            diag.clamped_root(t, self.width);
        }
        self.x0 + t.clamp(0.0, self.width)
    }

    fn clamp_distance(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::INFINITY;
        }
        (-t).max(t - self.width).max(0.0)
    }
}
