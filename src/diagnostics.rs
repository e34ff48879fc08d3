/// Counters for numerical clamping and fallbacks
/// Clamping keeps samplers robust at segment boundaries; these counters make it visible

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Quadratic inversions whose discriminant was negative and was treated as zero
    pub negative_discriminants: u64,
    /// Roots that fell outside their segment and were pulled back to its edge
    pub clamped_roots: u64,
    /// Uniform inputs outside [0, 1] that were clamped before inversion
    pub clamped_uniforms: u64,
    /// Discrete inversions that ran past the cumulative table and returned the last outcome
    pub cumulative_fallbacks: u64,
    /// Probability tables whose mass is not 1
    pub mass_warnings: u64,
    /// Event-driven runs stopped at their event cap before the horizon
    pub truncated_runs: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        *self == Diagnostics::default()
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.negative_discriminants += other.negative_discriminants;
        self.clamped_roots += other.clamped_roots;
        self.clamped_uniforms += other.clamped_uniforms;
        self.cumulative_fallbacks += other.cumulative_fallbacks;
        self.mass_warnings += other.mass_warnings;
        self.truncated_runs += other.truncated_runs;
    }

    pub(crate) fn negative_discriminant(&mut self, value: f64) {
        self.negative_discriminants += 1;
        log::warn!("negative discriminant {value:e} treated as a repeated root");
    }

    pub(crate) fn clamped_root(&mut self, root: f64, width: f64) {
        self.clamped_roots += 1;
        log::warn!("root {root} clamped into segment [0, {width}]");
    }

    pub(crate) fn clamped_uniform(&mut self, u: f64) {
        self.clamped_uniforms += 1;
        log::warn!("uniform draw {u} outside [0, 1] was clamped");
    }

    pub(crate) fn cumulative_fallback(&mut self, u: f64) {
        self.cumulative_fallbacks += 1;
        log::debug!("draw {u} exceeded cumulative table, using last outcome");
    }

    pub(crate) fn mass_warning(&mut self, total: f64) {
        self.mass_warnings += 1;
        log::warn!("probability table sums to {total:.9}, expected 1");
    }

    pub(crate) fn truncated_run(&mut self, events: usize, clock: f64) {
        self.truncated_runs += 1;
        log::warn!("run stopped after {events} events at t = {clock:.4}, before its horizon");
    }
}

/// Clamp a uniform into [0, 1], recording when it was needed.
pub(crate) fn clamp_unit(u: f64, diag: &mut Diagnostics) -> f64 {
    if u.is_nan() {
        diag.clamped_uniform(u);
        0.0
    } else if !(0.0..=1.0).contains(&u) {
        diag.clamped_uniform(u);
        u.clamp(0.0, 1.0)
    } else {
        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit_records() {
        let mut diag = Diagnostics::new();
        assert_eq!(clamp_unit(0.3, &mut diag), 0.3);
        assert!(diag.is_clean());
        assert_eq!(clamp_unit(1.2, &mut diag), 1.0);
        assert_eq!(clamp_unit(-0.1, &mut diag), 0.0);
        assert_eq!(diag.clamped_uniforms, 2);
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_merge_adds() {
        let mut a = Diagnostics::new();
        a.negative_discriminant(-1e-18);
        let mut b = Diagnostics::new();
        b.negative_discriminant(-1e-18);
        b.cumulative_fallback(0.9999);
        b.truncated_run(10, 3.5);
        a.merge(&b);
        assert_eq!(a.negative_discriminants, 2);
        assert_eq!(a.cumulative_fallbacks, 1);
        assert_eq!(a.truncated_runs, 1);
        assert!(!a.is_clean());
    }
}
