/// Policy optimization module
/// Discrete candidate sweeps and Hooke–Jeeves pattern search over an integer (q, R) grid

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::validate;

/// Hard cap on Hooke–Jeeves iterations
pub const MAX_ITERATIONS: usize = 10_000;

/// One evaluated candidate of a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate<D> {
    pub index: usize,
    pub cost: f64,
    pub detail: D,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepOutcome<D> {
    /// Index of the lowest-cost candidate; the first one wins ties
    pub best: usize,
    pub evaluations: Vec<Candidate<D>>,
}

/// Evaluate every candidate and keep the one with the lowest cost
pub fn sweep<T, D, F>(candidates: &[T], mut evaluate: F) -> SweepOutcome<D>
where
    F: FnMut(&T) -> (f64, D),
{
    let mut best_cost = f64::INFINITY;
    let mut best = 0;
    let mut evaluations = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        let (cost, detail) = evaluate(candidate);
        if cost < best_cost {
            best_cost = cost;
            best = index;
        }
        evaluations.push(Candidate {
            index,
            cost,
            detail,
        });
    }

    SweepOutcome { best, evaluations }
}

/// A policy on the integer search grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub q: u32,
    pub r: u32,
}

impl GridPoint {
    pub fn new(q: u32, r: u32) -> Self {
        GridPoint { q, r }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookeJeevesParams {
    pub start: GridPoint,
    pub step_q: u32,
    pub step_r: u32,
    pub min_step_q: u32,
    pub min_step_r: u32,
    /// Step multiplier applied when no exploratory move improves, in (0, 1)
    pub reduction: f64,
    pub q_min: u32,
    pub q_max: u32,
    pub r_min: u32,
    pub r_max: u32,
    pub max_iterations: usize,
}

impl Default for HookeJeevesParams {
    fn default() -> Self {
        HookeJeevesParams {
            start: GridPoint::new(220, 115),
            step_q: 40,
            step_r: 20,
            min_step_q: 1,
            min_step_r: 1,
            reduction: 0.5,
            q_min: 40,
            q_max: 600,
            r_min: 0,
            r_max: 400,
            max_iterations: 200,
        }
    }
}

impl HookeJeevesParams {
    pub fn validate(&self) -> SimResult<()> {
        validate::range_u32("q bounds", self.q_min, self.q_max)?;
        validate::range_u32("R bounds", self.r_min, self.r_max)?;
        if !(self.q_min..=self.q_max).contains(&self.start.q)
            || !(self.r_min..=self.r_max).contains(&self.start.r)
        {
            return Err(SimError::invalid("start", "must lie within the q and R bounds"));
        }
        validate::count("step_q", self.step_q as usize)?;
        validate::count("step_r", self.step_r as usize)?;
        validate::count("min_step_q", self.min_step_q as usize)?;
        validate::count("min_step_r", self.min_step_r as usize)?;
        if !(self.reduction > 0.0 && self.reduction < 1.0) {
            return Err(SimError::invalid("reduction", "must lie strictly between 0 and 1"));
        }
        validate::count("max_iterations", self.max_iterations)?;
        validate::at_most("max_iterations", self.max_iterations, MAX_ITERATIONS)?;
        Ok(())
    }

    fn clamp(&self, q: i64, r: i64) -> GridPoint {
        GridPoint {
            q: q.clamp(self.q_min as i64, self.q_max as i64) as u32,
            r: r.clamp(self.r_min as i64, self.r_max as i64) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAction {
    Start,
    Exploratory,
    Pattern,
    Reduce,
    Converged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchIteration {
    pub iteration: usize,
    pub point: GridPoint,
    pub cost: f64,
    pub action: SearchAction,
    pub step_q: u32,
    pub step_r: u32,
    pub best_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub best_point: GridPoint,
    pub best_cost: f64,
    pub termination: Termination,
    /// Distinct points evaluated
    pub evaluations: usize,
    pub iterations: Vec<SearchIteration>,
}

/// Memoised cost function; each grid point is evaluated at most once
struct Memo<F> {
    cost: F,
    seen: HashMap<GridPoint, f64>,
}

impl<F: FnMut(GridPoint) -> f64> Memo<F> {
    fn eval(&mut self, point: GridPoint) -> f64 {
        if let Some(&c) = self.seen.get(&point) {
            return c;
        }
        let c = (self.cost)(point);
        self.seen.insert(point, c);
        c
    }
}

/// Hooke–Jeeves pattern search minimising `cost` over the bounded grid.
///
/// Each iteration probes `q ± step_q` and `R ± step_r` around the base. The
/// best improving probe becomes the new base and a single pattern move
/// `new + (new - old)` is tried from it. Without an improving probe both
/// steps shrink by `reduction` (never below 1); the search converges once
/// that happens with both steps already at their minimums.
pub fn hooke_jeeves<F>(params: &HookeJeevesParams, cost: F) -> SimResult<SearchResult>
where
    F: FnMut(GridPoint) -> f64,
{
    params.validate()?;
    let mut memo = Memo {
        cost,
        seen: HashMap::new(),
    };

    let mut base = params.start;
    let mut base_cost = memo.eval(base);
    let mut step_q = params.step_q;
    let mut step_r = params.step_r;
    let mut termination = Termination::IterationLimit;

    let mut iterations = vec![SearchIteration {
        iteration: 0,
        point: base,
        cost: base_cost,
        action: SearchAction::Start,
        step_q,
        step_r,
        best_cost: base_cost,
    }];

    for iteration in 1..=params.max_iterations {
        let (q, r) = (base.q as i64, base.r as i64);
        let probes = [
            params.clamp(q + step_q as i64, r),
            params.clamp(q - step_q as i64, r),
            params.clamp(q, r + step_r as i64),
            params.clamp(q, r - step_r as i64),
        ];

        let mut best_probe: Option<(GridPoint, f64)> = None;
        for probe in probes {
            if probe == base {
                continue;
            }
            let c = memo.eval(probe);
            if c < base_cost && best_probe.map_or(true, |(_, b)| c < b) {
                best_probe = Some((probe, c));
            }
        }

        let action = match best_probe {
            Some((point, c)) => {
                let old = base;
                base = point;
                base_cost = c;

                let pattern = params.clamp(
                    2 * base.q as i64 - old.q as i64,
                    2 * base.r as i64 - old.r as i64,
                );
                if pattern != base {
                    let pc = memo.eval(pattern);
                    if pc < base_cost {
                        base = pattern;
                        base_cost = pc;
                    }
                }
                if base == point {
                    SearchAction::Exploratory
                } else {
                    SearchAction::Pattern
                }
            }
            None if step_q <= params.min_step_q && step_r <= params.min_step_r => {
                termination = Termination::Converged;
                SearchAction::Converged
            }
            None => {
                step_q = shrink(step_q, params.reduction);
                step_r = shrink(step_r, params.reduction);
                SearchAction::Reduce
            }
        };

        log::debug!(
            "hooke-jeeves {iteration}: {action:?} to ({}, {}) cost {base_cost:.4} steps ({step_q}, {step_r})",
            base.q,
            base.r
        );
        iterations.push(SearchIteration {
            iteration,
            point: base,
            cost: base_cost,
            action,
            step_q,
            step_r,
            best_cost: base_cost,
        });

        if termination == Termination::Converged {
            break;
        }
    }

    if termination == Termination::IterationLimit {
        log::info!(
            "hooke-jeeves stopped after {} iterations before reaching the minimum steps",
            params.max_iterations
        );
    }

    Ok(SearchResult {
        best_point: base,
        best_cost: base_cost,
        termination,
        evaluations: memo.seen.len(),
        iterations,
    })
}

fn shrink(step: u32, factor: f64) -> u32 {
    ((step as f64 * factor).floor() as u32).max(1)
}
