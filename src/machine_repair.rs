/// Machine–mechanic assignment simulator
/// N machines share one mechanic; a failed machine queues FIFO for repair and counts as down
/// until the repair ends. Sweeping N trades the mechanic's wage against idle machine time.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::composition::IntervalMixture;
use crate::diagnostics::Diagnostics;
use crate::distribution::{Density, Sampler};
use crate::error::{SimError, SimResult};
use crate::models::{BarPoint, ChartPoint, Metric, Report, RunLimits, Series};
use crate::monte_carlo::{replicate, MonteCarloStats};
use crate::optimizer::sweep;
use crate::rng::{resolve_seed, Lcg, UniformSource};
use crate::validate;

pub const MAX_MACHINES: u32 = 1_000;
pub const MAX_REPLICATIONS: usize = 10_000;
/// Event cap per run
pub const MAX_EVENTS: usize = 5_000_000;
/// Upper bound on expected failures, `machines * horizon_hours / mean time to failure`
pub const MAX_EXPECTED_FAILURES: u32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineRepairParams {
    /// Machines assigned to the mechanic in a single run
    pub machines: u32,
    pub machines_min: u32,
    pub machines_max: u32,
    /// (lower, upper, probability) in hours
    pub failure_hours: Vec<(f64, f64, f64)>,
    pub repair_hours: Vec<(f64, f64, f64)>,
    pub idle_cost_per_hour: f64,
    pub wage_per_hour: f64,
    pub horizon_hours: f64,
    /// Runs per N during the sweep
    pub replications: usize,
    pub seed: Option<u32>,
}

impl Default for MachineRepairParams {
    fn default() -> Self {
        MachineRepairParams {
            machines: 4,
            machines_min: 1,
            machines_max: 10,
            failure_hours: vec![
                (6.0, 8.0, 0.10),
                (8.0, 10.0, 0.15),
                (10.0, 12.0, 0.24),
                (12.0, 14.0, 0.26),
                (14.0, 16.0, 0.18),
                (16.0, 18.0, 0.07),
            ],
            repair_hours: vec![
                (0.5, 1.0, 0.20),
                (1.0, 1.5, 0.35),
                (1.5, 2.0, 0.30),
                (2.0, 3.0, 0.15),
            ],
            idle_cost_per_hour: 60.0,
            wage_per_hour: 40.0,
            horizon_hours: 2_000.0,
            replications: 5,
            seed: None,
        }
    }
}

impl MachineRepairParams {
    pub fn validate(&self) -> SimResult<()> {
        validate::count("machines", self.machines as usize)?;
        validate::at_most("machines", self.machines as usize, MAX_MACHINES as usize)?;
        validate::count("machines_min", self.machines_min as usize)?;
        validate::range_u32("machines", self.machines_min, self.machines_max)?;
        validate::at_most("machines_max", self.machines_max as usize, MAX_MACHINES as usize)?;
        validate::non_negative("idle_cost_per_hour", self.idle_cost_per_hour)?;
        validate::non_negative("wage_per_hour", self.wage_per_hour)?;
        validate::positive("horizon_hours", self.horizon_hours)?;
        validate::count("replications", self.replications)?;
        validate::at_most("replications", self.replications, MAX_REPLICATIONS)?;
        for &(lo, _, _) in self.failure_hours.iter().chain(&self.repair_hours) {
            validate::non_negative("interval lower bound", lo)?;
        }
        let failure = IntervalMixture::new(&self.failure_hours)?;
        IntervalMixture::new(&self.repair_hours)?;
        let most = self.machines.max(self.machines_max) as f64;
        if most * self.horizon_hours / failure.mean() > MAX_EXPECTED_FAILURES as f64 {
            return Err(SimError::invalid(
                "machines * horizon_hours / mean failure time",
                format!("must be <= {MAX_EXPECTED_FAILURES} expected failures"),
            ));
        }
        Ok(())
    }
}

/// Per-machine state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MachineState {
    Running { fails_at: f64 },
    Waiting { since: f64 },
    InRepair { until: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineEvent {
    Failure,
    RepairDone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineRow {
    pub event: usize,
    pub time: f64,
    /// 1-based
    pub machine: usize,
    pub kind: MachineEvent,
    /// Next failure time for a repaired machine, repair end for one entering repair
    pub scheduled: Option<f64>,
    pub down_machines: usize,
    pub queue_length: usize,
    pub mechanic_busy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineRunOutcome {
    pub machines: u32,
    pub horizon_hours: f64,
    /// Equals the horizon unless the event cap stopped the run early
    pub simulated_hours: f64,
    pub failures: usize,
    pub repairs: usize,
    /// Time-averaged number of machines down
    pub mean_down_machines: f64,
    pub down_fraction: f64,
    pub mechanic_utilisation: f64,
    pub mean_queue_wait: f64,
    /// `idle_cost_per_hour * mean_down_machines + wage_per_hour / machines`
    pub cost: f64,
    pub rows: Vec<MachineRow>,
    pub diagnostics: Diagnostics,
}

struct Laws {
    failure: IntervalMixture,
    repair: IntervalMixture,
}

struct Workshop<'a, U: ?Sized> {
    laws: &'a Laws,
    source: &'a mut U,
    diag: Diagnostics,
    states: Vec<MachineState>,
    queue: VecDeque<usize>,
    mechanic_busy: bool,
    queue_wait_total: f64,
    repairs_started: usize,
}

impl<'a, U: UniformSource + ?Sized> Workshop<'a, U> {
    fn draw_failure(&mut self) -> f64 {
        self.laws.failure.draw(&mut *self.source, &mut self.diag).x
    }

    fn draw_repair(&mut self) -> f64 {
        self.laws.repair.draw(&mut *self.source, &mut self.diag).x
    }

    fn start_repair(&mut self, machine: usize, now: f64) -> f64 {
        let until = now + self.draw_repair();
        self.states[machine] = MachineState::InRepair { until };
        self.mechanic_busy = true;
        self.repairs_started += 1;
        until
    }

    fn down_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| !matches!(s, MachineState::Running { .. }))
            .count()
    }

    /// Earliest pending event; repair completions win ties, then the lower machine index.
    fn next_event(&self) -> Option<(f64, MachineEvent, usize)> {
        let mut best: Option<(f64, u8, usize)> = None;
        for (i, state) in self.states.iter().enumerate() {
            let candidate = match *state {
                MachineState::InRepair { until } => (until, 0, i),
                MachineState::Running { fails_at } => (fails_at, 1, i),
                MachineState::Waiting { .. } => continue,
            };
            if best.map_or(true, |b| (candidate.0, candidate.1) < (b.0, b.1)) {
                best = Some(candidate);
            }
        }
        best.map(|(t, rank, i)| {
            let kind = if rank == 0 {
                MachineEvent::RepairDone
            } else {
                MachineEvent::Failure
            };
            (t, kind, i)
        })
    }
}

/// Simulate `machines` machines for `horizon_hours` on a stream seeded with `seed`.
pub fn simulate_machines(params: &MachineRepairParams, machines: u32, seed: u32) -> SimResult<MachineRunOutcome> {
    params.validate()?;
    validate::count("machines", machines as usize)?;
    let laws = build_laws(params)?;
    Ok(run_machines(
        params,
        &laws,
        machines,
        RunLimits::full(MAX_EVENTS),
        &mut Lcg::new(seed),
    ))
}

fn build_laws(params: &MachineRepairParams) -> SimResult<Laws> {
    Ok(Laws {
        failure: IntervalMixture::new(&params.failure_hours)?,
        repair: IntervalMixture::new(&params.repair_hours)?,
    })
}

fn run_machines<U: UniformSource + ?Sized>(
    params: &MachineRepairParams,
    laws: &Laws,
    machines: u32,
    limits: RunLimits,
    source: &mut U,
) -> MachineRunOutcome {
    let horizon = params.horizon_hours;
    let mut shop = Workshop {
        laws,
        source,
        diag: Diagnostics::new(),
        states: Vec::with_capacity(machines as usize),
        queue: VecDeque::new(),
        mechanic_busy: false,
        queue_wait_total: 0.0,
        repairs_started: 0,
    };
    for _ in 0..machines {
        let fails_at = shop.draw_failure();
        shop.states.push(MachineState::Running { fails_at });
    }

    let mut clock = 0.0;
    let mut down_area = 0.0;
    let mut busy_area = 0.0;
    let mut failures = 0;
    let mut repairs = 0;
    let mut events = 0;
    let mut end = horizon;
    let mut rows = Vec::new();

    while let Some((time, kind, machine)) = shop.next_event() {
        if time >= horizon {
            break;
        }
        if events >= limits.max_events {
            shop.diag.truncated_run(events, clock);
            end = clock;
            break;
        }
        events += 1;
        let dt = time - clock;
        down_area += shop.down_count() as f64 * dt;
        if shop.mechanic_busy {
            busy_area += dt;
        }
        clock = time;

        let scheduled = match kind {
            MachineEvent::Failure => {
                failures += 1;
                if shop.mechanic_busy {
                    shop.states[machine] = MachineState::Waiting { since: time };
                    shop.queue.push_back(machine);
                    None
                } else {
                    Some(shop.start_repair(machine, time))
                }
            }
            MachineEvent::RepairDone => {
                repairs += 1;
                let fails_at = time + shop.draw_failure();
                shop.states[machine] = MachineState::Running { fails_at };
                shop.mechanic_busy = false;
                if let Some(next) = shop.queue.pop_front() {
                    if let MachineState::Waiting { since } = shop.states[next] {
                        shop.queue_wait_total += time - since;
                    }
                    shop.start_repair(next, time);
                }
                Some(fails_at)
            }
        };

        if rows.len() < limits.rows {
            rows.push(MachineRow {
                event: events,
                time,
                machine: machine + 1,
                kind,
                scheduled,
                down_machines: shop.down_count(),
                queue_length: shop.queue.len(),
                mechanic_busy: shop.mechanic_busy,
            });
        }
    }

    let dt = end - clock;
    down_area += shop.down_count() as f64 * dt;
    if shop.mechanic_busy {
        busy_area += dt;
    }

    let per_hour = |area: f64| if end > 0.0 { area / end } else { 0.0 };
    let n = machines as f64;
    let mean_down_machines = per_hour(down_area);
    let cost = params.idle_cost_per_hour * mean_down_machines + params.wage_per_hour / n;
    let mean_queue_wait = if shop.repairs_started == 0 {
        0.0
    } else {
        shop.queue_wait_total / shop.repairs_started as f64
    };

    MachineRunOutcome {
        machines,
        horizon_hours: horizon,
        simulated_hours: end,
        failures,
        repairs,
        mean_down_machines,
        down_fraction: mean_down_machines / n,
        mechanic_utilisation: per_hour(busy_area),
        mean_queue_wait,
        cost,
        rows,
        diagnostics: shop.diag,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineRepairReport {
    pub seed: u32,
    pub outcome: MachineRunOutcome,
    pub report: Report<MachineRow>,
}

/// Single run with `params.machines` machines
pub fn run_machine_repair(params: &MachineRepairParams) -> SimResult<MachineRepairReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let outcome = simulate_machines(params, params.machines, seed)?;
    log::info!(
        "machine repair: N={} seed={} cost={:.4}",
        params.machines,
        seed,
        outcome.cost
    );

    let metrics = vec![
        Metric::new("machines", params.machines as f64),
        Metric::new("seed", seed as f64),
        Metric::new("failures", outcome.failures as f64),
        Metric::new("repairs", outcome.repairs as f64),
        Metric::new("mean_down_machines", outcome.mean_down_machines),
        Metric::new("down_fraction", outcome.down_fraction),
        Metric::new("mechanic_utilisation", outcome.mechanic_utilisation),
        Metric::new("mean_queue_wait", outcome.mean_queue_wait),
        Metric::new("simulated_hours", outcome.simulated_hours),
        Metric::new("cost", outcome.cost),
    ];
    let down = outcome
        .rows
        .iter()
        .map(|r| ChartPoint {
            x: r.time,
            y: r.down_machines as f64,
        })
        .collect();
    let report = Report::new(metrics, &outcome.rows, vec![Series::line("down_machines", down)]);
    Ok(MachineRepairReport {
        seed,
        outcome,
        report,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineCountEvaluation {
    pub machines: u32,
    pub cost: MonteCarloStats,
    pub down_fraction: f64,
    pub mechanic_utilisation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSweepReport {
    pub seed: u32,
    pub best_machines: u32,
    pub evaluations: Vec<MachineCountEvaluation>,
    pub report: Report<MachineCountEvaluation>,
}

/// Evaluate every N in `machines_min..=machines_max` over the same replication seeds.
pub fn sweep_machine_count(params: &MachineRepairParams) -> SimResult<MachineSweepReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let laws = build_laws(params)?;
    let counts: Vec<u32> = (params.machines_min..=params.machines_max).collect();

    let outcome = sweep(&counts, |&n| {
        let runs = replicate(params.replications, seed, |run_seed| {
            run_machines(
                params,
                &laws,
                n,
                RunLimits::preview(MAX_EVENTS),
                &mut Lcg::new(run_seed),
            )
        });
        let costs: Vec<f64> = runs.iter().map(|r| r.cost).collect();
        let k = runs.len() as f64;
        let evaluation = MachineCountEvaluation {
            machines: n,
            cost: MonteCarloStats::from_values(&costs),
            down_fraction: runs.iter().map(|r| r.down_fraction).sum::<f64>() / k,
            mechanic_utilisation: runs.iter().map(|r| r.mechanic_utilisation).sum::<f64>() / k,
        };
        log::debug!("N={n}: cost {:.4}", evaluation.cost.mean);
        (evaluation.cost.mean, evaluation)
    });

    let evaluations: Vec<MachineCountEvaluation> =
        outcome.evaluations.into_iter().map(|c| c.detail).collect();
    let best_machines = evaluations[outcome.best].machines;
    log::info!("machine repair sweep: best N={best_machines} (seed {seed})");

    let metrics = vec![
        Metric::new("seed", seed as f64),
        Metric::new("best_machines", best_machines as f64),
        Metric::new("best_cost", evaluations[outcome.best].cost.mean),
    ];
    let bars = evaluations
        .iter()
        .map(|e| BarPoint {
            label: format!("N={}", e.machines),
            value: e.cost.mean,
        })
        .collect();
    let report = Report::new(metrics, &evaluations, vec![Series::bars("cost_by_machines", bars)]);
    Ok(MachineSweepReport {
        seed,
        best_machines,
        evaluations,
        report,
    })
}
