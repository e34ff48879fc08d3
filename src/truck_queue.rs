/// Night-shift truck unloading queue
/// Trucks waiting at the start of the shift plus arrivals up to the cutoff are unloaded FIFO by one
/// crew that takes a single break. Times are minutes; draw order is initial queue, interarrival
/// times (the one crossing the cutoff is discarded), then one service time per truck

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{SimError, SimResult};
use crate::inverse::DiscreteDistribution;
use crate::models::{BarPoint, ChartPoint, Metric, Report, Series, PREVIEW_ROWS};
use crate::monte_carlo::{replicate, MonteCarloStats};
use crate::optimizer::{sweep, SweepOutcome};
use crate::rng::{resolve_seed, Lcg, UniformSource};
use crate::validate;

/// Upper bound on trucks in one shift: the largest initial queue plus
/// `arrival_cutoff` over the shortest interarrival time.
pub const MAX_TRUCKS: usize = 10_000;
pub const MAX_SHIFTS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTable {
    pub team_size: u32,
    pub minutes: Vec<(u32, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruckQueueParams {
    pub team_size: u32,
    pub initial_queue: Vec<(u32, f64)>,
    pub interarrival_minutes: Vec<(u32, f64)>,
    pub service_tables: Vec<ServiceTable>,
    pub arrival_cutoff: f64,
    pub shift_length: f64,
    pub break_start: f64,
    pub break_length: f64,
    pub wage_per_hour: f64,
    pub overtime_wage_per_hour: f64,
    pub waiting_cost_per_hour: f64,
    pub operation_cost_per_hour: f64,
    /// Shifts simulated per team size during the policy search
    pub shifts: usize,
    pub team_sizes: Vec<u32>,
    pub seed: Option<u32>,
}

impl Default for TruckQueueParams {
    fn default() -> Self {
        TruckQueueParams {
            team_size: 3,
            initial_queue: vec![(0, 0.50), (1, 0.25), (2, 0.15), (3, 0.10)],
            interarrival_minutes: vec![
                (20, 0.02),
                (25, 0.08),
                (30, 0.12),
                (35, 0.25),
                (40, 0.20),
                (45, 0.15),
                (50, 0.10),
                (55, 0.05),
                (60, 0.03),
            ],
            service_tables: vec![
                ServiceTable {
                    team_size: 3,
                    minutes: vec![
                        (20, 0.05),
                        (25, 0.10),
                        (30, 0.20),
                        (35, 0.25),
                        (40, 0.12),
                        (45, 0.10),
                        (50, 0.08),
                        (55, 0.06),
                        (60, 0.04),
                    ],
                },
                ServiceTable {
                    team_size: 4,
                    minutes: vec![
                        (15, 0.05),
                        (20, 0.15),
                        (25, 0.20),
                        (30, 0.20),
                        (35, 0.15),
                        (40, 0.12),
                        (45, 0.08),
                        (50, 0.04),
                        (55, 0.01),
                    ],
                },
                ServiceTable {
                    team_size: 5,
                    minutes: vec![
                        (10, 0.10),
                        (15, 0.18),
                        (20, 0.22),
                        (25, 0.18),
                        (30, 0.10),
                        (35, 0.08),
                        (40, 0.06),
                        (45, 0.05),
                        (50, 0.03),
                    ],
                },
                ServiceTable {
                    team_size: 6,
                    minutes: vec![
                        (5, 0.12),
                        (10, 0.15),
                        (15, 0.26),
                        (20, 0.15),
                        (25, 0.12),
                        (30, 0.08),
                        (35, 0.06),
                        (40, 0.04),
                        (45, 0.02),
                    ],
                },
            ],
            arrival_cutoff: 510.0,
            shift_length: 480.0,
            break_start: 240.0,
            break_length: 30.0,
            wage_per_hour: 25.0,
            overtime_wage_per_hour: 37.5,
            waiting_cost_per_hour: 100.0,
            operation_cost_per_hour: 500.0,
            shifts: 60,
            team_sizes: vec![3, 4, 5, 6],
            seed: None,
        }
    }
}

impl TruckQueueParams {
    pub fn validate(&self) -> SimResult<()> {
        validate::positive("shift_length", self.shift_length)?;
        validate::non_negative("arrival_cutoff", self.arrival_cutoff)?;
        validate::non_negative("break_start", self.break_start)?;
        validate::non_negative("break_length", self.break_length)?;
        validate::non_negative("wage_per_hour", self.wage_per_hour)?;
        validate::non_negative("overtime_wage_per_hour", self.overtime_wage_per_hour)?;
        validate::non_negative("waiting_cost_per_hour", self.waiting_cost_per_hour)?;
        validate::non_negative("operation_cost_per_hour", self.operation_cost_per_hour)?;
        validate::count("shifts", self.shifts)?;
        validate::at_most("shifts", self.shifts, MAX_SHIFTS)?;
        if self.team_sizes.is_empty() {
            return Err(SimError::invalid("team_sizes", "must list at least one team size"));
        }
        if self.interarrival_minutes.iter().any(|(v, _)| *v == 0) {
            return Err(SimError::invalid("interarrival_minutes", "must only contain times > 0"));
        }
        DiscreteDistribution::new(&self.initial_queue)?;
        DiscreteDistribution::new(&self.interarrival_minutes)?;
        let waiting = self.initial_queue.iter().map(|(v, _)| *v).max().unwrap_or(0);
        let shortest_gap = self.interarrival_minutes.iter().map(|(v, _)| *v).min().unwrap_or(1);
        let most_trucks = waiting as f64 + (self.arrival_cutoff / shortest_gap as f64).floor();
        if most_trucks > MAX_TRUCKS as f64 {
            return Err(SimError::invalid(
                "arrival_cutoff",
                format!("must allow at most {MAX_TRUCKS} trucks per shift, got up to {most_trucks}"),
            ));
        }
        for &size in self.team_sizes.iter().chain(std::iter::once(&self.team_size)) {
            let table = self.service_table(size)?;
            DiscreteDistribution::new(&table.minutes)?;
        }
        Ok(())
    }

    fn service_table(&self, team_size: u32) -> SimResult<&ServiceTable> {
        self.service_tables
            .iter()
            .find(|t| t.team_size == team_size)
            .ok_or_else(|| {
                SimError::invalid(
                    "team_size",
                    format!("{team_size} has no service time table"),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    Idle,
    Busy,
    OnBreak,
}

/// Crew occupancy; `until` is when the current activity ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrewState {
    Idle,
    Busy { until: f64 },
    OnBreak { until: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakWindow {
    pub start: f64,
    pub end: f64,
}

/// The unloading crew as an explicit state machine
#[derive(Debug, Clone)]
pub struct Crew {
    state: CrewState,
    break_start: f64,
    break_length: f64,
    taken: Option<BreakWindow>,
    history: Vec<(f64, f64, CrewStatus)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSlot {
    pub start: f64,
    pub end: f64,
    pub break_before: Option<BreakWindow>,
}

impl Crew {
    pub fn new(break_start: f64, break_length: f64) -> Self {
        Crew {
            state: CrewState::Idle,
            break_start,
            break_length,
            taken: None,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> CrewState {
        self.state
    }

    /// Earliest time the crew can start new work.
    pub fn available_at(&self) -> f64 {
        match self.state {
            CrewState::Idle => 0.0,
            CrewState::Busy { until } | CrewState::OnBreak { until } => until,
        }
    }

    pub fn break_window(&self) -> Option<BreakWindow> {
        self.taken
    }

    /// What the crew is doing at time `t`, from its recorded activities.
    pub fn status_at(&self, t: f64) -> CrewStatus {
        self.history
            .iter()
            .rev()
            .find(|(start, end, _)| t >= *start && t < *end)
            .map(|(_, _, status)| *status)
            .unwrap_or(CrewStatus::Idle)
    }

    /// Unload a truck that arrived at `arrival`. Takes the break first when the
    /// service would otherwise start at or after the break time.
    pub fn serve(&mut self, arrival: f64, duration: f64) -> ServiceSlot {
        let free = self.available_at();
        let mut start = arrival.max(free);
        let mut break_before = None;

        if self.taken.is_none() && start >= self.break_start {
            let window = self.take_break(free);
            start = arrival.max(window.end);
            break_before = Some(window);
        }

        let end = start + duration;
        self.state = CrewState::Busy { until: end };
        self.history.push((start, end, CrewStatus::Busy));
        ServiceSlot {
            start,
            end,
            break_before,
        }
    }

    /// Close the shift; a break never needed by the queue is taken idle.
    pub fn close(&mut self) -> BreakWindow {
        match self.taken {
            Some(window) => window,
            None => {
                let free = self.available_at();
                let window = self.take_break(free);
                self.state = CrewState::Idle;
                window
            }
        }
    }

    fn take_break(&mut self, free: f64) -> BreakWindow {
        let start = self.break_start.max(free);
        let window = BreakWindow {
            start,
            end: start + self.break_length,
        };
        self.state = CrewState::OnBreak { until: window.end };
        self.history.push((window.start, window.end, CrewStatus::OnBreak));
        self.taken = Some(window);
        window
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckRow {
    pub truck: usize,
    /// None for trucks already queued when the shift starts
    pub arrival_u: Option<f64>,
    pub interarrival: f64,
    pub arrival: f64,
    pub service_u: f64,
    pub service_minutes: f64,
    pub crew_at_arrival: CrewStatus,
    pub break_before: bool,
    pub start: f64,
    pub end: f64,
    pub wait: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ShiftCosts {
    pub normal_wage: f64,
    pub overtime_wage: f64,
    pub waiting: f64,
    pub operation: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftOutcome {
    pub team_size: u32,
    pub trucks: usize,
    pub initial_queue: u32,
    pub total_wait_minutes: f64,
    pub finish_time: f64,
    pub overtime_minutes: f64,
    pub break_window: BreakWindow,
    pub costs: ShiftCosts,
    pub rows: Vec<TruckRow>,
    pub diagnostics: Diagnostics,
}

struct Tables {
    initial_queue: DiscreteDistribution<u32>,
    interarrival: DiscreteDistribution<u32>,
    service: DiscreteDistribution<u32>,
}

impl Tables {
    fn build(params: &TruckQueueParams, team_size: u32) -> SimResult<Self> {
        Ok(Tables {
            initial_queue: DiscreteDistribution::new(&params.initial_queue)?,
            interarrival: DiscreteDistribution::new(&params.interarrival_minutes)?,
            service: DiscreteDistribution::new(&params.service_table(team_size)?.minutes)?,
        })
    }
}

/// Simulate one shift for `team_size` on a stream seeded with `seed`.
pub fn simulate_shift(params: &TruckQueueParams, team_size: u32, seed: u32) -> SimResult<ShiftOutcome> {
    params.validate()?;
    let tables = Tables::build(params, team_size)?;
    Ok(run_shift(params, &tables, team_size, usize::MAX, &mut Lcg::new(seed)))
}

/// Runs one shift, keeping the first `row_limit` truck rows. Validation bounds the
/// number of trucks by `MAX_TRUCKS`.
fn run_shift<U: UniformSource + ?Sized>(
    params: &TruckQueueParams,
    tables: &Tables,
    team_size: u32,
    row_limit: usize,
    source: &mut U,
) -> ShiftOutcome {
    let mut diag = Diagnostics::new();
    for table in [&tables.initial_queue, &tables.interarrival, &tables.service] {
        table.check_mass(&mut diag);
    }

    // (arrival_u, interarrival, arrival)
    let mut arrivals: Vec<(Option<f64>, f64, f64)> = Vec::new();
    let waiting_at_start = tables.initial_queue.invert(source.next_uniform(), &mut diag);
    for _ in 0..waiting_at_start {
        arrivals.push((None, 0.0, 0.0));
    }
    let mut clock = 0.0;
    loop {
        let u = source.next_uniform();
        let gap = tables.interarrival.invert(u, &mut diag) as f64;
        clock += gap;
        if clock > params.arrival_cutoff {
            break;
        }
        arrivals.push((Some(u), gap, clock));
    }

    let mut crew = Crew::new(params.break_start, params.break_length);
    let trucks = arrivals.len();
    let mut rows = Vec::with_capacity(trucks.min(row_limit));
    let mut total_wait = 0.0;
    let mut finish_time: f64 = 0.0;
    for (i, (arrival_u, interarrival, arrival)) in arrivals.into_iter().enumerate() {
        let service_u = source.next_uniform();
        let service_minutes = tables.service.invert(service_u, &mut diag) as f64;
        let crew_at_arrival = crew.status_at(arrival);
        let slot = crew.serve(arrival, service_minutes);
        let wait = slot.start - arrival;
        total_wait += wait;
        finish_time = slot.end;
        if rows.len() < row_limit {
            rows.push(TruckRow {
                truck: i + 1,
                arrival_u,
                interarrival,
                arrival,
                service_u,
                service_minutes,
                crew_at_arrival,
                break_before: slot.break_before.is_some(),
                start: slot.start,
                end: slot.end,
                wait,
            });
        }
    }
    let break_window = crew.close();

    let overtime_minutes = (finish_time - params.shift_length).max(0.0);
    let team = team_size as f64;
    let normal_wage = team * params.wage_per_hour * params.shift_length / 60.0;
    let overtime_wage = team * params.overtime_wage_per_hour * overtime_minutes / 60.0;
    let waiting = params.waiting_cost_per_hour * total_wait / 60.0;
    let operation = params.operation_cost_per_hour * (params.shift_length + overtime_minutes) / 60.0;

    ShiftOutcome {
        team_size,
        trucks,
        initial_queue: waiting_at_start,
        total_wait_minutes: total_wait,
        finish_time,
        overtime_minutes,
        break_window,
        costs: ShiftCosts {
            normal_wage,
            overtime_wage,
            waiting,
            operation,
            total: normal_wage + overtime_wage + waiting + operation,
        },
        rows,
        diagnostics: diag,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckQueueReport {
    pub seed: u32,
    pub outcome: ShiftOutcome,
    pub report: Report<TruckRow>,
}

/// Single shift with `params.team_size`.
pub fn run_truck_queue(params: &TruckQueueParams) -> SimResult<TruckQueueReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let outcome = simulate_shift(params, params.team_size, seed)?;
    log::info!(
        "truck queue: team={} seed={} trucks={} total cost={:.2}",
        params.team_size,
        seed,
        outcome.trucks,
        outcome.costs.total
    );

    let c = &outcome.costs;
    let metrics = vec![
        Metric::new("team_size", params.team_size as f64),
        Metric::new("seed", seed as f64),
        Metric::new("trucks", outcome.trucks as f64),
        Metric::new("initial_queue", outcome.initial_queue as f64),
        Metric::new("total_wait_minutes", outcome.total_wait_minutes),
        Metric::new("finish_time", outcome.finish_time),
        Metric::new("overtime_minutes", outcome.overtime_minutes),
        Metric::new("break_start", outcome.break_window.start),
        Metric::new("normal_wage", c.normal_wage),
        Metric::new("overtime_wage", c.overtime_wage),
        Metric::new("waiting_cost", c.waiting),
        Metric::new("operation_cost", c.operation),
        Metric::new("total_cost", c.total),
    ];
    let waits = outcome
        .rows
        .iter()
        .map(|r| ChartPoint { x: r.truck as f64, y: r.wait })
        .collect();
    let series = vec![Series::line("wait_by_truck", waits)];
    let report = Report::new(metrics, &outcome.rows, series);
    Ok(TruckQueueReport {
        seed,
        outcome,
        report,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamEvaluation {
    pub team_size: u32,
    pub total_cost: MonteCarloStats,
    pub normal_wage: f64,
    pub overtime_wage: f64,
    pub waiting_cost: f64,
    pub operation_cost: f64,
    pub mean_trucks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSearchReport {
    pub seed: u32,
    pub best_team_size: u32,
    pub evaluations: Vec<TeamEvaluation>,
    pub report: Report<TeamEvaluation>,
}

/// Simulate every team size over the same `shifts` seeds and pick the lowest mean total cost.
pub fn search_team_size(params: &TruckQueueParams) -> SimResult<TeamSearchReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);

    let mut tables = Vec::with_capacity(params.team_sizes.len());
    for &size in &params.team_sizes {
        tables.push((size, Tables::build(params, size)?));
    }

    let SweepOutcome { best, evaluations } = sweep(&tables, |(size, table)| {
        let outcomes = replicate(params.shifts, seed, |shift_seed| {
            run_shift(params, table, *size, PREVIEW_ROWS, &mut Lcg::new(shift_seed))
        });
        let evaluation = evaluate_team(*size, &outcomes);
        log::debug!(
            "team {}: mean total cost {:.2} over {} shifts",
            size,
            evaluation.total_cost.mean,
            params.shifts
        );
        (evaluation.total_cost.mean, evaluation)
    });

    let evaluations: Vec<TeamEvaluation> = evaluations.into_iter().map(|c| c.detail).collect();
    let best_team_size = evaluations[best].team_size;
    log::info!("truck queue search: best team size {best_team_size} (seed {seed})");

    let mut metrics = vec![
        Metric::new("seed", seed as f64),
        Metric::new("shifts", params.shifts as f64),
        Metric::new("best_team_size", best_team_size as f64),
    ];
    for e in &evaluations {
        metrics.push(Metric::new(format!("team_{}_mean_cost", e.team_size), e.total_cost.mean));
    }
    let bars = evaluations
        .iter()
        .map(|e| BarPoint {
            label: format!("{} workers", e.team_size),
            value: e.total_cost.mean,
        })
        .collect();
    let report = Report::new(metrics, &evaluations, vec![Series::bars("mean_cost_by_team", bars)]);
    Ok(TeamSearchReport {
        seed,
        best_team_size,
        evaluations,
        report,
    })
}

fn evaluate_team(team_size: u32, outcomes: &[ShiftOutcome]) -> TeamEvaluation {
    let n = outcomes.len().max(1) as f64;
    let mean = |f: fn(&ShiftOutcome) -> f64| outcomes.iter().map(f).sum::<f64>() / n;
    let totals: Vec<f64> = outcomes.iter().map(|o| o.costs.total).collect();
    TeamEvaluation {
        team_size,
        total_cost: MonteCarloStats::from_values(&totals),
        normal_wage: mean(|o| o.costs.normal_wage),
        overtime_wage: mean(|o| o.costs.overtime_wage),
        waiting_cost: mean(|o| o.costs.waiting),
        operation_cost: mean(|o| o.costs.operation),
        mean_trucks: mean(|o| o.trucks as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Scripted;

    fn single_truck_params() -> TruckQueueParams {
        TruckQueueParams {
            initial_queue: vec![(1, 1.0)],
            interarrival_minutes: vec![(600, 1.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_break_taken_immediately_when_idle() {
        let mut crew = Crew::new(240.0, 30.0);
        let first = crew.serve(100.0, 40.0);
        assert_eq!((first.start, first.end), (100.0, 140.0));
        assert!(first.break_before.is_none());

        let second = crew.serve(250.0, 20.0);
        let window = second.break_before.unwrap();
        assert_eq!((window.start, window.end), (240.0, 270.0));
        assert_eq!(second.start, 270.0);
        assert_eq!(crew.status_at(255.0), CrewStatus::OnBreak);
    }

    #[test]
    fn test_break_deferred_until_crew_frees_up() {
        let mut crew = Crew::new(240.0, 30.0);
        crew.serve(220.0, 40.0); // busy until 260
        assert_eq!(crew.status_at(240.0), CrewStatus::Busy);
        let next = crew.serve(230.0, 10.0);
        let window = next.break_before.unwrap();
        assert_eq!((window.start, window.end), (260.0, 290.0));
        assert_eq!(next.start, 290.0);
        assert_eq!(crew.state(), CrewState::Busy { until: 300.0 });
    }

    #[test]
    fn test_break_taken_once() {
        let mut crew = Crew::new(240.0, 30.0);
        crew.serve(250.0, 10.0);
        let later = crew.serve(300.0, 10.0);
        assert!(later.break_before.is_none());
        assert_eq!(later.start, 300.0);
    }

    #[test]
    fn test_unused_break_taken_at_close() {
        let mut crew = Crew::new(240.0, 30.0);
        crew.serve(0.0, 30.0);
        let window = crew.close();
        assert_eq!((window.start, window.end), (240.0, 270.0));
    }

    #[test]
    fn test_single_truck_costs() {
        let params = single_truck_params();
        let tables = Tables::build(&params, 3).unwrap();
        // initial queue, interarrival beyond cutoff, service time 35
        let mut source = Scripted::new(&[0.5, 0.5, 0.5]);
        let outcome = run_shift(&params, &tables, 3, usize::MAX, &mut source);
        assert_eq!(source.consumed(), 3);
        assert_eq!(outcome.trucks, 1);
        assert_eq!(outcome.rows[0].service_minutes, 35.0);
        assert_eq!(outcome.total_wait_minutes, 0.0);
        assert_eq!(outcome.overtime_minutes, 0.0);
        assert!((outcome.costs.normal_wage - 3.0 * 25.0 * 8.0).abs() < 1e-9);
        assert!((outcome.costs.operation - 500.0 * 8.0).abs() < 1e-9);
        assert!((outcome.costs.total - (600.0 + 4000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_overtime_after_shift_end() {
        let params = TruckQueueParams {
            initial_queue: vec![(0, 1.0)],
            interarrival_minutes: vec![(470, 1.0)],
            ..Default::default()
        };
        let tables = Tables::build(&params, 3).unwrap();
        // arrival at 470, next arrival at 940 is past the cutoff, service 60 minutes
        let mut source = Scripted::new(&[0.1, 0.1, 0.1, 0.99]);
        let outcome = run_shift(&params, &tables, 3, usize::MAX, &mut source);
        assert_eq!(outcome.trucks, 1);
        assert_eq!(outcome.rows[0].start, 470.0);
        assert_eq!(outcome.finish_time, 530.0);
        assert_eq!(outcome.overtime_minutes, 50.0);
        assert!((outcome.costs.overtime_wage - 3.0 * 37.5 * 50.0 / 60.0).abs() < 1e-9);
        assert!((outcome.costs.operation - 500.0 * 530.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_fifo_waits_accumulate() {
        let params = TruckQueueParams {
            initial_queue: vec![(3, 1.0)],
            interarrival_minutes: vec![(600, 1.0)],
            ..Default::default()
        };
        let tables = Tables::build(&params, 3).unwrap();
        let mut source = Scripted::new(&[0.5, 0.5, 0.0]);
        let outcome = run_shift(&params, &tables, 3, usize::MAX, &mut source);
        let waits: Vec<f64> = outcome.rows.iter().map(|r| r.wait).collect();
        assert_eq!(waits, vec![0.0, 20.0, 40.0]);
        assert!((outcome.costs.waiting - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_shift() {
        let params = TruckQueueParams::default();
        let a = simulate_shift(&params, 4, 2024).unwrap();
        let b = simulate_shift(&params, 4, 2024).unwrap();
        assert_eq!(a, b);
        assert!(a.diagnostics.is_clean());
        assert!(a.rows.iter().all(|r| r.arrival <= params.arrival_cutoff));
    }

    #[test]
    fn test_missing_service_table_is_rejected() {
        let params = TruckQueueParams {
            team_size: 9,
            ..Default::default()
        };
        let err = run_truck_queue(&params).unwrap_err();
        assert!(err.to_string().contains("no service time table"));
    }

    #[test]
    fn test_zero_interarrival_is_rejected() {
        let params = TruckQueueParams {
            interarrival_minutes: vec![(0, 0.5), (10, 0.5)],
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_interarrival_without_mass_is_rejected() {
        let params = TruckQueueParams {
            interarrival_minutes: vec![(0, 0.0), (10, 1.0)],
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_excessive_truck_volume_is_rejected() {
        let params = TruckQueueParams {
            interarrival_minutes: vec![(1, 1.0)],
            arrival_cutoff: 20_000.0,
            ..Default::default()
        };
        let err = run_truck_queue(&params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "arrival_cutoff must allow at most 10000 trucks per shift, got up to 20003"
        );
        // 3 waiting + 9_997 arrivals is exactly at the bound
        let at_bound = TruckQueueParams {
            arrival_cutoff: 9_997.0,
            ..params
        };
        assert!(at_bound.validate().is_ok());
    }

    #[test]
    fn test_search_runs_keep_only_preview_rows() {
        let params = TruckQueueParams {
            interarrival_minutes: vec![(5, 1.0)],
            ..Default::default()
        };
        let tables = Tables::build(&params, 6).unwrap();
        let full = run_shift(&params, &tables, 6, usize::MAX, &mut Lcg::new(4));
        let preview = run_shift(&params, &tables, 6, PREVIEW_ROWS, &mut Lcg::new(4));
        // 102 arrivals before the cutoff plus the initial queue
        assert!(full.trucks >= 102);
        assert_eq!(full.rows.len(), full.trucks);
        assert_eq!(preview.rows.len(), PREVIEW_ROWS);
        assert_eq!(preview.trucks, full.trucks);
        assert_eq!(preview.finish_time, full.finish_time);
        assert_eq!(preview.total_wait_minutes, full.total_wait_minutes);
        assert_eq!(preview.costs, full.costs);
        assert_eq!(preview.rows[..], full.rows[..PREVIEW_ROWS]);
    }

    #[test]
    fn test_search_covers_each_team_size() {
        let params = TruckQueueParams {
            shifts: 10,
            seed: Some(7),
            ..Default::default()
        };
        let result = search_team_size(&params).unwrap();
        let sizes: Vec<u32> = result.evaluations.iter().map(|e| e.team_size).collect();
        assert_eq!(sizes, vec![3, 4, 5, 6]);
        let best = result
            .evaluations
            .iter()
            .map(|e| e.total_cost.mean)
            .fold(f64::INFINITY, f64::min);
        let chosen = result
            .evaluations
            .iter()
            .find(|e| e.team_size == result.best_team_size)
            .unwrap();
        assert_eq!(chosen.total_cost.mean, best);
    }
}
