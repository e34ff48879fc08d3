/// Unloading-team sizing module
/// Poisson arrivals served one at a time by a team whose uniform service range depends on its size.
/// The run integrates queue length, number in system and the busy indicator over time.
/// On an arrival the next interarrival time is drawn before the service time; departures win ties

use serde::{Deserialize, Serialize};

use crate::diagnostics::{clamp_unit, Diagnostics};
use crate::error::{SimError, SimResult};
use crate::inverse::Exponential;
use crate::models::{BarPoint, ChartPoint, Metric, Report, RunLimits, Series};
use crate::monte_carlo::{replicate, MonteCarloStats};
use crate::optimizer::sweep;
use crate::rng::{resolve_seed, Lcg, UniformSource};
use crate::validate;

pub const MAX_EVENTS: usize = 5_000_000;
/// Upper bound on `arrival_rate_per_hour * horizon_hours`
pub const MAX_EXPECTED_ARRIVALS: u32 = 1_000_000;
pub const MAX_REPLICATIONS: usize = 10_000;

/// Uniform service time range in hours for one team size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceRange {
    pub team_size: u32,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnloadingTeamParams {
    pub team_size: u32,
    pub arrival_rate_per_hour: f64,
    pub service_ranges: Vec<ServiceRange>,
    pub wage_per_hour: f64,
    pub waiting_cost_per_hour: f64,
    pub horizon_hours: f64,
    pub replications: usize,
    pub team_sizes: Vec<u32>,
    pub seed: Option<u32>,
}

impl Default for UnloadingTeamParams {
    fn default() -> Self {
        let range = |team_size, lower, upper| ServiceRange {
            team_size,
            lower,
            upper,
        };
        UnloadingTeamParams {
            team_size: 4,
            arrival_rate_per_hour: 2.0,
            service_ranges: vec![
                range(3, 0.30, 0.50),
                range(4, 0.25, 0.40),
                range(5, 0.20, 0.30),
                range(6, 0.15, 0.25),
            ],
            wage_per_hour: 25.0,
            waiting_cost_per_hour: 100.0,
            horizon_hours: 2_000.0,
            replications: 5,
            team_sizes: vec![3, 4, 5, 6],
            seed: None,
        }
    }
}

impl UnloadingTeamParams {
    pub fn validate(&self) -> SimResult<()> {
        validate::positive("arrival_rate_per_hour", self.arrival_rate_per_hour)?;
        validate::non_negative("wage_per_hour", self.wage_per_hour)?;
        validate::non_negative("waiting_cost_per_hour", self.waiting_cost_per_hour)?;
        validate::positive("horizon_hours", self.horizon_hours)?;
        if self.arrival_rate_per_hour * self.horizon_hours > MAX_EXPECTED_ARRIVALS as f64 {
            return Err(SimError::invalid(
                "arrival_rate_per_hour * horizon_hours",
                format!("must be <= {MAX_EXPECTED_ARRIVALS} expected arrivals"),
            ));
        }
        validate::count("replications", self.replications)?;
        validate::at_most("replications", self.replications, MAX_REPLICATIONS)?;
        if self.team_sizes.is_empty() {
            return Err(SimError::invalid("team_sizes", "must list at least one team size"));
        }
        for r in &self.service_ranges {
            validate::non_negative("service lower bound", r.lower)?;
            validate::increasing("service range", &[r.lower, r.upper])?;
        }
        for &size in self.team_sizes.iter().chain(std::iter::once(&self.team_size)) {
            self.service_range(size)?;
        }
        Ok(())
    }

    fn service_range(&self, team_size: u32) -> SimResult<ServiceRange> {
        self.service_ranges
            .iter()
            .copied()
            .find(|r| r.team_size == team_size)
            .ok_or_else(|| {
                SimError::invalid("team_size", format!("{team_size} has no service time range"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEvent {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueRow {
    pub event: usize,
    pub time: f64,
    pub kind: QueueEvent,
    pub queue_length: u32,
    pub in_system: u32,
    pub busy: bool,
    pub area_queue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRunOutcome {
    pub team_size: u32,
    /// Equals the horizon unless the run hit its event cap
    pub simulated_hours: f64,
    pub arrivals: usize,
    pub served: usize,
    /// ∫ Lq dt
    pub area_queue: f64,
    /// ∫ L dt
    pub area_system: f64,
    /// ∫ busy dt
    pub area_busy: f64,
    pub mean_queue_length: f64,
    pub mean_in_system: f64,
    pub utilisation: f64,
    pub labor_cost: f64,
    pub waiting_cost: f64,
    pub total_cost: f64,
    pub rows: Vec<QueueRow>,
    pub diagnostics: Diagnostics,
}

/// Simulate one horizon for `team_size` on a stream seeded with `seed`.
pub fn simulate_team(params: &UnloadingTeamParams, team_size: u32, seed: u32) -> SimResult<TeamRunOutcome> {
    params.validate()?;
    let range = params.service_range(team_size)?;
    let arrivals = Exponential::new(params.arrival_rate_per_hour)?;
    Ok(run_team(
        params,
        &arrivals,
        range,
        RunLimits::full(MAX_EVENTS),
        &mut Lcg::new(seed),
    ))
}

fn run_team<U: UniformSource + ?Sized>(
    params: &UnloadingTeamParams,
    interarrival: &Exponential,
    range: ServiceRange,
    limits: RunLimits,
    source: &mut U,
) -> TeamRunOutcome {
    let horizon = params.horizon_hours;
    let mut diag = Diagnostics::new();
    let service = |source: &mut U, diag: &mut Diagnostics| {
        let u = clamp_unit(source.next_uniform(), diag);
        range.lower + u * (range.upper - range.lower)
    };

    let mut clock = 0.0;
    let mut next_arrival = interarrival.inverse(source.next_uniform(), &mut diag);
    let mut next_departure = f64::INFINITY;
    let mut queue: u32 = 0;
    let mut busy = false;
    let (mut area_queue, mut area_system, mut area_busy) = (0.0, 0.0, 0.0);
    let (mut arrivals, mut served, mut events) = (0, 0, 0);
    let mut rows = Vec::new();

    loop {
        let (time, kind) = if next_departure <= next_arrival {
            (next_departure, QueueEvent::Departure)
        } else {
            (next_arrival, QueueEvent::Arrival)
        };
        if events >= limits.max_events && time < horizon {
            diag.truncated_run(events, clock);
            break;
        }
        let end = time.min(horizon);
        let dt = end - clock;
        let in_service = if busy { 1.0 } else { 0.0 };
        area_queue += queue as f64 * dt;
        area_system += (queue as f64 + in_service) * dt;
        area_busy += in_service * dt;
        clock = end;
        if time >= horizon {
            break;
        }
        events += 1;

        match kind {
            QueueEvent::Arrival => {
                arrivals += 1;
                next_arrival = time + interarrival.inverse(source.next_uniform(), &mut diag);
                if busy {
                    queue += 1;
                } else {
                    busy = true;
                    next_departure = time + service(&mut *source, &mut diag);
                }
            }
            QueueEvent::Departure => {
                served += 1;
                if queue > 0 {
                    queue -= 1;
                    next_departure = time + service(&mut *source, &mut diag);
                } else {
                    busy = false;
                    next_departure = f64::INFINITY;
                }
            }
        }

        if rows.len() < limits.rows {
            rows.push(QueueRow {
                event: events,
                time,
                kind,
                queue_length: queue,
                in_system: queue + busy as u32,
                busy,
                area_queue,
            });
        }
    }

    let per_hour = |area: f64| if clock > 0.0 { area / clock } else { 0.0 };
    let labor_cost = range.team_size as f64 * params.wage_per_hour * clock;
    let waiting_cost = params.waiting_cost_per_hour * area_queue;
    TeamRunOutcome {
        team_size: range.team_size,
        simulated_hours: clock,
        arrivals,
        served,
        area_queue,
        area_system,
        area_busy,
        mean_queue_length: per_hour(area_queue),
        mean_in_system: per_hour(area_system),
        utilisation: per_hour(area_busy),
        labor_cost,
        waiting_cost,
        total_cost: labor_cost + waiting_cost,
        rows,
        diagnostics: diag,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnloadingTeamReport {
    pub seed: u32,
    pub outcome: TeamRunOutcome,
    pub report: Report<QueueRow>,
}

pub fn run_unloading_team(params: &UnloadingTeamParams) -> SimResult<UnloadingTeamReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let outcome = simulate_team(params, params.team_size, seed)?;
    log::info!(
        "unloading team: team={} seed={} utilisation={:.4} total cost={:.2}",
        params.team_size,
        seed,
        outcome.utilisation,
        outcome.total_cost
    );

    let metrics = vec![
        Metric::new("team_size", params.team_size as f64),
        Metric::new("seed", seed as f64),
        Metric::new("arrivals", outcome.arrivals as f64),
        Metric::new("served", outcome.served as f64),
        Metric::new("mean_queue_length", outcome.mean_queue_length),
        Metric::new("mean_in_system", outcome.mean_in_system),
        Metric::new("utilisation", outcome.utilisation),
        Metric::new("labor_cost", outcome.labor_cost),
        Metric::new("waiting_cost", outcome.waiting_cost),
        Metric::new("total_cost", outcome.total_cost),
    ];
    let queue = outcome
        .rows
        .iter()
        .map(|r| ChartPoint {
            x: r.time,
            y: r.queue_length as f64,
        })
        .collect();
    let report = Report::new(metrics, &outcome.rows, vec![Series::line("queue_length", queue)]);
    Ok(UnloadingTeamReport {
        seed,
        outcome,
        report,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSizeEvaluation {
    pub team_size: u32,
    pub total_cost: MonteCarloStats,
    pub labor_cost: f64,
    pub waiting_cost: f64,
    pub utilisation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSweepReport {
    pub seed: u32,
    pub best_team_size: u32,
    pub evaluations: Vec<TeamSizeEvaluation>,
    pub report: Report<TeamSizeEvaluation>,
}

/// Evaluate every configured team size over the same replication seeds.
pub fn sweep_team_size(params: &UnloadingTeamParams) -> SimResult<TeamSweepReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let interarrival = Exponential::new(params.arrival_rate_per_hour)?;
    let mut ranges = Vec::with_capacity(params.team_sizes.len());
    for &size in &params.team_sizes {
        ranges.push(params.service_range(size)?);
    }

    let outcome = sweep(&ranges, |&range| {
        let runs = replicate(params.replications, seed, |run_seed| {
            run_team(
                params,
                &interarrival,
                range,
                RunLimits::preview(MAX_EVENTS),
                &mut Lcg::new(run_seed),
            )
        });
        let k = runs.len() as f64;
        let totals: Vec<f64> = runs.iter().map(|r| r.total_cost).collect();
        let evaluation = TeamSizeEvaluation {
            team_size: range.team_size,
            total_cost: MonteCarloStats::from_values(&totals),
            labor_cost: runs.iter().map(|r| r.labor_cost).sum::<f64>() / k,
            waiting_cost: runs.iter().map(|r| r.waiting_cost).sum::<f64>() / k,
            utilisation: runs.iter().map(|r| r.utilisation).sum::<f64>() / k,
        };
        log::debug!(
            "team {}: mean total cost {:.2}",
            range.team_size,
            evaluation.total_cost.mean
        );
        (evaluation.total_cost.mean, evaluation)
    });

    let evaluations: Vec<TeamSizeEvaluation> =
        outcome.evaluations.into_iter().map(|c| c.detail).collect();
    let best_team_size = evaluations[outcome.best].team_size;
    log::info!("unloading team sweep: best team size {best_team_size} (seed {seed})");

    let mut metrics = vec![
        Metric::new("seed", seed as f64),
        Metric::new("best_team_size", best_team_size as f64),
    ];
    for e in &evaluations {
        metrics.push(Metric::new(format!("team_{}_utilisation", e.team_size), e.utilisation));
    }
    let bars = evaluations
        .iter()
        .map(|e| BarPoint {
            label: format!("{} workers", e.team_size),
            value: e.total_cost.mean,
        })
        .collect();
    let report = Report::new(metrics, &evaluations, vec![Series::bars("cost_by_team", bars)]);
    Ok(TeamSweepReport {
        seed,
        best_team_size,
        evaluations,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Scripted;

    #[test]
    fn test_two_trucks_by_hand() {
        let params = UnloadingTeamParams {
            horizon_hours: 2.0,
            ..Default::default()
        };
        let range = params.service_range(4).unwrap();
        let interarrival = Exponential::new(2.0).unwrap();
        let script = [
            1.0 - (-1.0f64).exp(), // first arrival at 0.5
            1.0 - (-0.2f64).exp(), // second arrival 0.1 later
            1.0,                   // first service 0.40
            0.999_999,             // third arrival past the horizon
            0.0,                   // second service 0.25
        ];
        let outcome = run_team(
            &params,
            &interarrival,
            range,
            RunLimits::full(MAX_EVENTS),
            &mut Scripted::new(&script),
        );
        assert_eq!(outcome.arrivals, 2);
        assert_eq!(outcome.served, 2);
        // second truck queues from 0.6 until 0.9, team busy 0.5..1.15
        assert!((outcome.area_queue - 0.3).abs() < 1e-9);
        assert!((outcome.area_busy - 0.65).abs() < 1e-9);
        assert!((outcome.area_system - 0.95).abs() < 1e-9);
        assert!((outcome.labor_cost - 4.0 * 25.0 * 2.0).abs() < 1e-9);
        assert!((outcome.waiting_cost - 30.0).abs() < 1e-6);
        let kinds: Vec<QueueEvent> = outcome.rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                QueueEvent::Arrival,
                QueueEvent::Arrival,
                QueueEvent::Departure,
                QueueEvent::Departure
            ]
        );
    }

    #[test]
    fn test_areas_are_consistent() {
        let params = UnloadingTeamParams::default();
        let outcome = simulate_team(&params, 3, 99).unwrap();
        assert!((outcome.area_system - outcome.area_queue - outcome.area_busy).abs() < 1e-6);
        assert!(outcome.area_busy <= params.horizon_hours);
        assert!(outcome.served <= outcome.arrivals);
        assert!(outcome.diagnostics.is_clean());
    }

    #[test]
    fn test_utilisation_matches_offered_load() {
        let params = UnloadingTeamParams {
            horizon_hours: 10_000.0,
            ..Default::default()
        };
        let outcome = simulate_team(&params, 4, 2718).unwrap();
        // rho = 2 * 0.325
        assert!((outcome.utilisation - 0.65).abs() < 0.03);
    }

    #[test]
    fn test_bigger_team_waits_less() {
        let params = UnloadingTeamParams {
            horizon_hours: 1_000.0,
            seed: Some(5),
            ..Default::default()
        };
        let result = sweep_team_size(&params).unwrap();
        let waits: Vec<f64> = result.evaluations.iter().map(|e| e.waiting_cost).collect();
        assert!(waits[0] > waits[3]);
        let labor: Vec<f64> = result.evaluations.iter().map(|e| e.labor_cost).collect();
        assert!(labor.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_saturated_team_is_busy_all_horizon() {
        let params = UnloadingTeamParams {
            arrival_rate_per_hour: 10.0,
            horizon_hours: 1_000.0,
            ..Default::default()
        };
        let outcome = simulate_team(&params, 4, 11).unwrap();
        assert!(outcome.utilisation > 0.99, "utilisation {}", outcome.utilisation);
        assert_eq!(outcome.simulated_hours, 1_000.0);
        assert!(outcome.diagnostics.is_clean());
    }

    #[test]
    fn test_excessive_arrival_volume_is_rejected() {
        let params = UnloadingTeamParams {
            arrival_rate_per_hour: 100_000.0,
            horizon_hours: 100.0,
            ..Default::default()
        };
        let err = simulate_team(&params, 4, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "arrival_rate_per_hour * horizon_hours must be <= 1000000 expected arrivals"
        );
    }

    #[test]
    fn test_event_cap_is_recorded_and_rates_use_simulated_time() {
        let params = UnloadingTeamParams {
            arrival_rate_per_hour: 1_000.0,
            horizon_hours: 10.0,
            ..Default::default()
        };
        let range = params.service_range(4).unwrap();
        let interarrival = Exponential::new(params.arrival_rate_per_hour).unwrap();
        let limits = RunLimits {
            max_events: 50,
            rows: 5,
        };
        let outcome = run_team(&params, &interarrival, range, limits, &mut Lcg::new(3));
        assert_eq!(outcome.diagnostics.truncated_runs, 1);
        assert_eq!(outcome.rows.len(), 5);
        assert!(outcome.simulated_hours < params.horizon_hours);
        assert!((outcome.utilisation - outcome.area_busy / outcome.simulated_hours).abs() < 1e-12);
        assert!(outcome.utilisation <= 1.0);
        let labor = 4.0 * params.wage_per_hour * outcome.simulated_hours;
        assert!((outcome.labor_cost - labor).abs() < 1e-9);
    }

    #[test]
    fn test_sweep_runs_keep_only_preview_rows() {
        let params = UnloadingTeamParams {
            horizon_hours: 200.0,
            ..Default::default()
        };
        let range = params.service_range(3).unwrap();
        let interarrival = Exponential::new(params.arrival_rate_per_hour).unwrap();
        let outcome = run_team(
            &params,
            &interarrival,
            range,
            RunLimits::preview(MAX_EVENTS),
            &mut Lcg::new(8),
        );
        assert_eq!(outcome.rows.len(), crate::models::PREVIEW_ROWS);
        assert!(outcome.arrivals > 300);
        assert_eq!(outcome.simulated_hours, 200.0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let params = UnloadingTeamParams::default();
        assert_eq!(
            simulate_team(&params, 5, 8).unwrap(),
            simulate_team(&params, 5, 8).unwrap()
        );
    }

    #[test]
    fn test_unknown_team_size_rejected() {
        let params = UnloadingTeamParams {
            team_size: 2,
            ..Default::default()
        };
        let err = run_unloading_team(&params).unwrap_err();
        assert_eq!(err.to_string(), "team_size 2 has no service time range");
    }
}
