/// Inventory (q, R) simulation module
/// Day-stepped reorder-point model: whenever the inventory position drops to R an order of q
/// units is placed and arrives after a random lead time. Unmet demand is either backordered
/// until stock arrives or waits a bounded number of days before turning into a lost sale.

use std::collections::VecDeque;

use rand::{Rng, RngCore};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{SimError, SimResult};
use crate::inverse::DiscreteDistribution;
use crate::models::{ChartPoint, Metric, Report, Series, PREVIEW_ROWS};
use crate::monte_carlo::{replicate, MonteCarloStats};
use crate::optimizer::{hooke_jeeves, GridPoint, HookeJeevesParams, SearchIteration, SearchResult};
use crate::rng::{resolve_seed, Lcg, UniformSource};
use crate::stats::RunningStats;
use crate::validate;

pub const MAX_DAYS: u32 = 100_000;
pub const MAX_WAIT_DAYS: u32 = 60;
pub const MAX_REPLICATIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DemandModel {
    /// Units per day with their probabilities
    Empirical { table: Vec<(u32, f64)> },
    /// Rounded, floored at zero and capped at mean + 3 std devs
    Normal { mean: f64, std_dev: f64 },
}

impl Default for DemandModel {
    fn default() -> Self {
        DemandModel::Empirical {
            table: vec![
                (25, 0.05),
                (30, 0.10),
                (35, 0.20),
                (40, 0.30),
                (45, 0.20),
                (50, 0.10),
                (55, 0.05),
            ],
        }
    }
}

/// What happens to demand that cannot be served from stock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortagePolicy {
    /// P1: backordered until stock arrives
    #[default]
    Backorder,
    /// P2: waits up to `max_wait_days`, then is lost
    WaitThenLose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryParams {
    pub order_quantity: u32,
    pub reorder_point: u32,
    pub days: u32,
    pub initial_inventory: u32,
    pub demand: DemandModel,
    pub lead_time_days: Vec<(u32, f64)>,
    pub holding_cost_per_unit_day: f64,
    pub ordering_cost: f64,
    /// P1: charged once per unit that becomes backordered
    pub shortage_cost: f64,
    /// P2: charged per unit per day spent waiting
    pub waiting_cost_per_unit_day: f64,
    /// P2: charged per unit that expires
    pub lost_sale_cost: f64,
    pub max_wait_days: u32,
    pub policy: ShortagePolicy,
    pub replications: usize,
    pub search: HookeJeevesParams,
    pub seed: Option<u32>,
}

impl Default for InventoryParams {
    fn default() -> Self {
        InventoryParams {
            order_quantity: 220,
            reorder_point: 115,
            days: 260,
            initial_inventory: 150,
            demand: DemandModel::default(),
            lead_time_days: vec![(1, 0.2), (2, 0.5), (3, 0.3)],
            holding_cost_per_unit_day: 0.2,
            ordering_cost: 120.0,
            shortage_cost: 4.0,
            waiting_cost_per_unit_day: 1.0,
            lost_sale_cost: 6.0,
            max_wait_days: 3,
            policy: ShortagePolicy::Backorder,
            replications: 30,
            search: HookeJeevesParams::default(),
            seed: None,
        }
    }
}

impl InventoryParams {
    pub fn validate(&self) -> SimResult<()> {
        validate::count("order_quantity", self.order_quantity as usize)?;
        validate::count("days", self.days as usize)?;
        validate::at_most("days", self.days as usize, MAX_DAYS as usize)?;
        validate::non_negative("holding_cost_per_unit_day", self.holding_cost_per_unit_day)?;
        validate::non_negative("ordering_cost", self.ordering_cost)?;
        validate::non_negative("shortage_cost", self.shortage_cost)?;
        validate::non_negative("waiting_cost_per_unit_day", self.waiting_cost_per_unit_day)?;
        validate::non_negative("lost_sale_cost", self.lost_sale_cost)?;
        validate::at_most("max_wait_days", self.max_wait_days as usize, MAX_WAIT_DAYS as usize)?;
        validate::count("replications", self.replications)?;
        validate::at_most("replications", self.replications, MAX_REPLICATIONS)?;
        if self.lead_time_days.iter().any(|(days, p)| *days == 0 && *p > 0.0) {
            return Err(SimError::invalid("lead_time_days", "must only contain lead times >= 1"));
        }
        DiscreteDistribution::new(&self.lead_time_days)?;
        match &self.demand {
            DemandModel::Empirical { table } => {
                DiscreteDistribution::new(table)?;
            }
            DemandModel::Normal { mean, std_dev } => {
                validate::non_negative("demand mean", *mean)?;
                validate::positive("demand std_dev", *std_dev)?;
            }
        }
        Ok(())
    }

    fn with_policy(&self, point: GridPoint) -> Self {
        InventoryParams {
            order_quantity: point.q,
            reorder_point: point.r,
            ..self.clone()
        }
    }
}

enum DemandLaw {
    Empirical(DiscreteDistribution<u32>),
    Normal { law: Normal<f64>, cap: f64 },
}

impl DemandLaw {
    fn build(model: &DemandModel) -> SimResult<Self> {
        match model {
            DemandModel::Empirical { table } => Ok(DemandLaw::Empirical(DiscreteDistribution::new(table)?)),
            DemandModel::Normal { mean, std_dev } => {
                let law = Normal::new(*mean, *std_dev)
                    .map_err(|e| SimError::invalid("demand", e.to_string()))?;
                Ok(DemandLaw::Normal {
                    law,
                    cap: (mean + 3.0 * std_dev).floor(),
                })
            }
        }
    }

    fn draw<R: UniformSource + RngCore>(&self, rng: &mut R, diag: &mut Diagnostics) -> u32 {
        match self {
            DemandLaw::Empirical(table) => table.invert(rng.next_uniform(), diag),
            DemandLaw::Normal { law, cap } => {
                let demand: f64 = rng.sample(law);
                demand.round().clamp(0.0, *cap) as u32
            }
        }
    }
}

struct Laws {
    demand: DemandLaw,
    lead_time: DiscreteDistribution<u32>,
}

impl Laws {
    fn build(params: &InventoryParams) -> SimResult<Self> {
        Ok(Laws {
            demand: DemandLaw::build(&params.demand)?,
            lead_time: DiscreteDistribution::new(&params.lead_time_days)?,
        })
    }
}

/// Unmet demand from one day, waiting for stock
#[derive(Debug, Clone, Copy, PartialEq)]
struct WaitBucket {
    day: u32,
    units: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingOrder {
    arrives: u32,
    units: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayRow {
    pub day: u32,
    pub received: u64,
    pub backlog_filled: u64,
    pub demand: u64,
    pub sales: u64,
    pub shortage: u64,
    pub expired: u64,
    pub on_hand: u64,
    pub backlog: u64,
    pub position: i64,
    pub order_placed: bool,
    pub lead_time: Option<u32>,
    pub holding_cost: f64,
    pub ordering_cost: f64,
    pub shortage_cost: f64,
    pub waiting_cost: f64,
    pub lost_sale_cost: f64,
    pub day_cost: f64,
    pub cumulative_cost: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InventoryCosts {
    pub holding: f64,
    pub ordering: f64,
    pub shortage: f64,
    pub waiting: f64,
    pub lost_sales: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryOutcome {
    pub policy: ShortagePolicy,
    pub order_quantity: u32,
    pub reorder_point: u32,
    pub days: u32,
    pub orders_placed: u32,
    pub total_demand: u64,
    /// Units sold from stock on the day they were demanded
    pub immediate_sales: u64,
    pub backordered_units: u64,
    pub lost_units: u64,
    pub fill_rate: f64,
    pub costs: InventoryCosts,
    pub rows: Vec<DayRow>,
    pub diagnostics: Diagnostics,
}

/// Simulate one horizon of `params.days` days on a stream seeded with `seed`.
pub fn simulate_inventory(params: &InventoryParams, seed: u32) -> SimResult<InventoryOutcome> {
    params.validate()?;
    let laws = Laws::build(params)?;
    Ok(run_days(params, &laws, usize::MAX, &mut Lcg::new(seed)))
}

/// Keeps the first `row_limit` day rows; totals always cover every day.
fn run_days<R: UniformSource + RngCore>(
    params: &InventoryParams,
    laws: &Laws,
    row_limit: usize,
    rng: &mut R,
) -> InventoryOutcome {
    let mut diag = Diagnostics::new();
    laws.lead_time.check_mass(&mut diag);
    if let DemandLaw::Empirical(table) = &laws.demand {
        table.check_mass(&mut diag);
    }

    let mut on_hand = u64::from(params.initial_inventory);
    let mut pipeline: Vec<PendingOrder> = Vec::new();
    let mut waiting: VecDeque<WaitBucket> = VecDeque::new();
    let mut costs = InventoryCosts::default();
    let mut rows = Vec::with_capacity((params.days as usize).min(row_limit));
    let (mut orders_placed, mut total_demand, mut immediate_sales) = (0u32, 0u64, 0u64);
    let (mut backordered_units, mut lost_units) = (0u64, 0u64);

    for day in 1..=params.days {
        let mut row = DayRow {
            day,
            ..Default::default()
        };

        // receive
        pipeline.retain(|order| {
            if order.arrives <= day {
                row.received += order.units;
                false
            } else {
                true
            }
        });
        on_hand += row.received;

        // settle waiting demand, oldest first
        while let Some(front) = waiting.front_mut() {
            if on_hand == 0 {
                break;
            }
            let filled = front.units.min(on_hand);
            front.units -= filled;
            on_hand -= filled;
            row.backlog_filled += filled;
            if front.units == 0 {
                waiting.pop_front();
            }
        }

        row.demand = u64::from(laws.demand.draw(rng, &mut diag));
        row.sales = row.demand.min(on_hand);
        on_hand -= row.sales;
        row.shortage = row.demand - row.sales;
        if row.shortage > 0 {
            waiting.push_back(WaitBucket {
                day,
                units: row.shortage,
            });
        }

        match params.policy {
            ShortagePolicy::Backorder => {
                row.shortage_cost = row.shortage as f64 * params.shortage_cost;
                backordered_units += row.shortage;
            }
            ShortagePolicy::WaitThenLose => {
                while let Some(front) = waiting.front() {
                    if day - front.day < params.max_wait_days {
                        break;
                    }
                    row.expired += front.units;
                    waiting.pop_front();
                }
                lost_units += row.expired;
                row.lost_sale_cost = row.expired as f64 * params.lost_sale_cost;
            }
        }
        row.backlog = waiting.iter().map(|b| b.units).sum();
        if params.policy == ShortagePolicy::WaitThenLose {
            row.waiting_cost = row.backlog as f64 * params.waiting_cost_per_unit_day;
        }

        let on_order: u64 = pipeline.iter().map(|o| o.units).sum();
        row.position = on_hand as i64 + on_order as i64 - row.backlog as i64;
        if row.position <= params.reorder_point as i64 {
            let lead = laws.lead_time.invert(rng.next_uniform(), &mut diag);
            pipeline.push(PendingOrder {
                arrives: day.saturating_add(lead),
                units: u64::from(params.order_quantity),
            });
            orders_placed += 1;
            row.order_placed = true;
            row.lead_time = Some(lead);
            row.ordering_cost = params.ordering_cost;
        }

        row.on_hand = on_hand;
        row.holding_cost = on_hand as f64 * params.holding_cost_per_unit_day;
        row.day_cost =
            row.holding_cost + row.ordering_cost + row.shortage_cost + row.waiting_cost + row.lost_sale_cost;

        costs.holding += row.holding_cost;
        costs.ordering += row.ordering_cost;
        costs.shortage += row.shortage_cost;
        costs.waiting += row.waiting_cost;
        costs.lost_sales += row.lost_sale_cost;
        costs.total += row.day_cost;
        row.cumulative_cost = costs.total;

        total_demand += row.demand;
        immediate_sales += row.sales;
        if rows.len() < row_limit {
            rows.push(row);
        }
    }

    InventoryOutcome {
        policy: params.policy,
        order_quantity: params.order_quantity,
        reorder_point: params.reorder_point,
        days: params.days,
        orders_placed,
        total_demand,
        immediate_sales,
        backordered_units,
        lost_units,
        fill_rate: if total_demand == 0 {
            1.0
        } else {
            immediate_sales as f64 / total_demand as f64
        },
        costs,
        rows,
        diagnostics: diag,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryReport {
    pub seed: u32,
    pub outcome: InventoryOutcome,
    pub report: Report<DayRow>,
}

/// Single run with the configured (q, R)
pub fn run_inventory(params: &InventoryParams) -> SimResult<InventoryReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let outcome = simulate_inventory(params, seed)?;
    log::info!(
        "inventory: q={} R={} {:?} seed={} total cost={:.2}",
        params.order_quantity,
        params.reorder_point,
        params.policy,
        seed,
        outcome.costs.total
    );

    let c = &outcome.costs;
    let metrics = vec![
        Metric::new("order_quantity", params.order_quantity as f64),
        Metric::new("reorder_point", params.reorder_point as f64),
        Metric::new("seed", seed as f64),
        Metric::new("orders_placed", outcome.orders_placed as f64),
        Metric::new("fill_rate", outcome.fill_rate),
        Metric::new("backordered_units", outcome.backordered_units as f64),
        Metric::new("lost_units", outcome.lost_units as f64),
        Metric::new("holding_cost", c.holding),
        Metric::new("ordering_cost", c.ordering),
        Metric::new("shortage_cost", c.shortage),
        Metric::new("waiting_cost", c.waiting),
        Metric::new("lost_sale_cost", c.lost_sales),
        Metric::new("total_cost", c.total),
    ];
    let level = outcome
        .rows
        .iter()
        .map(|r| ChartPoint {
            x: r.day as f64,
            y: r.on_hand as f64 - r.backlog as f64,
        })
        .collect();
    let cumulative = outcome
        .rows
        .iter()
        .map(|r| ChartPoint {
            x: r.day as f64,
            y: r.cumulative_cost,
        })
        .collect();
    let series = vec![
        Series::line("net_inventory", level),
        Series::line("cumulative_cost", cumulative),
    ];
    let report = Report::new(metrics, &outcome.rows, series);
    Ok(InventoryReport {
        seed,
        outcome,
        report,
    })
}

/// Mean and standard deviation of one cost component across replications
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for CostSummary {
    fn from(stats: &RunningStats) -> Self {
        CostSummary {
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationRow {
    pub replication: usize,
    pub seed: u32,
    pub costs: InventoryCosts,
    pub fill_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyEvaluation {
    pub seed: u32,
    pub order_quantity: u32,
    pub reorder_point: u32,
    pub total: MonteCarloStats,
    pub holding: CostSummary,
    pub ordering: CostSummary,
    pub shortage: CostSummary,
    pub waiting: CostSummary,
    pub lost_sales: CostSummary,
    pub fill_rate: CostSummary,
    pub replications: Vec<ReplicationRow>,
    pub diagnostics: Diagnostics,
    pub report: Report<ReplicationRow>,
}

/// Run `params.replications` seeded replications of the configured policy and aggregate.
pub fn replicate_policy(params: &InventoryParams) -> SimResult<PolicyEvaluation> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let laws = Laws::build(params)?;

    let mut seeds = Vec::with_capacity(params.replications);
    let outcomes = replicate(params.replications, seed, |run_seed| {
        seeds.push(run_seed);
        run_days(params, &laws, PREVIEW_ROWS, &mut Lcg::new(run_seed))
    });

    let mut holding = RunningStats::new();
    let mut ordering = RunningStats::new();
    let mut shortage = RunningStats::new();
    let mut waiting = RunningStats::new();
    let mut lost = RunningStats::new();
    let mut fill = RunningStats::new();
    let mut diagnostics = Diagnostics::new();
    for o in &outcomes {
        holding.push(o.costs.holding);
        ordering.push(o.costs.ordering);
        shortage.push(o.costs.shortage);
        waiting.push(o.costs.waiting);
        lost.push(o.costs.lost_sales);
        fill.push(o.fill_rate);
        diagnostics.merge(&o.diagnostics);
    }
    let totals: Vec<f64> = outcomes.iter().map(|o| o.costs.total).collect();
    let total = MonteCarloStats::from_values(&totals);

    let replications: Vec<ReplicationRow> = outcomes
        .iter()
        .zip(&seeds)
        .enumerate()
        .map(|(i, (o, &s))| ReplicationRow {
            replication: i + 1,
            seed: s,
            costs: o.costs,
            fill_rate: o.fill_rate,
        })
        .collect();

    log::info!(
        "inventory replications: q={} R={} n={} mean total={:.2} (se {:.2})",
        params.order_quantity,
        params.reorder_point,
        params.replications,
        total.mean,
        total.std_error
    );

    let metrics = vec![
        Metric::new("seed", seed as f64),
        Metric::new("replications", params.replications as f64),
        Metric::new("mean_total_cost", total.mean),
        Metric::new("std_total_cost", total.std_dev),
        Metric::new("std_error_total_cost", total.std_error),
        Metric::new("mean_holding_cost", holding.mean()),
        Metric::new("mean_ordering_cost", ordering.mean()),
        Metric::new("mean_shortage_cost", shortage.mean()),
        Metric::new("mean_waiting_cost", waiting.mean()),
        Metric::new("mean_lost_sale_cost", lost.mean()),
        Metric::new("mean_fill_rate", fill.mean()),
    ];
    let running_mean = running_means(&totals);
    let report = Report::new(
        metrics,
        &replications,
        vec![Series::line("running_mean_total_cost", running_mean)],
    );

    Ok(PolicyEvaluation {
        seed,
        order_quantity: params.order_quantity,
        reorder_point: params.reorder_point,
        total,
        holding: (&holding).into(),
        ordering: (&ordering).into(),
        shortage: (&shortage).into(),
        waiting: (&waiting).into(),
        lost_sales: (&lost).into(),
        fill_rate: (&fill).into(),
        replications,
        diagnostics,
        report,
    })
}

fn running_means(values: &[f64]) -> Vec<ChartPoint> {
    let mut stats = RunningStats::new();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            stats.push(v);
            ChartPoint {
                x: (i + 1) as f64,
                y: stats.mean(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySearchReport {
    pub seed: u32,
    pub search: SearchResult,
    pub report: Report<SearchIteration>,
}

/// Hooke–Jeeves over (q, R); every point is scored by the mean total cost of
/// `params.replications` runs on the same replication seeds.
pub fn optimize_inventory_policy(params: &InventoryParams) -> SimResult<PolicySearchReport> {
    params.validate()?;
    let seed = resolve_seed(params.seed);
    let laws = Laws::build(params)?;

    let search = hooke_jeeves(&params.search, |point| {
        let candidate = params.with_policy(point);
        let totals: Vec<f64> = replicate(params.replications, seed, |run_seed| {
            run_days(&candidate, &laws, PREVIEW_ROWS, &mut Lcg::new(run_seed)).costs.total
        });
        RunningStats::from_values(&totals).mean()
    })?;

    log::info!(
        "inventory search: best q={} R={} cost={:.2} after {} iterations ({:?})",
        search.best_point.q,
        search.best_point.r,
        search.best_cost,
        search.iterations.len() - 1,
        search.termination
    );

    let metrics = vec![
        Metric::new("seed", seed as f64),
        Metric::new("best_q", search.best_point.q as f64),
        Metric::new("best_r", search.best_point.r as f64),
        Metric::new("best_cost", search.best_cost),
        Metric::new("iterations", (search.iterations.len() - 1) as f64),
        Metric::new("evaluations", search.evaluations as f64),
    ];
    let best = search
        .iterations
        .iter()
        .map(|i| ChartPoint {
            x: i.iteration as f64,
            y: i.best_cost,
        })
        .collect();
    let path = search
        .iterations
        .iter()
        .map(|i| ChartPoint {
            x: i.point.q as f64,
            y: i.point.r as f64,
        })
        .collect();
    let report = Report::new(
        metrics,
        &search.iterations,
        vec![Series::line("best_cost", best), Series::line("search_path", path)],
    );
    Ok(PolicySearchReport {
        seed,
        search,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Demand 40 every day, lead time 2 days
    fn fixed_params(policy: ShortagePolicy, max_wait_days: u32) -> InventoryParams {
        InventoryParams {
            order_quantity: 100,
            reorder_point: 50,
            days: 5,
            initial_inventory: 100,
            demand: DemandModel::Empirical {
                table: vec![(40, 1.0)],
            },
            lead_time_days: vec![(2, 1.0)],
            holding_cost_per_unit_day: 1.0,
            ordering_cost: 10.0,
            shortage_cost: 5.0,
            waiting_cost_per_unit_day: 2.0,
            lost_sale_cost: 7.0,
            max_wait_days,
            policy,
            ..Default::default()
        }
    }

    #[test]
    fn test_backorder_days_by_hand() {
        let outcome = simulate_inventory(&fixed_params(ShortagePolicy::Backorder, 0), 1).unwrap();
        let on_hand: Vec<u64> = outcome.rows.iter().map(|r| r.on_hand).collect();
        assert_eq!(on_hand, vec![60, 20, 0, 40, 0]);
        let ordered: Vec<bool> = outcome.rows.iter().map(|r| r.order_placed).collect();
        assert_eq!(ordered, vec![false, true, false, true, false]);
        assert_eq!(outcome.rows[2].shortage, 20);
        assert_eq!(outcome.rows[3].received, 100);
        assert_eq!(outcome.rows[3].backlog_filled, 20);
        assert_eq!(outcome.backordered_units, 20);
        assert_eq!(outcome.costs.holding, 120.0);
        assert_eq!(outcome.costs.ordering, 20.0);
        assert_eq!(outcome.costs.shortage, 100.0);
        assert_eq!(outcome.costs.total, 240.0);
        assert_eq!(outcome.rows[4].cumulative_cost, 240.0);
    }

    #[test]
    fn test_zero_wait_loses_shortage_at_once() {
        let outcome = simulate_inventory(&fixed_params(ShortagePolicy::WaitThenLose, 0), 1).unwrap();
        assert_eq!(outcome.rows[2].expired, 20);
        assert_eq!(outcome.rows[2].backlog, 0);
        assert_eq!(outcome.lost_units, 20);
        let on_hand: Vec<u64> = outcome.rows.iter().map(|r| r.on_hand).collect();
        assert_eq!(on_hand, vec![60, 20, 0, 60, 20]);
        assert_eq!(outcome.costs.lost_sales, 140.0);
        assert_eq!(outcome.costs.waiting, 0.0);
        assert_eq!(outcome.costs.shortage, 0.0);
    }

    #[test]
    fn test_waiting_demand_filled_before_expiry() {
        let outcome = simulate_inventory(&fixed_params(ShortagePolicy::WaitThenLose, 1), 1).unwrap();
        assert_eq!(outcome.lost_units, 0);
        assert_eq!(outcome.rows[3].backlog_filled, 20);
        // 20 units wait through day 3 only
        assert_eq!(outcome.costs.waiting, 40.0);
        let on_hand: Vec<u64> = outcome.rows.iter().map(|r| r.on_hand).collect();
        assert_eq!(on_hand, vec![60, 20, 0, 40, 0]);
    }

    #[test]
    fn test_large_orders_keep_exact_stock_counts() {
        let params = InventoryParams {
            order_quantity: 1 << 31,
            reorder_point: u32::MAX,
            lead_time_days: vec![(3, 1.0)],
            ..fixed_params(ShortagePolicy::Backorder, 0)
        };
        let outcome = simulate_inventory(&params, 1).unwrap();
        let ordered: Vec<bool> = outcome.rows.iter().map(|r| r.order_placed).collect();
        assert_eq!(ordered, vec![true, true, true, false, false]);
        // two orders of 2^31 on order, 20 units backordered
        assert_eq!(outcome.rows[2].position, (1i64 << 32) - 20);
        assert_eq!(outcome.rows[3].received, 1 << 31);
        assert_eq!(outcome.rows[4].on_hand, (1u64 << 32) - 100);
        assert_eq!(outcome.orders_placed, 3);
    }

    #[test]
    fn test_same_seed_same_total() {
        let params = InventoryParams {
            order_quantity: 220,
            reorder_point: 115,
            days: 260,
            ..Default::default()
        };
        let a = simulate_inventory(&params, 12345).unwrap();
        let b = simulate_inventory(&params, 12345).unwrap();
        assert_eq!(a.costs.total, b.costs.total);
        assert_eq!(a.rows, b.rows);
        assert!(a.diagnostics.is_clean());
    }

    #[test]
    fn test_replication_runs_keep_only_preview_rows() {
        let params = InventoryParams {
            days: 260,
            ..Default::default()
        };
        let laws = Laws::build(&params).unwrap();
        let full = run_days(&params, &laws, usize::MAX, &mut Lcg::new(12345));
        let preview = run_days(&params, &laws, PREVIEW_ROWS, &mut Lcg::new(12345));
        assert_eq!(full.rows.len(), 260);
        assert_eq!(preview.rows.len(), PREVIEW_ROWS);
        assert_eq!(preview.rows[..], full.rows[..PREVIEW_ROWS]);
        assert_eq!(preview.costs, full.costs);
        assert_eq!(preview.total_demand, full.total_demand);
    }

    #[test]
    fn test_costs_are_non_negative() {
        for policy in [ShortagePolicy::Backorder, ShortagePolicy::WaitThenLose] {
            let params = InventoryParams {
                policy,
                ..Default::default()
            };
            let outcome = simulate_inventory(&params, 404).unwrap();
            assert!(outcome.rows.iter().all(|r| r.day_cost >= 0.0));
            let c = outcome.costs;
            let parts = c.holding + c.ordering + c.shortage + c.waiting + c.lost_sales;
            assert!((c.total - parts).abs() < 1e-6);
        }
    }

    #[test]
    fn test_higher_holding_rate_never_cheaper_to_hold() {
        let base = InventoryParams {
            replications: 10,
            seed: Some(9),
            ..Default::default()
        };
        let dearer = InventoryParams {
            holding_cost_per_unit_day: base.holding_cost_per_unit_day * 2.0,
            ..base.clone()
        };
        let a = replicate_policy(&base).unwrap();
        let b = replicate_policy(&dearer).unwrap();
        assert!(b.holding.mean >= a.holding.mean);
        assert_eq!(a.ordering.mean, b.ordering.mean);
    }

    #[test]
    fn test_normal_demand_respects_cap() {
        let params = InventoryParams {
            demand: DemandModel::Normal {
                mean: 40.0,
                std_dev: 10.0,
            },
            ..Default::default()
        };
        let outcome = simulate_inventory(&params, 17).unwrap();
        assert!(outcome.rows.iter().all(|r| r.demand <= 70));
        let mean = outcome.total_demand as f64 / outcome.days as f64;
        assert!((mean - 40.0).abs() < 3.0);
    }

    #[test]
    fn test_replication_rows_match_seeds() {
        let params = InventoryParams {
            replications: 4,
            days: 30,
            seed: Some(100),
            ..Default::default()
        };
        let evaluation = replicate_policy(&params).unwrap();
        assert_eq!(evaluation.replications.len(), 4);
        let second = simulate_inventory(&params, evaluation.replications[1].seed).unwrap();
        assert_eq!(second.costs.total, evaluation.replications[1].costs.total);
    }

    #[test]
    fn test_search_does_not_worsen_start() {
        let params = InventoryParams {
            days: 60,
            replications: 3,
            seed: Some(21),
            search: HookeJeevesParams {
                max_iterations: 15,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = optimize_inventory_policy(&params).unwrap();
        let start = result.search.iterations[0].cost;
        assert!(result.search.best_cost <= start);
        for pair in result.search.iterations.windows(2) {
            assert!(pair[1].best_cost <= pair[0].best_cost);
        }
    }

    #[test]
    fn test_rejects_excessive_wait() {
        let params = InventoryParams {
            max_wait_days: MAX_WAIT_DAYS + 1,
            ..Default::default()
        };
        assert!(run_inventory(&params).is_err());
        let zero_lead = InventoryParams {
            lead_time_days: vec![(0, 1.0)],
            ..Default::default()
        };
        assert!(zero_lead.validate().is_err());
    }
}
