/// End-to-end runs of each engine against known analytic or qualitative answers

use sampling_lab::experiments::{run_sampling, SamplerSpec, SamplingParams};
use sampling_lab::inventory::{
    optimize_inventory_policy, replicate_policy, simulate_inventory, InventoryParams,
};
use sampling_lab::inverse::Parabolic;
use sampling_lab::optimizer::{HookeJeevesParams, SearchAction};
use sampling_lab::truck_queue::{search_team_size, simulate_shift, TruckQueueParams};
use sampling_lab::Diagnostics;

#[test]
fn parabolic_inverse_hits_the_support_and_the_centre() {
    let dist = Parabolic::new(0.0, 6.0).unwrap();
    let mut diag = Diagnostics::new();
    assert!((dist.inverse(0.5, &mut diag) - 3.0).abs() < 1e-9);
    assert!(dist.inverse(0.0, &mut diag).abs() < 1e-9);
    assert!((dist.inverse(1.0, &mut diag) - 6.0).abs() < 1e-9);
}

#[test]
fn parabolic_sample_matches_its_moments() {
    let params = SamplingParams::new(
        SamplerSpec::Parabolic {
            lower: 0.0,
            upper: 6.0,
        },
        10_000,
        Some(42),
    );
    let report = run_sampling(&params).unwrap();
    assert!((report.summary.mean - 3.0).abs() < 0.05, "mean {}", report.summary.mean);
    assert!(
        (report.summary.variance - 5.4).abs() < 0.1,
        "variance {}",
        report.summary.variance
    );
    assert!(report.summary.ks_statistic < report.summary.ks_critical_value);
}

#[test]
fn exponential_mixture_splits_evenly() {
    let params = SamplingParams::new(
        SamplerSpec::ExponentialMixture {
            beta1: 1.0,
            beta2: 2.0,
            p: 0.5,
        },
        5_000,
        Some(42),
    );
    let report = run_sampling(&params).unwrap();
    let fraction = report.summary.component_fraction(0);
    assert!((fraction - 0.5).abs() < 0.03, "first component fraction {fraction}");
    assert_eq!(report.summary.component_counts.iter().sum::<usize>(), 5_000);
    // mixture mean is 0.5 * 1 + 0.5 * 2
    assert!((report.summary.theoretical_mean - 1.5).abs() < 1e-12);
}

#[test]
fn truck_shift_is_seeded() {
    let params = TruckQueueParams::default();
    let a = simulate_shift(&params, 4, 99).unwrap();
    let b = simulate_shift(&params, 4, 99).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.team_size, 4);
    assert!(a.rows.iter().all(|r| r.wait >= 0.0 && r.end >= r.start));
}

#[test]
fn expensive_waiting_favours_a_larger_team() {
    let params = TruckQueueParams {
        wage_per_hour: 1.0,
        overtime_wage_per_hour: 1.5,
        waiting_cost_per_hour: 1000.0,
        shifts: 100,
        team_sizes: vec![3, 4],
        seed: Some(42),
        ..Default::default()
    };
    let search = search_team_size(&params).unwrap();
    let mean = |size: u32| {
        search
            .evaluations
            .iter()
            .find(|e| e.team_size == size)
            .map(|e| e.total_cost.mean)
            .unwrap()
    };
    assert!(mean(4) <= mean(3), "team 4 {} vs team 3 {}", mean(4), mean(3));
    assert_eq!(search.best_team_size, 4);
}

#[test]
fn inventory_run_is_repeatable() {
    let params = InventoryParams {
        order_quantity: 220,
        reorder_point: 115,
        days: 260,
        ..Default::default()
    };
    let a = simulate_inventory(&params, 12345).unwrap();
    let b = simulate_inventory(&params, 12345).unwrap();
    assert_eq!(a.costs.total, b.costs.total);
    assert_eq!(a.rows.len(), 260);
}

#[test]
fn more_replications_narrow_the_standard_error() {
    let base = InventoryParams {
        seed: Some(12345),
        ..Default::default()
    };
    let few = replicate_policy(&InventoryParams {
        replications: 10,
        ..base.clone()
    })
    .unwrap();
    let many = replicate_policy(&InventoryParams {
        replications: 100,
        ..base
    })
    .unwrap();
    assert_eq!(few.total.num_replications, 10);
    assert_eq!(many.total.num_replications, 100);
    assert!(many.total.std_error < few.total.std_error);
}

#[test]
fn policy_search_never_loses_its_best_cost() {
    let params = InventoryParams {
        days: 120,
        replications: 4,
        seed: Some(3),
        search: HookeJeevesParams {
            max_iterations: 40,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = optimize_inventory_policy(&params).unwrap();
    let iterations = &result.search.iterations;
    assert_eq!(iterations[0].action, SearchAction::Start);
    for pair in iterations.windows(2) {
        assert!(pair[1].best_cost <= pair[0].best_cost);
    }
    let last = iterations.last().unwrap();
    assert_eq!(last.best_cost, result.search.best_cost);
    let bounds = &params.search;
    assert!((bounds.q_min..=bounds.q_max).contains(&result.search.best_point.q));
    assert!((bounds.r_min..=bounds.r_max).contains(&result.search.best_point.r));
}
