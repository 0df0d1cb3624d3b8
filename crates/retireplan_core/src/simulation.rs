//! Monte Carlo path engine
//!
//! Every iteration carries one portfolio path: a slice of the shared balance
//! arena (one slot per asset class) plus its own cash and realized buckets
//! and its own RNG. Paths advance one calendar month per step; after every
//! step the ensemble is reduced to percentiles and the raw column is reused.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::config::{NegativeBalancePolicy, SimulationConfig};
use crate::error::SimulationError;
use crate::model::{AssetId, Injection, MonteCarloResult, MonthIndex, SimulationWarning};
use crate::percentiles::{PercentileTable, percentiles_in_place};
use crate::sampler::ReturnSampler;

/// Net monthly flows smaller than this are not reported as injections.
const INJECTION_THRESHOLD: f64 = 1.0;

/// Progress tracking and cooperative cancellation for a running simulation
#[derive(Debug, Clone, Default)]
pub struct SimulationProgress {
    /// Completed months
    completed: Arc<AtomicUsize>,
    /// Months to simulate
    total: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl SimulationProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from existing atomics shared with a front end
    pub fn from_atomics(
        completed: Arc<AtomicUsize>,
        total: Arc<AtomicUsize>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            completed,
            total,
            cancelled,
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Request cancellation; checked at every step boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Derive an independent per-iteration seed (splitmix64 finalizer).
///
/// Iteration `i` always gets the same stream regardless of how iterations
/// are scheduled across threads.
#[must_use]
pub fn iteration_seed(seed: u64, iteration: usize) -> u64 {
    let stride = (iteration as u64).wrapping_add(1);
    let mut z = seed.wrapping_add(stride.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-iteration state outside the balance arena
struct PathState {
    rng: SmallRng,
    cash: f64,
    realized: f64,
    invested: f64,
    went_negative: bool,
}

impl PathState {
    fn total(&self) -> f64 {
        self.invested + self.realized
    }
}

/// Per-thread scratch buffers for the sampler
struct Scratch {
    normals: Vec<f64>,
    factors: Vec<f64>,
}

impl Scratch {
    fn new(num_assets: usize) -> Self {
        Self {
            normals: vec![0.0; num_assets],
            factors: vec![0.0; num_assets],
        }
    }
}

/// Where an event lands: an index into the asset arena, or cash
type Bucket = Option<usize>;

/// Everything one step needs, shared read-only by all paths
struct Step<'a> {
    sampler: &'a ReturnSampler,
    events: &'a [(Bucket, f64)],
    exits: &'a [usize],
    policy: NegativeBalancePolicy,
}

impl Step<'_> {
    fn advance(&self, path: &mut PathState, balances: &mut [f64], scratch: &mut Scratch) {
        // 1. Market move
        self.sampler
            .sample_into(&mut path.rng, &mut scratch.normals, &mut scratch.factors);
        for (balance, factor) in balances.iter_mut().zip(&scratch.factors) {
            *balance *= factor;
        }

        // 2. Scheduled flows for the month that just closed
        for &(bucket, amount) in self.events {
            match bucket {
                Some(idx) => balances[idx] += amount,
                None => path.cash += amount,
            }
        }

        // 3. Positions sold this month
        for &idx in self.exits {
            path.realized += balances[idx];
            balances[idx] = 0.0;
        }

        // 4. Negative balances
        if self.policy == NegativeBalancePolicy::FloorAtZero {
            path.cash = path.cash.max(0.0);
            balances.iter_mut().for_each(|b| *b = b.max(0.0));
        }

        // 5. Record
        path.invested = path.cash + balances.iter().sum::<f64>();
        if path.total() < 0.0 {
            path.went_negative = true;
        }
    }
}

/// Month-indexed events routed to buckets, plus targets that were not found.
fn route_events(
    config: &SimulationConfig,
    asset_index: &FxHashMap<AssetId, usize>,
) -> (Vec<Vec<(Bucket, f64)>>, BTreeSet<AssetId>) {
    let mut by_month = vec![Vec::new(); config.horizon_months as usize];
    let mut unrouted = BTreeSet::new();

    for event in &config.cash_flows {
        let Some(slot) = by_month.get_mut(event.month_index as usize) else {
            continue;
        };
        let bucket = match event.target {
            None => None,
            Some(id) => match asset_index.get(&id) {
                // Flows into a position that has already been sold stay in cash
                Some(&idx) => match config.assets[idx].exit_month {
                    Some(exit) if event.month_index > exit => None,
                    _ => Some(idx),
                },
                None => {
                    unrouted.insert(id);
                    None
                }
            },
        };
        slot.push((bucket, event.amount));
    }

    (by_month, unrouted)
}

/// Invested principal (asset values, no cash) plus cumulative net scheduled
/// flows, and the monthly injections worth reporting.
fn principal_and_injections(
    initial: f64,
    events: &[Vec<(Bucket, f64)>],
) -> (Vec<f64>, Vec<Injection>) {
    let mut path = Vec::with_capacity(events.len() + 1);
    let mut injections = Vec::new();
    let mut running = initial;
    path.push(running);
    for (month, month_events) in events.iter().enumerate() {
        let net: f64 = month_events.iter().map(|(_, amount)| amount).sum();
        running += net;
        path.push(running);
        if net.abs() >= INJECTION_THRESHOLD {
            injections.push(Injection {
                month_index: month as MonthIndex,
                amount: net,
            });
        }
    }
    (path, injections)
}

/// Run the Monte Carlo simulation.
pub fn monte_carlo_simulate(config: &SimulationConfig) -> Result<MonteCarloResult, SimulationError> {
    monte_carlo_simulate_with_progress(config, &SimulationProgress::new())
}

/// Run the Monte Carlo simulation, reporting completed months to `progress`
/// and stopping with [`SimulationError::Cancelled`] once it is cancelled.
pub fn monte_carlo_simulate_with_progress(
    config: &SimulationConfig,
    progress: &SimulationProgress,
) -> Result<MonteCarloResult, SimulationError> {
    config.validate()?;
    let started = Instant::now();
    let deadline = config.deadline();
    let mut warnings = Vec::new();

    let iterations = config.effective_iterations();
    if iterations < config.iterations {
        warn!(
            requested = config.iterations,
            used = iterations,
            "Iteration count capped"
        );
        warnings.push(SimulationWarning::IterationsCapped {
            requested: config.iterations,
            used: iterations,
        });
    }

    let correlation = config.effective_correlation();
    let sampler = ReturnSampler::new(&config.assets, correlation.as_deref(), config.shocks)?;
    if sampler.covariance_adjusted() {
        let clamped_pivots = sampler.cholesky().clamped_pivots();
        warn!(clamped_pivots, "Covariance matrix not positive definite; pivots clamped");
        warnings.push(SimulationWarning::CovarianceAdjusted { clamped_pivots });
    }

    let num_assets = config.assets.len();
    let asset_index: FxHashMap<AssetId, usize> = config
        .assets
        .iter()
        .enumerate()
        .map(|(idx, asset)| (asset.id, idx))
        .collect();

    let (month_events, unrouted) = route_events(config, &asset_index);
    for asset in unrouted {
        warn!(asset = asset.0, "Cash flow targets unknown asset; booked to cash");
        warnings.push(SimulationWarning::UnroutedCashflow { asset });
    }

    let mut exits_by_month: Vec<Vec<usize>> = vec![Vec::new(); config.horizon_months as usize];
    for (idx, asset) in config.assets.iter().enumerate() {
        if let Some(slot) = asset
            .exit_month
            .and_then(|month| exits_by_month.get_mut(month as usize))
        {
            slot.push(idx);
        }
    }

    let initial_principal: f64 = config.assets.iter().map(|a| a.initial_value).sum();
    let initial_invested = config.initial_cash + initial_principal;
    let (principal_path, injections) = principal_and_injections(initial_principal, &month_events);

    info!(
        iterations,
        horizon_months = config.horizon_months,
        assets = num_assets,
        events = config.cash_flows.len(),
        "Starting Monte Carlo simulation"
    );

    // Balance arena: `iterations × num_assets`, row-major by iteration
    let mut balances: Vec<f64> = (0..iterations)
        .flat_map(|_| config.assets.iter().map(|a| a.initial_value))
        .collect();
    let mut paths: Vec<PathState> = (0..iterations)
        .map(|i| PathState {
            rng: SmallRng::seed_from_u64(iteration_seed(config.seed, i)),
            cash: config.initial_cash,
            realized: 0.0,
            invested: initial_invested,
            went_negative: initial_invested < 0.0,
        })
        .collect();

    let steps = config.horizon_months as usize + 1;
    let mut total = PercentileTable::new(&config.percentiles, steps);
    let mut invested = PercentileTable::new(&config.percentiles, steps);
    let mut realized = PercentileTable::new(&config.percentiles, steps);
    let mut column = vec![0.0; iterations];

    let mut record = |paths: &[PathState], column: &mut Vec<f64>| {
        column.iter_mut().zip(paths).for_each(|(c, p)| *c = p.total());
        total.push_step(percentiles_in_place(column, &config.percentiles));
        column.iter_mut().zip(paths).for_each(|(c, p)| *c = p.invested);
        invested.push_step(percentiles_in_place(column, &config.percentiles));
        column.iter_mut().zip(paths).for_each(|(c, p)| *c = p.realized);
        realized.push_step(percentiles_in_place(column, &config.percentiles));
    };
    record(&paths, &mut column);

    progress.reset(config.horizon_months as usize);

    for month in 0..config.horizon_months {
        if progress.is_cancelled() {
            info!(completed_months = month, "Monte Carlo simulation cancelled");
            return Err(SimulationError::Cancelled);
        }
        if let Some(budget) = deadline
            && started.elapsed() >= budget
        {
            warn!(completed_months = month, "Simulation deadline reached; result truncated");
            warnings.push(SimulationWarning::DeadlineReached {
                completed_months: month,
            });
            break;
        }

        let step = Step {
            sampler: &sampler,
            events: &month_events[month as usize],
            exits: &exits_by_month[month as usize],
            policy: config.negative_balance_policy,
        };

        #[cfg(feature = "parallel")]
        balances
            .par_chunks_mut(num_assets)
            .zip(paths.par_iter_mut())
            .for_each_init(
                || Scratch::new(num_assets),
                |scratch, (row, path)| step.advance(path, row, scratch),
            );

        #[cfg(not(feature = "parallel"))]
        {
            let mut scratch = Scratch::new(num_assets);
            balances
                .chunks_mut(num_assets)
                .zip(paths.iter_mut())
                .for_each(|(row, path)| step.advance(path, row, &mut scratch));
        }

        record(&paths, &mut column);
        progress.increment();
    }

    let survivors = paths.iter().filter(|p| !p.went_negative).count();
    let success_rate = survivors as f64 / iterations as f64;

    debug!(
        success_rate,
        elapsed_ms = started.elapsed().as_millis() as u64,
        warnings = warnings.len(),
        "Monte Carlo simulation complete"
    );

    Ok(MonteCarloResult {
        iterations,
        horizon_months: config.horizon_months,
        total,
        invested,
        realized,
        principal_path,
        injections,
        success_rate,
        warnings,
    })
}
