use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_POOL_SEED, DEFAULT_POOL_SIZE, DEFAULT_TRIALS, DEFAULT_TRIAL_SEED,
    LINEUP_SIZE,
};
use crate::data::winter_games;
use crate::error::PoolError;
use crate::opponents::OpponentPolicy;
use crate::pool::{run_pool, run_rankings, PoolReport, SimulationConfig};
use crate::ranking::LineupSummary;

impl From<PoolError> for PyErr {
    fn from(err: PoolError) -> PyErr {
        match err {
            PoolError::Io(_) | PoolError::Csv(_) => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Outcome of one pool run.
#[pyclass(name = "PoolReport", frozen)]
#[derive(Clone)]
pub struct PyPoolReport {
    #[pyo3(get)]
    pub lineup: Vec<String>,
    #[pyo3(get)]
    pub pool_size: usize,
    #[pyo3(get)]
    pub policy: String,
    #[pyo3(get)]
    pub trials: usize,
    #[pyo3(get)]
    pub expected_points: f64,
    #[pyo3(get)]
    pub strict_win: f64,
    #[pyo3(get)]
    pub tie: f64,
    #[pyo3(get)]
    pub loss: f64,
    #[pyo3(get)]
    pub win_share: f64,
}

impl From<PoolReport> for PyPoolReport {
    fn from(report: PoolReport) -> Self {
        PyPoolReport {
            lineup: report.lineup,
            pool_size: report.pool_size,
            policy: report.policy.to_string(),
            trials: report.evaluation.trials,
            expected_points: report.expected_points,
            strict_win: report.evaluation.strict_win,
            tie: report.evaluation.tie,
            loss: report.evaluation.loss,
            win_share: report.evaluation.win_share,
        }
    }
}

#[pymethods]
impl PyPoolReport {
    fn __repr__(&self) -> String {
        format!(
            "PoolReport(lineup={:?}, strict_win={:.6}, tie={:.6}, win_share={:.6})",
            self.lineup, self.strict_win, self.tie, self.win_share
        )
    }
}

/// Win probability of a lineup on the built-in Winter Games roster.
///
/// `policy` is one of "uniform", "ev_biased" or "tier_biased".
#[pyfunction]
#[pyo3(signature = (
    lineup = None,
    players = DEFAULT_POOL_SIZE,
    trials = DEFAULT_TRIALS,
    seed_trials = DEFAULT_TRIAL_SEED,
    seed_pool = DEFAULT_POOL_SEED,
    policy = "uniform",
    chunk_size = DEFAULT_CHUNK_SIZE,
))]
fn pool_win_probability(
    py: Python<'_>,
    lineup: Option<Vec<String>>,
    players: usize,
    trials: usize,
    seed_trials: u64,
    seed_pool: u64,
    policy: &str,
    chunk_size: usize,
) -> PyResult<PyPoolReport> {
    let defaults = SimulationConfig::default();
    let config = SimulationConfig {
        pool_size: players,
        trials,
        trial_seed: seed_trials,
        pool_seed: seed_pool,
        policy: policy.parse::<OpponentPolicy>()?,
        lineup: lineup.unwrap_or(defaults.lineup),
        chunk_size,
        ..SimulationConfig::default()
    };
    let data = winter_games()?;
    let report = py.allow_threads(|| run_pool(&data, &config))?;
    Ok(report.into())
}

/// Rank lineups built from `entities` (or the default fifteen nations) as a list of
/// `(lineup, expected_points, median, p90, p99, win_rate)` tuples.
#[pyfunction]
#[pyo3(signature = (
    entities = None,
    lineup_size = LINEUP_SIZE,
    trials = 50_000,
    seed = DEFAULT_TRIAL_SEED,
    chunk_size = DEFAULT_CHUNK_SIZE,
))]
fn rank_lineups(
    py: Python<'_>,
    entities: Option<Vec<String>>,
    lineup_size: usize,
    trials: usize,
    seed: u64,
    chunk_size: usize,
) -> PyResult<Vec<(String, f64, f64, f64, f64, f64)>> {
    let data = winter_games()?;
    let names = entities.unwrap_or_default();
    let rows =
        py.allow_threads(|| run_rankings(&data, &names, lineup_size, trials, seed, chunk_size))?;
    Ok(rows
        .into_iter()
        .map(|r: LineupSummary| (r.lineup, r.expected_points, r.median, r.p90, r.p99, r.win_rate))
        .collect())
}

#[pymodule]
fn medal_pool(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPoolReport>()?;

    m.add_function(wrap_pyfunction!(pool_win_probability, m)?)?;
    m.add_function(wrap_pyfunction!(rank_lineups, m)?)?;

    m.add("LINEUP_SIZE", LINEUP_SIZE)?;
    m.add("DEFAULT_POOL_SIZE", DEFAULT_POOL_SIZE)?;

    Ok(())
}
