//! Medal Pool - win probability of a medal-pool lineup.
//!
//! Each entity earns Poisson-distributed gold, silver and bronze counts per
//! simulated Games. Lineup scores are compared against a sampled pool of
//! opponent lineups to estimate how often a given lineup finishes first.
//! Python bindings are available behind the `python` feature.

pub mod combos;
pub mod constants;
pub mod data;
pub mod entity;
pub mod error;
pub mod evaluate;
pub mod opponents;
pub mod pool;
pub mod ranking;
pub mod rates;
pub mod simulate;

#[cfg(feature = "python")]
mod python;

pub use combos::{binomial, ComboHandle, ComboTable};
pub use constants::{CATEGORY_POINTS, FIRST_MEDAL_BONUS, LINEUP_SIZE};
pub use data::{winter_games, Dataset};
pub use entity::{expected_score, score, Category, Entity, Roster};
pub use error::{PoolError, Result};
pub use evaluate::{evaluate_lineup, pool_max, Evaluation, PoolMax};
pub use opponents::{sample_opponents, OpponentPolicy, OpponentPool, TierPopularity};
pub use pool::{run_pool, run_rankings, PoolReport, SimulationConfig};
pub use ranking::{rank_lineups, LineupSummary};
pub use rates::{estimate_rates, HistoryRecord, HistorySummary, RateSource, RateTable};
pub use simulate::{simulate_scores, ScoreMatrix};
