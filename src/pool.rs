use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::combos::ComboTable;
use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_LINEUP, DEFAULT_POOL_SEED, DEFAULT_POOL_SIZE,
    DEFAULT_RANK_ENTITIES, DEFAULT_TRIALS, DEFAULT_TRIAL_SEED, LINEUP_SIZE,
};
use crate::data::Dataset;
use crate::entity::expected_score;
use crate::error::{PoolError, Result};
use crate::evaluate::{evaluate_lineup, Evaluation};
use crate::opponents::{
    combo_weights, entity_weights, sample_opponents, OpponentPolicy, TierPopularity,
};
use crate::ranking::{rank_lineups, LineupSummary};
use crate::rates::{estimate_rates, RateTable};
use crate::simulate::{simulate_scores, ScoreMatrix};

/// Run parameters for one pool evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Players in the pool, the evaluated lineup included.
    pub pool_size: usize,
    pub trials: usize,
    pub trial_seed: u64,
    pub pool_seed: u64,
    pub policy: OpponentPolicy,
    pub lineup: Vec<String>,
    pub lineup_size: usize,
    /// Opponents scored per evaluation chunk.
    pub chunk_size: usize,
    pub tier_popularity: TierPopularity,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            pool_size: DEFAULT_POOL_SIZE,
            trials: DEFAULT_TRIALS,
            trial_seed: DEFAULT_TRIAL_SEED,
            pool_seed: DEFAULT_POOL_SEED,
            policy: OpponentPolicy::Uniform,
            lineup: DEFAULT_LINEUP.iter().map(|s| s.to_string()).collect(),
            lineup_size: LINEUP_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tier_popularity: TierPopularity::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(PoolError::validation("trial count must be positive"));
        }
        if self.pool_size == 0 {
            return Err(PoolError::validation("pool size must be positive"));
        }
        if self.chunk_size == 0 {
            return Err(PoolError::validation("chunk size must be positive"));
        }
        if self.lineup_size == 0 {
            return Err(PoolError::validation("lineup size must be positive"));
        }
        Ok(())
    }

    pub fn opponents(&self) -> usize {
        self.pool_size.saturating_sub(1)
    }
}

/// Result of one run, with everything needed to reproduce it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoolReport {
    pub lineup: Vec<String>,
    pub pool_size: usize,
    pub policy: OpponentPolicy,
    pub trial_seed: u64,
    pub pool_seed: u64,
    /// Closed-form expected lineup points under the fitted rates.
    pub expected_points: f64,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pool Win Probability ===")?;
        writeln!(
            f,
            "Players: {} (opponents={})",
            self.pool_size, self.evaluation.opponents
        )?;
        writeln!(f, "Games simulated: {}", self.evaluation.trials)?;
        writeln!(f, "Opponent model: {}", self.policy)?;
        writeln!(f, "My lineup: {}", self.lineup.join(", "))?;
        writeln!(f, "Expected points: {:.2}", self.expected_points)?;
        writeln!(f, "Strict win probability: {:.6}", self.evaluation.strict_win)?;
        writeln!(f, "Tie probability: {:.6}", self.evaluation.tie)?;
        write!(
            f,
            "Expected win share (random tiebreak): {:.6}",
            self.evaluation.win_share
        )
    }
}

/// Closed-form expected points of a lineup.
pub fn lineup_expected_points(dataset: &Dataset, rates: &RateTable, lineup: &[usize]) -> f64 {
    lineup
        .iter()
        .filter_map(|&i| dataset.roster.get(i).map(|e| expected_score(e.tier, rates.rates(i))))
        .sum()
}

/// Fitted rates and simulated scores for a dataset.
pub fn simulate_dataset(
    dataset: &Dataset,
    trials: usize,
    seed: u64,
) -> Result<(RateTable, ScoreMatrix)> {
    let rates = estimate_rates(&dataset.roster, &dataset.recent, &dataset.long_run);
    let scores = simulate_scores(&dataset.roster, &rates, trials, seed)?;
    Ok((rates, scores))
}

/// Estimate rates, simulate, sample the pool and evaluate the configured
/// lineup.
///
/// Every configuration and validation error is raised before the first trial
/// is simulated.
pub fn run_pool(dataset: &Dataset, config: &SimulationConfig) -> Result<PoolReport> {
    config.validate()?;
    let lineup = dataset.roster.resolve_lineup(&config.lineup, config.lineup_size)?;
    if config.policy == OpponentPolicy::TierBiased {
        config.tier_popularity.entity_weights(&dataset.roster)?;
    }
    if dataset.roster.len() < config.lineup_size {
        return Err(PoolError::config(format!(
            "roster of {} cannot fill a lineup of {}",
            dataset.roster.len(),
            config.lineup_size
        )));
    }

    let (rates, scores) = simulate_dataset(dataset, config.trials, config.trial_seed)?;
    let table = ComboTable::enumerate(dataset.roster.len(), config.lineup_size)?;

    let weights = entity_weights(config.policy, &dataset.roster, &scores, &config.tier_popularity)?
        .map(|w| combo_weights(&table, &w))
        .transpose()?;
    let pool = sample_opponents(
        &table,
        config.opponents(),
        config.policy,
        weights.as_deref(),
        config.pool_seed,
    )?;

    let evaluation = evaluate_lineup(&scores, &lineup, &table, &pool, config.chunk_size)?;
    let report = PoolReport {
        lineup: config.lineup.iter().map(|s| s.trim().to_string()).collect(),
        pool_size: config.pool_size,
        policy: config.policy,
        trial_seed: config.trial_seed,
        pool_seed: config.pool_seed,
        expected_points: lineup_expected_points(dataset, &rates, &lineup),
        evaluation,
    };
    info!(
        lineup = %report.lineup.join(","),
        strict_win = report.evaluation.strict_win,
        win_share = report.evaluation.win_share,
        "Pool run complete"
    );
    Ok(report)
}

fn resolve_names<S: AsRef<str>>(dataset: &Dataset, names: &[S]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|n| {
            let n = n.as_ref().trim();
            dataset
                .roster
                .index_of(n)
                .ok_or_else(|| PoolError::validation(format!("unknown entity: {n}")))
        })
        .collect()
}

/// Entities ranked when none are named: [`DEFAULT_RANK_ENTITIES`] if the
/// roster carries all of them, otherwise the whole roster.
fn default_rank_subset(dataset: &Dataset) -> Vec<usize> {
    match resolve_names(dataset, &DEFAULT_RANK_ENTITIES) {
        Ok(subset) => subset,
        Err(_) => {
            debug!("Roster lacks the default ranking nations; ranking the whole roster");
            (0..dataset.roster.len()).collect()
        }
    }
}

/// Rank every lineup drawn from the named entities, or from the default
/// ranking nations when `names` is empty.
pub fn run_rankings<S: AsRef<str>>(
    dataset: &Dataset,
    names: &[S],
    lineup_size: usize,
    trials: usize,
    seed: u64,
    chunk_size: usize,
) -> Result<Vec<LineupSummary>> {
    let subset = if names.is_empty() {
        default_rank_subset(dataset)
    } else {
        resolve_names(dataset, names)?
    };
    if subset.len() < lineup_size {
        return Err(PoolError::validation(format!(
            "{} entities cannot fill a lineup of {}",
            subset.len(),
            lineup_size
        )));
    }
    if chunk_size == 0 {
        return Err(PoolError::validation("chunk size must be positive"));
    }

    let (_, scores) = simulate_dataset(dataset, trials, seed)?;
    rank_lineups(&scores, &dataset.roster, &subset, lineup_size, chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::winter_games;
    use crate::entity::{Entity, Roster};
    use crate::rates::{HistoryRecord, HistorySummary};

    fn small_dataset() -> Dataset {
        let roster = Roster::new(vec![
            Entity::new("A", 1),
            Entity::new("B", 1),
            Entity::new("C", 2),
            Entity::new("D", 2),
        ])
        .unwrap();
        let recent = HistorySummary::from_records([
            HistoryRecord::new("A", [3, 2, 2], 4),
            HistoryRecord::new("B", [1, 1, 2], 4),
            HistoryRecord::new("C", [1, 0, 1], 4),
        ]);
        let long_run = HistorySummary::from_records([HistoryRecord::new("D", [1, 1, 1], 10)]);
        Dataset {
            roster,
            recent,
            long_run,
        }
    }

    fn small_config(lineup: &[&str]) -> SimulationConfig {
        SimulationConfig {
            pool_size: 5,
            trials: 100,
            lineup: lineup.iter().map(|s| s.to_string()).collect(),
            lineup_size: 2,
            chunk_size: 3,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_small_pool_scenario() {
        let data = small_dataset();
        let report = run_pool(&data, &small_config(&["A", "C"])).unwrap();
        let eval = report.evaluation;

        assert_eq!(eval.trials, 100);
        assert_eq!(eval.opponents, 4);
        assert!((eval.strict_win + eval.tie + eval.loss - 1.0).abs() < 1e-12);
        assert!(eval.strict_win <= eval.win_share);
        assert!(eval.win_share <= 1.0);
        // Ties add at most half a win each, since at least one opponent shares the top.
        assert!(eval.win_share <= eval.strict_win + eval.tie / 2.0 + 1e-12);
        assert!(report.expected_points > 0.0);
    }

    #[test]
    fn test_run_is_reproducible() {
        let data = small_dataset();
        let config = SimulationConfig {
            policy: OpponentPolicy::EvBiased,
            ..small_config(&["B", "D"])
        };
        let a = run_pool(&data, &config).unwrap();
        let b = run_pool(&data, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validation_errors() {
        let data = small_dataset();
        for config in [
            SimulationConfig {
                trials: 0,
                ..small_config(&["A", "B"])
            },
            SimulationConfig {
                pool_size: 0,
                ..small_config(&["A", "B"])
            },
            SimulationConfig {
                chunk_size: 0,
                ..small_config(&["A", "B"])
            },
            small_config(&["A"]),
            small_config(&["A", "A"]),
            small_config(&["A", "Z"]),
        ] {
            assert!(matches!(run_pool(&data, &config), Err(PoolError::Validation(_))));
        }
    }

    #[test]
    fn test_tier_popularity_gap_is_configuration_error() {
        let data = small_dataset();
        let config = SimulationConfig {
            policy: OpponentPolicy::TierBiased,
            tier_popularity: TierPopularity::new([(1, 2.0)].into_iter().collect()),
            ..small_config(&["A", "B"])
        };
        assert!(matches!(run_pool(&data, &config), Err(PoolError::Configuration(_))));
    }

    #[test]
    fn test_single_player_pool_always_wins() {
        let data = small_dataset();
        let config = SimulationConfig {
            pool_size: 1,
            ..small_config(&["C", "D"])
        };
        let report = run_pool(&data, &config).unwrap();
        assert_eq!(report.evaluation.opponents, 0);
        assert_eq!(report.evaluation.win_share, 1.0);
    }

    #[test]
    fn test_winter_games_tier_biased_run() {
        let data = winter_games().unwrap();
        let config = SimulationConfig {
            pool_size: 200,
            trials: 300,
            policy: OpponentPolicy::TierBiased,
            ..SimulationConfig::default()
        };
        let report = run_pool(&data, &config).unwrap();
        assert_eq!(report.lineup.len(), 6);
        assert!(report.evaluation.win_share >= report.evaluation.strict_win);
        assert!(report.to_string().starts_with("=== Pool Win Probability ==="));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["policy"], "tier_biased");
        assert_eq!(json["opponents"], 199);
    }

    #[test]
    fn test_rankings_for_named_subset() {
        let data = small_dataset();
        let ranks = run_rankings(&data, &["A", "B", "C"], 2, 200, 1, 2).unwrap();
        assert_eq!(ranks.len(), 3);
        let total: f64 = ranks.iter().map(|r| r.win_rate).sum();
        assert!((total - 1.0).abs() < 1e-9);

        assert!(matches!(
            run_rankings(&data, &["A", "Nowhere"], 2, 10, 1, 2),
            Err(PoolError::Validation(_))
        ));
    }

    #[test]
    fn test_rankings_default_to_fifteen_nations() {
        let data = winter_games().unwrap();
        let none: [&str; 0] = [];
        let ranks = run_rankings(&data, &none, LINEUP_SIZE, 20, 7, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(ranks.len(), 5005);
        assert!(ranks
            .iter()
            .all(|r| r.lineup.split(',').all(|n| DEFAULT_RANK_ENTITIES.contains(&n))));
    }

    #[test]
    fn test_rankings_default_falls_back_to_whole_roster() {
        let data = small_dataset();
        let none: [&str; 0] = [];
        let ranks = run_rankings(&data, &none, 2, 50, 3, 4).unwrap();
        assert_eq!(ranks.len(), 6);
    }
}
