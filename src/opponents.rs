use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combos::{ComboHandle, ComboTable};
use crate::constants::TIER_POPULARITY;
use crate::entity::Roster;
use crate::error::{PoolError, Result};
use crate::simulate::ScoreMatrix;

/// How opponents pick their lineups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OpponentPolicy {
    /// Every lineup equally likely.
    #[default]
    Uniform,
    /// Entities weighted by their average simulated score.
    #[value(name = "ev_biased", alias = "ev-biased")]
    EvBiased,
    /// Entities weighted by a fixed popularity per tier.
    #[value(name = "tier_biased", alias = "tier-biased")]
    TierBiased,
}

impl OpponentPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OpponentPolicy::Uniform => "uniform",
            OpponentPolicy::EvBiased => "ev_biased",
            OpponentPolicy::TierBiased => "tier_biased",
        }
    }

    pub fn is_biased(self) -> bool {
        !matches!(self, OpponentPolicy::Uniform)
    }
}

impl fmt::Display for OpponentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpponentPolicy {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "uniform" => Ok(OpponentPolicy::Uniform),
            "ev_biased" => Ok(OpponentPolicy::EvBiased),
            "tier_biased" => Ok(OpponentPolicy::TierBiased),
            other => Err(PoolError::config(format!("unknown opponent model: {other}"))),
        }
    }
}

/// Popularity weight per tier for the tier-biased model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierPopularity {
    weights: HashMap<u8, f64>,
}

impl Default for TierPopularity {
    fn default() -> Self {
        TierPopularity {
            weights: TIER_POPULARITY.into_iter().collect(),
        }
    }
}

impl TierPopularity {
    pub fn new(weights: HashMap<u8, f64>) -> Self {
        TierPopularity { weights }
    }

    pub fn weight(&self, tier: u8) -> Option<f64> {
        self.weights.get(&tier).copied()
    }

    /// Weight for every roster entity; fails on a tier with no weight.
    pub fn entity_weights(&self, roster: &Roster) -> Result<Vec<f64>> {
        roster
            .entities()
            .iter()
            .map(|e| {
                self.weight(e.tier).ok_or_else(|| {
                    PoolError::config(format!(
                        "no popularity weight for tier {} ({})",
                        e.tier, e.name
                    ))
                })
            })
            .collect()
    }
}

/// Per-entity selection weights for a policy, or `None` for uniform play.
pub fn entity_weights(
    policy: OpponentPolicy,
    roster: &Roster,
    scores: &ScoreMatrix,
    popularity: &TierPopularity,
) -> Result<Option<Vec<f64>>> {
    match policy {
        OpponentPolicy::Uniform => Ok(None),
        OpponentPolicy::EvBiased => Ok(Some(scores.means())),
        OpponentPolicy::TierBiased => popularity.entity_weights(roster).map(Some),
    }
}

/// Probability of each lineup under independent entity popularity.
///
/// Entity weights are normalized, a lineup's weight is the product of its
/// members' shares, and the result is normalized over every lineup.
pub fn combo_weights(table: &ComboTable, entity_weights: &[f64]) -> Result<Vec<f64>> {
    if entity_weights.len() != table.entity_count() {
        return Err(PoolError::config(format!(
            "{} entity weights for {} entities",
            entity_weights.len(),
            table.entity_count()
        )));
    }
    if entity_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(PoolError::config("entity weights must be finite and non-negative"));
    }
    let total: f64 = entity_weights.iter().sum();
    if total <= 0.0 {
        return Err(PoolError::config("entity weights sum to zero"));
    }
    let shares: Vec<f64> = entity_weights.iter().map(|w| w / total).collect();

    let mut weights: Vec<f64> = table
        .par_iter()
        .map(|combo| combo.iter().map(|&m| shares[m as usize]).product::<f64>())
        .collect();

    let norm: f64 = weights.iter().sum();
    if norm <= 0.0 || !norm.is_finite() {
        return Err(PoolError::config("no lineup has positive weight"));
    }
    weights.iter_mut().for_each(|w| *w /= norm);
    Ok(weights)
}

/// Opponent lineups for one run. Handles repeat when players pick alike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpponentPool {
    policy: OpponentPolicy,
    handles: Vec<ComboHandle>,
}

impl OpponentPool {
    pub fn from_handles(policy: OpponentPolicy, handles: Vec<ComboHandle>) -> Self {
        OpponentPool { policy, handles }
    }

    pub fn policy(&self) -> OpponentPolicy {
        self.policy
    }

    pub fn handles(&self) -> &[ComboHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Draw `count` opponent lineups with replacement.
///
/// Biased policies need the lineup distribution from [`combo_weights`];
/// calling them without one is a configuration error.
pub fn sample_opponents(
    table: &ComboTable,
    count: usize,
    policy: OpponentPolicy,
    combo_weights: Option<&[f64]>,
    seed: u64,
) -> Result<OpponentPool> {
    if table.is_empty() {
        return Err(PoolError::config("no lineups to sample from"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let handles: Vec<ComboHandle> = match policy {
        OpponentPolicy::Uniform => {
            let n = table.len() as ComboHandle;
            (0..count).map(|_| rng.gen_range(0..n)).collect()
        }
        OpponentPolicy::EvBiased | OpponentPolicy::TierBiased => {
            let weights = combo_weights.ok_or_else(|| {
                PoolError::config(format!("lineup weights required for the {policy} model"))
            })?;
            if weights.len() != table.len() {
                return Err(PoolError::config(format!(
                    "{} lineup weights for {} lineups",
                    weights.len(),
                    table.len()
                )));
            }
            let dist = WeightedIndex::new(weights)
                .map_err(|e| PoolError::config(format!("invalid lineup weights: {e}")))?;
            (0..count).map(|_| dist.sample(&mut rng) as ComboHandle).collect()
        }
    };

    info!(opponents = count, %policy, seed, "Sampled opponent pool");
    Ok(OpponentPool { policy, handles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn roster() -> Roster {
        Roster::new(vec![
            Entity::new("A", 1),
            Entity::new("B", 1),
            Entity::new("C", 2),
            Entity::new("D", 6),
        ])
        .unwrap()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("uniform".parse::<OpponentPolicy>().unwrap(), OpponentPolicy::Uniform);
        assert_eq!("ev-biased".parse::<OpponentPolicy>().unwrap(), OpponentPolicy::EvBiased);
        assert_eq!("TIER_BIASED".parse::<OpponentPolicy>().unwrap(), OpponentPolicy::TierBiased);
        assert!(matches!(
            "popular".parse::<OpponentPolicy>(),
            Err(PoolError::Configuration(_))
        ));

        assert!(!OpponentPolicy::Uniform.is_biased());
        assert!(OpponentPolicy::EvBiased.is_biased());
        assert!(OpponentPolicy::TierBiased.is_biased());
    }

    #[test]
    fn test_uniform_sample_in_range_and_deterministic() {
        let table = ComboTable::enumerate(8, 3).unwrap();
        let a = sample_opponents(&table, 1000, OpponentPolicy::Uniform, None, 123).unwrap();
        let b = sample_opponents(&table, 1000, OpponentPolicy::Uniform, None, 123).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1000);
        assert_eq!(a.policy(), OpponentPolicy::Uniform);
        assert!(a.handles().iter().all(|&h| (h as usize) < table.len()));
    }

    #[test]
    fn test_biased_without_weights_fails() {
        let table = ComboTable::enumerate(4, 2).unwrap();
        for policy in [OpponentPolicy::EvBiased, OpponentPolicy::TierBiased] {
            assert!(matches!(
                sample_opponents(&table, 10, policy, None, 1),
                Err(PoolError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_combo_weights_products() {
        let table = ComboTable::enumerate(4, 2).unwrap();
        let w = combo_weights(&table, &[4.0, 2.0, 1.0, 1.0]).unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // {0,1} is the most popular pair and {2,3} the least.
        let best = table.handle_of(&[0, 1]).unwrap() as usize;
        let worst = table.handle_of(&[2, 3]).unwrap() as usize;
        assert!((w[best] / w[worst] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_combo_weights_reject_bad_input() {
        let table = ComboTable::enumerate(4, 2).unwrap();
        assert!(combo_weights(&table, &[1.0, 1.0]).is_err());
        assert!(combo_weights(&table, &[0.0; 4]).is_err());
        assert!(combo_weights(&table, &[1.0, -1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_zero_weight_lineups_never_drawn() {
        let table = ComboTable::enumerate(4, 2).unwrap();
        let w = combo_weights(&table, &[1.0, 1.0, 0.0, 0.0]).unwrap();
        let pool =
            sample_opponents(&table, 500, OpponentPolicy::EvBiased, Some(&w), 9).unwrap();
        assert_eq!(pool.policy(), OpponentPolicy::EvBiased);
        let only = table.handle_of(&[0, 1]).unwrap();
        assert!(pool.handles().iter().all(|&h| h == only));
    }

    #[test]
    fn test_tier_weights() {
        let weights = TierPopularity::default().entity_weights(&roster()).unwrap();
        assert_eq!(weights, vec![4.0, 4.0, 2.5, 0.9]);

        let sparse = TierPopularity::new([(1, 1.0)].into_iter().collect());
        assert!(matches!(
            sparse.entity_weights(&roster()),
            Err(PoolError::Configuration(_))
        ));
    }

    #[test]
    fn test_entity_weights_by_policy() {
        let r = roster();
        let scores =
            ScoreMatrix::from_rows(vec![vec![10.0, 0.0, 4.0, 2.0], vec![0.0, 0.0, 2.0, 2.0]])
                .unwrap();
        let pop = TierPopularity::default();
        assert_eq!(entity_weights(OpponentPolicy::Uniform, &r, &scores, &pop).unwrap(), None);
        assert_eq!(
            entity_weights(OpponentPolicy::EvBiased, &r, &scores, &pop).unwrap(),
            Some(vec![5.0, 0.0, 3.0, 2.0])
        );
    }

    #[test]
    fn test_biased_sampling_follows_weights() {
        let table = ComboTable::enumerate(4, 2).unwrap();
        let w = combo_weights(&table, &[4.0, 2.0, 1.0, 1.0]).unwrap();
        let pool =
            sample_opponents(&table, 20_000, OpponentPolicy::TierBiased, Some(&w), 5).unwrap();
        let best = table.handle_of(&[0, 1]).unwrap();
        let freq = pool.handles().iter().filter(|&&h| h == best).count() as f64 / 20_000.0;
        assert!((freq - w[best as usize]).abs() < 0.02);
    }
}
