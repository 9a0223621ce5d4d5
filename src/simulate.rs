use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use statrs::distribution::Poisson;
use tracing::info;

use crate::entity::{score, Category, Roster};
use crate::error::{PoolError, Result};
use crate::rates::RateTable;

/// Simulated points, one row per trial and one column per roster entity.
///
/// Immutable once built; every downstream evaluation reads from it.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
    trials: usize,
    entities: usize,
    data: Vec<f64>,
}

impl ScoreMatrix {
    /// Wrap row-major scores.
    pub fn new(trials: usize, entities: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != trials * entities {
            return Err(PoolError::config(format!(
                "score data has {} values, expected {} x {}",
                data.len(),
                trials,
                entities
            )));
        }
        Ok(ScoreMatrix {
            trials,
            entities,
            data,
        })
    }

    /// Build from one row of entity scores per trial.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let trials = rows.len();
        let entities = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != entities) {
            return Err(PoolError::config("score rows have uneven lengths"));
        }
        Self::new(trials, entities, rows.into_iter().flatten().collect())
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    pub fn get(&self, trial: usize, entity: usize) -> f64 {
        self.data[trial * self.entities + entity]
    }

    pub fn row(&self, trial: usize) -> &[f64] {
        let start = trial * self.entities;
        &self.data[start..start + self.entities]
    }

    /// Lineup total for one trial. Members are summed in the order given.
    #[inline]
    pub fn lineup_score<I>(&self, trial: usize, members: I) -> f64
    where
        I: IntoIterator<Item = usize>,
    {
        let row = self.row(trial);
        members.into_iter().map(|e| row[e]).sum()
    }

    /// Lineup total for every trial.
    pub fn lineup_scores(&self, members: &[usize]) -> Vec<f64> {
        (0..self.trials)
            .map(|t| self.lineup_score(t, members.iter().copied()))
            .collect()
    }

    /// Average simulated score per entity.
    pub fn means(&self) -> Vec<f64> {
        if self.trials == 0 {
            return vec![0.0; self.entities];
        }
        let mut sums = vec![0.0; self.entities];
        for t in 0..self.trials {
            for (acc, v) in sums.iter_mut().zip(self.row(t)) {
                *acc += v;
            }
        }
        let n = self.trials as f64;
        sums.into_iter().map(|s| s / n).collect()
    }

    /// Copy of the matrix restricted to the given entity columns, in order.
    pub fn select_columns(&self, columns: &[usize]) -> ScoreMatrix {
        let mut data = Vec::with_capacity(self.trials * columns.len());
        for t in 0..self.trials {
            let row = self.row(t);
            data.extend(columns.iter().map(|&c| row[c]));
        }
        ScoreMatrix {
            trials: self.trials,
            entities: columns.len(),
            data,
        }
    }
}

fn check_rate(roster: &Roster, idx: usize, category: Category, rate: f64) -> Result<()> {
    if rate.is_finite() && rate >= 0.0 {
        return Ok(());
    }
    let entity = roster
        .get(idx)
        .map_or_else(|| format!("#{idx}"), |e| e.name.clone());
    Err(PoolError::InvalidRate {
        entity,
        category,
        rate,
    })
}

/// Draw `trials` Poisson counts from an independent stream.
fn draw_counts(rate: f64, trials: usize, seed: u64) -> Vec<u32> {
    // Poisson::new rejects a zero mean; such an entity never medals.
    let dist = match Poisson::new(rate) {
        Ok(dist) => dist,
        Err(_) => return vec![0; trials],
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..trials)
        .map(|_| {
            let draw: f64 = dist.sample(&mut rng);
            draw as u32
        })
        .collect()
}

/// Simulate `trials` independent Games and score every roster entity.
///
/// Each (entity, category) pair gets its own sub-seed drawn from `seed`, so the
/// result is identical for identical inputs regardless of thread count.
pub fn simulate_scores(
    roster: &Roster,
    rates: &RateTable,
    trials: usize,
    seed: u64,
) -> Result<ScoreMatrix> {
    if trials == 0 {
        return Err(PoolError::validation("trial count must be positive"));
    }
    if rates.len() != roster.len() {
        return Err(PoolError::config(format!(
            "rate table has {} entries for a roster of {}",
            rates.len(),
            roster.len()
        )));
    }
    for (idx, r) in rates.iter().enumerate() {
        for category in Category::ALL {
            check_rate(roster, idx, category, r[category.index()])?;
        }
    }

    let n = roster.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut seeds = vec![[0u64; 3]; n];
    for category in Category::ALL {
        for s in seeds.iter_mut() {
            s[category.index()] = rng.gen::<u64>();
        }
    }

    let tiers = roster.tiers();
    let columns: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|e| {
            let r = rates.rates(e);
            let gold = draw_counts(r[0], trials, seeds[e][0]);
            let silver = draw_counts(r[1], trials, seeds[e][1]);
            let bronze = draw_counts(r[2], trials, seeds[e][2]);
            (0..trials)
                .map(|t| score(tiers[e], [gold[t], silver[t], bronze[t]]))
                .collect()
        })
        .collect();

    let mut data = Vec::with_capacity(trials * n);
    for t in 0..trials {
        data.extend(columns.iter().map(|col| col[t]));
    }

    info!(trials, entities = n, seed, "Simulated Games");
    Ok(ScoreMatrix {
        trials,
        entities: n,
        data,
    })
}
