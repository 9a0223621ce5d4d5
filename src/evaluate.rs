use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::combos::{ComboHandle, ComboTable};
use crate::error::{PoolError, Result};
use crate::opponents::OpponentPool;
use crate::simulate::ScoreMatrix;

/// Running best opponent score per trial and how many opponents share it.
///
/// Built chunk by chunk; two partial states combine with [`PoolMax::merge`].
#[derive(Clone, Debug, PartialEq)]
pub struct PoolMax {
    max: Vec<f64>,
    ties: Vec<u32>,
}

impl PoolMax {
    /// State before any opponent is seen: no maximum, no ties.
    pub fn new(trials: usize) -> Self {
        PoolMax {
            max: vec![f64::NEG_INFINITY; trials],
            ties: vec![0; trials],
        }
    }

    pub fn trials(&self) -> usize {
        self.max.len()
    }

    pub fn max(&self, trial: usize) -> f64 {
        self.max[trial]
    }

    /// Opponents scoring exactly the maximum in this trial.
    pub fn ties(&self, trial: usize) -> u32 {
        self.ties[trial]
    }

    /// Record one opponent's score for a trial.
    #[inline]
    pub fn observe(&mut self, trial: usize, score: f64) {
        if score > self.max[trial] {
            self.max[trial] = score;
            self.ties[trial] = 1;
        } else if score == self.max[trial] {
            self.ties[trial] += 1;
        }
    }

    /// Fold another partial state into this one.
    ///
    /// A strictly higher maximum replaces both the maximum and the tie count;
    /// the ties counted against the old, lower maximum no longer apply. Equal
    /// maxima add their tie counts.
    pub fn merge(&mut self, other: &PoolMax) {
        debug_assert_eq!(self.trials(), other.trials());
        for t in 0..self.max.len() {
            if other.max[t] > self.max[t] {
                self.max[t] = other.max[t];
                self.ties[t] = other.ties[t];
            } else if other.max[t] == self.max[t] {
                self.ties[t] += other.ties[t];
            }
        }
    }
}

/// Best score and tie count for one chunk of opponents.
///
/// Memory is one entry per trial regardless of chunk length.
pub fn chunk_pool_max(scores: &ScoreMatrix, table: &ComboTable, chunk: &[ComboHandle]) -> PoolMax {
    let mut best = PoolMax::new(scores.trials());
    for t in 0..scores.trials() {
        for &handle in chunk {
            let members = table.get(handle).iter().map(|&m| m as usize);
            best.observe(t, scores.lineup_score(t, members));
        }
    }
    best
}

/// Per-trial opponent maximum over the whole pool, `chunk_size` opponents
/// at a time. Chunks are scored in parallel and merged.
pub fn pool_max(
    scores: &ScoreMatrix,
    table: &ComboTable,
    handles: &[ComboHandle],
    chunk_size: usize,
) -> Result<PoolMax> {
    if chunk_size == 0 {
        return Err(PoolError::validation("chunk size must be positive"));
    }
    if table.entity_count() != scores.entities() {
        return Err(PoolError::config(format!(
            "lineups cover {} entities but scores cover {}",
            table.entity_count(),
            scores.entities()
        )));
    }
    if let Some(&bad) = handles.iter().find(|&&h| h as usize >= table.len()) {
        return Err(PoolError::validation(format!(
            "opponent handle {bad} outside {} lineups",
            table.len()
        )));
    }

    let trials = scores.trials();
    let best = handles
        .par_chunks(chunk_size)
        .map(|chunk| chunk_pool_max(scores, table, chunk))
        .reduce(
            || PoolMax::new(trials),
            |mut acc, part| {
                acc.merge(&part);
                acc
            },
        );
    Ok(best)
}

/// Outcome of one lineup against an opponent pool.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub trials: usize,
    pub opponents: usize,
    /// Share of trials the lineup beats every opponent outright.
    pub strict_win: f64,
    /// Share of trials the lineup ties the best opponent.
    pub tie: f64,
    /// Share of trials some opponent scores strictly more.
    pub loss: f64,
    /// Expected share of the prize with ties split evenly.
    pub win_share: f64,
}

/// Score a lineup's per-trial totals against the pool's running maximum.
pub fn tally(mine: &[f64], best: &PoolMax, opponents: usize) -> Evaluation {
    let trials = mine.len();
    let mut wins = 0usize;
    let mut ties = 0usize;
    let mut share = 0.0;

    for (t, &score) in mine.iter().enumerate() {
        let max = best.max(t);
        if score > max {
            wins += 1;
            share += 1.0;
        } else if score == max {
            ties += 1;
            share += 1.0 / (1.0 + f64::from(best.ties(t)));
        }
    }

    let n = trials.max(1) as f64;
    Evaluation {
        trials,
        opponents,
        strict_win: wins as f64 / n,
        tie: ties as f64 / n,
        loss: (trials - wins - ties) as f64 / n,
        win_share: share / n,
    }
}

/// Check a lineup of roster indices and return it sorted.
pub fn validate_lineup(lineup: &[usize], table: &ComboTable) -> Result<Vec<usize>> {
    if lineup.len() != table.lineup_size() {
        return Err(PoolError::validation(format!(
            "lineup must contain exactly {} entities, got {}",
            table.lineup_size(),
            lineup.len()
        )));
    }
    let mut sorted = lineup.to_vec();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(PoolError::validation("lineup repeats an entity"));
    }
    if let Some(&bad) = sorted.iter().find(|&&i| i >= table.entity_count()) {
        return Err(PoolError::validation(format!(
            "lineup entity {bad} is not on the roster"
        )));
    }
    Ok(sorted)
}

/// Win probability of `lineup` against `pool`.
///
/// The opponent pool is scored `chunk_size` lineups at a time so the full
/// trials x opponents score block is never held in memory.
pub fn evaluate_lineup(
    scores: &ScoreMatrix,
    lineup: &[usize],
    table: &ComboTable,
    pool: &OpponentPool,
    chunk_size: usize,
) -> Result<Evaluation> {
    let lineup = validate_lineup(lineup, table)?;
    let best = pool_max(scores, table, pool.handles(), chunk_size)?;
    let mine = scores.lineup_scores(&lineup);

    let eval = tally(&mine, &best, pool.len());
    debug!(?lineup, chunk_size, "Evaluated lineup");
    info!(
        trials = eval.trials,
        opponents = eval.opponents,
        strict_win = eval.strict_win,
        win_share = eval.win_share,
        "Pool evaluation complete"
    );
    Ok(eval)
}
