use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::combos::{ComboHandle, ComboTable};
use crate::entity::Roster;
use crate::error::{PoolError, Result};
use crate::evaluate::pool_max;
use crate::simulate::ScoreMatrix;

/// Score distribution and head-to-head win rate of one lineup.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineupSummary {
    pub rank: usize,
    pub lineup: String,
    pub expected_points: f64,
    pub median: f64,
    pub p90: f64,
    pub p99: f64,
    /// Share of trials this lineup tops every other lineup, ties split.
    pub win_rate: f64,
}

/// Linearly interpolated percentile of ascending data, `q` in [0, 100].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Evaluate every lineup drawn from `subset` against all the others.
///
/// Results are ordered by win rate, best first, with expected points
/// breaking ties.
pub fn rank_lineups(
    scores: &ScoreMatrix,
    roster: &Roster,
    subset: &[usize],
    lineup_size: usize,
    chunk_size: usize,
) -> Result<Vec<LineupSummary>> {
    if scores.entities() != roster.len() {
        return Err(PoolError::config(format!(
            "scores cover {} entities for a roster of {}",
            scores.entities(),
            roster.len()
        )));
    }
    let mut seen = vec![false; roster.len()];
    for &idx in subset {
        if idx >= roster.len() {
            return Err(PoolError::validation(format!("entity {idx} is not on the roster")));
        }
        if std::mem::replace(&mut seen[idx], true) {
            let name = roster.get(idx).map_or("", |e| e.name.as_str());
            return Err(PoolError::validation(format!("{name} listed twice")));
        }
    }

    let sub = scores.select_columns(subset);
    let table = ComboTable::enumerate(subset.len(), lineup_size)?;
    let handles: Vec<ComboHandle> = (0..table.len() as ComboHandle).collect();
    let best = pool_max(&sub, &table, &handles, chunk_size)?;

    let trials = sub.trials();
    let n = trials as f64;
    let mut summaries: Vec<LineupSummary> = handles
        .par_iter()
        .map(|&h| {
            let members: Vec<usize> = table.get(h).iter().map(|&m| m as usize).collect();
            let mut totals = sub.lineup_scores(&members);

            let mut wins = 0.0;
            for (t, &s) in totals.iter().enumerate() {
                if s == best.max(t) {
                    wins += 1.0 / f64::from(best.ties(t));
                }
            }
            let mean = totals.iter().sum::<f64>() / n;
            totals.sort_by(f64::total_cmp);

            let names: Vec<usize> = members.iter().map(|&m| subset[m]).collect();
            LineupSummary {
                rank: 0,
                lineup: roster.names_of(&names).join(","),
                expected_points: mean,
                median: percentile(&totals, 50.0),
                p90: percentile(&totals, 90.0),
                p99: percentile(&totals, 99.0),
                win_rate: wins / n,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.win_rate
            .total_cmp(&a.win_rate)
            .then(b.expected_points.total_cmp(&a.expected_points))
    });
    for (i, s) in summaries.iter_mut().enumerate() {
        s.rank = i + 1;
    }

    info!(lineups = summaries.len(), trials, "Ranked lineups");
    Ok(summaries)
}

/// Write rankings as CSV with a header row.
pub fn write_rankings_csv<P: AsRef<Path>>(path: P, rankings: &[LineupSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rankings {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
