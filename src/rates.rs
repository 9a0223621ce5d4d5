use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{Category, Roster};

/// One row of a historical medal table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub name: String,
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,

    /// Games contested over the window the counts cover.
    pub opportunities: u32,
}

impl HistoryRecord {
    pub fn new(name: impl Into<String>, counts: [u32; 3], opportunities: u32) -> Self {
        HistoryRecord {
            name: name.into(),
            gold: counts[0],
            silver: counts[1],
            bronze: counts[2],
            opportunities,
        }
    }

    pub fn counts(&self) -> [u32; 3] {
        [self.gold, self.silver, self.bronze]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tally {
    counts: [u64; 3],
    opportunities: u32,
}

impl Tally {
    fn rates(&self) -> Option<[f64; 3]> {
        if self.opportunities == 0 {
            return None;
        }
        let opp = f64::from(self.opportunities);
        Some(self.counts.map(|n| n as f64 / opp))
    }
}

/// Aggregated medal history keyed by entity name.
///
/// Repeated rows for one entity describe the same window: their counts are
/// summed and the window keeps the largest opportunity count.
#[derive(Clone, Debug, Default)]
pub struct HistorySummary {
    tallies: HashMap<String, Tally>,
}

impl HistorySummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = HistoryRecord>>(records: I) -> Self {
        let mut summary = Self::new();
        for record in records {
            summary.add(&record);
        }
        summary
    }

    pub fn add(&mut self, record: &HistoryRecord) {
        let tally = self.tallies.entry(record.name.trim().to_string()).or_default();
        for (acc, n) in tally.counts.iter_mut().zip(record.counts()) {
            *acc += u64::from(n);
        }
        tally.opportunities = tally.opportunities.max(record.opportunities);
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Per-opportunity rates, or `None` when the entity is absent or has no
    /// recorded opportunities.
    pub fn rates(&self, name: &str) -> Option<[f64; 3]> {
        self.tallies.get(name).and_then(Tally::rates)
    }
}

/// Where an entity's rates came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Recent,
    LongRun,
    Missing,
    /// Supplied directly rather than estimated from history.
    Provided,
}

/// Expected medals per Games for every roster entity, in roster order.
#[derive(Clone, Debug, PartialEq)]
pub struct RateTable {
    rates: Vec<[f64; 3]>,
    sources: Vec<RateSource>,
}

impl RateTable {
    /// Build a table directly from per-entity rates.
    pub fn from_rates(rates: Vec<[f64; 3]>) -> Self {
        let sources = vec![RateSource::Provided; rates.len()];
        RateTable { rates, sources }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rates(&self, idx: usize) -> [f64; 3] {
        self.rates[idx]
    }

    pub fn rate(&self, idx: usize, category: Category) -> f64 {
        self.rates[idx][category.index()]
    }

    pub fn source(&self, idx: usize) -> RateSource {
        self.sources[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64; 3]> {
        self.rates.iter()
    }
}

/// Estimate per-Games medal rates for every roster entity.
///
/// The recent window wins whenever it has a record for the entity; otherwise
/// the long-run average is used, and entities absent from both score nothing.
pub fn estimate_rates(
    roster: &Roster,
    recent: &HistorySummary,
    long_run: &HistorySummary,
) -> RateTable {
    let mut rates = Vec::with_capacity(roster.len());
    let mut sources = Vec::with_capacity(roster.len());

    for entity in roster.entities() {
        let (r, source) = if let Some(r) = recent.rates(&entity.name) {
            (r, RateSource::Recent)
        } else if let Some(r) = long_run.rates(&entity.name) {
            (r, RateSource::LongRun)
        } else {
            ([0.0; 3], RateSource::Missing)
        };
        debug!(entity = %entity.name, ?source, gold = r[0], silver = r[1], bronze = r[2], "rates");
        rates.push(r);
        sources.push(source);
    }

    let missing = sources.iter().filter(|s| **s == RateSource::Missing).count();
    let fallback = sources.iter().filter(|s| **s == RateSource::LongRun).count();
    info!(
        entities = roster.len(),
        fallback,
        missing,
        "Estimated medal rates"
    );

    RateTable { rates, sources }
}
