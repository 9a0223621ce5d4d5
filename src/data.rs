use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::constants::RECENT_WINDOW_GAMES;
use crate::entity::{Entity, Roster};
use crate::error::{PoolError, Result};
use crate::rates::{HistoryRecord, HistorySummary};

/// Tier per nation.
const TIERS: [(&str, u8); 31] = [
    ("Norway", 1),
    ("Canada", 1),
    ("Germany", 1),
    ("USA", 1),
    ("Netherlands", 2),
    ("Austria", 2),
    ("Sweden", 2),
    ("France", 2),
    ("Switzerland", 2),
    ("Japan", 2),
    ("Korea", 2),
    ("China", 2),
    ("Italy", 3),
    ("Finland", 3),
    ("Czechia", 3),
    ("Slovenia", 4),
    ("Belarus", 4),
    ("Great Britain", 4),
    ("Australia", 5),
    ("Poland", 5),
    ("Latvia", 5),
    ("Slovakia", 5),
    ("New Zealand", 5),
    ("Ukraine", 5),
    ("Hungary", 5),
    ("Belgium", 6),
    ("Spain", 6),
    ("Kazakhstan", 6),
    ("Croatia", 6),
    ("Liechtenstein", 6),
    ("Estonia", 6),
];

/// All-time Winter Games medals: (nation, games contested, gold, silver, bronze).
const ALL_TIME: [(&str, u32, u32, u32, u32); 31] = [
    ("Norway", 24, 148, 133, 124),
    ("USA", 24, 114, 121, 95),
    ("Germany", 28, 162, 155, 118),
    ("Canada", 24, 77, 72, 76),
    ("Austria", 24, 71, 88, 91),
    ("Sweden", 24, 65, 51, 60),
    ("Switzerland", 24, 63, 47, 57),
    ("Netherlands", 22, 53, 49, 45),
    ("Finland", 24, 45, 65, 65),
    ("Italy", 24, 42, 43, 56),
    ("France", 24, 41, 42, 55),
    ("Korea", 28, 33, 31, 17),
    ("China", 12, 22, 32, 23),
    ("Japan", 22, 17, 28, 31),
    ("Great Britain", 24, 12, 5, 17),
    ("Czechia", 24, 12, 19, 27),
    ("Belarus", 8, 8, 7, 5),
    ("Poland", 24, 7, 7, 9),
    ("Australia", 20, 6, 7, 6),
    ("Slovenia", 9, 4, 8, 12),
    ("Croatia", 9, 4, 6, 1),
    ("Slovakia", 8, 4, 4, 2),
    ("Estonia", 11, 4, 2, 2),
    ("Ukraine", 8, 3, 2, 4),
    ("Hungary", 24, 2, 2, 6),
    ("Liechtenstein", 20, 2, 2, 6),
    ("Belgium", 22, 2, 2, 4),
    ("New Zealand", 17, 2, 2, 2),
    ("Latvia", 12, 1, 3, 6),
    ("Kazakhstan", 8, 1, 3, 4),
    ("Spain", 21, 1, 1, 3),
];

/// Medals over the last eight Winter Games. Switzerland appears twice and
/// the two rows are combined.
const PAST_30_YEARS: [(&str, u32, u32, u32); 29] = [
    ("Australia", 1, 2, 1),
    ("Austria", 7, 7, 4),
    ("Belarus", 0, 2, 0),
    ("Belgium", 1, 0, 1),
    ("Canada", 46, 43, 41),
    ("China", 9, 4, 2),
    ("Czechia", 1, 0, 1),
    ("Estonia", 0, 0, 1),
    ("Finland", 2, 2, 4),
    ("France", 5, 7, 2),
    ("Germany", 99, 97, 61),
    ("Great Britain", 1, 1, 0),
    ("Hungary", 1, 0, 2),
    ("Italy", 2, 7, 8),
    ("Japan", 3, 6, 9),
    ("Korea", 2, 5, 2),
    ("Latvia", 0, 0, 1),
    ("Netherlands", 8, 5, 4),
    ("New Zealand", 2, 1, 0),
    ("Norway", 83, 59, 56),
    ("Poland", 0, 0, 1),
    ("Slovakia", 1, 0, 1),
    ("Slovenia", 2, 3, 2),
    ("Spain", 0, 1, 0),
    ("Sweden", 8, 5, 5),
    ("Switzerland", 5, 5, 5),
    ("Switzerland", 7, 2, 5),
    ("Ukraine", 0, 1, 0),
    ("USA", 45, 54, 50),
];

/// Roster and medal history for one run.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub roster: Roster,
    pub recent: HistorySummary,
    pub long_run: HistorySummary,
}

/// The Winter Games pool: 31 nations sorted by name.
pub fn winter_games() -> Result<Dataset> {
    let mut entities: Vec<Entity> = TIERS
        .iter()
        .map(|&(name, tier)| Entity::new(name, tier))
        .collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));
    let roster = Roster::new(entities)?;

    let recent = HistorySummary::from_records(
        PAST_30_YEARS
            .iter()
            .map(|&(name, g, s, b)| HistoryRecord::new(name, [g, s, b], RECENT_WINDOW_GAMES)),
    );
    let long_run = HistorySummary::from_records(
        ALL_TIME
            .iter()
            .map(|&(name, games, g, s, b)| HistoryRecord::new(name, [g, s, b], games)),
    );

    Ok(Dataset {
        roster,
        recent,
        long_run,
    })
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    name: String,
    tier: u8,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    name: String,
    gold: u32,
    silver: u32,
    bronze: u32,
    #[serde(default)]
    opportunities: Option<u32>,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader)
}

/// Read a roster from CSV with `name,tier` columns.
pub fn read_roster<R: Read>(reader: R) -> Result<Roster> {
    let mut entities = Vec::new();
    for row in csv_reader(reader).deserialize() {
        let row: RosterRow = row?;
        entities.push(Entity::new(row.name, row.tier));
    }
    Roster::new(entities)
}

/// Read a medal history from CSV with `name,gold,silver,bronze` and an
/// optional `opportunities` column.
///
/// Rows without an opportunity count use `default_opportunities`; a row with
/// neither is a configuration error.
pub fn read_history<R: Read>(
    reader: R,
    default_opportunities: Option<u32>,
) -> Result<HistorySummary> {
    let mut records = Vec::new();
    for (line, row) in csv_reader(reader).deserialize().enumerate() {
        let row: HistoryRow = row?;
        let opportunities = row.opportunities.or(default_opportunities).ok_or_else(|| {
            PoolError::config(format!(
                "history row {} ({}) has no opportunity count",
                line + 1,
                row.name
            ))
        })?;
        records.push(HistoryRecord::new(
            row.name,
            [row.gold, row.silver, row.bronze],
            opportunities,
        ));
    }
    Ok(HistorySummary::from_records(records))
}

pub fn load_roster<P: AsRef<Path>>(path: P) -> Result<Roster> {
    let path = path.as_ref();
    let roster = read_roster(File::open(path)?)?;
    info!(path = %path.display(), entities = roster.len(), "Loaded roster");
    Ok(roster)
}

pub fn load_history<P: AsRef<Path>>(
    path: P,
    default_opportunities: Option<u32>,
) -> Result<HistorySummary> {
    let path = path.as_ref();
    let summary = read_history(File::open(path)?, default_opportunities)?;
    info!(path = %path.display(), entities = summary.len(), "Loaded medal history");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{estimate_rates, RateSource};

    #[test]
    fn test_winter_games_roster() {
        let data = winter_games().unwrap();
        assert_eq!(data.roster.len(), 31);
        assert_eq!(data.roster.get(0).unwrap().name, "Australia");
        assert_eq!(data.roster.get(30).unwrap().name, "Ukraine");
        assert_eq!(data.roster.get(data.roster.index_of("Croatia").unwrap()).unwrap().tier, 6);
    }

    #[test]
    fn test_winter_games_rates() {
        let data = winter_games().unwrap();
        let rates = estimate_rates(&data.roster, &data.recent, &data.long_run);

        let norway = data.roster.index_of("Norway").unwrap();
        assert_eq!(rates.rates(norway), [83.0 / 8.0, 59.0 / 8.0, 56.0 / 8.0]);

        let swiss = data.roster.index_of("Switzerland").unwrap();
        assert_eq!(rates.rates(swiss), [1.5, 7.0 / 8.0, 1.25]);

        // Missing from the recent table: all-time average per Games.
        let croatia = data.roster.index_of("Croatia").unwrap();
        assert_eq!(rates.source(croatia), RateSource::LongRun);
        assert_eq!(rates.rates(croatia), [4.0 / 9.0, 6.0 / 9.0, 1.0 / 9.0]);

        let kaz = data.roster.index_of("Kazakhstan").unwrap();
        assert_eq!(rates.source(kaz), RateSource::LongRun);
    }

    #[test]
    fn test_read_roster_csv() {
        let csv = "name,tier\nNorway,1\n Japan , 2\n";
        let roster = read_roster(csv.as_bytes()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.index_of("Japan"), Some(1));
    }

    #[test]
    fn test_read_roster_rejects_duplicates() {
        let csv = "name,tier\nNorway,1\nNorway,2\n";
        assert!(matches!(
            read_roster(csv.as_bytes()),
            Err(PoolError::Configuration(_))
        ));
    }

    #[test]
    fn test_read_history_with_default_opportunities() {
        let csv = "name,gold,silver,bronze\nNorway,8,4,0\n";
        let summary = read_history(csv.as_bytes(), Some(8)).unwrap();
        assert_eq!(summary.rates("Norway"), Some([1.0, 0.5, 0.0]));

        assert!(matches!(
            read_history(csv.as_bytes(), None),
            Err(PoolError::Configuration(_))
        ));
    }

    #[test]
    fn test_read_history_with_opportunities_column() {
        let csv = "name,gold,silver,bronze,opportunities\nSpain,1,1,3,21\n";
        let summary = read_history(csv.as_bytes(), Some(8)).unwrap();
        let r = summary.rates("Spain").unwrap();
        assert!((r[2] - 3.0 / 21.0).abs() < 1e-12);
    }

    #[test]
    fn test_read_history_bad_number() {
        let csv = "name,gold,silver,bronze\nNorway,lots,4,0\n";
        assert!(matches!(read_history(csv.as_bytes(), Some(8)), Err(PoolError::Csv(_))));
    }
}
