/// Points per medal before the tier multiplier: gold, silver, bronze.
pub const CATEGORY_POINTS: [f64; 3] = [3.0, 2.0, 1.0];

/// First-medal bonus base; the bonus paid is `FIRST_MEDAL_BONUS * tier / 2`.
pub const FIRST_MEDAL_BONUS: f64 = 25.0;

/// Number of entities in a lineup.
pub const LINEUP_SIZE: usize = 6;

/// Games covered by the recent-window medal table.
pub const RECENT_WINDOW_GAMES: u32 = 8;

/// Total players in the pool, including the evaluated lineup.
pub const DEFAULT_POOL_SIZE: usize = 2000;

/// Simulated Games per run
pub const DEFAULT_TRIALS: usize = 10_000;

pub const DEFAULT_TRIAL_SEED: u64 = 42;
pub const DEFAULT_POOL_SEED: u64 = 123;

/// Opponent lineups scored together in one evaluation chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

pub const DEFAULT_LINEUP: [&str; LINEUP_SIZE] =
    ["Germany", "Norway", "USA", "Canada", "Kazakhstan", "Croatia"];

/// Nations ranked by the `rank` command when none are named.
pub const DEFAULT_RANK_ENTITIES: [&str; 15] = [
    "Germany",
    "Norway",
    "USA",
    "Canada",
    "Austria",
    "Netherlands",
    "Japan",
    "Sweden",
    "Switzerland",
    "China",
    "Italy",
    "Finland",
    "Slovenia",
    "Kazakhstan",
    "Croatia",
];

/// Popularity weight per tier for the tier-biased opponent model.
/// Tiers 1 and 2 are picked far more often than the long tail.
pub const TIER_POPULARITY: [(u8, f64); 6] =
    [(1, 4.0), (2, 2.5), (3, 1.8), (4, 1.2), (5, 1.0), (6, 0.9)];

/// First-medal bonus for a tier.
pub fn first_medal_bonus(tier: u8) -> f64 {
    FIRST_MEDAL_BONUS * (f64::from(tier) / 2.0)
}
