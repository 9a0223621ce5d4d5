use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Discrete, Poisson};

use crate::constants::{first_medal_bonus, CATEGORY_POINTS};
use crate::error::{PoolError, Result};

/// Medal category. Order matches `CATEGORY_POINTS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gold,
    Silver,
    Bronze,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Gold, Category::Silver, Category::Bronze];

    pub fn index(self) -> usize {
        match self {
            Category::Gold => 0,
            Category::Silver => 1,
            Category::Bronze => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Gold => "gold",
            Category::Silver => "silver",
            Category::Bronze => "bronze",
        };
        f.write_str(name)
    }
}

/// A scoring unit (a country) and its fixed tier multiplier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    /// Points multiplier; also scales the first-medal bonus.
    pub tier: u8,
}

impl Entity {
    pub fn new(name: impl Into<String>, tier: u8) -> Self {
        Entity {
            name: name.into(),
            tier,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tier {})", self.name, self.tier)
    }
}

/// Points scored by an entity of `tier` with the given medal counts.
///
/// The first-medal bonus is a step: it is paid once if any medal was won.
pub fn score(tier: u8, counts: [u32; 3]) -> f64 {
    let weighted: f64 = counts
        .iter()
        .zip(CATEGORY_POINTS)
        .map(|(&n, pts)| f64::from(n) * pts)
        .sum();
    let bonus = if counts.iter().any(|&n| n > 0) {
        first_medal_bonus(tier)
    } else {
        0.0
    };
    weighted * f64::from(tier) + bonus
}

/// Closed-form expected score under independent Poisson medal counts.
///
/// The medal total is Poisson with the summed rate, so the bonus is paid
/// with probability `1 - P(total = 0)`.
pub fn expected_score(tier: u8, rates: [f64; 3]) -> f64 {
    let weighted: f64 = rates.iter().zip(CATEGORY_POINTS).map(|(r, pts)| r * pts).sum();
    let total: f64 = rates.iter().sum();
    let p_none = match Poisson::new(total) {
        Ok(dist) => dist.pmf(0),
        Err(_) => 1.0,
    };
    weighted * f64::from(tier) + first_medal_bonus(tier) * (1.0 - p_none)
}

/// The fixed, ordered set of entities a run draws lineups from.
///
/// Entity positions are the indices used by every downstream table.
#[derive(Clone, Debug)]
pub struct Roster {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl Roster {
    /// Build a roster, rejecting duplicate names and zero tiers.
    pub fn new(entities: Vec<Entity>) -> Result<Self> {
        if entities.len() > usize::from(u8::MAX) + 1 {
            return Err(PoolError::config(format!(
                "roster has {} entities; at most 256 are supported",
                entities.len()
            )));
        }

        let mut index = HashMap::with_capacity(entities.len());
        for (i, entity) in entities.iter().enumerate() {
            if entity.tier == 0 {
                return Err(PoolError::config(format!(
                    "{} has tier 0; tiers start at 1",
                    entity.name
                )));
            }
            if index.insert(entity.name.clone(), i).is_some() {
                return Err(PoolError::config(format!(
                    "duplicate roster entity: {}",
                    entity.name
                )));
            }
        }

        Ok(Roster { entities, index })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn get(&self, idx: usize) -> Option<&Entity> {
        self.entities.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn tiers(&self) -> Vec<u8> {
        self.entities.iter().map(|e| e.tier).collect()
    }

    pub fn names_of(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.entities.get(i))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Resolve lineup names to sorted roster indices.
    ///
    /// Fails if the lineup is the wrong size, repeats an entity, or names an
    /// entity that is not on the roster.
    pub fn resolve_lineup<S: AsRef<str>>(&self, names: &[S], size: usize) -> Result<Vec<usize>> {
        if names.len() != size {
            return Err(PoolError::validation(format!(
                "lineup must contain exactly {} entities, got {}",
                size,
                names.len()
            )));
        }

        let mut indices = Vec::with_capacity(size);
        for name in names {
            let name = name.as_ref().trim();
            let idx = self
                .index_of(name)
                .ok_or_else(|| PoolError::validation(format!("unknown entity in lineup: {name}")))?;
            if indices.contains(&idx) {
                return Err(PoolError::validation(format!(
                    "lineup repeats entity: {name}"
                )));
            }
            indices.push(idx);
        }

        indices.sort_unstable();
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new(vec![
            Entity::new("Norway", 1),
            Entity::new("Italy", 3),
            Entity::new("Croatia", 6),
        ])
        .unwrap()
    }

    #[test]
    fn test_score_without_medals_is_zero() {
        assert_eq!(score(4, [0, 0, 0]), 0.0);
    }

    #[test]
    fn test_score_formula() {
        // (3*1 + 2*2 + 1*0) * 3 + 25 * 1.5
        assert!((score(3, [1, 2, 0]) - 58.5).abs() < 1e-12);
        // Single bronze for a tier 6 nation: 6 + 75
        assert!((score(6, [0, 0, 1]) - 81.0).abs() < 1e-12);
    }

    #[test]
    fn test_bonus_is_a_step() {
        let one = score(2, [0, 0, 1]) - 2.0;
        let many = score(2, [0, 0, 5]) - 10.0;
        assert_eq!(one, many);
    }

    #[test]
    fn test_expected_score_zero_rates() {
        assert_eq!(expected_score(5, [0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_expected_score_matches_closed_form() {
        let rates = [0.5, 0.25, 0.25];
        let expected = (1.5 + 0.5 + 0.25) * 2.0 + 25.0 * (1.0 - (-1.0f64).exp());
        assert!((expected_score(2, rates) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let err = Roster::new(vec![Entity::new("USA", 1), Entity::new("USA", 2)]).unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_zero_tier_rejected() {
        let err = Roster::new(vec![Entity::new("USA", 0)]).unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_resolve_lineup_sorts_indices() {
        let r = roster();
        let idx = r.resolve_lineup(&["Croatia", " Norway "], 2).unwrap();
        assert_eq!(idx, vec![0, 2]);
    }

    #[test]
    fn test_resolve_lineup_errors() {
        let r = roster();
        assert!(matches!(
            r.resolve_lineup(&["Norway"], 2),
            Err(PoolError::Validation(_))
        ));
        assert!(matches!(
            r.resolve_lineup(&["Norway", "Norway"], 2),
            Err(PoolError::Validation(_))
        ));
        assert!(matches!(
            r.resolve_lineup(&["Norway", "Atlantis"], 2),
            Err(PoolError::Validation(_))
        ));
    }
}
