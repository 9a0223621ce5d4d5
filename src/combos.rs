use rayon::prelude::*;
use tracing::info;

use crate::error::{PoolError, Result};

/// Stable position of a lineup inside a [`ComboTable`].
pub type ComboHandle = u32;

/// Binomial coefficient C(n, k), saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u128::from(u64::MAX) {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Every k-subset of `0..n`, enumerated once in lexicographic order.
///
/// Members are stored back to back in one flat arena; a lineup is addressed
/// by its handle and never allocated on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComboTable {
    entities: usize,
    size: usize,
    members: Vec<u8>,
}

impl ComboTable {
    pub fn enumerate(entities: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(PoolError::validation("lineup size must be positive"));
        }
        if entities < size {
            return Err(PoolError::config(format!(
                "cannot form lineups of {size} from {entities} entities"
            )));
        }
        if entities > usize::from(u8::MAX) + 1 {
            return Err(PoolError::config(format!(
                "{entities} entities exceed the 256 supported"
            )));
        }
        let count = binomial(entities, size);
        if count > u64::from(ComboHandle::MAX) {
            return Err(PoolError::config(format!(
                "C({entities}, {size}) = {count} lineups is too many to enumerate"
            )));
        }

        let mut members = Vec::with_capacity(count as usize * size);
        let mut current: Vec<usize> = (0..size).collect();
        loop {
            members.extend(current.iter().map(|&i| i as u8));

            // Rightmost slot that can still move up.
            let Some(pos) = (0..size).rev().find(|&i| current[i] < entities - size + i) else {
                break;
            };
            current[pos] += 1;
            for i in pos + 1..size {
                current[i] = current[i - 1] + 1;
            }
        }

        info!(entities, size, lineups = count, "Enumerated lineups");
        Ok(ComboTable {
            entities,
            size,
            members,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len() / self.size
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn lineup_size(&self) -> usize {
        self.size
    }

    pub fn entity_count(&self) -> usize {
        self.entities
    }

    /// Members of a lineup, ascending.
    pub fn get(&self, handle: ComboHandle) -> &[u8] {
        let start = handle as usize * self.size;
        &self.members[start..start + self.size]
    }

    pub fn iter(&self) -> std::slice::ChunksExact<'_, u8> {
        self.members.chunks_exact(self.size)
    }

    pub fn par_iter(&self) -> rayon::slice::ChunksExact<'_, u8> {
        self.members.par_chunks_exact(self.size)
    }

    /// Handle of a sorted, distinct lineup: its lexicographic rank.
    pub fn handle_of(&self, lineup: &[usize]) -> Option<ComboHandle> {
        if lineup.len() != self.size {
            return None;
        }
        if lineup.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        if lineup.last().is_some_and(|&last| last >= self.entities) {
            return None;
        }

        // Count the lineups that precede this one slot by slot.
        let mut rank: u64 = 0;
        let mut next = 0;
        for (slot, &member) in lineup.iter().enumerate() {
            let remaining = self.size - slot - 1;
            for skipped in next..member {
                rank += binomial(self.entities - skipped - 1, remaining);
            }
            next = member + 1;
        }
        ComboHandle::try_from(rank).ok()
    }
}
