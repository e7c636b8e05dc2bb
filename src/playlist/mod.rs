//! Rotation building for HeroReel
//!
//! A rotation is the materialized play order derived from the active clip
//! set. It is rebuilt from scratch on every registry push or shuffle toggle
//! and is treated as cyclic: indices wrap modulo its length.

use crate::clip::{ClipId, ClipRecord};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Smallest rotation produced when featured clips are interleaved
pub const MIN_WEIGHTED_LENGTH: usize = 10;

/// Ordered, cyclic play order
#[derive(Debug, Clone, Default)]
pub struct Rotation {
    entries: Vec<Arc<ClipRecord>>,
}

impl Rotation {
    /// Build a rotation from the active clip set
    ///
    /// Without featured clips the rotation is the normal clips in input
    /// order. With featured clips, every `minWeight`-th position (1-based)
    /// takes the next featured clip round-robin and every other position the
    /// next normal clip. When `randomize` is set the finished rotation is
    /// shuffled, so weighting survives only as aggregate frequency.
    ///
    /// With `randomize == false` the result depends only on `clips`.
    pub fn build<R: Rng + ?Sized>(clips: &[Arc<ClipRecord>], randomize: bool, rng: &mut R) -> Self {
        let active: Vec<&Arc<ClipRecord>> = clips.iter().filter(|c| c.active).collect();
        let (featured, normal): (Vec<&Arc<ClipRecord>>, Vec<&Arc<ClipRecord>>) =
            active.iter().copied().partition(|c| c.featured);

        let mut entries: Vec<Arc<ClipRecord>> = if featured.is_empty() {
            normal.into_iter().cloned().collect()
        } else {
            interleave(&featured, &normal, active.len())
        };

        if randomize {
            entries.shuffle(rng);
        }

        debug!(
            "Built rotation of {} entries from {} active clips ({} featured)",
            entries.len(),
            active.len(),
            featured.len()
        );

        Self { entries }
    }

    /// Wrap an already ordered list
    pub fn from_entries(entries: Vec<Arc<ClipRecord>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, wrapping modulo the rotation length
    pub fn get(&self, index: usize) -> Option<&Arc<ClipRecord>> {
        if self.entries.is_empty() {
            None
        } else {
            self.entries.get(index % self.entries.len())
        }
    }

    /// Index following `index` in the cycle
    pub fn next_index(&self, index: usize) -> usize {
        if self.entries.is_empty() {
            0
        } else {
            (index + 1) % self.entries.len()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClipRecord>> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<ClipId> {
        self.entries.iter().map(|c| c.id.clone()).collect()
    }
}

/// Target length of a weighted rotation for `active_count` clips
pub fn target_length(active_count: usize) -> usize {
    (2 * active_count).max(MIN_WEIGHTED_LENGTH)
}

fn interleave(
    featured: &[&Arc<ClipRecord>],
    normal: &[&Arc<ClipRecord>],
    active_count: usize,
) -> Vec<Arc<ClipRecord>> {
    // A single low weight sets the spacing for every featured clip.
    let min_weight = featured
        .iter()
        .map(|c| c.featured_weight.max(1) as usize)
        .min()
        .unwrap_or(1);

    let target = target_length(active_count);
    let max_iterations = 3 * active_count;

    let mut entries = Vec::with_capacity(target.min(max_iterations));
    let mut next_featured = 0;
    let mut next_normal = 0;

    let mut i = 1;
    while entries.len() < target && i <= max_iterations {
        if i % min_weight == 0 || normal.is_empty() {
            entries.push(Arc::clone(featured[next_featured % featured.len()]));
            next_featured += 1;
        } else {
            entries.push(Arc::clone(normal[next_normal % normal.len()]));
            next_normal += 1;
        }
        i += 1;
    }

    entries
}
