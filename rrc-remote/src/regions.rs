//! Region and marker model
//!
//! Regions are the unit of navigation. The map keeps them sorted by start
//! time so "next" and "previous" follow the project timeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A named time interval in the DAW project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// DAW region number
    pub id: u32,
    pub name: String,
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
    /// DAW color (0 = default)
    pub color: u32,
}

impl Region {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open containment: `start <= position < end`
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }
}

/// A point annotation in the DAW project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// DAW marker number
    pub id: u32,
    pub name: String,
    /// Position in seconds
    pub position: f64,
    pub color: u32,
}

/// Regions sorted by `(start, id)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMap {
    regions: Vec<Region>,
}

impl RegionMap {
    /// Build from an unsorted region list
    ///
    /// Regions with zero or negative length (or non-finite bounds) are
    /// dropped.
    pub fn new(regions: Vec<Region>) -> Self {
        let mut regions: Vec<Region> = regions
            .into_iter()
            .filter(|r| {
                let valid = r.start.is_finite() && r.end.is_finite() && r.end > r.start;
                if !valid {
                    warn!(
                        "Ignoring region {} '{}' with invalid bounds {}..{}",
                        r.id, r.name, r.start, r.end
                    );
                }
                valid
            })
            .collect();

        regions.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.id.cmp(&b.id)));
        Self { regions }
    }

    /// Region containing `position`
    ///
    /// When regions overlap, the one that started last (the innermost) wins.
    pub fn region_at(&self, position: f64) -> Option<&Region> {
        self.regions.iter().rev().find(|r| r.contains(position))
    }

    pub fn by_id(&self, id: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Position of the region in timeline order
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.regions.iter().position(|r| r.id == id)
    }

    /// The region following `id` in timeline order
    pub fn next_after(&self, id: u32) -> Option<&Region> {
        let index = self.index_of(id)?;
        self.regions.get(index + 1)
    }

    /// The region preceding `id` in timeline order
    pub fn previous_before(&self, id: u32) -> Option<&Region> {
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|i| self.regions.get(i))
    }

    /// First region whose start lies at or after `position`
    pub fn first_starting_after(&self, position: f64) -> Option<&Region> {
        self.regions.iter().find(|r| r.start >= position)
    }

    pub fn first(&self) -> Option<&Region> {
        self.regions.first()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }
}

/// Markers inside `region` (`start <= position < end`), sorted by position
pub fn markers_within<'a>(region: &Region, markers: &'a [Marker]) -> Vec<&'a Marker> {
    let mut within: Vec<&Marker> = markers
        .iter()
        .filter(|m| region.contains(m.position))
        .collect();
    within.sort_by(|a, b| a.position.total_cmp(&b.position));
    within
}

#[cfg(test)]
pub(crate) fn region(id: u32, name: &str, start: f64, end: f64) -> Region {
    Region {
        id,
        name: name.to_string(),
        start,
        end,
        color: 0,
    }
}

#[cfg(test)]
pub(crate) fn marker(id: u32, name: &str, position: f64) -> Marker {
    Marker {
        id,
        name: name.to_string(),
        position,
        color: 0,
    }
}
