//! Distance and coverage primitives.
//!
//! All proximity rules live here so that tower selection, handover and
//! topology validation agree on what "in range" and "overlapping" mean.

use serde::{Deserialize, Serialize};

use crate::tower::Tower;

/// A point on the simulation plane, with an optional ground elevation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            elevation: 0.0,
        }
    }

    pub const fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.elevation.is_finite()
    }
}

/// Planar Euclidean distance; elevation is ignored.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Euclidean distance including elevation.
pub fn distance_3d(a: &Position, b: &Position) -> f64 {
    let dz = a.elevation - b.elevation;
    let planar = distance(a, b);
    (planar * planar + dz * dz).sqrt()
}

/// `true` iff `user` lies within the tower's planar coverage disk.
pub fn in_range(user: &Position, tower: &Tower) -> bool {
    CoverageModel::Planar.covers(tower, user)
}

/// `true` iff the planar coverage disks of the two towers intersect.
/// Touching disks do not overlap.
pub fn coverages_overlap(t1: &Tower, t2: &Tower) -> bool {
    CoverageModel::Planar.overlaps(t1, t2)
}

/// How coverage is measured.
///
/// `Planar` treats coverage as a disk of `coverage_radius` around the tower
/// base. `HeightAdjusted` measures from the antenna (the tower base raised by
/// the tower height) in three dimensions, so the usable ground footprint
/// shrinks as the mast gets taller relative to its radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageModel {
    #[default]
    Planar,
    HeightAdjusted,
}

impl CoverageModel {
    /// Distance from `point` to the tower under this model.
    pub fn reach(self, tower: &Tower, point: &Position) -> f64 {
        match self {
            CoverageModel::Planar => distance(point, tower.position()),
            CoverageModel::HeightAdjusted => distance_3d(point, &tower.antenna()),
        }
    }

    pub fn covers(self, tower: &Tower, point: &Position) -> bool {
        self.reach(tower, point) <= tower.coverage_radius()
    }

    /// Radius of the coverage disk at the tower's base elevation.
    pub fn footprint_radius(self, tower: &Tower) -> f64 {
        let radius = tower.coverage_radius();
        match self {
            CoverageModel::Planar => radius,
            CoverageModel::HeightAdjusted => {
                let height = tower.height();
                (radius * radius - height * height).max(0.0).sqrt()
            }
        }
    }

    pub fn overlaps(self, t1: &Tower, t2: &Tower) -> bool {
        distance(t1.position(), t2.position())
            < self.footprint_radius(t1) + self.footprint_radius(t2)
    }
}
