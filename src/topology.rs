//! Per-zone tower graph.
//!
//! Towers live in an arena keyed by id; edges are stored as id sets on each
//! tower. Iterating a `BTreeMap`/`BTreeSet` gives ascending id order, which is
//! what makes nearest-tower tie breaking and BFS neighbor order deterministic.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{NetworkError, Result};
use crate::geometry::{CoverageModel, Position};
use crate::ids::{TowerId, ZoneId};
use crate::tower::Tower;

#[derive(Debug, Clone)]
pub struct TopologyGraph {
    zone: ZoneId,
    coverage: CoverageModel,
    towers: BTreeMap<TowerId, Tower>,
}

impl TopologyGraph {
    pub fn new(zone: ZoneId, coverage: CoverageModel) -> Self {
        Self {
            zone,
            coverage,
            towers: BTreeMap::new(),
        }
    }

    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    pub fn coverage(&self) -> CoverageModel {
        self.coverage
    }

    /// Adds a tower, rejecting duplicate ids and overlapping coverage.
    /// On failure the graph is untouched.
    pub fn add_tower(&mut self, tower: Tower) -> Result<()> {
        if self.towers.contains_key(tower.id()) {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{}' already exists in zone '{}'",
                tower.id(),
                self.zone
            )));
        }
        if let Some(existing) = self
            .towers
            .values()
            .find(|existing| self.coverage.overlaps(existing, &tower))
        {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{}' coverage overlaps tower '{}' in zone '{}'",
                tower.id(),
                existing.id(),
                self.zone
            )));
        }
        self.towers.insert(tower.id().clone(), tower);
        Ok(())
    }

    /// Links two towers in both directions. Linking an existing pair again is
    /// a no-op.
    pub fn add_edge(&mut self, a: &TowerId, b: &TowerId) -> Result<()> {
        for id in [a, b] {
            if !self.towers.contains_key(id) {
                return Err(NetworkError::UnknownTower {
                    zone: self.zone.clone(),
                    tower: id.clone(),
                });
            }
        }
        if a == b {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{a}' cannot link to itself"
            )));
        }
        if let Some(tower) = self.towers.get_mut(a) {
            tower.link(b.clone());
        }
        if let Some(tower) = self.towers.get_mut(b) {
            tower.link(a.clone());
        }
        Ok(())
    }

    pub fn tower(&self, id: &TowerId) -> Option<&Tower> {
        self.towers.get(id)
    }

    pub fn tower_mut(&mut self, id: &TowerId) -> Option<&mut Tower> {
        self.towers.get_mut(id)
    }

    pub fn contains(&self, id: &TowerId) -> bool {
        self.towers.contains_key(id)
    }

    /// Towers in ascending id order.
    pub fn towers(&self) -> impl Iterator<Item = &Tower> {
        self.towers.values()
    }

    pub fn len(&self) -> usize {
        self.towers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.towers.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.towers.values().map(|t| t.neighbors().count()).sum::<usize>() / 2
    }

    pub fn covers(&self, tower: &TowerId, position: &Position) -> bool {
        self.towers
            .get(tower)
            .is_some_and(|t| self.coverage.covers(t, position))
    }

    /// Closest tower whose coverage contains `position`; equal distances go
    /// to the lowest tower id.
    pub fn nearest_in_range_tower(&self, position: &Position) -> Option<&Tower> {
        let mut best: Option<(&Tower, f64)> = None;
        for tower in self.towers.values() {
            if !self.coverage.covers(tower, position) {
                continue;
            }
            let reach = self.coverage.reach(tower, position);
            match best {
                Some((_, best_reach)) if reach >= best_reach => {}
                _ => best = Some((tower, reach)),
            }
        }
        best.map(|(tower, _)| tower)
    }

    /// Fewest-hop route from `from` to `to`, both ends included.
    pub fn shortest_path(&self, from: &TowerId, to: &TowerId) -> Option<Vec<TowerId>> {
        if !self.towers.contains_key(from) || !self.towers.contains_key(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.clone()]);
        }

        let mut parents: HashMap<&TowerId, &TowerId> = HashMap::new();
        let mut queue: VecDeque<&TowerId> = VecDeque::new();
        parents.insert(from, from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let Some(tower) = self.towers.get(current) else {
                continue;
            };
            for neighbor in tower.neighbors() {
                if parents.contains_key(neighbor) {
                    continue;
                }
                parents.insert(neighbor, current);
                if neighbor == to {
                    return Some(Self::unwind(&parents, from, neighbor));
                }
                queue.push_back(neighbor);
            }
        }
        None
    }

    fn unwind<'a>(
        parents: &HashMap<&'a TowerId, &'a TowerId>,
        from: &TowerId,
        to: &'a TowerId,
    ) -> Vec<TowerId> {
        let mut path = vec![to.clone()];
        let mut cursor = to;
        while cursor != from {
            match parents.get(cursor) {
                Some(parent) => {
                    cursor = *parent;
                    path.push(cursor.clone());
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}
