//! Main Switching Center.
//!
//! One per directory. The MSC is adjacent to exactly one gateway tower in
//! each zone, which makes it the only bridge between zone graphs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::ids::{TowerId, ZoneId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchingCenter {
    name: String,
    position: Position,
    #[serde(default)]
    gateways: BTreeMap<ZoneId, TowerId>,
}

impl SwitchingCenter {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
            gateways: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Makes `tower` the zone's gateway, returning the one it replaces.
    /// Callers are responsible for checking the tower exists in the zone.
    pub(crate) fn designate_gateway(&mut self, zone: ZoneId, tower: TowerId) -> Option<TowerId> {
        self.gateways.insert(zone, tower)
    }

    pub fn gateway(&self, zone: &ZoneId) -> Option<&TowerId> {
        self.gateways.get(zone)
    }

    pub fn has_gateway(&self, zone: &ZoneId) -> bool {
        self.gateways.contains_key(zone)
    }

    pub fn gateways(&self) -> impl Iterator<Item = (&ZoneId, &TowerId)> {
        self.gateways.iter()
    }
}

impl Default for SwitchingCenter {
    fn default() -> Self {
        Self::new("MSC", Position::default())
    }
}
