use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::ids::{TowerId, UserId, ZoneId};

/// One recorded position change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub tick: u64,
    pub recorded_at: DateTime<Utc>,
    pub position: Position,
}

/// One recorded move between zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSwitchEntry {
    pub tick: u64,
    pub recorded_at: DateTime<Utc>,
    pub from: ZoneId,
    pub to: ZoneId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "tower", rename_all = "snake_case")]
pub enum ConnectionState {
    Unconnected,
    Connected(TowerId),
}

/// A subscriber. Histories are append-only; the zone and tower fields are
/// maintained by the zone and the connection manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    position: Position,
    zone_id: ZoneId,
    tower_id: Option<TowerId>,
    movement_history: Vec<MovementEntry>,
    zone_history: Vec<ZoneSwitchEntry>,
}

impl User {
    pub fn new(id: UserId, name: String, position: Position, zone_id: ZoneId) -> Self {
        Self {
            id,
            name,
            position,
            zone_id,
            tower_id: None,
            movement_history: Vec::new(),
            zone_history: Vec::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    pub fn tower_id(&self) -> Option<&TowerId> {
        self.tower_id.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        match &self.tower_id {
            Some(tower) => ConnectionState::Connected(tower.clone()),
            None => ConnectionState::Unconnected,
        }
    }

    pub fn movement_history(&self) -> &[MovementEntry] {
        &self.movement_history
    }

    pub fn zone_history(&self) -> &[ZoneSwitchEntry] {
        &self.zone_history
    }

    pub(crate) fn record_movement(&mut self, tick: u64, position: Position) {
        self.movement_history.push(MovementEntry {
            tick,
            recorded_at: Utc::now(),
            position,
        });
        self.position = position;
    }

    pub(crate) fn record_zone_switch(&mut self, tick: u64, to: ZoneId) {
        let from = std::mem::replace(&mut self.zone_id, to.clone());
        self.zone_history.push(ZoneSwitchEntry {
            tick,
            recorded_at: Utc::now(),
            from,
            to,
        });
    }

    pub(crate) fn set_zone(&mut self, zone: ZoneId) {
        self.zone_id = zone;
    }

    pub(crate) fn set_tower(&mut self, tower: Option<TowerId>) {
        self.tower_id = tower;
    }
}
