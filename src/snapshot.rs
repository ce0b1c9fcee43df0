//! Serializable view of the whole network, used by the CLI report and the
//! web API.

use serde::Serialize;

use crate::directory::NetworkDirectory;
use crate::geometry::Position;
use crate::ids::{TowerId, UserId, ZoneId};
use crate::zone::{Zone, ZoneSummary};

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub tick: u64,
    pub msc: MscSnapshot,
    pub zones: Vec<ZoneSnapshot>,
    pub active_calls: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MscSnapshot {
    pub name: String,
    pub position: Position,
    pub gateways: Vec<(ZoneId, TowerId)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSnapshot {
    #[serde(flatten)]
    pub summary: ZoneSummary,
    pub towers: Vec<TowerSnapshot>,
    pub users: Vec<UserSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TowerSnapshot {
    pub id: TowerId,
    pub position: Position,
    pub height: f64,
    pub coverage_radius: f64,
    pub gateway: bool,
    pub neighbors: Vec<TowerId>,
    pub connected_users: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub id: UserId,
    pub name: String,
    pub position: Position,
    pub tower: Option<TowerId>,
    pub on_call_with: Option<UserId>,
    pub moves: usize,
    pub zone_switches: usize,
}

impl NetworkSnapshot {
    pub fn capture(directory: &NetworkDirectory) -> Self {
        let msc = directory.switching_center();
        Self {
            tick: directory.tick(),
            msc: MscSnapshot {
                name: msc.name().to_string(),
                position: *msc.position(),
                gateways: msc
                    .gateways()
                    .map(|(zone, tower)| (zone.clone(), tower.clone()))
                    .collect(),
            },
            zones: directory
                .zones()
                .map(|zone| ZoneSnapshot::capture(directory, zone))
                .collect(),
            active_calls: directory.router().active_calls(),
        }
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneSnapshot> {
        self.zones.iter().find(|zone| &zone.summary.id == id)
    }

    pub fn user_count(&self) -> usize {
        self.zones.iter().map(|zone| zone.users.len()).sum()
    }
}

impl ZoneSnapshot {
    fn capture(directory: &NetworkDirectory, zone: &Zone) -> Self {
        let gateway = directory.switching_center().gateway(zone.id());
        let towers = zone
            .graph()
            .towers()
            .map(|tower| TowerSnapshot {
                id: tower.id().clone(),
                position: *tower.position(),
                height: tower.height(),
                coverage_radius: tower.coverage_radius(),
                gateway: gateway == Some(tower.id()),
                neighbors: tower.neighbors().cloned().collect(),
                connected_users: tower.connected_users().cloned().collect(),
            })
            .collect();

        let mut users: Vec<UserSnapshot> = zone
            .users()
            .users()
            .map(|user| UserSnapshot {
                id: user.id().clone(),
                name: user.name().to_string(),
                position: *user.position(),
                tower: user.tower_id().cloned(),
                on_call_with: directory.router().partner_of(user.id()).cloned(),
                moves: user.movement_history().len(),
                zone_switches: user.zone_history().len(),
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            summary: zone.summary(),
            towers,
            users,
        }
    }
}

impl NetworkDirectory {
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::capture(self)
    }
}
