//! Top-level owner of zones, the MSC and the call router.
//!
//! Every external operation enters here. The directory keeps an index from
//! user id to zone so lookups do not have to scan every zone's registry.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::connection::{ConnectionManager, MovementStatus};
use crate::error::{NetworkError, Result};
use crate::geometry::Position;
use crate::ids::{TowerId, UserId, ZoneId};
use crate::msc::SwitchingCenter;
use crate::router::{CallRouter, CallSession};
use crate::tower::Tower;
use crate::user::{ConnectionState, User};
use crate::zone::Zone;

/// Tower placement request. Without `radius`, the radius is derived from the
/// height using the configured meters-per-height-unit factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSpec {
    pub id: TowerId,
    pub position: Position,
    pub height: f64,
    #[serde(default)]
    pub radius: Option<f64>,
}

/// Read-only view over the routing state, handed to the call router while the
/// directory holds the router mutably.
pub struct NetworkView<'a> {
    zones: &'a BTreeMap<ZoneId, Zone>,
    user_zones: &'a HashMap<UserId, ZoneId>,
    msc: &'a SwitchingCenter,
}

impl<'a> NetworkView<'a> {
    pub fn user(&self, id: &UserId) -> Option<&'a User> {
        let zone = self.user_zones.get(id)?;
        self.zones.get(zone)?.user(id)
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&'a Zone> {
        self.zones.get(id)
    }

    pub fn switching_center(&self) -> &'a SwitchingCenter {
        self.msc
    }
}

#[derive(Debug)]
pub struct NetworkDirectory {
    config: SimulationConfig,
    zones: BTreeMap<ZoneId, Zone>,
    user_zones: HashMap<UserId, ZoneId>,
    msc: SwitchingCenter,
    router: CallRouter,
    connections: ConnectionManager,
    tick: u64,
}

impl NetworkDirectory {
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_switching_center(config, SwitchingCenter::default())
    }

    pub fn with_switching_center(config: SimulationConfig, msc: SwitchingCenter) -> Self {
        Self {
            config,
            zones: BTreeMap::new(),
            user_zones: HashMap::new(),
            msc,
            router: CallRouter::new(),
            connections: ConnectionManager::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Logical time: advances once per registration, movement or zone switch.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn switching_center(&self) -> &SwitchingCenter {
        &self.msc
    }

    pub fn router(&self) -> &CallRouter {
        &self.router
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    /// Zones in ascending id order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.view().user(id)
    }

    /// Registered user ids in ascending order.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_zones.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn user_count(&self) -> usize {
        self.user_zones.len()
    }

    pub fn view(&self) -> NetworkView<'_> {
        NetworkView {
            zones: &self.zones,
            user_zones: &self.user_zones,
            msc: &self.msc,
        }
    }

    pub fn create_zone(&mut self, id: ZoneId) -> Result<&Zone> {
        if self.zones.contains_key(&id) {
            return Err(NetworkError::DuplicateZone(id));
        }
        info!(zone = %id, "zone created");
        let zone = Zone::new(id.clone(), &self.config);
        Ok(self.zones.entry(id).or_insert(zone))
    }

    /// Places a tower. The first tower of a zone becomes its MSC gateway
    /// unless one is designated explicitly.
    pub fn add_tower(&mut self, zone_id: &ZoneId, spec: TowerSpec) -> Result<()> {
        let zone = self
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| NetworkError::UnknownZone(zone_id.clone()))?;
        let radius = spec
            .radius
            .unwrap_or_else(|| self.config.coverage.radius_for_height(spec.height));
        let tower = Tower::new(spec.id.clone(), spec.position, spec.height, radius)?;
        zone.add_tower(tower)?;
        info!(zone = %zone_id, tower = %spec.id, radius, "tower added");

        if !self.msc.has_gateway(zone_id) {
            self.msc.designate_gateway(zone_id.clone(), spec.id);
        }
        Ok(())
    }

    pub fn add_edge(&mut self, zone_id: &ZoneId, a: &TowerId, b: &TowerId) -> Result<()> {
        let zone = self
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| NetworkError::UnknownZone(zone_id.clone()))?;
        zone.add_edge(a, b)?;
        debug!(zone = %zone_id, %a, %b, "link added");
        Ok(())
    }

    pub fn designate_gateway(&mut self, zone_id: &ZoneId, tower: &TowerId) -> Result<()> {
        let zone = self
            .zones
            .get(zone_id)
            .ok_or_else(|| NetworkError::UnknownZone(zone_id.clone()))?;
        if !zone.graph().contains(tower) {
            return Err(NetworkError::UnknownTower {
                zone: zone_id.clone(),
                tower: tower.clone(),
            });
        }
        self.msc.designate_gateway(zone_id.clone(), tower.clone());
        info!(zone = %zone_id, %tower, "gateway designated");
        Ok(())
    }

    pub fn register_user(
        &mut self,
        zone_id: &ZoneId,
        user_id: UserId,
        position: Position,
    ) -> Result<ConnectionState> {
        let name = user_id.to_string();
        self.register_named_user(zone_id, user_id, name, position)
    }

    /// Adds the user to the zone and tries to connect it. Landing outside
    /// coverage is not an error: the user is registered as `Unconnected`.
    pub fn register_named_user(
        &mut self,
        zone_id: &ZoneId,
        user_id: UserId,
        name: String,
        position: Position,
    ) -> Result<ConnectionState> {
        if !self.zones.contains_key(zone_id) {
            return Err(NetworkError::UnknownZone(zone_id.clone()));
        }
        if self.user_zones.contains_key(&user_id) {
            return Err(NetworkError::DuplicateUser(user_id));
        }
        self.tick += 1;

        let zone = self
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| NetworkError::UnknownZone(zone_id.clone()))?;
        zone.admit(User::new(user_id.clone(), name, position, zone_id.clone()));
        self.user_zones.insert(user_id.clone(), zone_id.clone());
        info!(user = %user_id, zone = %zone_id, "user registered");

        Self::attach(&self.connections, zone, &user_id)
    }

    pub fn move_user(&mut self, user_id: &UserId, position: Position) -> Result<MovementStatus> {
        let zone_id = self
            .user_zones
            .get(user_id)
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        let zone = self
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| NetworkError::UnknownZone(zone_id.clone()))?;
        self.tick += 1;

        let (graph, users) = zone.split_mut();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        let status = self
            .connections
            .handle_movement(graph, user, position, self.tick);

        if status == MovementStatus::OutOfCoverage {
            self.drop_call(user_id);
        }
        Ok(status)
    }

    pub fn place_call(&mut self, caller: &UserId, callee: &UserId) -> Result<CallSession> {
        let view = NetworkView {
            zones: &self.zones,
            user_zones: &self.user_zones,
            msc: &self.msc,
        };
        self.router.place_call(caller, callee, &view)
    }

    /// Hangs up the user's call and returns the other party.
    pub fn end_call(&mut self, user_id: &UserId) -> Result<UserId> {
        if !self.user_zones.contains_key(user_id) {
            return Err(NetworkError::UnknownUser(user_id.clone()));
        }
        let partner = self
            .router
            .hang_up(user_id)
            .ok_or_else(|| NetworkError::NoActiveCall(user_id.clone()))?;
        info!(user = %user_id, %partner, "call ended");
        Ok(partner)
    }

    /// Moves a user to another zone, keeping its identity, position and
    /// histories. The target zone is validated before anything changes.
    pub fn switch_zone(&mut self, user_id: &UserId, new_zone: &ZoneId) -> Result<ConnectionState> {
        if !self.zones.contains_key(new_zone) {
            return Err(NetworkError::UnknownZone(new_zone.clone()));
        }
        let old_zone = self
            .user_zones
            .get(user_id)
            .cloned()
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        if &old_zone == new_zone {
            return self
                .user(user_id)
                .map(User::connection_state)
                .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()));
        }

        let mut user = self
            .zones
            .get_mut(&old_zone)
            .and_then(|zone| zone.release(user_id))
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        self.drop_call(user_id);
        self.tick += 1;
        user.record_zone_switch(self.tick, new_zone.clone());

        let zone = self
            .zones
            .get_mut(new_zone)
            .ok_or_else(|| NetworkError::UnknownZone(new_zone.clone()))?;
        zone.admit(user);
        self.user_zones.insert(user_id.clone(), new_zone.clone());
        info!(user = %user_id, from = %old_zone, to = %new_zone, "zone switched");

        Self::attach(&self.connections, zone, user_id)
    }

    /// Removes the user from the network entirely.
    pub fn deregister_user(&mut self, user_id: &UserId) -> Result<User> {
        let zone_id = self
            .user_zones
            .remove(user_id)
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        self.drop_call(user_id);
        let user = self
            .zones
            .get_mut(&zone_id)
            .and_then(|zone| zone.release(user_id))
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        info!(user = %user_id, zone = %zone_id, "user deregistered");
        Ok(user)
    }

    fn attach(
        connections: &ConnectionManager,
        zone: &mut Zone,
        user_id: &UserId,
    ) -> Result<ConnectionState> {
        let (graph, users) = zone.split_mut();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| NetworkError::UnknownUser(user_id.clone()))?;
        match connections.connect(graph, user) {
            Ok(tower) => Ok(ConnectionState::Connected(tower)),
            Err(NetworkError::NoCoverage(_)) => {
                info!(user = %user_id, zone = %graph.zone(), "registered without coverage");
                Ok(ConnectionState::Unconnected)
            }
            Err(err) => Err(err),
        }
    }

    fn drop_call(&mut self, user_id: &UserId) {
        if let Some(partner) = self.router.hang_up(user_id) {
            info!(user = %user_id, %partner, "call dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoverageModel;
    use crate::router::{CallFailure, CallStatus, RouteHop};

    fn zid(raw: &str) -> ZoneId {
        ZoneId::parse(raw).unwrap()
    }

    fn tid(raw: &str) -> TowerId {
        TowerId::parse(raw).unwrap()
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn spec(id: &str, x: f64, radius: f64) -> TowerSpec {
        TowerSpec {
            id: tid(id),
            position: Position::new(x, 0.0),
            height: 10.0,
            radius: Some(radius),
        }
    }

    /// Zone `z`: A(0,0,r5) - B(20,0,r5).
    fn directory() -> NetworkDirectory {
        let mut dir = NetworkDirectory::new(SimulationConfig::default());
        dir.create_zone(zid("z")).unwrap();
        dir.add_tower(&zid("z"), spec("A", 0.0, 5.0)).unwrap();
        dir.add_tower(&zid("z"), spec("B", 20.0, 5.0)).unwrap();
        dir.add_edge(&zid("z"), &tid("A"), &tid("B")).unwrap();
        dir
    }

    #[test]
    fn setup_errors_leave_no_partial_state() {
        let mut dir = directory();
        assert_eq!(
            dir.create_zone(zid("z")).unwrap_err(),
            NetworkError::DuplicateZone(zid("z"))
        );
        assert!(matches!(
            dir.add_tower(&zid("z"), spec("C", 3.0, 5.0)),
            Err(NetworkError::InvalidTopology(_))
        ));
        assert!(matches!(
            dir.add_tower(&zid("nowhere"), spec("C", 100.0, 5.0)),
            Err(NetworkError::UnknownZone(_))
        ));
        assert!(matches!(
            dir.add_edge(&zid("z"), &tid("A"), &tid("Q")),
            Err(NetworkError::UnknownTower { .. })
        ));
        assert!(matches!(
            dir.designate_gateway(&zid("z"), &tid("Q")),
            Err(NetworkError::UnknownTower { .. })
        ));
        let zone = dir.zone(&zid("z")).unwrap();
        assert_eq!(zone.graph().len(), 2);
        assert_eq!(zone.graph().edge_count(), 1);
        assert_eq!(dir.switching_center().gateway(&zid("z")), Some(&tid("A")));
    }

    #[test]
    fn radius_defaults_to_height_factor() {
        let mut dir = NetworkDirectory::new(SimulationConfig::default());
        dir.create_zone(zid("z")).unwrap();
        dir.add_tower(
            &zid("z"),
            TowerSpec {
                id: tid("T"),
                position: Position::new(0.0, 0.0),
                height: 2.0,
                radius: None,
            },
        )
        .unwrap();
        let tower = dir.zone(&zid("z")).unwrap().graph().tower(&tid("T")).unwrap();
        assert_eq!(tower.coverage_radius(), 100.0);
    }

    #[test]
    fn register_reports_connection_state() {
        let mut dir = directory();
        let state = dir
            .register_user(&zid("z"), uid("near"), Position::new(1.0, 0.0))
            .unwrap();
        assert_eq!(state, ConnectionState::Connected(tid("A")));

        let state = dir
            .register_user(&zid("z"), uid("far"), Position::new(10.0, 0.0))
            .unwrap();
        assert_eq!(state, ConnectionState::Unconnected);
        assert!(dir.user(&uid("far")).is_some());

        assert_eq!(
            dir.register_user(&zid("z"), uid("near"), Position::new(1.0, 0.0))
                .unwrap_err(),
            NetworkError::DuplicateUser(uid("near"))
        );
        assert_eq!(
            dir.register_user(&zid("q"), uid("other"), Position::new(1.0, 0.0))
                .unwrap_err(),
            NetworkError::UnknownZone(zid("q"))
        );
        assert_eq!(dir.user_count(), 2);
    }

    #[test]
    fn move_unknown_user_is_rejected() {
        let mut dir = directory();
        assert_eq!(
            dir.move_user(&uid("ghost"), Position::new(0.0, 0.0))
                .unwrap_err(),
            NetworkError::UnknownUser(uid("ghost"))
        );
    }

    #[test]
    fn calls_on_same_tower_need_no_msc() {
        let mut dir = directory();
        dir.register_user(&zid("z"), uid("a"), Position::new(1.0, 0.0))
            .unwrap();
        dir.register_user(&zid("z"), uid("b"), Position::new(-1.0, 0.0))
            .unwrap();
        let session = dir.place_call(&uid("a"), &uid("b")).unwrap();
        assert!(session.is_established());
        assert_eq!(
            session.path,
            vec![RouteHop::Tower {
                zone: zid("z"),
                tower: tid("A")
            }]
        );
        assert_eq!(session.hop_count(), 0);
        assert!(!session.uses_msc());
    }

    #[test]
    fn busy_parties_and_end_call() {
        let mut dir = directory();
        for (name, x) in [("a", 1.0), ("b", 21.0), ("c", 19.0)] {
            dir.register_user(&zid("z"), uid(name), Position::new(x, 0.0))
                .unwrap();
        }
        let session = dir.place_call(&uid("a"), &uid("b")).unwrap();
        assert!(session.is_established());
        assert_eq!(session.hop_count(), 1);

        let busy = dir.place_call(&uid("c"), &uid("b")).unwrap();
        assert_eq!(busy.status, CallStatus::Failed(CallFailure::Busy));
        assert!(busy.path.is_empty());

        assert_eq!(dir.end_call(&uid("b")).unwrap(), uid("a"));
        assert_eq!(
            dir.end_call(&uid("a")).unwrap_err(),
            NetworkError::NoActiveCall(uid("a"))
        );
        assert!(dir.place_call(&uid("c"), &uid("b")).unwrap().is_established());
    }

    #[test]
    fn self_and_unknown_calls_are_errors() {
        let mut dir = directory();
        dir.register_user(&zid("z"), uid("a"), Position::new(1.0, 0.0))
            .unwrap();
        assert!(matches!(
            dir.place_call(&uid("a"), &uid("a")),
            Err(NetworkError::InvalidCall(_))
        ));
        assert_eq!(
            dir.place_call(&uid("a"), &uid("ghost")).unwrap_err(),
            NetworkError::UnknownUser(uid("ghost"))
        );
    }

    #[test]
    fn no_path_between_disconnected_towers() {
        let mut dir = directory();
        dir.add_tower(&zid("z"), spec("C", 60.0, 5.0)).unwrap();
        dir.register_user(&zid("z"), uid("a"), Position::new(1.0, 0.0))
            .unwrap();
        dir.register_user(&zid("z"), uid("c"), Position::new(61.0, 0.0))
            .unwrap();
        let session = dir.place_call(&uid("a"), &uid("c")).unwrap();
        assert_eq!(session.status, CallStatus::Failed(CallFailure::NoPath));
        assert_eq!(dir.router().active_calls(), 0);
    }

    #[test]
    fn cross_zone_call_fails_when_caller_cannot_reach_gateway() {
        let mut dir = NetworkDirectory::new(SimulationConfig::default());
        dir.create_zone(zid("z")).unwrap();
        dir.add_tower(&zid("z"), spec("A", 0.0, 5.0)).unwrap();
        dir.add_tower(&zid("z"), spec("B", 20.0, 5.0)).unwrap();
        dir.create_zone(zid("y")).unwrap();
        dir.add_tower(&zid("y"), spec("Y", 0.0, 5.0)).unwrap();
        assert_eq!(dir.switching_center().gateway(&zid("z")), Some(&tid("A")));

        dir.register_user(&zid("z"), uid("a"), Position::new(21.0, 0.0))
            .unwrap();
        dir.register_user(&zid("y"), uid("b"), Position::new(1.0, 0.0))
            .unwrap();
        let session = dir.place_call(&uid("a"), &uid("b")).unwrap();
        assert_eq!(session.status, CallStatus::Failed(CallFailure::NoPath));
        assert!(session.path.is_empty());
        assert_eq!(dir.router().active_calls(), 0);
        assert!(!dir.router().is_busy(&uid("a")));
        assert!(!dir.router().is_busy(&uid("b")));
    }

    #[test]
    fn height_adjusted_model_shapes_overlap_and_attachment() {
        let mast = |id: &str, x: f64| TowerSpec {
            id: tid(id),
            position: Position::new(x, 0.0),
            height: 3.0,
            radius: Some(5.0),
        };

        let mut planar = NetworkDirectory::new(SimulationConfig::default());
        planar.create_zone(zid("z")).unwrap();
        planar.add_tower(&zid("z"), mast("A", 0.0)).unwrap();
        assert!(matches!(
            planar.add_tower(&zid("z"), mast("B", 9.0)),
            Err(NetworkError::InvalidTopology(_))
        ));

        let mut config = SimulationConfig::default();
        config.coverage.model = CoverageModel::HeightAdjusted;
        let mut dir = NetworkDirectory::new(config);
        dir.create_zone(zid("z")).unwrap();
        dir.add_tower(&zid("z"), mast("A", 0.0)).unwrap();
        // Footprints are 4 each, so 9 apart no longer overlap but 7 apart do.
        dir.add_tower(&zid("z"), mast("B", 9.0)).unwrap();
        assert!(matches!(
            dir.add_tower(&zid("z"), mast("C", -7.0)),
            Err(NetworkError::InvalidTopology(_))
        ));
        assert_eq!(dir.zone(&zid("z")).unwrap().graph().len(), 2);

        let state = dir
            .register_user(&zid("z"), uid("near_a"), Position::new(4.0, 0.0))
            .unwrap();
        assert_eq!(state, ConnectionState::Connected(tid("A")));
        let state = dir
            .register_user(&zid("z"), uid("near_b"), Position::new(5.0, 0.0))
            .unwrap();
        assert_eq!(state, ConnectionState::Connected(tid("B")));
        let state = dir
            .register_user(&zid("z"), uid("gap"), Position::new(4.5, 0.0))
            .unwrap();
        assert_eq!(state, ConnectionState::Unconnected);
    }

    #[test]
    fn losing_coverage_drops_the_call() {
        let mut dir = directory();
        dir.register_user(&zid("z"), uid("a"), Position::new(1.0, 0.0))
            .unwrap();
        dir.register_user(&zid("z"), uid("b"), Position::new(21.0, 0.0))
            .unwrap();
        dir.place_call(&uid("a"), &uid("b")).unwrap();
        assert!(dir.router().is_busy(&uid("b")));

        let status = dir.move_user(&uid("a"), Position::new(10.0, 0.0)).unwrap();
        assert_eq!(status, MovementStatus::OutOfCoverage);
        assert!(!dir.router().is_busy(&uid("a")));
        assert!(!dir.router().is_busy(&uid("b")));
    }

    #[test]
    fn deregister_removes_everywhere() {
        let mut dir = directory();
        dir.register_user(&zid("z"), uid("a"), Position::new(1.0, 0.0))
            .unwrap();
        let user = dir.deregister_user(&uid("a")).unwrap();
        assert_eq!(user.id(), &uid("a"));
        assert!(dir.user(&uid("a")).is_none());
        let tower = dir.zone(&zid("z")).unwrap().graph().tower(&tid("A")).unwrap();
        assert_eq!(tower.connected_user_count(), 0);
        assert!(dir.deregister_user(&uid("a")).is_err());
    }
}
