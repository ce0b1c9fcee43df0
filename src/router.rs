//! Call path computation and the ledger of calls in progress.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::directory::NetworkView;
use crate::error::{NetworkError, Result};
use crate::ids::{TowerId, UserId, ZoneId};

/// One node on a call path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteHop {
    Tower { zone: ZoneId, tower: TowerId },
    Msc,
}

impl RouteHop {
    fn tower(zone: &ZoneId, tower: TowerId) -> Self {
        RouteHop::Tower {
            zone: zone.clone(),
            tower,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFailure {
    NoCoverage,
    NoPath,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CallStatus {
    Established,
    Failed(CallFailure),
}

/// Result of one call attempt. Failed attempts carry an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSession {
    pub caller: UserId,
    pub callee: UserId,
    pub path: Vec<RouteHop>,
    pub status: CallStatus,
}

impl CallSession {
    fn failed(caller: &UserId, callee: &UserId, reason: CallFailure) -> Self {
        Self {
            caller: caller.clone(),
            callee: callee.clone(),
            path: Vec::new(),
            status: CallStatus::Failed(reason),
        }
    }

    pub fn is_established(&self) -> bool {
        self.status == CallStatus::Established
    }

    /// Links traversed; a call within a single tower has zero hops.
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn uses_msc(&self) -> bool {
        self.path.contains(&RouteHop::Msc)
    }
}

/// Routes calls and remembers which users are currently talking.
#[derive(Debug, Default, Clone)]
pub struct CallRouter {
    partners: BTreeMap<UserId, UserId>,
}

impl CallRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_call(
        &mut self,
        caller: &UserId,
        callee: &UserId,
        view: &NetworkView<'_>,
    ) -> Result<CallSession> {
        let caller_user = view
            .user(caller)
            .ok_or_else(|| NetworkError::UnknownUser(caller.clone()))?;
        let callee_user = view
            .user(callee)
            .ok_or_else(|| NetworkError::UnknownUser(callee.clone()))?;
        if caller == callee {
            return Err(NetworkError::InvalidCall(format!(
                "user '{caller}' cannot call itself"
            )));
        }

        if self.is_busy(caller) || self.is_busy(callee) {
            info!(%caller, %callee, "call rejected: party busy");
            return Ok(CallSession::failed(caller, callee, CallFailure::Busy));
        }

        let (Some(from), Some(to)) = (caller_user.tower_id(), callee_user.tower_id()) else {
            info!(%caller, %callee, "call failed: no coverage");
            return Ok(CallSession::failed(caller, callee, CallFailure::NoCoverage));
        };

        let Some(path) = self.route(view, caller_user.zone_id(), from, callee_user.zone_id(), to)
        else {
            info!(%caller, %callee, %from, %to, "call failed: no path");
            return Ok(CallSession::failed(caller, callee, CallFailure::NoPath));
        };

        self.partners.insert(caller.clone(), callee.clone());
        self.partners.insert(callee.clone(), caller.clone());
        let session = CallSession {
            caller: caller.clone(),
            callee: callee.clone(),
            path,
            status: CallStatus::Established,
        };
        info!(
            %caller,
            %callee,
            hops = session.hop_count(),
            via_msc = session.uses_msc(),
            "call established"
        );
        Ok(session)
    }

    /// Same zone: BFS on the zone graph. Different zones:
    /// caller tower -> gateway -> MSC -> gateway -> callee tower.
    fn route(
        &self,
        view: &NetworkView<'_>,
        from_zone: &ZoneId,
        from: &TowerId,
        to_zone: &ZoneId,
        to: &TowerId,
    ) -> Option<Vec<RouteHop>> {
        let origin = view.zone(from_zone)?;
        if from_zone == to_zone {
            let towers = origin.graph().shortest_path(from, to)?;
            return Some(
                towers
                    .into_iter()
                    .map(|tower| RouteHop::tower(from_zone, tower))
                    .collect(),
            );
        }

        let destination = view.zone(to_zone)?;
        let msc = view.switching_center();
        let outbound = origin.graph().shortest_path(from, msc.gateway(from_zone)?)?;
        let inbound = destination.graph().shortest_path(msc.gateway(to_zone)?, to)?;

        let mut path = Vec::with_capacity(outbound.len() + inbound.len() + 1);
        path.extend(outbound.into_iter().map(|tower| RouteHop::tower(from_zone, tower)));
        path.push(RouteHop::Msc);
        path.extend(inbound.into_iter().map(|tower| RouteHop::tower(to_zone, tower)));
        Some(path)
    }

    pub fn is_busy(&self, user: &UserId) -> bool {
        self.partners.contains_key(user)
    }

    pub fn partner_of(&self, user: &UserId) -> Option<&UserId> {
        self.partners.get(user)
    }

    /// Ends the user's call, returning the other party.
    pub fn hang_up(&mut self, user: &UserId) -> Option<UserId> {
        let partner = self.partners.remove(user)?;
        self.partners.remove(&partner);
        Some(partner)
    }

    pub fn active_calls(&self) -> usize {
        self.partners.len() / 2
    }
}
