//! JSON handlers for topology changes, users and calls.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    connection::MovementStatus,
    directory::TowerSpec,
    engine::NetworkEvent,
    error::NetworkError,
    geometry::Position,
    ids::{TowerId, UserId, ZoneId},
    router::CallSession,
    user::ConnectionState,
    zone::ZoneSummary,
};

use super::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("network state unavailable")]
    Poisoned,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Network(err) => match err {
                NetworkError::UnknownZone(_)
                | NetworkError::UnknownTower { .. }
                | NetworkError::UnknownUser(_)
                | NetworkError::NoActiveCall(_) => StatusCode::NOT_FOUND,
                NetworkError::DuplicateZone(_)
                | NetworkError::DuplicateUser(_)
                | NetworkError::InvalidTopology(_) => StatusCode::CONFLICT,
                NetworkError::MalformedIdentifier(_)
                | NetworkError::InvalidCall(_)
                | NetworkError::NoCoverage(_)
                | NetworkError::NoPath { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateZone {
    pub id: ZoneId,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub a: TowerId,
    pub b: TowerId,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    pub zone: ZoneId,
    pub position: Position,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub to: Position,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub zone: ZoneId,
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub caller: UserId,
    pub callee: UserId,
}

#[derive(Debug, Serialize)]
pub struct CallEnded {
    pub user: UserId,
    pub partner: UserId,
}

pub async fn create_zone(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateZone>,
) -> ApiResult<ZoneSummary> {
    let mut directory = state.lock()?;
    let summary = directory.create_zone(body.id.clone())?.summary();
    state.publish(&NetworkEvent::ZoneCreated { zone: body.id }, directory.tick());
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn add_tower(
    State(state): State<Arc<AppState>>,
    Path(zone): Path<String>,
    Json(spec): Json<TowerSpec>,
) -> ApiResult<ZoneSummary> {
    let zone = ZoneId::parse(zone)?;
    let tower = spec.id.clone();
    let mut directory = state.lock()?;
    directory.add_tower(&zone, spec)?;
    let summary = zone_summary(&directory, &zone)?;
    state.publish(&NetworkEvent::TowerAdded { zone, tower }, directory.tick());
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn add_link(
    State(state): State<Arc<AppState>>,
    Path(zone): Path<String>,
    Json(link): Json<LinkRequest>,
) -> ApiResult<ZoneSummary> {
    let zone = ZoneId::parse(zone)?;
    let mut directory = state.lock()?;
    directory.add_edge(&zone, &link.a, &link.b)?;
    let summary = zone_summary(&directory, &zone)?;
    state.publish(
        &NetworkEvent::LinkAdded {
            zone,
            a: link.a,
            b: link.b,
        },
        directory.tick(),
    );
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterUser>,
) -> ApiResult<ConnectionState> {
    let mut directory = state.lock()?;
    let name = body.name.unwrap_or_else(|| body.id.to_string());
    let connection =
        directory.register_named_user(&body.zone, body.id.clone(), name, body.position)?;
    state.publish(
        &NetworkEvent::UserRegistered {
            user: body.id,
            zone: body.zone,
            connection: connection.clone(),
        },
        directory.tick(),
    );
    Ok((StatusCode::CREATED, Json(connection)))
}

pub async fn move_user(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<MoveRequest>,
) -> ApiResult<MovementStatus> {
    let user = UserId::parse(user)?;
    let mut directory = state.lock()?;
    let outcome = directory.move_user(&user, body.to)?;
    let tick = directory.tick();
    state.publish(
        &NetworkEvent::Moved {
            tick,
            user,
            outcome: outcome.clone(),
        },
        tick,
    );
    Ok((StatusCode::OK, Json(outcome)))
}

pub async fn switch_zone(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<SwitchRequest>,
) -> ApiResult<ConnectionState> {
    let user = UserId::parse(user)?;
    let mut directory = state.lock()?;
    let connection = directory.switch_zone(&user, &body.zone)?;
    state.publish(
        &NetworkEvent::ZoneSwitched {
            user,
            zone: body.zone,
            connection: connection.clone(),
        },
        directory.tick(),
    );
    Ok((StatusCode::OK, Json(connection)))
}

pub async fn place_call(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CallRequest>,
) -> ApiResult<CallSession> {
    let mut directory = state.lock()?;
    let session = directory.place_call(&body.caller, &body.callee)?;
    state.publish(
        &NetworkEvent::Call {
            session: session.clone(),
        },
        directory.tick(),
    );
    Ok((StatusCode::OK, Json(session)))
}

pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> ApiResult<CallEnded> {
    let user = UserId::parse(user)?;
    let mut directory = state.lock()?;
    let partner = directory.end_call(&user)?;
    state.publish(
        &NetworkEvent::CallEnded {
            user: user.clone(),
            partner: partner.clone(),
        },
        directory.tick(),
    );
    Ok((StatusCode::OK, Json(CallEnded { user, partner })))
}

fn zone_summary(
    directory: &crate::directory::NetworkDirectory,
    zone: &ZoneId,
) -> Result<ZoneSummary, ApiError> {
    directory
        .zone(zone)
        .map(|zone| zone.summary())
        .ok_or_else(|| NetworkError::UnknownZone(zone.clone()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::directory::NetworkDirectory;
    use crate::router::RouteHop;

    fn state() -> Arc<AppState> {
        AppState::new("api", NetworkDirectory::new(SimulationConfig::default()))
    }

    fn zid(raw: &str) -> ZoneId {
        ZoneId::parse(raw).unwrap()
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    async fn zone_with_tower(state: &Arc<AppState>, zone: &str, tower: &str, x: f64) {
        create_zone(State(state.clone()), Json(CreateZone { id: zid(zone) }))
            .await
            .unwrap();
        add_tower(
            State(state.clone()),
            Path(zone.to_string()),
            Json(TowerSpec {
                id: TowerId::parse(tower).unwrap(),
                position: Position::new(x, 0.0),
                height: 10.0,
                radius: Some(5.0),
            }),
        )
        .await
        .unwrap();
    }

    async fn register(state: &Arc<AppState>, user: &str, zone: &str, x: f64) -> ConnectionState {
        let (status, Json(connection)) = register_user(
            State(state.clone()),
            Json(RegisterUser {
                id: uid(user),
                name: None,
                zone: zid(zone),
                position: Position::new(x, 0.0),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        connection
    }

    #[tokio::test]
    async fn cross_zone_call_through_api() {
        let state = state();
        zone_with_tower(&state, "north", "N1", 0.0).await;
        zone_with_tower(&state, "south", "S1", 100.0).await;
        register(&state, "ada", "north", 1.0).await;
        register(&state, "bob", "south", 101.0).await;

        let mut events = state.subscribe();
        let (_, Json(session)) = place_call(
            State(state.clone()),
            Json(CallRequest {
                caller: uid("ada"),
                callee: uid("bob"),
            }),
        )
        .await
        .unwrap();
        assert!(session.is_established());
        assert_eq!(session.path[1], RouteHop::Msc);
        assert!(events.try_recv().unwrap().contains("\"event\":\"call\""));

        let (_, Json(ended)) = end_call(State(state.clone()), Path("bob".to_string()))
            .await
            .unwrap();
        assert_eq!(ended.partner, uid("ada"));
    }

    #[tokio::test]
    async fn move_and_switch_report_connection() {
        let state = state();
        zone_with_tower(&state, "north", "N1", 0.0).await;
        zone_with_tower(&state, "south", "S1", 0.0).await;
        register(&state, "ada", "north", 1.0).await;

        let (_, Json(outcome)) = move_user(
            State(state.clone()),
            Path("ada".to_string()),
            Json(MoveRequest {
                to: Position::new(30.0, 0.0),
            }),
        )
        .await
        .unwrap();
        assert_eq!(outcome, MovementStatus::OutOfCoverage);

        let (_, Json(connection)) = switch_zone(
            State(state.clone()),
            Path("ada".to_string()),
            Json(SwitchRequest { zone: zid("south") }),
        )
        .await
        .unwrap();
        assert_eq!(connection, ConnectionState::Unconnected);
        let directory = state.lock().unwrap();
        assert_eq!(directory.user(&uid("ada")).unwrap().zone_id(), &zid("south"));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let state = state();
        zone_with_tower(&state, "north", "N1", 0.0).await;

        let err = create_zone(State(state.clone()), Json(CreateZone { id: zid("north") }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = move_user(
            State(state.clone()),
            Path("ghost".to_string()),
            Json(MoveRequest {
                to: Position::new(0.0, 0.0),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = end_call(State(state.clone()), Path("bad id".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        register(&state, "ada", "north", 1.0).await;
        let err = place_call(
            State(state.clone()),
            Json(CallRequest {
                caller: uid("ada"),
                callee: uid("ada"),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
