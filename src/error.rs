use thiserror::Error;

use crate::ids::{TowerId, UserId, ZoneId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("unknown tower '{tower}' in zone '{zone}'")]
    UnknownTower { zone: ZoneId, tower: TowerId },

    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),

    #[error("unknown user '{0}'")]
    UnknownUser(UserId),

    #[error("user '{0}' has no tower in range")]
    NoCoverage(UserId),

    #[error("no route between tower '{from}' and tower '{to}'")]
    NoPath { from: TowerId, to: TowerId },

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("zone '{0}' already exists")]
    DuplicateZone(ZoneId),

    #[error("user '{0}' is already registered")]
    DuplicateUser(UserId),

    #[error("malformed identifier '{0}'")]
    MalformedIdentifier(String),

    #[error("user '{0}' is not on a call")]
    NoActiveCall(UserId),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
