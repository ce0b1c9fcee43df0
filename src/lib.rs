pub mod config;
pub mod connection;
pub mod directory;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod mobility;
pub mod msc;
pub mod registry;
pub mod rng;
pub mod router;
pub mod scenario;
pub mod snapshot;
pub mod topology;
pub mod tower;
pub mod user;
pub mod web;
pub mod zone;

pub use config::SimulationConfig;
pub use directory::{NetworkDirectory, TowerSpec};
pub use engine::{Engine, EngineSettings, NetworkEvent, RunSummary};
pub use error::{NetworkError, Result};
pub use scenario::{Scenario, ScenarioLoader};
