use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::config::SimulationConfig;
use crate::directory::{NetworkDirectory, TowerSpec};
use crate::geometry::Position;
use crate::ids::{TowerId, UserId, ZoneId};
use crate::mobility::RandomWalk;
use crate::msc::SwitchingCenter;

fn default_msc_name() -> String {
    "MSC".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub config: SimulationConfig,
    #[serde(default)]
    pub msc: Option<ScenarioMsc>,
    pub zones: Vec<ScenarioZone>,
    #[serde(default)]
    pub users: Vec<ScenarioUser>,
    /// Steps are written as single-key maps, e.g. `- move: { ... }`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMsc {
    #[serde(default = "default_msc_name")]
    pub name: String,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioZone {
    pub id: ZoneId,
    /// Gateway tower; defaults to the first tower listed.
    #[serde(default)]
    pub gateway: Option<TowerId>,
    #[serde(default)]
    pub towers: Vec<TowerSpec>,
    #[serde(default)]
    pub links: Vec<(TowerId, TowerId)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioUser {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    pub zone: ZoneId,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Move { user: UserId, to: Position },
    Call { caller: UserId, callee: UserId },
    EndCall { user: UserId },
    SwitchZone { user: UserId, zone: ZoneId },
    RandomWalk(RandomWalk),
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(data)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.zones.is_empty(), "scenario '{}' defines no zones", self.name);
        ensure!(
            self.config.coverage.meters_per_height_unit > 0.0,
            "meters_per_height_unit must be positive"
        );
        for (index, step) in self.steps.iter().enumerate() {
            if let Step::RandomWalk(walk) = step {
                ensure!(
                    walk.is_valid(),
                    "step {index}: max_step must be a finite, non-negative number"
                );
            }
        }
        Ok(())
    }

    /// Builds the initial network: MSC, zones, towers, links, gateways and
    /// registered users. Any topology error aborts the build.
    pub fn build_directory(&self) -> Result<NetworkDirectory> {
        let msc = match &self.msc {
            Some(msc) => SwitchingCenter::new(msc.name.clone(), msc.position),
            None => SwitchingCenter::default(),
        };
        let mut directory = NetworkDirectory::with_switching_center(self.config.clone(), msc);

        for zone in &self.zones {
            directory
                .create_zone(zone.id.clone())
                .with_context(|| format!("zone '{}'", zone.id))?;
            for tower in &zone.towers {
                directory
                    .add_tower(&zone.id, tower.clone())
                    .with_context(|| format!("tower '{}' in zone '{}'", tower.id, zone.id))?;
            }
            for (a, b) in &zone.links {
                directory
                    .add_edge(&zone.id, a, b)
                    .with_context(|| format!("link {a}-{b} in zone '{}'", zone.id))?;
            }
            if let Some(gateway) = &zone.gateway {
                directory
                    .designate_gateway(&zone.id, gateway)
                    .with_context(|| format!("gateway of zone '{}'", zone.id))?;
            }
        }

        for user in &self.users {
            let name = user.name.clone().unwrap_or_else(|| user.id.to_string());
            directory
                .register_named_user(&user.zone, user.id.clone(), name, user.position)
                .with_context(|| format!("user '{}'", user.id))?;
        }
        Ok(directory)
    }
}
