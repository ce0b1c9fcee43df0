//! Scenario step execution.
//!
//! The engine drives a `NetworkDirectory` through a list of steps. A step
//! that the network refuses (unknown user, self-call and so on) becomes a
//! `Rejected` event; the run carries on with the next step.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::connection::MovementStatus;
use crate::directory::NetworkDirectory;
use crate::error::NetworkError;
use crate::ids::{TowerId, UserId, ZoneId};
use crate::rng::RngManager;
use crate::router::CallSession;
use crate::scenario::Step;
use crate::user::ConnectionState;

const MOBILITY_STREAM: &str = "mobility";

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetworkEvent {
    ZoneCreated {
        zone: ZoneId,
    },
    TowerAdded {
        zone: ZoneId,
        tower: TowerId,
    },
    LinkAdded {
        zone: ZoneId,
        a: TowerId,
        b: TowerId,
    },
    UserRegistered {
        user: UserId,
        zone: ZoneId,
        connection: ConnectionState,
    },
    Moved {
        tick: u64,
        user: UserId,
        outcome: MovementStatus,
    },
    Call {
        session: CallSession,
    },
    CallEnded {
        user: UserId,
        partner: UserId,
    },
    ZoneSwitched {
        user: UserId,
        zone: ZoneId,
        connection: ConnectionState,
    },
    Rejected {
        step: usize,
        reason: String,
    },
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub steps: usize,
    pub moves: usize,
    pub handovers: usize,
    pub out_of_coverage: usize,
    pub calls_established: usize,
    pub calls_failed: usize,
    pub calls_ended: usize,
    pub zone_switches: usize,
    pub rejected: usize,
    pub final_tick: u64,
}

impl RunSummary {
    pub fn record(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::Moved { outcome, .. } => {
                self.moves += 1;
                match outcome {
                    MovementStatus::Handover { .. } => self.handovers += 1,
                    MovementStatus::OutOfCoverage => self.out_of_coverage += 1,
                    MovementStatus::Connected { .. } => {}
                }
            }
            NetworkEvent::Call { session } if session.is_established() => {
                self.calls_established += 1
            }
            NetworkEvent::Call { .. } => self.calls_failed += 1,
            NetworkEvent::CallEnded { .. } => self.calls_ended += 1,
            NetworkEvent::ZoneSwitched { .. } => self.zone_switches += 1,
            NetworkEvent::Rejected { .. } => self.rejected += 1,
            NetworkEvent::ZoneCreated { .. }
            | NetworkEvent::TowerAdded { .. }
            | NetworkEvent::LinkAdded { .. }
            | NetworkEvent::UserRegistered { .. } => {}
        }
    }
}

pub struct Engine {
    rng: RngManager,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            rng: RngManager::new(settings.seed),
            settings,
        }
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn run(&mut self, directory: &mut NetworkDirectory, steps: &[Step]) -> Result<RunSummary> {
        self.run_with_hook(directory, steps, |_, _| Ok(()))
    }

    /// Runs every step, calling `hook` after each event with the directory
    /// as it stands at that point.
    pub fn run_with_hook<F>(
        &mut self,
        directory: &mut NetworkDirectory,
        steps: &[Step],
        mut hook: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&NetworkEvent, &NetworkDirectory) -> Result<()>,
    {
        let mut summary = RunSummary::default();
        for (index, step) in steps.iter().enumerate() {
            for event in self.apply(directory, index, step) {
                summary.record(&event);
                hook(&event, directory)?;
            }
            summary.steps += 1;
        }
        summary.final_tick = directory.tick();
        info!(
            scenario = %self.settings.scenario_name,
            steps = summary.steps,
            rejected = summary.rejected,
            "run complete"
        );
        Ok(summary)
    }

    /// Executes one step and returns the events it produced.
    pub fn apply(
        &mut self,
        directory: &mut NetworkDirectory,
        index: usize,
        step: &Step,
    ) -> Vec<NetworkEvent> {
        match self.execute(directory, step) {
            Ok(events) => events,
            Err(err) => {
                warn!(step = index, error = %err, "step rejected");
                vec![NetworkEvent::Rejected {
                    step: index,
                    reason: err.to_string(),
                }]
            }
        }
    }

    fn execute(
        &mut self,
        directory: &mut NetworkDirectory,
        step: &Step,
    ) -> std::result::Result<Vec<NetworkEvent>, NetworkError> {
        let events = match step {
            Step::Move { user, to } => {
                let outcome = directory.move_user(user, *to)?;
                vec![NetworkEvent::Moved {
                    tick: directory.tick(),
                    user: user.clone(),
                    outcome,
                }]
            }
            Step::Call { caller, callee } => {
                let session = directory.place_call(caller, callee)?;
                vec![NetworkEvent::Call { session }]
            }
            Step::EndCall { user } => {
                let partner = directory.end_call(user)?;
                vec![NetworkEvent::CallEnded {
                    user: user.clone(),
                    partner,
                }]
            }
            Step::SwitchZone { user, zone } => {
                let connection = directory.switch_zone(user, zone)?;
                vec![NetworkEvent::ZoneSwitched {
                    user: user.clone(),
                    zone: zone.clone(),
                    connection,
                }]
            }
            Step::RandomWalk(walk) => {
                let rng = self.rng.stream(MOBILITY_STREAM);
                let start = directory.tick();
                walk.run(directory, rng)?
                    .into_iter()
                    .enumerate()
                    .map(|(offset, (user, outcome))| NetworkEvent::Moved {
                        tick: start + offset as u64 + 1,
                        user,
                        outcome,
                    })
                    .collect()
            }
        };
        Ok(events)
    }
}
