//! Random-walk movement for scenario runs.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::connection::MovementStatus;
use crate::directory::NetworkDirectory;
use crate::error::Result;
use crate::geometry::Position;
use crate::ids::UserId;

fn default_rounds() -> u32 {
    1
}

/// Each round moves every registered user, in id order, by an offset drawn
/// uniformly from `[-max_step, max_step]` on each axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomWalk {
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    pub max_step: f64,
}

impl RandomWalk {
    pub fn new(rounds: u32, max_step: f64) -> Self {
        Self { rounds, max_step }
    }

    /// The full step span `2 * max_step` must also be finite, or the
    /// uniform range cannot be built.
    pub fn is_valid(&self) -> bool {
        self.max_step >= 0.0 && (2.0 * self.max_step).is_finite()
    }

    pub fn step_from<R: Rng + ?Sized>(&self, rng: &mut R, from: &Position) -> Position {
        let reach = if self.is_valid() { self.max_step } else { 0.0 };
        let dx = rng.gen_range(-reach..=reach);
        let dy = rng.gen_range(-reach..=reach);
        Position {
            x: from.x + dx,
            y: from.y + dy,
            elevation: from.elevation,
        }
    }

    /// Applies every round to the directory and returns each move's outcome.
    pub fn run<R: Rng + ?Sized>(
        &self,
        directory: &mut NetworkDirectory,
        rng: &mut R,
    ) -> Result<Vec<(UserId, MovementStatus)>> {
        let users = directory.user_ids();
        let mut outcomes = Vec::new();
        for _ in 0..self.rounds {
            for id in &users {
                let Some(current) = directory.user(id).map(|user| *user.position()) else {
                    continue;
                };
                let next = self.step_from(rng, &current);
                let status = directory.move_user(id, next)?;
                outcomes.push((id.clone(), status));
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::directory::TowerSpec;
    use crate::geometry::distance;
    use crate::ids::{TowerId, ZoneId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn steps_stay_within_bounds() {
        let walk = RandomWalk::new(1, 2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let origin = Position::new(10.0, -4.0);
        for _ in 0..200 {
            let next = walk.step_from(&mut rng, &origin);
            assert!((next.x - origin.x).abs() <= 2.0);
            assert!((next.y - origin.y).abs() <= 2.0);
        }
    }

    #[test]
    fn invalid_step_does_not_move() {
        let walk = RandomWalk::new(1, f64::NAN);
        assert!(!walk.is_valid());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let origin = Position::new(1.0, 1.0);
        assert_eq!(distance(&walk.step_from(&mut rng, &origin), &origin), 0.0);
    }

    #[test]
    fn step_whose_span_overflows_is_invalid() {
        let walk = RandomWalk::new(1, 1.0e308);
        assert!(!walk.is_valid());
        assert!(!RandomWalk::new(1, f64::INFINITY).is_valid());
        assert!(RandomWalk::new(1, f64::MAX / 2.0).is_valid());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let origin = Position::new(-3.0, 2.0);
        assert_eq!(walk.step_from(&mut rng, &origin), origin);
    }

    #[test]
    fn run_moves_every_user_each_round() {
        let zone = ZoneId::parse("z").unwrap();
        let mut dir = NetworkDirectory::new(SimulationConfig::default());
        dir.create_zone(zone.clone()).unwrap();
        dir.add_tower(
            &zone,
            TowerSpec {
                id: TowerId::parse("A").unwrap(),
                position: Position::new(0.0, 0.0),
                height: 10.0,
                radius: Some(100.0),
            },
        )
        .unwrap();
        for name in ["a", "b", "c"] {
            dir.register_user(&zone, UserId::parse(name).unwrap(), Position::new(0.0, 0.0))
                .unwrap();
        }

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let outcomes = RandomWalk::new(4, 1.0).run(&mut dir, &mut rng).unwrap();
        assert_eq!(outcomes.len(), 12);
        let user = dir.user(&UserId::parse("b").unwrap()).unwrap();
        assert_eq!(user.movement_history().len(), 4);
    }
}
