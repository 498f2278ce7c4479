//! Energy particle state.

use serde::{Deserialize, Serialize};

use super::common::Direction;
use crate::energy::EnergyKind;

/// Particles at or below this life are removed.
pub const DEATH_THRESHOLD: f32 = 0.1;

/// One unit of energy travelling across the grid.
///
/// Lives on an entity together with a [`GridPos`](super::GridPos) naming the
/// cell it is leaving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub direction: Direction,
    pub energy: EnergyKind,
    /// 1.0 at emission, decays every tick.
    pub life: f32,
    /// Fraction of the way to the next cell, in `[0, 1)`.
    pub progress: f32,
}

impl Particle {
    pub fn new(direction: Direction, energy: EnergyKind) -> Self {
        Self {
            direction,
            energy,
            life: 1.0,
            progress: 0.0,
        }
    }

    /// Advance decay and progress by `dt` seconds. Returns `true` when the
    /// particle has reached the next cell boundary.
    pub fn advance(&mut self, dt: f32) -> bool {
        let profile = self.energy.profile();
        let ticks = dt * 60.0;
        self.life *= profile.decay.powf(ticks);
        self.progress += profile.speed * ticks;
        self.progress >= 1.0
    }

    pub fn kill(&mut self) {
        self.life = 0.0;
    }

    pub fn is_alive(&self) -> bool {
        self.life > DEATH_THRESHOLD
    }

    /// A split-off sibling: same kind and life, fresh progress.
    pub fn offshoot(&self, direction: Direction) -> Self {
        Self {
            direction,
            energy: self.energy,
            life: self.life,
            progress: 0.0,
        }
    }
}
