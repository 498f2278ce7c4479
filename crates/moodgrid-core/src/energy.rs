//! Energy types and their physics.
//!
//! The registry is a fixed lookup table. Particles read `speed` and `decay`
//! once per tick, scaled by elapsed time against a 60 ticks/second
//! reference cadence:
//!
//! ```text
//! life     *= decay ^ (dt * 60)
//! progress += speed * dt * 60
//! ```

use serde::{Deserialize, Serialize};

/// The mood an energy particle carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyKind {
    Happy,
    Calm,
    Excited,
}

/// Static physics and abilities of one energy kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyProfile {
    /// Display color (0xRRGGBB) for renderers.
    pub color: u32,
    /// Cells advanced per reference tick.
    pub speed: f32,
    /// Life multiplier per reference tick.
    pub decay: f32,
    /// Energy added to a piece the particle enters.
    pub transfer: f32,
    pub can_spread_joy: bool,
    pub can_stabilize: bool,
    pub can_bridge: bool,
    /// How long a bridge laid by this kind stays passable.
    pub bridge_duration_ms: f64,
    pub can_overwhelm: bool,
    pub can_power_through: bool,
    /// Chance per obstacle arrival of breaking through.
    pub power_through_chance: f64,
    /// Chance per overloaded entry of burning a piece out.
    pub burnout_chance: f64,
}

const HAPPY: EnergyProfile = EnergyProfile {
    color: 0xffd700,
    speed: 0.04,
    decay: 0.995,
    transfer: 0.25,
    can_spread_joy: true,
    can_stabilize: false,
    can_bridge: false,
    bridge_duration_ms: 0.0,
    can_overwhelm: false,
    can_power_through: false,
    power_through_chance: 0.0,
    burnout_chance: 0.0,
};

const CALM: EnergyProfile = EnergyProfile {
    color: 0x4169e1,
    speed: 0.025,
    decay: 0.998,
    transfer: 0.15,
    can_spread_joy: false,
    can_stabilize: true,
    can_bridge: true,
    bridge_duration_ms: 3000.0,
    can_overwhelm: false,
    can_power_through: false,
    power_through_chance: 0.0,
    burnout_chance: 0.0,
};

const EXCITED: EnergyProfile = EnergyProfile {
    color: 0xff6347,
    speed: 0.06,
    decay: 0.985,
    transfer: 0.3,
    can_spread_joy: false,
    can_stabilize: false,
    can_bridge: false,
    bridge_duration_ms: 0.0,
    can_overwhelm: true,
    can_power_through: true,
    power_through_chance: 0.3,
    burnout_chance: 0.3,
};

impl EnergyKind {
    pub const ALL: [EnergyKind; 3] = [EnergyKind::Happy, EnergyKind::Calm, EnergyKind::Excited];

    pub fn profile(self) -> &'static EnergyProfile {
        match self {
            EnergyKind::Happy => &HAPPY,
            EnergyKind::Calm => &CALM,
            EnergyKind::Excited => &EXCITED,
        }
    }

    /// Next kind in the player's selection cycle.
    pub fn next(self) -> EnergyKind {
        match self {
            EnergyKind::Happy => EnergyKind::Calm,
            EnergyKind::Calm => EnergyKind::Excited,
            EnergyKind::Excited => EnergyKind::Happy,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EnergyKind::Happy => "happy",
            EnergyKind::Calm => "calm",
            EnergyKind::Excited => "excited",
        }
    }
}

impl std::fmt::Display for EnergyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
