//! Grid pieces: source, goal, routing pieces and personality gates.

use serde::{Deserialize, Serialize};

use super::common::{Connections, Side};
use crate::energy::EnergyKind;

/// What occupies a non-obstacle cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Source,
    Goal,
    Pipe,
    Corner,
    #[serde(alias = "t_junction")]
    TJunction,
    Cross,
    Nervous,
    Sleepy,
    Grumpy,
}

impl PieceKind {
    /// Kinds a player may place from the toolbox.
    pub const PLACEABLE: [PieceKind; 7] = [
        PieceKind::Pipe,
        PieceKind::Corner,
        PieceKind::TJunction,
        PieceKind::Cross,
        PieceKind::Nervous,
        PieceKind::Sleepy,
        PieceKind::Grumpy,
    ];

    /// Connection set at orientation 0.
    pub fn default_connections(self) -> Connections {
        match self {
            PieceKind::Source => Connections::new(true, false, false, false),
            PieceKind::Pipe => Connections::new(true, false, true, false),
            PieceKind::Corner => Connections::new(true, true, false, false),
            PieceKind::TJunction => Connections::new(false, true, true, true),
            PieceKind::Cross | PieceKind::Goal => Connections::ALL,
            PieceKind::Nervous | PieceKind::Sleepy | PieceKind::Grumpy => {
                Connections::new(true, false, true, false)
            }
        }
    }

    /// Source and goal are level anchors: never rotated, never removed by the player.
    pub fn is_anchor(self) -> bool {
        matches!(self, PieceKind::Source | PieceKind::Goal)
    }

    pub fn personality(self) -> Option<Personality> {
        let (required, output) = match self {
            PieceKind::Nervous => (EnergyKind::Calm, EnergyKind::Excited),
            PieceKind::Sleepy => (EnergyKind::Excited, EnergyKind::Happy),
            PieceKind::Grumpy => (EnergyKind::Happy, EnergyKind::Calm),
            _ => return None,
        };
        Some(Personality {
            required_mood: required,
            converts_to: output,
        })
    }

    pub fn max_energy(self) -> f32 {
        if self == PieceKind::Goal {
            2.0
        } else {
            1.0
        }
    }

    /// Whether a particle entering this kind always fans out over every exit.
    pub fn always_splits(self) -> bool {
        matches!(self, PieceKind::Cross | PieceKind::TJunction)
    }
}

/// Mood gate carried by nervous, sleepy and grumpy pieces.
///
/// A satisfied gate passes energy of its required mood and converts it to
/// `converts_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Personality {
    pub required_mood: EnergyKind,
    pub converts_to: EnergyKind,
}

impl Personality {
    pub fn is_satisfied_by(&self, energy: EnergyKind) -> bool {
        energy == self.required_mood
    }

    /// Output kind for a satisfied gate, `None` when the input is not converted.
    pub fn convert(&self, energy: EnergyKind) -> Option<EnergyKind> {
        if self.is_satisfied_by(energy) && energy != self.converts_to {
            Some(self.converts_to)
        } else {
            None
        }
    }
}

/// Displayed mood of a piece.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Calm,
    Excited,
}

impl From<EnergyKind> for Mood {
    fn from(kind: EnergyKind) -> Self {
        match kind {
            EnergyKind::Happy => Mood::Happy,
            EnergyKind::Calm => Mood::Calm,
            EnergyKind::Excited => Mood::Excited,
        }
    }
}

/// Number of clockwise quarter turns applied to a piece.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orientation(u8);

impl Orientation {
    pub fn quarter_turns(self) -> u8 {
        self.0
    }

    pub fn degrees(self) -> u16 {
        u16::from(self.0) * 90
    }

    pub fn turned(self) -> Self {
        Self((self.0 + 1) % 4)
    }
}

/// How a piece reacted to a mood update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodResponse {
    /// Returned to neutral; blocking cleared.
    Cleared,
    /// Personality gate received its required mood.
    Accepted,
    /// Personality gate received the wrong mood and now blocks.
    Denied,
    /// Plain piece took on the mood; no gating applies.
    Ambient,
}

/// A grid occupant other than an obstacle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub orientation: Orientation,
    /// Connection set at orientation 0 (kind default or level override).
    pub base_connections: Connections,
    pub energy: f32,
    pub max_energy: f32,
    pub mood: Mood,
    /// Falls toward 0 while idle; the mood returns to neutral when it gets there.
    pub mood_stability: f32,
    pub is_blocking: bool,
    /// Permanent for the rest of the run.
    pub burned_out: bool,
}

impl Piece {
    pub fn new(kind: PieceKind) -> Self {
        Self::with_connections(kind, kind.default_connections())
    }

    pub fn with_connections(kind: PieceKind, base_connections: Connections) -> Self {
        Self {
            kind,
            orientation: Orientation::default(),
            base_connections,
            energy: 0.0,
            max_energy: kind.max_energy(),
            mood: Mood::Neutral,
            mood_stability: 0.0,
            is_blocking: false,
            burned_out: false,
        }
    }

    /// Current open sides: the base set turned by the orientation.
    pub fn connections(&self) -> Connections {
        let mut conns = self.base_connections;
        for _ in 0..self.orientation.quarter_turns() {
            conns = conns.rotated_cw();
        }
        conns
    }

    /// Turn a quarter clockwise. Returns `false` for source and goal,
    /// which never turn.
    pub fn rotate(&mut self) -> bool {
        if self.kind.is_anchor() {
            return false;
        }
        self.orientation = self.orientation.turned();
        true
    }

    pub fn personality(&self) -> Option<Personality> {
        self.kind.personality()
    }

    /// Whether energy of `energy` kind may enter through `side`.
    ///
    /// Burned-out pieces refuse everything. A blocking gate refuses
    /// everything except calm energy at a nervous gate.
    pub fn can_connect(&self, side: Side, energy: Option<EnergyKind>) -> bool {
        if self.burned_out {
            return false;
        }
        if self.is_blocking {
            let calm_at_nervous =
                self.kind == PieceKind::Nervous && energy == Some(EnergyKind::Calm);
            if !calm_at_nervous {
                return false;
            }
        }
        self.connections().get(side)
    }

    /// Set the mood and work out the gate state. Pure state change; the
    /// caller emits events and spreads joy.
    pub fn apply_mood(&mut self, mood: Mood, particle: Option<EnergyKind>) -> MoodResponse {
        self.mood = mood;
        self.mood_stability = 1.0;

        let particle = match particle {
            Some(kind) if mood != Mood::Neutral => kind,
            _ => {
                self.is_blocking = false;
                return MoodResponse::Cleared;
            }
        };

        match self.personality() {
            Some(personality) if personality.is_satisfied_by(particle) => {
                self.is_blocking = false;
                MoodResponse::Accepted
            }
            Some(_) => {
                self.is_blocking = true;
                MoodResponse::Denied
            }
            None => MoodResponse::Ambient,
        }
    }

    /// Add energy, saturating at `max_energy`. Returns the amount actually stored.
    pub fn absorb(&mut self, amount: f32) -> f32 {
        let before = self.energy;
        self.energy = (self.energy + amount).min(self.max_energy);
        self.energy - before
    }

    pub fn fill_fraction(&self) -> f32 {
        (self.energy / self.max_energy).min(1.0)
    }

    /// Back to the start-of-run state: empty, neutral, open, intact.
    pub fn reset_state(&mut self) {
        self.energy = 0.0;
        self.mood = Mood::Neutral;
        self.mood_stability = 0.0;
        self.is_blocking = false;
        self.burned_out = false;
    }
}

/// Marks a piece placed by the level; the player cannot rotate or remove it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fixed;

/// Fill level last reported for the goal, used to detect milestone crossings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalMeter {
    pub last_fill: f32,
}
