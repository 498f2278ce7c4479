//! Events system - one-way notifications for renderers and audio.
//!
//! The simulation pushes a [`SimEvent`] for every state change a presenter
//! might want to show or play a sound for. Delivery is fire-and-forget: the
//! core never reads anything back from a sink.

use crate::components::{Direction, GridPos, MoodResponse, PieceKind};
use crate::energy::EnergyKind;

/// Why a run ended without reaching the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The goal never received any energy.
    NoEnergyReached,
    /// Energy arrived but stopped before the goal filled.
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Won,
    TimedOut(FailureReason),
}

/// Final report of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub result: RunResult,
    /// Goal energy over goal capacity when the run ended.
    pub goal_fill: f32,
}

impl RunOutcome {
    pub fn is_win(&self) -> bool {
        self.result == RunResult::Won
    }

    /// Whole percent, rounded down, for "the goal was N% powered" messages.
    pub fn fill_percent(&self) -> u32 {
        (self.goal_fill * 100.0).floor() as u32
    }
}

/// Everything the simulation reports outward.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Placed { pos: GridPos, kind: PieceKind },
    Removed { pos: GridPos, kind: PieceKind },
    Rotated { pos: GridPos, kind: PieceKind, degrees: u16 },
    RunStarted { energy: EnergyKind },
    /// The source pulsed and released particles.
    Emitted { pos: GridPos, energy: EnergyKind },
    ParticleSpawned { pos: GridPos, direction: Direction, energy: EnergyKind },
    /// A piece reacted to a mood, from a particle or from joy contagion.
    PieceEntered {
        pos: GridPos,
        kind: PieceKind,
        energy: EnergyKind,
        outcome: MoodResponse,
    },
    /// Joy travelling from one piece to a neighbour.
    JoySpread { from: GridPos, to: GridPos },
    Converted { pos: GridPos, from: EnergyKind, to: EnergyKind },
    Burnout { pos: GridPos, kind: PieceKind },
    /// Excited energy smashed through an obstacle.
    PoweredThrough { pos: GridPos },
    BridgeCreated { pos: GridPos },
    BridgeExpired { pos: GridPos },
    GoalMilestone { percent: u8 },
    GoalReached { fill: f32 },
    RunWon { fill: f32 },
    RunFailed { reason: FailureReason, fill: f32 },
    LevelReset,
}

/// Receiver for simulation events.
pub trait EventSink {
    fn emit(&mut self, event: SimEvent);
}

impl EventSink for Vec<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        self.push(event);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}
