//! MoodGrid Core - Mood-Routing Puzzle Simulation Engine
//!
//! Players lay pipes, junctions and moody gate pieces on a small grid so that
//! energy from a source reaches a goal. Energy comes in three kinds (happy,
//! calm, excited), each with its own speed, decay and special ability, and
//! the gate pieces only let the mood they want through.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Pieces on the board and energy particles in flight
//! - **Components**: Pure data attached to entities (GridPos, Piece, Particle, etc.)
//! - **Systems**: Logic that queries and updates components
//!
//! Time is simulated, not wall-clock: emission, goal polling, the failure
//! deadline and joy contagion are timers on one queue driven by
//! [`SimulationEngine::update`].
//!
//! # Example
//!
//! ```rust,no_run
//! use moodgrid_core::prelude::*;
//!
//! let level: Level = serde_json::from_str(r#"{
//!     "name": "straight shot",
//!     "source": { "x": 1, "y": 3, "connections": { "right": true } },
//!     "goal": { "x": 4, "y": 3 }
//! }"#).unwrap();
//!
//! let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
//! engine.load_level(level).unwrap();
//! for x in 2..4 {
//!     engine.place(PieceKind::Pipe, x, 3).unwrap();
//!     engine.rotate_at(x, 3).unwrap();
//! }
//!
//! engine.start();
//! while engine.is_running() {
//!     engine.update(1.0 / 60.0); // 60 FPS
//! }
//! println!("{:?}", engine.outcome());
//! ```

pub mod components;
pub mod config;
pub mod energy;
pub mod engine;
pub mod grid;
pub mod level;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{ConfigError, SimConfig};
    pub use crate::energy::EnergyKind;
    pub use crate::engine::{PlacementError, RunPhase, SimulationEngine};
    pub use crate::grid::{Cell, Grid};
    pub use crate::level::{Level, LevelError};
    pub use crate::systems::{EventSink, FailureReason, NullSink, RunOutcome, RunResult, SimEvent};
}
