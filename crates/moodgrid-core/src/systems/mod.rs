//! Systems - logic that operates on components

mod bridges;
mod events;
mod goal;
mod mood;
mod particles;
mod timers;

pub use bridges::*;
pub use events::*;
pub use goal::*;
pub use mood::*;
pub use particles::*;
pub use timers::*;

use rand::RngCore;

use crate::grid::Grid;

/// Shared state a system needs beyond the ECS world for one pass.
pub struct TickContext<'a> {
    pub grid: &'a Grid,
    pub bridges: &'a mut BridgeRegistry,
    pub timers: &'a mut TimerQueue,
    pub events: &'a mut dyn EventSink,
    pub goal: &'a mut GoalState,
    pub rng: &'a mut dyn RngCore,
    /// Simulation clock.
    pub now_ms: f64,
    pub joy_spread_delay_ms: f64,
}
