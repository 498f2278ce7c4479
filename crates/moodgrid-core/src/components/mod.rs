//! Component definitions for the ECS simulation.
//!
//! Components are plain data attached to entities. Pieces and particles both
//! carry a [`GridPos`]; the rules that move and gate them live in systems.

mod common;
mod particle;
mod piece;

pub use common::*;
pub use particle::*;
pub use piece::*;
