//! Level descriptors.
//!
//! A level arrives fully resolved from whoever loads it; this module only
//! describes its shape and checks that it fits on the board.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{Connections, GridPos, PieceKind};
use crate::energy::EnergyKind;
use crate::grid::GridError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("{what} at ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        what: String,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    #[error("more than one occupant at ({x}, {y})")]
    Overlap { x: i32, y: i32 },
    #[error("pre-placed piece at ({x}, {y}) cannot be a {kind:?}")]
    AnchorPrePlaced { kind: PieceKind, x: i32, y: i32 },
    #[error("this level requires {0} energy")]
    ForcedEnergy(EnergyKind),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Position of the source or goal, with an optional connection override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub connections: Option<Connections>,
}

impl Anchor {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

/// A piece the level puts on the board; the player cannot move it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrePlaced {
    #[serde(alias = "type")]
    pub kind: PieceKind,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub connections: Option<Connections>,
}

impl PrePlaced {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub name: String,
    pub source: Anchor,
    pub goal: Anchor,
    #[serde(default)]
    pub obstacles: Vec<[i32; 2]>,
    #[serde(default)]
    pub pre_placed: Vec<PrePlaced>,
    #[serde(default)]
    pub forced_energy_type: Option<EnergyKind>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Level {
    pub fn obstacle_positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.obstacles.iter().map(|[x, y]| GridPos::new(*x, *y))
    }

    /// Check every occupant is on the board and no two share a cell.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), LevelError> {
        let mut seen = HashSet::new();
        let mut claim = |what: &str, pos: GridPos| -> Result<(), LevelError> {
            let on_board =
                pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < width && (pos.y as u32) < height;
            if !on_board {
                return Err(LevelError::OutOfBounds {
                    what: what.to_string(),
                    x: pos.x,
                    y: pos.y,
                    width,
                    height,
                });
            }
            if !seen.insert(pos) {
                return Err(LevelError::Overlap { x: pos.x, y: pos.y });
            }
            Ok(())
        };

        claim("source", self.source.pos())?;
        claim("goal", self.goal.pos())?;
        for pos in self.obstacle_positions() {
            claim("obstacle", pos)?;
        }
        for piece in &self.pre_placed {
            if piece.kind.is_anchor() {
                return Err(LevelError::AnchorPrePlaced {
                    kind: piece.kind,
                    x: piece.x,
                    y: piece.y,
                });
            }
            claim("pre-placed piece", piece.pos())?;
        }
        Ok(())
    }
}
