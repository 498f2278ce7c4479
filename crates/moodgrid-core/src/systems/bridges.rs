//! Bridges laid by calm energy over obstacles and open ground.
//!
//! A bridge makes its cell passable for any particle until it expires. At
//! most one active bridge exists per cell.

use serde::{Deserialize, Serialize};

use crate::components::GridPos;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    pub pos: GridPos,
    pub created_at_ms: f64,
    pub expires_at_ms: f64,
}

impl Bridge {
    pub fn is_active(&self, now_ms: f64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeRegistry {
    bridges: Vec<Bridge>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay a bridge unless an active one already covers `pos`.
    /// Returns `true` when a new bridge was created.
    pub fn create(&mut self, pos: GridPos, now_ms: f64, duration_ms: f64) -> bool {
        if self.is_bridged(pos, now_ms) {
            return false;
        }
        self.bridges.push(Bridge {
            pos,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + duration_ms,
        });
        true
    }

    pub fn is_bridged(&self, pos: GridPos, now_ms: f64) -> bool {
        self.bridges
            .iter()
            .any(|b| b.pos == pos && b.is_active(now_ms))
    }

    /// Drop expired bridges, returning where they were.
    pub fn expire(&mut self, now_ms: f64) -> Vec<GridPos> {
        let mut expired = Vec::new();
        self.bridges.retain(|b| {
            if b.is_active(now_ms) {
                true
            } else {
                expired.push(b.pos);
                false
            }
        });
        expired
    }

    pub fn clear(&mut self) {
        self.bridges.clear();
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bridge> {
        self.bridges.iter()
    }
}
