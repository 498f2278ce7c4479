//! The board: a fixed-size matrix of cells.
//!
//! The grid owns placement bookkeeping only. Piece state lives on ECS
//! entities; a cell holds the entity handle as a back-reference.

use hecs::Entity;
use thiserror::Error;

use crate::components::GridPos;

/// Contents of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Obstacle,
    Piece(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
}

/// `width × height` cells, row-major, origin at the bottom-left.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_valid(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPos) -> Result<usize, GridError> {
        if self.is_valid(pos) {
            Ok(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            Err(GridError::OutOfBounds { x: pos.x, y: pos.y })
        }
    }

    pub fn get(&self, pos: GridPos) -> Result<Cell, GridError> {
        self.index(pos).map(|i| self.cells[i])
    }

    pub fn set(&mut self, pos: GridPos, cell: Cell) -> Result<(), GridError> {
        let i = self.index(pos)?;
        self.cells[i] = cell;
        Ok(())
    }

    /// `false` for out-of-bounds coordinates.
    pub fn is_empty(&self, pos: GridPos) -> bool {
        matches!(self.get(pos), Ok(Cell::Empty))
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    /// Every coordinate with its cell, row by row from the bottom.
    pub fn iter(&self) -> impl Iterator<Item = (GridPos, Cell)> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().map(move |(i, cell)| {
            let pos = GridPos::new((i % width) as i32, (i / width) as i32);
            (pos, *cell)
        })
    }

    /// One line per row, top row first: `S` source, `G` goal, `X` obstacle,
    /// `#` any other piece, `.` empty.
    pub fn render_ascii(&self, kind_of: impl Fn(Entity) -> char) -> String {
        let mut out = String::new();
        for y in (0..self.height as i32).rev() {
            for x in 0..self.width as i32 {
                let glyph = match self.get(GridPos::new(x, y)) {
                    Ok(Cell::Empty) | Err(_) => '.',
                    Ok(Cell::Obstacle) => 'X',
                    Ok(Cell::Piece(entity)) => kind_of(entity),
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let grid = Grid::new(8, 6);
        assert!(grid.is_valid(GridPos::new(0, 0)));
        assert!(grid.is_valid(GridPos::new(7, 5)));
        assert!(!grid.is_valid(GridPos::new(8, 0)));
        assert!(!grid.is_valid(GridPos::new(0, 6)));
        assert!(!grid.is_valid(GridPos::new(-1, 3)));
        assert!(!grid.is_valid(GridPos::new(3, -1)));
    }

    #[test]
    fn test_get_rejects_out_of_bounds() {
        let grid = Grid::new(4, 4);
        assert_eq!(
            grid.get(GridPos::new(-1, 0)),
            Err(GridError::OutOfBounds { x: -1, y: 0 })
        );
        assert_eq!(grid.get(GridPos::new(2, 2)), Ok(Cell::Empty));
    }

    #[test]
    fn test_set_and_is_empty() {
        let mut grid = Grid::new(4, 4);
        let pos = GridPos::new(1, 2);
        assert!(grid.is_empty(pos));

        grid.set(pos, Cell::Obstacle).unwrap();
        assert!(!grid.is_empty(pos));
        assert_eq!(grid.get(pos), Ok(Cell::Obstacle));

        assert!(grid.set(GridPos::new(4, 0), Cell::Obstacle).is_err());
        assert!(!grid.is_empty(GridPos::new(4, 0)));
    }

    #[test]
    fn test_piece_cells_hold_entity() {
        let mut world = hecs::World::new();
        let entity = world.spawn((1u8,));
        let mut grid = Grid::new(3, 3);
        grid.set(GridPos::new(2, 1), Cell::Piece(entity)).unwrap();
        assert_eq!(grid.get(GridPos::new(2, 1)), Ok(Cell::Piece(entity)));

        grid.clear();
        assert!(grid.iter().all(|(_, cell)| cell == Cell::Empty));
    }

    #[test]
    fn test_render_ascii_top_row_first() {
        let mut grid = Grid::new(3, 2);
        grid.set(GridPos::new(0, 1), Cell::Obstacle).unwrap();
        let text = grid.render_ascii(|_| '#');
        assert_eq!(text, "X..\n...\n");
    }
}
