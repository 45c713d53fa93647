//! Playfield: fixed-size grid of single-cell tiles. y=0 is the spawn row (top).
//!
//! The store does no bounds checking of its own. Coordinates must lie inside
//! `[0, width) × [0, height)`; the game only ever produces such coordinates.

use rand::Rng;

/// Block colours. The LED matrix and the console both map these to real colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileColor {
    Red,
    Green,
    Blue,
    Magenta,
    Cyan,
    Yellow,
}

impl TileColor {
    pub const ALL: [Self; 6] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::Yellow,
    ];

    /// Uniformly random palette entry.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Index 0..6, used for theme lookup.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Column/row address on the playfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Single cell. An unoccupied cell never carries a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub occupied: bool,
    pub color: Option<TileColor>,
}

impl Cell {
    pub const EMPTY: Self = Self {
        occupied: false,
        color: None,
    };
}

/// Row-major flat buffer; `cells[y * width + x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playfield {
    pub width: usize,
    pub height: usize,
    cells: Vec<Cell>,
}

impl Playfield {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; width * height],
        }
    }

    #[inline]
    fn index(&self, at: Coord) -> usize {
        debug_assert!(at.x < self.width && at.y < self.height, "cell {at:?} off the playfield");
        at.y * self.width + at.x
    }

    #[inline]
    fn row_range(&self, y: usize) -> std::ops::Range<usize> {
        debug_assert!(y < self.height, "row {y} off the playfield");
        let start = y * self.width;
        start..start + self.width
    }

    /// Index of the landing row.
    #[inline]
    pub fn bottom(&self) -> usize {
        self.height - 1
    }

    #[inline]
    pub fn cell(&self, at: Coord) -> Cell {
        self.cells[self.index(at)]
    }

    /// One row as a slice, left to right.
    #[inline]
    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[self.row_range(y)]
    }

    /// Rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks_exact(self.width)
    }

    /// Mark a cell occupied with the given colour (`None` for monochrome).
    pub fn place(&mut self, at: Coord, color: Option<TileColor>) {
        let i = self.index(at);
        self.cells[i] = Cell {
            occupied: true,
            color,
        };
    }

    pub fn copy_cell(&mut self, to: Coord, from: Coord) {
        let (t, f) = (self.index(to), self.index(from));
        self.cells[t] = self.cells[f];
    }

    pub fn copy_row(&mut self, to: usize, from: usize) {
        let src = self.row_range(from);
        let dst = self.row_range(to);
        self.cells.copy_within(src, dst.start);
    }

    pub fn clear_cell(&mut self, at: Coord) {
        let i = self.index(at);
        self.cells[i] = Cell::EMPTY;
    }

    pub fn clear_row(&mut self, y: usize) {
        let range = self.row_range(y);
        self.cells[range].fill(Cell::EMPTY);
    }

    #[inline]
    pub fn is_occupied(&self, at: Coord) -> bool {
        self.cell(at).occupied
    }

    pub fn is_row_full(&self, y: usize) -> bool {
        self.row(y).iter().all(|c| c.occupied)
    }

    pub fn reset_all(&mut self) {
        for y in 0..self.height {
            self.clear_row(y);
        }
    }

    /// Number of occupied cells on the whole board.
    #[cfg(test)]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_new_is_empty() {
        let pf = Playfield::new(8, 8);
        assert_eq!(pf.occupied_count(), 0);
        assert_eq!(pf.rows().count(), 8);
        assert!(pf.rows().all(|r| r.len() == 8));
    }

    #[test]
    fn test_place_and_clear_cell() {
        let mut pf = Playfield::new(8, 8);
        let at = Coord::new(3, 5);
        pf.place(at, Some(TileColor::Cyan));
        assert!(pf.is_occupied(at));
        assert_eq!(pf.cell(at).color, Some(TileColor::Cyan));
        pf.clear_cell(at);
        assert_eq!(pf.cell(at), Cell::EMPTY);
    }

    #[test]
    fn test_copy_cell_keeps_colour() {
        let mut pf = Playfield::new(4, 4);
        pf.place(Coord::new(1, 1), Some(TileColor::Magenta));
        pf.copy_cell(Coord::new(2, 1), Coord::new(1, 1));
        assert_eq!(pf.cell(Coord::new(2, 1)), pf.cell(Coord::new(1, 1)));
    }

    #[test]
    fn test_row_full_and_copy_row() {
        let mut pf = Playfield::new(3, 4);
        for x in 0..3 {
            pf.place(Coord::new(x, 3), Some(TileColor::Red));
        }
        assert!(pf.is_row_full(3));
        assert!(!pf.is_row_full(2));
        pf.place(Coord::new(1, 2), Some(TileColor::Blue));
        pf.copy_row(3, 2);
        assert!(!pf.is_row_full(3));
        assert!(pf.is_occupied(Coord::new(1, 3)));
        assert_eq!(pf.row(3), pf.row(2));
        pf.clear_row(2);
        assert!(pf.row(2).iter().all(|c| *c == Cell::EMPTY));
    }

    #[test]
    fn test_reset_all() {
        let mut pf = Playfield::new(5, 5);
        pf.place(Coord::new(0, 0), None);
        pf.place(Coord::new(4, 4), Some(TileColor::Yellow));
        pf.reset_all();
        assert_eq!(pf.occupied_count(), 0);
    }

    #[test]
    fn test_random_colour_covers_palette() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 6];
        for _ in 0..500 {
            seen[TileColor::random(&mut rng).index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
