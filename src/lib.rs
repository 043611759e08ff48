use std::ops::Index;

use arrayvec::ArrayVec;
use bitflags::bitflags;

mod fmt;
mod parse;
pub mod solve;
pub mod tape;

pub use parse::LevelError;

bitflags! {
    /// Contents of one grid cell.
    ///
    /// The same bitset serves as the tag set of a level description, so a cell
    /// may be both a target and hold a boulder.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Cell: u8 {
        const BOULDER = 0x01;
        const WALL = 0x02;
        const TARGET = 0x04;
        const PLAYER = 0x08;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, derive_more::Error)]
#[display("Move is blocked")]
pub struct Blocked;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Unknown direction: {ch:?}")]
pub struct UnknownDirection {
    pub ch: char,
}

/// A `(row, col)` grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub u8, pub u8);

impl Pos {
    pub fn row(self) -> usize {
        self.0 as usize
    }

    pub fn col(self) -> usize {
        self.1 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Fixed expansion order used by move enumeration and the solver.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Row/column delta, not screen coordinates.
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

impl TryFrom<char> for Direction {
    type Error = UnknownDirection;

    fn try_from(ch: char) -> Result<Self, Self::Error> {
        Ok(match ch {
            'U' => Self::Up,
            'D' => Self::Down,
            'L' => Self::Left,
            'R' => Self::Right,
            _ => return Err(UnknownDirection { ch }),
        })
    }
}

/// Result of looking one step ahead of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum MoveOutcome {
    Blocked,
    Move(Pos),
    Push { boulder: Pos, to: Pos },
}

/// A snapshot of the puzzle: grid contents, player position and target set.
///
/// Equality and hashing are structural, which is what the solver's visited
/// set relies on. Targets are kept sorted so that two states with the same
/// target set always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardState {
    height: u8,
    width: u8,
    grid: Box<[Cell]>,
    player: Pos,
    targets: Box<[Pos]>,
}

impl Index<Pos> for BoardState {
    type Output = Cell;
    fn index(&self, pos: Pos) -> &Self::Output {
        &self.grid[self.offset(pos)]
    }
}

impl BoardState {
    fn offset(&self, pos: Pos) -> usize {
        pos.row() * self.width as usize + pos.col()
    }

    fn cell_mut(&mut self, pos: Pos) -> &mut Cell {
        let idx = self.offset(pos);
        &mut self.grid[idx]
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn player(&self) -> Pos {
        self.player
    }

    pub fn targets(&self) -> &[Pos] {
        &self.targets
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.0 < self.height && pos.1 < self.width
    }

    /// The cell at `pos`, or `None` if out of bounds.
    pub fn cell(&self, pos: Pos) -> Option<Cell> {
        self.in_bounds(pos).then(|| self[pos])
    }

    pub fn has_wall(&self, pos: Pos) -> bool {
        self.has(pos, Cell::WALL)
    }

    pub fn has_boulder(&self, pos: Pos) -> bool {
        self.has(pos, Cell::BOULDER)
    }

    pub fn has_target(&self, pos: Pos) -> bool {
        self.has(pos, Cell::TARGET)
    }

    pub fn has_player(&self, pos: Pos) -> bool {
        self.has(pos, Cell::PLAYER)
    }

    fn has(&self, pos: Pos, flag: Cell) -> bool {
        self.cell(pos).is_some_and(|cell| cell.contains(flag))
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Pos, Cell)> + '_ {
        let idx_iter = std::iter::successors(Some(Pos(0, 0)), |&Pos(x, y)| {
            Some(if y + 1 < self.width {
                Pos(x, y + 1)
            } else {
                Pos(x + 1, 0)
            })
        });
        idx_iter.zip(self.grid.iter().copied())
    }

    pub fn boulder_count(&self) -> usize {
        self.grid
            .iter()
            .filter(|cell| cell.contains(Cell::BOULDER))
            .count()
    }

    fn sibling_pos(&self, pos: Pos, dir: Direction) -> Option<Pos> {
        let (dx, dy) = dir.delta();
        let x = pos.0.checked_add_signed(dx)?;
        let y = pos.1.checked_add_signed(dy)?;
        if self.height <= x || self.width <= y {
            return None;
        }
        Some(Pos(x, y))
    }

    /// Classifies a step of the player in `dir` without touching the board.
    pub fn analyze(&self, dir: Direction) -> MoveOutcome {
        let Some(dest) = self.sibling_pos(self.player, dir) else {
            return MoveOutcome::Blocked;
        };
        let cell = self[dest];
        if cell.contains(Cell::WALL) {
            return MoveOutcome::Blocked;
        }
        if !cell.contains(Cell::BOULDER) {
            return MoveOutcome::Move(dest);
        }
        match self.sibling_pos(dest, dir) {
            Some(beyond) if !self[beyond].intersects(Cell::WALL | Cell::BOULDER) => {
                MoveOutcome::Push {
                    boulder: dest,
                    to: beyond,
                }
            }
            _ => MoveOutcome::Blocked,
        }
    }

    /// Directions that are not blocked, in [`Direction::ALL`] order.
    pub fn valid_moves(&self) -> ArrayVec<Direction, 4> {
        Direction::ALL
            .into_iter()
            .filter(|&dir| !self.analyze(dir).is_blocked())
            .collect()
    }

    /// Moves the player in place. Returns whether a boulder was pushed.
    pub fn go(&mut self, dir: Direction) -> Result<bool, Blocked> {
        let (dest, pushed) = match self.analyze(dir) {
            MoveOutcome::Blocked => return Err(Blocked),
            MoveOutcome::Move(dest) => (dest, false),
            MoveOutcome::Push { boulder, to } => {
                self.cell_mut(boulder).remove(Cell::BOULDER);
                self.cell_mut(to).insert(Cell::BOULDER);
                (boulder, true)
            }
        };
        let old = self.player;
        self.cell_mut(old).remove(Cell::PLAYER);
        self.cell_mut(dest).insert(Cell::PLAYER);
        self.player = dest;
        Ok(pushed)
    }

    /// The state after stepping in `dir`, or `None` if blocked. `self` is
    /// left untouched.
    pub fn apply(&self, dir: Direction) -> Option<Self> {
        let mut next = self.clone();
        next.go(dir).ok()?;
        Some(next)
    }

    /// Every target holds a boulder. Vacuously true without targets.
    pub fn is_victory(&self) -> bool {
        self.targets.iter().all(|&pos| self[pos].contains(Cell::BOULDER))
    }
}
