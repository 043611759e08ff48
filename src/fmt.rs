use std::fmt;

use crate::{BoardState, Cell, Direction, MoveOutcome, Pos};

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pos, cell) in self.cells() {
            cell.fmt(f)?;
            if pos.col() + 1 == self.width() {
                "\n".fmt(f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_target = self.contains(Cell::TARGET);
        let ch = if self.contains(Cell::WALL) {
            "#"
        } else if self.contains(Cell::PLAYER) {
            if on_target {
                "P"
            } else {
                "p"
            }
        } else if self.contains(Cell::BOULDER) {
            if on_target {
                "B"
            } else {
                "b"
            }
        } else if on_target {
            "_"
        } else {
            "."
        };
        ch.fmt(f)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => "U".fmt(f),
            Direction::Down => "D".fmt(f),
            Direction::Left => "L".fmt(f),
            Direction::Right => "R".fmt(f),
        }
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveOutcome::Blocked => "blocked".fmt(f),
            MoveOutcome::Move(dest) => write!(f, "move to {dest}"),
            MoveOutcome::Push { boulder, to } => write!(f, "push {boulder} to {to}"),
        }
    }
}
