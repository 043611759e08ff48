use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::{BoardState, Cell, Pos};

/// Structural problems with a level description.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum LevelError {
    #[display("Level has no cells")]
    Empty,
    #[display("Row {row} has {len} cells, expecting {expected}")]
    RaggedRows {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[display("Level of {height}x{width} exceeds the 255x255 limit")]
    TooLarge { height: usize, width: usize },
    #[display("Missing player")]
    MissingPlayer,
    #[display("Multiple players at {first} and {second}")]
    MultiplePlayers { first: Pos, second: Pos },
    #[display("Wall at {pos} overlaps a boulder or the player")]
    Overlap { pos: Pos },
}

impl BoardState {
    /// Builds a state from rows of per-cell tag sets.
    pub fn from_tags<R: AsRef<[Cell]>>(rows: &[R]) -> Result<Self, LevelError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().len());
        if height == 0 || width == 0 {
            return Err(LevelError::Empty);
        }
        if height > u8::MAX as usize || width > u8::MAX as usize {
            return Err(LevelError::TooLarge { height, width });
        }

        let mut grid = Vec::with_capacity(height * width);
        let mut player = None;
        let mut targets = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(LevelError::RaggedRows {
                    row: i,
                    len: row.len(),
                    expected: width,
                });
            }
            for (j, &cell) in row.iter().enumerate() {
                let pos = Pos(i as _, j as _);
                if cell.contains(Cell::WALL) && cell.intersects(Cell::BOULDER | Cell::PLAYER) {
                    return Err(LevelError::Overlap { pos });
                }
                if cell.contains(Cell::PLAYER) {
                    if let Some(first) = player {
                        return Err(LevelError::MultiplePlayers { first, second: pos });
                    }
                    player = Some(pos);
                }
                if cell.contains(Cell::TARGET) {
                    targets.push(pos);
                }
                grid.push(cell);
            }
        }

        let player = player.ok_or(LevelError::MissingPlayer)?;
        if targets.is_empty() {
            log::warn!("Level has no targets and is solved from the start");
        }

        // Row-major collection keeps targets sorted and unique.
        Ok(BoardState {
            height: height as _,
            width: width as _,
            grid: grid.into(),
            player,
            targets: targets.into(),
        })
    }
}

fn parse_cell(ch: char) -> Result<Cell> {
    Ok(match ch {
        '.' => Cell::empty(),
        '#' => Cell::WALL,
        'b' => Cell::BOULDER,
        '_' => Cell::TARGET,
        'B' => Cell::BOULDER | Cell::TARGET,
        'p' => Cell::PLAYER,
        'P' => Cell::PLAYER | Cell::TARGET,
        _ => bail!("Invalid cell: {ch:?}"),
    })
}

impl FromStr for BoardState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s
            .trim()
            .lines()
            .zip(1..)
            .map(|(line, lineno)| {
                line.trim()
                    .chars()
                    .map(parse_cell)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Invalid line {lineno}"))
            })
            .collect::<Result<Vec<_>>>()?;
        BoardState::from_tags(&rows).context("Invalid level")
    }
}
