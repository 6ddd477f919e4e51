use crate::{InvalidMoveReason, TttMark, TttMatchResult};

pub const BOARD_CELLS: usize = 9;

/// Row-major cell triples that win the game.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TttBoard {
    cells: [Option<TttMark>; BOARD_CELLS],
}

impl TttBoard {
    pub fn new() -> Self {
        TttBoard {
            cells: [None; BOARD_CELLS],
        }
    }

    pub fn from_cells(cells: [Option<TttMark>; BOARD_CELLS]) -> Self {
        TttBoard { cells }
    }

    pub fn cells(&self) -> &[Option<TttMark>; BOARD_CELLS] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<TttMark> {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.is_none())
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    pub fn can_do_place(&self, index: usize) -> Result<(), InvalidMoveReason> {
        match self.cells.get(index) {
            None => Err(InvalidMoveReason::CellOutOfRange),
            Some(Some(_)) => Err(InvalidMoveReason::CellOccupied),
            Some(None) => Ok(()),
        }
    }

    pub fn do_place(&mut self, index: usize, mark: TttMark) -> Result<(), InvalidMoveReason> {
        self.can_do_place(index)?;
        self.cells[index] = Some(mark);
        Ok(())
    }

    pub fn check_for_line(&self) -> Option<TttMark> {
        WINNING_LINES.iter().find_map(|[a, b, c]| {
            let mark = self.cells[*a]?;
            (self.cells[*b] == Some(mark) && self.cells[*c] == Some(mark)).then_some(mark)
        })
    }

    /// A line wins before a full board counts as a draw.
    pub fn check_game_over(&self) -> Option<TttMatchResult> {
        if let Some(mark) = self.check_for_line() {
            Some(TttMatchResult::Win(mark))
        } else if self.is_full() {
            Some(TttMatchResult::Draw)
        } else {
            None
        }
    }
}
