mod board;
mod game;

use std::fmt::Display;

pub use board::{BOARD_CELLS, TttBoard, WINNING_LINES};
pub use game::{MoveRecord, TttMatch};

pub type PlayerName = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TttMark {
    X,
    O,
}

impl TttMark {
    pub const ALL: [TttMark; 2] = [TttMark::X, TttMark::O];

    pub fn opponent(&self) -> TttMark {
        match self {
            TttMark::X => TttMark::O,
            TttMark::O => TttMark::X,
        }
    }

    /// Index of the player slot that plays this mark.
    pub fn seat(&self) -> usize {
        match self {
            TttMark::X => 0,
            TttMark::O => 1,
        }
    }

    pub fn from_seat(seat: usize) -> Option<TttMark> {
        match seat {
            0 => Some(TttMark::X),
            1 => Some(TttMark::O),
            _ => None,
        }
    }
}

impl Display for TttMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TttMark::X => write!(f, "X"),
            TttMark::O => write!(f, "O"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TttMatchResult {
    Win(TttMark),
    Draw,
}

impl TttMatchResult {
    pub fn winner(&self) -> Option<TttMark> {
        match self {
            TttMatchResult::Win(mark) => Some(*mark),
            TttMatchResult::Draw => None,
        }
    }
}

impl Display for TttMatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TttMatchResult::Win(mark) => write!(f, "{} wins", mark),
            TttMatchResult::Draw => write!(f, "draw"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TttMatchState {
    Waiting,
    InProgress,
    Finished(TttMatchResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidMoveReason {
    NotInProgress,
    CellOutOfRange,
    CellOccupied,
    NotYourTurn,
    NotAPlayer,
}

impl Display for InvalidMoveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            InvalidMoveReason::NotInProgress => "match is not in progress",
            InvalidMoveReason::CellOutOfRange => "cell index out of range",
            InvalidMoveReason::CellOccupied => "cell is already occupied",
            InvalidMoveReason::NotYourTurn => "it is not your turn",
            InvalidMoveReason::NotAPlayer => "you are not a player in this room",
        };
        write!(f, "{}", msg)
    }
}
