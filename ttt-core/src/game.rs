use crate::{
    InvalidMoveReason, PlayerName, TttMark, TttMatchResult, TttMatchState, board::TttBoard,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub mark: TttMark,
    pub cell: usize,
    pub result: Option<TttMatchResult>,
}

/// Seats, board and turn of a single room. Seat 0 plays X, seat 1 plays O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TttMatch {
    players: [Option<PlayerName>; 2],
    board: TttBoard,
    current_player: TttMark,
    result: Option<TttMatchResult>,
}

impl Default for TttMatch {
    fn default() -> Self {
        Self::new()
    }
}

impl TttMatch {
    pub fn new() -> Self {
        TttMatch {
            players: [None, None],
            board: TttBoard::new(),
            current_player: TttMark::X,
            result: None,
        }
    }

    pub fn from_parts(
        players: [Option<PlayerName>; 2],
        board: TttBoard,
        current_player: TttMark,
        result: Option<TttMatchResult>,
    ) -> Self {
        TttMatch {
            players,
            board,
            current_player,
            result,
        }
    }

    pub fn players(&self) -> &[Option<PlayerName>; 2] {
        &self.players
    }

    pub fn player(&self, mark: TttMark) -> Option<&PlayerName> {
        self.players[mark.seat()].as_ref()
    }

    pub fn board(&self) -> &TttBoard {
        &self.board
    }

    pub fn current_player(&self) -> TttMark {
        self.current_player
    }

    pub fn result(&self) -> Option<TttMatchResult> {
        self.result
    }

    pub fn state(&self) -> TttMatchState {
        if let Some(result) = self.result {
            TttMatchState::Finished(result)
        } else if self.players.iter().all(|p| p.is_some()) {
            TttMatchState::InProgress
        } else {
            TttMatchState::Waiting
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn mark_of(&self, username: &str) -> Option<TttMark> {
        self.players
            .iter()
            .position(|p| p.as_deref() == Some(username))
            .and_then(TttMark::from_seat)
    }

    pub fn has_free_seat(&self) -> bool {
        self.players.iter().any(|p| p.is_none())
    }

    /// Seats the player in the first free slot.
    pub fn take_seat(&mut self, username: PlayerName) -> Option<TttMark> {
        let seat = self.players.iter().position(|p| p.is_none())?;
        self.players[seat] = Some(username);
        TttMark::from_seat(seat)
    }

    /// Frees the player's slot. Board and turn are left as they are.
    pub fn release_seat(&mut self, username: &str) -> Option<TttMark> {
        let mark = self.mark_of(username)?;
        self.players[mark.seat()] = None;
        Some(mark)
    }

    pub fn can_apply_move(
        &self,
        username: &str,
        cell: usize,
    ) -> Result<TttMark, InvalidMoveReason> {
        if self.state() != TttMatchState::InProgress {
            return Err(InvalidMoveReason::NotInProgress);
        }
        let Some(mark) = self.mark_of(username) else {
            return Err(InvalidMoveReason::NotAPlayer);
        };
        if mark != self.current_player {
            return Err(InvalidMoveReason::NotYourTurn);
        }
        self.board.can_do_place(cell)?;
        Ok(mark)
    }

    pub fn apply_move(
        &mut self,
        username: &str,
        cell: usize,
    ) -> Result<MoveRecord, InvalidMoveReason> {
        let mark = self.can_apply_move(username, cell)?;
        self.board.do_place(cell, mark)?;
        self.current_player = mark.opponent();
        self.result = self.board.check_game_over();
        Ok(MoveRecord {
            mark,
            cell,
            result: self.result,
        })
    }

    /// Starts a fresh match with the same seats.
    pub fn reset(&mut self) {
        self.board = TttBoard::new();
        self.current_player = TttMark::X;
        self.result = None;
    }
}
