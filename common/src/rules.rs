//! Client-side legality of an in-progress move.
//!
//! Everything here is advisory: the server owns the real rules and always
//! wins on conflict. These checks only exist so an illegal move never costs a
//! round trip. All functions are pure and leave their inputs untouched when
//! they reject.

use std::fmt;

use crate::game::{ParticipantId, Player, Snapshot};

/// Maximum amount of numbers a single call may contain
pub const MAX_SELECTION: usize = 3;

/// Who this terminal plays for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalIdentity {
    /// A single seat in a networked room
    Seat(ParticipantId),
    /// Every human seat of a locally started game
    HotSeat,
}

impl LocalIdentity {
    pub fn controls(&self, player: &Player) -> bool {
        if player.is_ai {
            return false;
        }
        match self {
            LocalIdentity::Seat(id) => *id == player.id,
            LocalIdentity::HotSeat => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveError {
    GameOver,
    NotYourTurn,
    AutomatedTurn,
    AlreadyCalled(i64),
    OutOfRange(i64),
    NotNextInSequence { expected: i64, got: i64 },
    NotConsecutive { expected: i64, got: i64 },
    SelectionFull,
    NotLastSelected { last: i64, got: i64 },
    NotSelected(i64),
    EmptySelection,
    PassSpent,
    ReverseSpent,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::GameOver => write!(f, "The game is over"),
            MoveError::NotYourTurn => write!(f, "It is not your turn"),
            MoveError::AutomatedTurn => write!(f, "An automated player is taking its turn"),
            MoveError::AlreadyCalled(n) => write!(f, "{n} has already been called"),
            MoveError::OutOfRange(n) => write!(f, "{n} is outside the playable range"),
            MoveError::NotNextInSequence { expected, got } => {
                write!(f, "You must start from {expected}, not {got}")
            }
            MoveError::NotConsecutive { expected, got } => {
                write!(f, "Only consecutive numbers: next is {expected}, not {got}")
            }
            MoveError::SelectionFull => write!(f, "At most {MAX_SELECTION} numbers per call"),
            MoveError::NotLastSelected { last, got } => {
                write!(f, "Remove {last} before {got}")
            }
            MoveError::NotSelected(n) => write!(f, "{n} is not selected"),
            MoveError::EmptySelection => write!(f, "Select at least one number"),
            MoveError::PassSpent => write!(f, "Pass has already been used"),
            MoveError::ReverseSpent => write!(f, "Reverse has already been used"),
        }
    }
}

impl std::error::Error for MoveError {}

/// What a toggle on a number did to the selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Added(i64),
    Removed(i64),
}

/// Numbers the player has picked but not yet submitted.
///
/// Always strictly increasing and consecutive, never longer than
/// [`MAX_SELECTION`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    numbers: Vec<i64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numbers(&self) -> &[i64] {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn last(&self) -> Option<i64> {
        self.numbers.last().copied()
    }

    pub fn contains(&self, number: i64) -> bool {
        self.numbers.contains(&number)
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
    }

    /// The number that would legally extend this selection
    pub fn extension(&self, snapshot: &Snapshot) -> i64 {
        match self.last() {
            Some(last) => last + 1,
            None => start_of_sequence(snapshot),
        }
    }

    /// Check that `number` may be appended, without appending it
    pub fn check_select(&self, snapshot: &Snapshot, number: i64) -> Result<(), MoveError> {
        if snapshot.is_called(number) {
            return Err(MoveError::AlreadyCalled(number));
        }
        if self.numbers.len() >= MAX_SELECTION {
            return Err(MoveError::SelectionFull);
        }
        let expected = self.extension(snapshot);
        if number != expected {
            return Err(if self.is_empty() {
                MoveError::NotNextInSequence { expected, got: number }
            } else {
                MoveError::NotConsecutive { expected, got: number }
            });
        }
        if number < snapshot.low() || number > snapshot.high() {
            return Err(MoveError::OutOfRange(number));
        }
        Ok(())
    }

    pub fn select(&mut self, snapshot: &Snapshot, number: i64) -> Result<(), MoveError> {
        self.check_select(snapshot, number)?;
        self.numbers.push(number);
        Ok(())
    }

    /// Remove `number`; only the most recently added one may go
    pub fn deselect(&mut self, number: i64) -> Result<(), MoveError> {
        match self.last() {
            Some(last) if last == number => {
                self.numbers.pop();
                Ok(())
            }
            Some(last) if self.contains(number) => Err(MoveError::NotLastSelected { last, got: number }),
            _ => Err(MoveError::NotSelected(number)),
        }
    }

    /// Single intent for a number cell: remove if it is the last pick, add otherwise
    pub fn toggle(&mut self, snapshot: &Snapshot, number: i64) -> Result<Toggle, MoveError> {
        if self.contains(number) {
            self.deselect(number)?;
            Ok(Toggle::Removed(number))
        } else {
            self.select(snapshot, number)?;
            Ok(Toggle::Added(number))
        }
    }

    /// Whether toggling `number` right now would succeed
    pub fn is_eligible(&self, snapshot: &Snapshot, number: i64) -> bool {
        self.last() == Some(number) || self.check_select(snapshot, number).is_ok()
    }

    /// Every number in the interval that a toggle would currently accept
    pub fn eligible_numbers(&self, snapshot: &Snapshot) -> Vec<i64> {
        (snapshot.low()..=snapshot.high())
            .filter(|n| self.is_eligible(snapshot, *n))
            .collect()
    }
}

fn start_of_sequence(snapshot: &Snapshot) -> i64 {
    snapshot.next_in_sequence().max(snapshot.low())
}

/// The participant whose turn it is, if this terminal may act for them
pub fn check_turn<'a>(snapshot: &'a Snapshot, identity: &LocalIdentity) -> Result<&'a Player, MoveError> {
    if snapshot.game_over {
        return Err(MoveError::GameOver);
    }
    let current = snapshot.current().ok_or(MoveError::NotYourTurn)?;
    if current.is_ai {
        return Err(MoveError::AutomatedTurn);
    }
    if !identity.controls(current) {
        return Err(MoveError::NotYourTurn);
    }
    Ok(current)
}

/// Validate a call and return the acting participant with the numbers to send
pub fn check_submit(
    snapshot: &Snapshot,
    identity: &LocalIdentity,
    selection: &Selection,
) -> Result<(ParticipantId, Vec<i64>), MoveError> {
    let player = check_turn(snapshot, identity)?;
    if selection.is_empty() {
        return Err(MoveError::EmptySelection);
    }
    // The snapshot may have moved on since the numbers were picked
    let mut replay = Selection::new();
    for number in selection.numbers() {
        replay.select(snapshot, *number)?;
    }
    Ok((player.id, replay.numbers))
}

pub fn check_pass(snapshot: &Snapshot, identity: &LocalIdentity) -> Result<ParticipantId, MoveError> {
    let player = check_turn(snapshot, identity)?;
    if !player.pass_available {
        return Err(MoveError::PassSpent);
    }
    Ok(player.id)
}

pub fn check_reverse(snapshot: &Snapshot, identity: &LocalIdentity) -> Result<ParticipantId, MoveError> {
    let player = check_turn(snapshot, identity)?;
    if !player.reverse_available {
        return Err(MoveError::ReverseSpent);
    }
    Ok(player.id)
}

/// Everything the local player may do right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedActions {
    pub numbers: Vec<i64>,
    pub submit: bool,
    pub pass: bool,
    pub reverse: bool,
}

pub fn allowed_actions(snapshot: &Snapshot, identity: &LocalIdentity, selection: &Selection) -> AllowedActions {
    let my_turn = check_turn(snapshot, identity).is_ok();
    AllowedActions {
        numbers: if my_turn { selection.eligible_numbers(snapshot) } else { Vec::new() },
        submit: check_submit(snapshot, identity, selection).is_ok(),
        pass: check_pass(snapshot, identity).is_ok(),
        reverse: check_reverse(snapshot, identity).is_ok(),
    }
}
