use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub type ParticipantId = i64;
pub type GameId = String;

/// Participant as seen inside a running game
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub is_ai: bool,
    #[serde(default = "default_true")]
    pub pass_available: bool,
    #[serde(default = "default_true")]
    pub reverse_available: bool,
}

fn default_true() -> bool {
    true
}

/// Authoritative game view as last received from the server.
///
/// `called_numbers` is a set on the server side, so its order on the wire
/// carries no meaning. Use [`Snapshot::called_set`] when comparing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub game_id: GameId,
    pub current_round: u32,
    pub current_player: ParticipantId,
    pub number_range: (i64, i64),
    #[serde(default)]
    pub called_numbers: Vec<i64>,
    pub players: Vec<Player>,
    pub direction: i32,
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,
}

impl Snapshot {
    pub fn low(&self) -> i64 {
        self.number_range.0
    }

    pub fn high(&self) -> i64 {
        self.number_range.1
    }

    pub fn called_set(&self) -> BTreeSet<i64> {
        self.called_numbers.iter().copied().collect()
    }

    pub fn is_called(&self, number: i64) -> bool {
        self.called_numbers.contains(&number)
    }

    /// Highest number called so far, if any
    pub fn max_called(&self) -> Option<i64> {
        self.called_numbers.iter().copied().max()
    }

    /// The only number a fresh selection may start from
    pub fn next_in_sequence(&self) -> i64 {
        match self.max_called() {
            Some(max) => max + 1,
            None => self.low(),
        }
    }

    pub fn player(&self, id: ParticipantId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn current(&self) -> Option<&Player> {
        self.player(self.current_player)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn winner_player(&self) -> Option<&Player> {
        self.winner.and_then(|id| self.player(id))
    }

    pub fn is_clockwise(&self) -> bool {
        self.direction >= 0
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl Difficulty {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Seat configuration for a locally started game
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub name: String,
    #[serde(default)]
    pub is_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl PlayerConfig {
    pub fn human(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_ai: false,
            difficulty: None,
        }
    }

    pub fn automated(name: &str, difficulty: Difficulty) -> Self {
        Self {
            name: name.to_string(),
            is_ai: true,
            difficulty: Some(difficulty),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_next_in_sequence_starts_at_low() {
        let state = snapshot(&[]);
        assert_eq!(state.next_in_sequence(), 1);
    }

    #[test]
    fn test_next_in_sequence_follows_highest_called() {
        let state = snapshot(&[3, 1, 2]);
        assert_eq!(state.next_in_sequence(), 4);
    }

    #[test]
    fn test_decode_server_status() {
        let json = r#"{
            "game_id": "abc",
            "current_round": 2,
            "current_player": 7,
            "number_range": [5, 30],
            "called_numbers": [5, 6],
            "players": [
                {"id": 7, "name": "A", "is_ai": false, "is_alive": true, "pass_available": false, "reverse_available": true},
                {"id": 9, "name": "B", "is_ai": true, "is_alive": false, "pass_available": true, "reverse_available": true}
            ],
            "direction": -1,
            "game_over": false,
            "winner": null
        }"#;
        let state: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(state.number_range, (5, 30));
        assert_eq!(state.winner, None);
        assert!(!state.current().unwrap().pass_available);
        assert_eq!(state.alive_players().count(), 1);
        assert!(!state.is_clockwise());
    }

    #[test]
    fn test_player_config_omits_missing_difficulty() {
        let json = serde_json::to_string(&PlayerConfig::human("Ann")).unwrap();
        assert_eq!(json, r#"{"name":"Ann","is_ai":false}"#);
    }
}
