use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::{GameId, ParticipantId};

pub type RoomId = i64;

pub const MIN_ROOM_PLAYERS: u32 = 2;
pub const MAX_ROOM_PLAYERS: u32 = 10;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Full,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "waiting"),
            RoomStatus::Playing => write!(f, "playing"),
            RoomStatus::Full => write!(f, "full"),
        }
    }
}

/// Participant summary shown in a room before the game starts
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoomMember {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default)]
    pub is_ai: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub player_count: u32,
    pub max_players: u32,
    #[serde(default)]
    pub players: Vec<RoomMember>,
    #[serde(default)]
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default)]
    pub host_id: Option<ParticipantId>,
}

impl Room {
    /// Push channel carrying updates for this room
    pub fn channel(&self) -> String {
        room_channel(self.room_id)
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.players.iter().any(|p| p.id == participant)
    }

    pub fn is_host(&self, participant: ParticipantId) -> bool {
        self.host_id == Some(participant)
    }

    pub fn open_seats(&self) -> u32 {
        self.max_players.saturating_sub(self.player_count)
    }

    pub fn can_start(&self) -> bool {
        self.status != RoomStatus::Playing && self.player_count >= MIN_ROOM_PLAYERS
    }

    /// Linked game, once the room has moved on to playing
    pub fn active_game(&self) -> Option<&GameId> {
        match self.status {
            RoomStatus::Playing => self.game_id.as_ref(),
            _ => None,
        }
    }
}

pub const LOBBY_CHANNEL: &str = "lobby";

pub fn room_channel(room_id: RoomId) -> String {
    format!("room_{room_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_json() -> &'static str {
        r#"{
            "room_id": 123456,
            "name": "Lucky Tiger",
            "status": "playing",
            "player_count": 2,
            "max_players": 5,
            "has_password": true,
            "host_id": 11,
            "players": [
                {"id": 11, "name": "Ann", "is_ai": false, "is_alive": true, "pass_available": true, "reverse_available": true},
                {"id": 12, "name": "AI-7", "is_ai": true, "is_alive": true, "pass_available": true, "reverse_available": true}
            ],
            "game_id": "g-42"
        }"#
    }

    #[test]
    fn test_decode_room_ignores_game_fields() {
        let room: Room = serde_json::from_str(room_json()).unwrap();
        assert_eq!(room.players.len(), 2);
        assert!(room.players[1].is_ai);
        assert!(room.is_host(11));
        assert_eq!(room.open_seats(), 3);
        assert_eq!(room.channel(), "room_123456");
    }

    #[test]
    fn test_active_game_only_while_playing() {
        let mut room: Room = serde_json::from_str(room_json()).unwrap();
        assert_eq!(room.active_game().map(String::as_str), Some("g-42"));

        room.status = RoomStatus::Waiting;
        assert_eq!(room.active_game(), None);
        assert!(room.can_start());
    }
}
