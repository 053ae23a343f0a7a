use serde::{Deserialize, Serialize};

use crate::game::{GameId, ParticipantId, PlayerConfig, Snapshot};
use crate::room::{Room, RoomId, RoomMember};

// Game endpoints

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StartGameRequest {
    pub players: Vec<PlayerConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CallNumbersRequest {
    pub game_id: GameId,
    pub player_id: ParticipantId,
    pub numbers: Vec<i64>,
}

/// Body shared by the pass and reverse endpoints
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TurnRequest {
    pub game_id: GameId,
    pub player_id: ParticipantId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CallResult {
    pub success: bool,
    pub hit_secret: bool,
    #[serde(default)]
    pub eliminated_player: Option<ParticipantId>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub next_player: Option<ParticipantId>,
    #[serde(default)]
    pub called_numbers: Vec<i64>,
    #[serde(default)]
    pub winner: Option<ParticipantId>,
    #[serde(default)]
    pub new_range: Option<(i64, i64)>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PassResult {
    pub success: bool,
    pub next_player: ParticipantId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReverseResult {
    pub success: bool,
    pub new_direction: i32,
    #[serde(default)]
    pub next_player: Option<ParticipantId>,
}

/// Outcome of a server-driven automated turn.
///
/// The endpoint answers with one of three shapes and no tag, so variants are
/// listed most specific first: a call always carries `hit_secret`, a reverse
/// always carries `new_direction`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ActionResult {
    Call(CallResult),
    Reverse(ReverseResult),
    Pass(PassResult),
}

impl ActionResult {
    pub fn is_accepted(&self) -> bool {
        match self {
            ActionResult::Call(r) => r.success,
            ActionResult::Reverse(r) => r.success,
            ActionResult::Pass(r) => r.success,
        }
    }
}

// Room endpoints

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoomListResponse {
    pub rooms: Vec<Room>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateRoomRequest {
    pub max_players: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub player_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JoinRoomRequest {
    pub player_name: String,
    pub is_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Returned by both create and join: the room plus the seat assigned to us
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoomSeatResponse {
    pub room: Room,
    pub player: RoomMember,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LeaveRoomRequest {
    pub player_id: ParticipantId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LeaveRoomResponse {
    pub success: bool,
    #[serde(default)]
    pub room: Option<Room>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StartRoomResponse {
    pub success: bool,
    pub game_id: GameId,
    pub room_id: RoomId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateRoomSettingsRequest {
    pub host_id: ParticipantId,
    pub max_players: u32,
}

/// Error body produced by the server on non-2xx responses
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// Push channel messages

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum PushMessage {
    #[serde(rename = "room_update")]
    RoomUpdate { room: Room },

    #[serde(rename = "refresh")]
    Refresh,

    #[serde(rename = "game_started")]
    GameStarted {
        game_id: GameId,
        #[serde(default)]
        room: Option<Room>,
    },

    #[serde(rename = "game_update")]
    GameUpdate { game: Snapshot },
}

impl PushMessage {
    /// Decode an inbound frame. Unknown tags and malformed bodies are errors.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// Stats endpoints

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub total_games: i64,
    pub total_wins: i64,
    pub total_losses: i64,
    pub win_rate: f64,
    #[serde(default)]
    pub is_ai: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecentGame {
    pub game_id: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub eliminated_round: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PlayerStats {
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub total_games: i64,
    pub total_wins: i64,
    pub total_losses: i64,
    pub win_rate: f64,
    #[serde(default)]
    pub is_ai: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub recent_games: Vec<RecentGame>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GameParticipant {
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub eliminated_round: Option<i64>,
    #[serde(default)]
    pub total_calls: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActionRecord {
    pub round: i64,
    pub player_id: ParticipantId,
    pub action: String,
    #[serde(default)]
    pub numbers: Option<Vec<i64>>,
    #[serde(default)]
    pub hit_secret: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GameDetails {
    pub game_id: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_rounds: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub participants: Vec<GameParticipant>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}
