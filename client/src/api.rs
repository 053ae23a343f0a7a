//! Remote request/response operations.
//!
//! Every call either yields the decoded body or an [`ApiError`]; nothing here
//! touches local state. Views catch the error and turn it into a notice.

use duel_common::*;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("wrong room password")]
    WrongPassword,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected ({status}): {detail}")]
    Rejected { status: StatusCode, detail: String },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }

    // Game

    pub async fn start_game(&self, players: Vec<PlayerConfig>) -> ApiResult<Snapshot> {
        self.post("/game/start", &StartGameRequest { players }).await
    }

    pub async fn call_numbers(&self, game_id: &str, player_id: ParticipantId, numbers: Vec<i64>) -> ApiResult<CallResult> {
        let request = CallNumbersRequest {
            game_id: game_id.to_string(),
            player_id,
            numbers,
        };
        self.post("/game/call", &request).await
    }

    pub async fn pass(&self, game_id: &str, player_id: ParticipantId) -> ApiResult<PassResult> {
        let request = TurnRequest { game_id: game_id.to_string(), player_id };
        self.post("/game/pass", &request).await
    }

    pub async fn reverse(&self, game_id: &str, player_id: ParticipantId) -> ApiResult<ReverseResult> {
        let request = TurnRequest { game_id: game_id.to_string(), player_id };
        self.post("/game/reverse", &request).await
    }

    pub async fn game_status(&self, game_id: &str) -> ApiResult<Snapshot> {
        self.get(&format!("/game/status?game_id={game_id}")).await
    }

    pub async fn ai_action(&self, game_id: &str) -> ApiResult<ActionResult> {
        let url = format!("{}/game/ai-action?game_id={game_id}", self.base);
        debug!("POST {url}");
        let response = self.http.post(&url).send().await?;
        decode(response).await
    }

    // Stats

    pub async fn leaderboard(&self, limit: u32) -> ApiResult<Vec<LeaderboardEntry>> {
        let body: LeaderboardResponse = self.get(&format!("/stats/leaderboard?limit={limit}")).await?;
        Ok(body.leaderboard)
    }

    pub async fn player_stats(&self, username: &str) -> ApiResult<PlayerStats> {
        self.get(&format!("/stats/player/{username}")).await
    }

    pub async fn game_details(&self, game_id: &str) -> ApiResult<GameDetails> {
        self.get(&format!("/stats/game/{game_id}")).await
    }

    // Rooms

    pub async fn list_rooms(&self) -> ApiResult<Vec<Room>> {
        let body: RoomListResponse = self.get("/rooms").await?;
        Ok(body.rooms)
    }

    pub async fn get_room(&self, room_id: RoomId) -> ApiResult<Room> {
        self.get(&format!("/rooms/{room_id}")).await
    }

    pub async fn create_room(&self, max_players: u32, password: Option<String>, player_name: &str) -> ApiResult<RoomSeatResponse> {
        let request = CreateRoomRequest {
            max_players,
            password,
            player_name: player_name.to_string(),
        };
        self.post("/rooms/create", &request).await
    }

    pub async fn join_room(&self, room_id: RoomId, player_name: &str, is_ai: bool, password: Option<String>) -> ApiResult<RoomSeatResponse> {
        let request = JoinRoomRequest {
            player_name: player_name.to_string(),
            is_ai,
            password,
        };
        self.post(&format!("/rooms/{room_id}/join"), &request).await
    }

    pub async fn leave_room(&self, room_id: RoomId, player_id: ParticipantId) -> ApiResult<LeaveRoomResponse> {
        self.post(&format!("/rooms/{room_id}/leave_action"), &LeaveRoomRequest { player_id }).await
    }

    pub async fn start_room(&self, room_id: RoomId) -> ApiResult<StartRoomResponse> {
        let url = format!("{}/rooms/{room_id}/start", self.base);
        debug!("POST {url}");
        let response = self.http.post(&url).send().await?;
        decode(response).await
    }

    pub async fn update_room_settings(&self, room_id: RoomId, host_id: ParticipantId, max_players: u32) -> ApiResult<Room> {
        let request = UpdateRoomSettingsRequest { host_id, max_players };
        self.post(&format!("/rooms/{room_id}/settings"), &request).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = format!("{}{path}", self.base);
        debug!("GET {url}");
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let url = format!("{}{path}", self.base);
        debug!("POST {url}");
        let response = self.http.post(&url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message())
        .unwrap_or(text);
    warn!("request rejected: {status} {detail}");
    Err(classify(status, detail))
}

fn classify(status: StatusCode, detail: String) -> ApiError {
    match status {
        StatusCode::FORBIDDEN => ApiError::WrongPassword,
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        _ => ApiError::Rejected { status, detail },
    }
}
