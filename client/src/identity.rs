//! Room seat memory: which participant this terminal was given in each room.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use duel_common::{ParticipantId, Room, RoomId};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid json: {0}")]
    Format(#[from] serde_json::Error),
}

pub struct SessionStore {
    path: Option<PathBuf>,
    seats: BTreeMap<RoomId, ParticipantId>,
}

impl SessionStore {
    /// Load the store from `path`; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let seats = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            seats,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            seats: BTreeMap::new(),
        }
    }

    pub fn save(&mut self, room_id: RoomId, participant: ParticipantId) -> Result<(), StoreError> {
        self.seats.insert(room_id, participant);
        self.persist()
    }

    pub fn restore(&self, room_id: RoomId) -> Option<ParticipantId> {
        self.seats.get(&room_id).copied()
    }

    pub fn clear(&mut self, room_id: RoomId) -> Result<(), StoreError> {
        if self.seats.remove(&room_id).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Drop the saved seat when a fresh room snapshot no longer lists it.
    ///
    /// Returns true when a removal happened.
    pub fn reconcile_room(&mut self, room: &Room) -> Result<bool, StoreError> {
        match self.restore(room.room_id) {
            Some(participant) if !room.contains(participant) => {
                warn!("participant {participant} no longer in room {}", room.room_id);
                self.clear(room.room_id)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&self.seats)?;
        fs::write(path, content)?;
        info!("saved {} room seats to {}", self.seats.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use duel_common::{RoomMember, RoomStatus};

    use super::*;

    /// Waiting room whose first member is the host
    pub fn room(room_id: RoomId, members: &[ParticipantId]) -> Room {
        Room {
            room_id,
            name: format!("Room {room_id}"),
            status: RoomStatus::Waiting,
            player_count: members.len() as u32,
            max_players: 4,
            players: members
                .iter()
                .map(|id| RoomMember {
                    id: *id,
                    name: format!("P{id}"),
                    is_ai: false,
                })
                .collect(),
            game_id: None,
            has_password: false,
            host_id: members.first().copied(),
        }
    }
}
