//! Room waiting view.
//!
//! Seeded with `GET /rooms/{id}` and kept current by the room's push
//! channel. The saved seat is checked against every fresh room snapshot so a
//! kick or room reset drops us back to the unjoined view.

use colored::*;
use duel_common::*;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::board::{self, BoardOptions};
use crate::identity::{SessionStore, StoreError};
use crate::multiplexer::ChannelFeed;
use crate::state::SessionState;
use crate::ui::*;

enum Event {
    Line(Option<String>),
    Push(PushMessage),
}

struct RoomView {
    room: Room,
    seat: Option<ParticipantId>,
    notice: Option<Notice>,
    /// Game already entered from this view, so a late `game_started` is ignored
    played: Option<GameId>,
}

pub async fn open_room(session: &mut SessionState, room_id: RoomId) -> Result<(), Box<dyn std::error::Error>> {
    let mut feed = ChannelFeed::open(&session.push, &room_channel(room_id));
    let result = run(session, room_id, &mut feed).await;
    feed.close();
    result
}

async fn run(
    session: &mut SessionState,
    room_id: RoomId,
    feed: &mut ChannelFeed,
) -> Result<(), Box<dyn std::error::Error>> {
    let room = match session.api.get_room(room_id).await {
        Ok(room) => room,
        Err(ApiError::NotFound(_)) => {
            session.seats.clear(room_id)?;
            return Err(format!("Room {room_id} does not exist").into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut view = RoomView {
        seat: session.seats.restore(room_id),
        room,
        notice: None,
        played: None,
    };
    view.check_seat(&mut session.seats)?;

    if let (Some(game_id), Some(_)) = (view.room.active_game().cloned(), view.seat) {
        view.notice = Some(Notice::info("Rejoining the game in progress"));
        view.enter_game(session, game_id).await?;
    }

    loop {
        view.render()?;
        session.input.request("> ");

        let event = tokio::select! {
            line = session.input.next() => Event::Line(line),
            message = feed.recv() => Event::Push(message),
        };

        match event {
            Event::Line(None) => return Ok(()),
            Event::Line(Some(line)) => {
                if line == "q" {
                    return Ok(());
                }
                view.command(session, &line).await?;
            }
            Event::Push(message) => view.on_push(session, message).await?,
        }
    }
}

impl RoomView {
    fn is_host(&self) -> bool {
        self.seat.is_some_and(|seat| self.room.is_host(seat))
    }

    /// Apply the forced removal rule to the current room snapshot
    fn check_seat(&mut self, seats: &mut SessionStore) -> Result<(), StoreError> {
        if seats.reconcile_room(&self.room)? {
            self.seat = None;
            self.notice = Some(Notice::warning("You are no longer in this room"));
        }
        Ok(())
    }

    /// Take a fresh snapshot of this room; snapshots of other rooms are ignored
    fn apply_room(&mut self, seats: &mut SessionStore, room: Room) -> Result<(), StoreError> {
        if room.room_id != self.room.room_id {
            debug!("room view ignoring snapshot of room {}", room.room_id);
            return Ok(());
        }
        self.room = room;
        self.check_seat(seats)
    }

    async fn reload(&mut self, session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
        match session.api.get_room(self.room.room_id).await {
            Ok(room) => self.apply_room(&mut session.seats, room)?,
            Err(e) => {
                warn!("room {} reload failed: {e}", self.room.room_id);
                self.notice = Some(Notice::error(format!("Could not reload the room: {e}")));
            }
        }
        Ok(())
    }

    async fn on_push(&mut self, session: &mut SessionState, message: PushMessage) -> Result<(), Box<dyn std::error::Error>> {
        match message {
            PushMessage::RoomUpdate { room } => self.apply_room(&mut session.seats, room)?,
            PushMessage::Refresh => self.reload(session).await?,
            PushMessage::GameStarted { game_id, room } => {
                if let Some(room) = room {
                    self.apply_room(&mut session.seats, room)?;
                }
                if self.played.as_ref() == Some(&game_id) {
                    debug!("game {game_id} already played from this room");
                } else if self.seat.is_some() {
                    self.enter_game(session, game_id).await?;
                } else {
                    self.notice = Some(Notice::info("A game started in this room"));
                }
            }
            other => debug!("room view ignoring push {other:?}"),
        }
        Ok(())
    }

    async fn command(&mut self, session: &mut SessionState, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("j"), _) => self.join(session).await?,
            (Some("a"), _) => self.add_automated(session).await,
            (Some("l"), _) => self.leave(session).await?,
            (Some("s"), _) => self.start(session).await?,
            (Some("m"), Some(value)) => match value.parse::<u32>() {
                Ok(max) => self.change_max(session, max).await,
                Err(_) => self.notice = Some(Notice::warning("Usage: m <max players>")),
            },
            (Some("r"), _) => self.reload(session).await?,
            (None, _) => {}
            _ => self.notice = Some(Notice::warning(format!("Unknown command: {line}"))),
        }
        Ok(())
    }

    async fn join(&mut self, session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
        if self.seat.is_some() {
            self.notice = Some(Notice::warning("You already joined this room"));
            return Ok(());
        }

        let name = session.player_name().await?;
        let password = if self.room.has_password {
            let typed = session.input.line("Room password: ").await.ok_or("Input closed")?;
            Some(typed)
        } else {
            None
        };

        match session.api.join_room(self.room.room_id, &name, false, password).await {
            Ok(seat) => {
                session.seats.save(self.room.room_id, seat.player.id)?;
                info!("joined room {} as {}", self.room.room_id, seat.player.id);
                self.seat = Some(seat.player.id);
                self.room = seat.room;
                self.notice = Some(Notice::success(format!("Joined as {}", seat.player.name)));
            }
            Err(ApiError::WrongPassword) => self.notice = Some(Notice::error("Wrong password")),
            Err(e) => self.notice = Some(Notice::error(format!("Could not join: {e}"))),
        }
        Ok(())
    }

    async fn add_automated(&mut self, session: &mut SessionState) {
        if !self.is_host() {
            self.notice = Some(Notice::warning("Only the host can add automated players"));
            return;
        }
        let name = format!("AI {}", self.room.player_count + 1);
        match session.api.join_room(self.room.room_id, &name, true, None).await {
            Ok(seat) => {
                self.room = seat.room;
                self.notice = Some(Notice::success(format!("{} joined", seat.player.name)));
            }
            Err(e) => self.notice = Some(Notice::error(format!("Could not add player: {e}"))),
        }
    }

    async fn leave(&mut self, session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
        let Some(seat) = self.seat else {
            self.notice = Some(Notice::warning("You have not joined this room"));
            return Ok(());
        };

        match session.api.leave_room(self.room.room_id, seat).await {
            Ok(response) => {
                session.seats.clear(self.room.room_id)?;
                self.seat = None;
                if let Some(room) = response.room {
                    self.room = room;
                }
                self.notice = Some(Notice::info("You left the room"));
            }
            Err(e) => self.notice = Some(Notice::error(format!("Could not leave: {e}"))),
        }
        Ok(())
    }

    async fn start(&mut self, session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_host() {
            self.notice = Some(Notice::warning("Only the host can start the game"));
            return Ok(());
        }
        if !self.room.can_start() {
            self.notice = Some(Notice::warning(format!("At least {MIN_ROOM_PLAYERS} players are needed")));
            return Ok(());
        }

        match session.api.start_room(self.room.room_id).await {
            Ok(started) => self.enter_game(session, started.game_id).await?,
            Err(e) => self.notice = Some(Notice::error(format!("Could not start: {e}"))),
        }
        Ok(())
    }

    async fn change_max(&mut self, session: &mut SessionState, max: u32) {
        let Some(seat) = self.seat.filter(|_| self.is_host()) else {
            self.notice = Some(Notice::warning("Only the host can change settings"));
            return;
        };
        if !(MIN_ROOM_PLAYERS..=MAX_ROOM_PLAYERS).contains(&max) {
            self.notice = Some(Notice::warning(format!(
                "Max players must be between {MIN_ROOM_PLAYERS} and {MAX_ROOM_PLAYERS}"
            )));
            return;
        }

        match session.api.update_room_settings(self.room.room_id, seat, max).await {
            Ok(room) => {
                self.room = room;
                self.notice = Some(Notice::success(format!("Max players set to {max}")));
            }
            Err(e) => self.notice = Some(Notice::error(format!("Could not update settings: {e}"))),
        }
    }

    /// Resolve the started game and hand over to the board
    async fn enter_game(&mut self, session: &mut SessionState, game_id: GameId) -> Result<(), Box<dyn std::error::Error>> {
        let Some(seat) = self.seat else {
            return Ok(());
        };
        self.played = Some(game_id.clone());

        let seed = match session.api.game_status(&game_id).await {
            Ok(seed) => seed,
            Err(e) => {
                self.notice = Some(Notice::error(format!("Could not load game {game_id}: {e}")));
                return Ok(());
            }
        };

        let options = BoardOptions {
            identity: LocalIdentity::Seat(seat),
            drives_automated: self.is_host(),
            channel: Some(self.room.channel()),
        };
        board::play(session, seed, options).await?;

        self.notice = None;
        self.reload(session).await
    }

    fn render(&self) -> std::io::Result<()> {
        let room = &self.room;
        clear_screen()?;
        print_header(&room.name.to_uppercase());

        let lock = if room.has_password { " (password)" } else { "" };
        println!(
            "  Room #{}{}   Status {}   Players {}/{}",
            room.room_id,
            lock,
            room.status.to_string().bright_yellow(),
            room.player_count,
            room.max_players
        );
        println!();

        for member in &room.players {
            let mut line = format!("  {}", member.name);
            if member.is_ai {
                line.push_str(" (AI)");
            }
            if room.is_host(member.id) {
                line.push_str(" ★ host");
            }
            if self.seat == Some(member.id) {
                println!("{}", format!("{line} (you)").bright_green());
            } else {
                println!("{line}");
            }
        }
        for _ in 0..room.open_seats() {
            println!("  {}", "(open seat)".dimmed());
        }
        println!();

        let mut commands = vec![];
        if self.seat.is_some() {
            commands.push("l leave");
        } else {
            commands.push("j join");
        }
        if self.is_host() {
            commands.extend(["a add AI", "s start", "m <n> max players"]);
        }
        commands.extend(["r reload", "q back"]);
        println!("{}", commands.join(" | ").dimmed());

        print_notice(&self.notice);
        Ok(())
    }
}
