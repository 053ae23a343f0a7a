use colored::*;
use duel_common::*;
use tracing::{debug, warn};

use crate::multiplexer::ChannelFeed;
use crate::room::open_room;
use crate::state::SessionState;
use crate::ui::*;

enum Event {
    Line(Option<String>),
    Push(PushMessage),
}

pub async fn show_lobby(session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
    let mut feed = ChannelFeed::open(&session.push, LOBBY_CHANNEL);
    let result = run(session, &mut feed).await;
    feed.close();
    result
}

async fn run(
    session: &mut SessionState,
    feed: &mut ChannelFeed,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rooms = session.api.list_rooms().await?;
    let mut notice: Option<Notice> = None;

    loop {
        render(&rooms, &notice)?;
        session.input.request("> ");

        let event = tokio::select! {
            line = session.input.next() => Event::Line(line),
            message = feed.recv() => Event::Push(message),
        };

        let line = match event {
            Event::Line(None) => return Ok(()),
            Event::Line(Some(line)) => line,
            Event::Push(PushMessage::RoomUpdate { room }) => {
                match rooms.iter_mut().find(|r| r.room_id == room.room_id) {
                    Some(existing) => *existing = room,
                    None => rooms.push(room),
                }
                continue;
            }
            Event::Push(PushMessage::Refresh) => {
                reload(session, &mut rooms, &mut notice).await;
                continue;
            }
            Event::Push(other) => {
                debug!("lobby ignoring push {other:?}");
                continue;
            }
        };

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("q"), _) => return Ok(()),
            (Some("r"), _) | (None, _) => reload(session, &mut rooms, &mut notice).await,
            (Some("c"), _) => {
                match create_room(session).await {
                    Ok(room_id) => enter(session, room_id, &mut notice).await,
                    Err(e) => notice = Some(Notice::error(format!("Could not create room: {e}"))),
                }
                reload(session, &mut rooms, &mut notice).await;
            }
            (Some("j"), Some(id)) | (Some(id), None) => match id.parse::<RoomId>() {
                Ok(room_id) => {
                    enter(session, room_id, &mut notice).await;
                    reload(session, &mut rooms, &mut notice).await;
                }
                Err(_) => notice = Some(Notice::warning(format!("Unknown command: {line}"))),
            },
            _ => notice = Some(Notice::warning(format!("Unknown command: {line}"))),
        }
    }
}

async fn enter(session: &mut SessionState, room_id: RoomId, notice: &mut Option<Notice>) {
    *notice = match open_room(session, room_id).await {
        Ok(()) => None,
        Err(e) => Some(Notice::error(e.to_string())),
    };
}

async fn reload(session: &SessionState, rooms: &mut Vec<Room>, notice: &mut Option<Notice>) {
    match session.api.list_rooms().await {
        Ok(fresh) => *rooms = fresh,
        Err(e) => {
            warn!("room list reload failed: {e}");
            *notice = Some(Notice::error(format!("Could not load rooms: {e}")));
        }
    }
}

/// Ask for room settings and create it; returns the new room id
async fn create_room(session: &mut SessionState) -> Result<RoomId, Box<dyn std::error::Error>> {
    let name = session.player_name().await?;

    let max = session.input.line_or("Max players (2-10)", "4").await.ok_or("Input closed")?;
    let max_players = match max.parse::<u32>() {
        Ok(n) if (MIN_ROOM_PLAYERS..=MAX_ROOM_PLAYERS).contains(&n) => n,
        _ => return Err(format!("Max players must be between {MIN_ROOM_PLAYERS} and {MAX_ROOM_PLAYERS}").into()),
    };

    let password = session
        .input
        .line("Password (leave empty for none): ")
        .await
        .ok_or("Input closed")?;
    let password = (!password.is_empty()).then_some(password);

    let created = session.api.create_room(max_players, password, &name).await?;
    session.seats.save(created.room.room_id, created.player.id)?;
    Ok(created.room.room_id)
}

fn render(rooms: &[Room], notice: &Option<Notice>) -> std::io::Result<()> {
    clear_screen()?;
    print_header("ROOMS");

    if rooms.is_empty() {
        println!("  {}", "No rooms yet, create one!".dimmed());
    } else {
        println!("{:>6}  {:24} {:>9}  {:8}", "Room".dimmed(), "Name".dimmed(), "Players".dimmed(), "Status".dimmed());
        println!("{}", "─".repeat(60).dimmed());
        for room in rooms {
            let lock = if room.has_password { "🔒" } else { "" };
            let status = match room.status {
                RoomStatus::Waiting => room.status.to_string().green(),
                RoomStatus::Playing => room.status.to_string().yellow(),
                RoomStatus::Full => room.status.to_string().red(),
            };
            println!(
                "{:>6}  {:24} {:>9}  {} {}",
                format!("#{}", room.room_id),
                room.name,
                format!("{}/{}", room.player_count, room.max_players),
                status,
                lock
            );
        }
    }
    println!();
    println!("{}", "<id> open | c create | r reload | q back".dimmed());

    print_notice(notice);
    Ok(())
}
