use colored::*;
use duel_common::*;

use crate::board::{self, BoardOptions};
use crate::state::SessionState;
use crate::ui::*;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 5;

/// Set up seats on this terminal and play them against each other
pub async fn start_local_game(session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
    clear_screen()?;
    print_header("NEW LOCAL GAME");
    println!("  {}", "Humans share this terminal, automated players are driven from here.".dimmed());
    println!();

    let players = read_player_configs(session).await?;

    println!("\n{}", "Starting game...".cyan());
    let seed = session.api.start_game(players).await?;

    let options = BoardOptions {
        identity: LocalIdentity::HotSeat,
        drives_automated: true,
        channel: None,
    };
    board::play(session, seed, options).await
}

async fn read_player_configs(session: &mut SessionState) -> Result<Vec<PlayerConfig>, Box<dyn std::error::Error>> {
    let count = loop {
        let answer = session
            .input
            .line_or(&format!("Number of players ({MIN_PLAYERS}-{MAX_PLAYERS})"), "2")
            .await
            .ok_or("Input closed")?;
        match answer.parse::<usize>() {
            Ok(n) if (MIN_PLAYERS..=MAX_PLAYERS).contains(&n) => break n,
            _ => println!("{}", format!("Please enter a number between {MIN_PLAYERS} and {MAX_PLAYERS}.").red()),
        }
    };

    let mut players = Vec::with_capacity(count);
    for seat in 1..=count {
        println!("\n{}", format!("Player {seat}").bright_yellow());
        let default_kind = if seat == 1 { "h" } else { "a" };
        let kind = session
            .input
            .line_or("Human or AI (h/a)", default_kind)
            .await
            .ok_or("Input closed")?;

        let config = if kind.eq_ignore_ascii_case("a") {
            let name = session
                .input
                .line_or("Name", &format!("AI {seat}"))
                .await
                .ok_or("Input closed")?;
            let difficulty = read_difficulty(session).await?;
            PlayerConfig::automated(&name, difficulty)
        } else {
            let name = session
                .input
                .line_or("Name", &format!("Player {seat}"))
                .await
                .ok_or("Input closed")?;
            PlayerConfig::human(&name)
        };
        players.push(config);
    }
    Ok(players)
}

async fn read_difficulty(session: &mut SessionState) -> Result<Difficulty, Box<dyn std::error::Error>> {
    loop {
        let answer = session
            .input
            .line_or("Difficulty (easy/medium/hard)", "medium")
            .await
            .ok_or("Input closed")?;
        match Difficulty::from_string(&answer.to_lowercase()) {
            Some(difficulty) => return Ok(difficulty),
            None => println!("{}", "Please enter easy, medium or hard.".red()),
        }
    }
}
