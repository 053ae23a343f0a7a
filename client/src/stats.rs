use colored::*;
use duel_common::{GameDetails, PlayerStats};

use crate::state::*;
use crate::ui::*;

pub async fn show_stats(session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
    let default = session.config.player_name.clone().unwrap_or_default();
    let username = session
        .input
        .line_or("Player name", &default)
        .await
        .ok_or("Input closed")?;
    if username.is_empty() {
        return Err("No player name given".into());
    }

    clear_screen()?;
    println!("\n{}", "Loading stats...".cyan());
    let stats = session.api.player_stats(&username).await?;
    print_player_stats(&stats)?;

    if stats.recent_games.is_empty() {
        session.input.pause().await;
        return Ok(());
    }
    let game_id = session
        .input
        .line("Game id for details (empty to go back): ")
        .await
        .unwrap_or_default();
    if game_id.is_empty() {
        return Ok(());
    }

    let details = session.api.game_details(&game_id).await?;
    print_game_details(&details)?;
    session.input.pause().await;
    Ok(())
}

fn print_player_stats(stats: &PlayerStats) -> std::io::Result<()> {
    clear_screen()?;
    let name = stats.nickname.as_deref().unwrap_or(&stats.username);
    print_header(&format!("{} STATISTICS", name.to_uppercase()));

    println!("  {} {}", "Total Games:".bright_white(), stats.total_games.to_string().bright_yellow());
    println!("  {} {}", "Won:        ".bright_green(), stats.total_wins.to_string().bright_green().bold());
    println!("  {} {}", "Lost:       ".bright_red(), stats.total_losses.to_string().bright_red());
    println!("  {} {}", "Win Rate:   ".bright_yellow().bold(), format!("{:.1}%", stats.win_rate).bright_yellow().bold());
    println!();

    if !stats.recent_games.is_empty() {
        println!("{}", "  Recent games".dimmed());
        println!("{}", "  ─────────────────────────────────────────────────────".dimmed());
        for game in &stats.recent_games {
            let rank = game.rank.map(|r| format!("#{r}")).unwrap_or_else(|| "-".to_string());
            let when = game.end_time.as_deref().or(game.start_time.as_deref()).unwrap_or("");
            println!("  {:>4}  {}  {}", rank, game.game_id, when.dimmed());
        }
        println!();
    }
    Ok(())
}

fn print_game_details(details: &GameDetails) -> std::io::Result<()> {
    clear_screen()?;
    print_header("GAME DETAILS");

    println!("  {} {}", "Game:  ".bright_white(), details.game_id);
    if let Some(winner) = &details.winner {
        println!("  {} {}", "Winner:".bright_green(), winner.bright_green().bold());
    }
    if let Some(rounds) = details.total_rounds {
        println!("  {} {}", "Rounds:".bright_white(), rounds);
    }
    if let Some(duration) = details.duration {
        println!("  {} {:.0}s", "Length:".bright_white(), duration);
    }
    println!();

    let mut participants: Vec<_> = details.participants.iter().collect();
    participants.sort_by_key(|p| p.rank.unwrap_or(i64::MAX));
    for p in participants {
        let name = p.nickname.as_deref().unwrap_or(&p.username);
        let rank = p.rank.map(|r| format!("#{r}")).unwrap_or_else(|| "-".to_string());
        let out = p
            .eliminated_round
            .map(|r| format!("out in round {r}"))
            .unwrap_or_default();
        println!("  {:>4}  {:20} {}", rank, name, out.dimmed());
    }

    if !details.actions.is_empty() {
        println!();
        println!("{}", "  Actions".dimmed());
        for action in &details.actions {
            let numbers = action
                .numbers
                .as_ref()
                .map(|n| n.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            let hit = if action.hit_secret { " 💥".to_string() } else { String::new() };
            println!("  R{:<3} player {:<4} {:8} {}{}", action.round, action.player_id, action.action, numbers, hit);
        }
    }
    println!();
    Ok(())
}
