use colored::*;

use crate::state::*;
use crate::ui::*;

pub async fn show_leaderboard(session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
    let page_size = (terminal_height() as u32).saturating_sub(12).max(5);
    let mut limit = page_size;

    loop {
        clear_screen()?;
        println!("\n{}", "Loading leaderboard...".cyan());

        let entries = session.api.leaderboard(limit).await?;

        clear_screen()?;
        print_header("LEADERBOARD");

        println!("{:>5} {:24} {:>6} {:>6} {:>6} {:>8}",
            "Rank".dimmed(), "Player".dimmed(), "Games".dimmed(), "Won".dimmed(), "Lost".dimmed(), "Win %".dimmed());
        println!("{}", "─".repeat(60).dimmed());

        for entry in &entries {
            let mut name = entry.nickname.clone().unwrap_or_else(|| entry.username.clone());
            if entry.is_ai {
                name.push_str(" (AI)");
            }
            let rank = format!("#{}", entry.rank);
            let line = format!("{:>5} {:24} {:>6} {:>6} {:>6} {:>7.1}%",
                rank, name, entry.total_games, entry.total_wins, entry.total_losses, entry.win_rate);
            if entry.rank <= 3 {
                println!("{}", line.bright_yellow());
            } else {
                println!("{line}");
            }
        }
        println!();

        let has_more = entries.len() as u32 >= limit;
        let controls = if has_more { "m: more | q: quit" } else { "q: quit" };
        println!("{}", controls.dimmed());

        let choice = session.input.line("> ").await.unwrap_or_else(|| "q".to_string());
        match choice.to_lowercase().as_str() {
            "m" if has_more => limit += page_size,
            "q" => break,
            _ => {}
        }
    }

    Ok(())
}
