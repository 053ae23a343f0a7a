pub mod api;
pub mod board;
pub mod config;
pub mod identity;
pub mod input;
pub mod leaderboard;
pub mod lobby;
pub mod local_game;
pub mod logging;
pub mod multiplexer;
pub mod reconciler;
pub mod room;
pub mod state;
pub mod stats;
pub mod ui;
pub mod websocket;

use colored::*;
use tracing::{error, info};

use leaderboard::*;
use lobby::*;
use local_game::*;
use state::*;
use stats::*;
use ui::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = logging::init() {
        eprintln!("Logging disabled: {e}");
    }

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    if let Err(e) = start_app(&config_path).await {
        error!("client stopped: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn start_app(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = SessionState::new_with_config(config_path)?;
    info!("client v{VERSION} using {}", session.config.server_url);

    let result = menu_loop(&mut session).await;
    session.shutdown();
    result
}

async fn menu_loop(session: &mut SessionState) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let outcome = match read_menu_choice(session).await? {
            MenuChoice::LocalGame => start_local_game(session).await,
            MenuChoice::Rooms => show_lobby(session).await,
            MenuChoice::Stats => show_stats(session).await,
            MenuChoice::Leaderboard => show_leaderboard(session).await,
            MenuChoice::Exit => {
                println!("\n{}", "Goodbye!".cyan());
                return Ok(());
            }
        };

        if let Err(e) = outcome {
            error!("view failed: {e}");
            println!("\n{}", format!("Error: {e}").red());
            session.input.pause().await;
        }
    }
}

enum MenuChoice {
    LocalGame,
    Rooms,
    Stats,
    Leaderboard,
    Exit,
}

fn display_menu(title: &str, items: &[(&str, &str)]) {
    clear_screen().ok();

    println!();
    println!();
    println!("{}", "░█▀█░█▀█░█▀▀░█▀▀░█░█░█▀█░█▀▄░█▀▄░░░█▀▄░█░█░█▀▀░█░░".bright_cyan());
    println!("{}", "░█▀▀░█▀█░▀▀█░▀▀█░█▄█░█░█░█▀▄░█░█░░░█░█░█░█░█▀▀░█░░".bright_cyan());
    println!("{}", "░▀░░░▀░▀░▀▀▀░▀▀▀░▀░▀░▀▀▀░▀░▀░▀▀░░░░▀▀░░▀▀▀░▀▀▀░▀▀▀".bright_cyan());
    println!();

    println!("{}", title.dimmed());
    println!();

    for (num, text) in items {
        println!("  {}. {}", num.bright_yellow(), text);
    }

    println!();
}

async fn read_menu_choice(session: &mut SessionState) -> Result<MenuChoice, Box<dyn std::error::Error>> {
    let menu_items = [
        ("1", "Local Game"),
        ("2", "Multiplayer Rooms"),
        ("3", "Player Stats"),
        ("4", "Leaderboard"),
        ("5", "Exit"),
    ];

    let title = format!("v{VERSION}");
    display_menu(&title, &menu_items);

    loop {
        let Some(line) = session.input.line("Select option: ").await else {
            return Ok(MenuChoice::Exit);
        };
        match line.as_str() {
            "1" => return Ok(MenuChoice::LocalGame),
            "2" => return Ok(MenuChoice::Rooms),
            "3" => return Ok(MenuChoice::Stats),
            "4" => return Ok(MenuChoice::Leaderboard),
            "5" => return Ok(MenuChoice::Exit),
            _ => println!("{}", format!("Invalid choice. Please enter 1-{}.", menu_items.len()).red()),
        }
    }
}
