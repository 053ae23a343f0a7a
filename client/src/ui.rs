use std::io::{self, Write};

use colored::*;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

pub fn clear_screen() -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    stdout.flush()?;
    Ok(())
}

pub fn terminal_height() -> u16 {
    crossterm::terminal::size().map(|(_, h)| h).unwrap_or(24)
}

pub fn print_header(title: &str) {
    let rule = "═".repeat(60);
    println!();
    println!("{}", rule.bright_cyan());
    println!("{}", format!("{title:^60}").bright_cyan().bold());
    println!("{}", rule.bright_cyan());
    println!();
}

/// Severity of a one-line notice shown under a view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { tone: Tone::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { tone: Tone::Success, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { tone: Tone::Warning, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { tone: Tone::Error, text: text.into() }
    }

    pub fn print(&self) {
        let line = match self.tone {
            Tone::Info => self.text.cyan(),
            Tone::Success => self.text.green(),
            Tone::Warning => self.text.yellow(),
            Tone::Error => self.text.red(),
        };
        println!("\n{line}");
    }
}

pub fn print_notice(notice: &Option<Notice>) {
    if let Some(notice) = notice {
        notice.print();
    }
}
