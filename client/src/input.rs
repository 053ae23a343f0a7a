//! Line input that can be awaited next to push messages.
//!
//! A dedicated thread owns the line editor and only reads the terminal while
//! a prompt is outstanding, so a view can `select!` between the next typed
//! line and its push receiver without losing keystrokes.

use std::io;
use std::sync::mpsc as std_mpsc;
use std::thread;

use colored::*;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, error};

pub struct Input {
    requests: std_mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<Option<String>>,
    pending: bool,
}

impl Input {
    pub fn spawn() -> io::Result<Self> {
        let (request_tx, request_rx) = std_mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        thread::Builder::new().name("input".to_string()).spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    error!("line editor unavailable: {e}");
                    return;
                }
            };
            while let Ok(prompt) = request_rx.recv() {
                let line = match editor.readline(&prompt) {
                    Ok(line) => {
                        let _ = editor.add_history_entry(line.as_str());
                        Some(line)
                    }
                    Err(e) => {
                        debug!("input closed: {e}");
                        None
                    }
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self {
            requests: request_tx,
            lines: line_rx,
            pending: false,
        })
    }

    /// Show `prompt` unless a previous prompt is still waiting for its line
    pub fn request(&mut self, prompt: &str) {
        if !self.pending && self.requests.send(prompt.to_string()).is_ok() {
            self.pending = true;
        }
    }

    /// Next typed line, or `None` on Ctrl-C/Ctrl-D. Cancel safe.
    pub async fn next(&mut self) -> Option<String> {
        let line = self.lines.recv().await.flatten();
        self.pending = false;
        line.map(|l| l.trim().to_string())
    }

    pub async fn line(&mut self, prompt: &str) -> Option<String> {
        self.request(prompt);
        self.next().await
    }

    /// Prompt with a default used when the answer is blank
    pub async fn line_or(&mut self, prompt: &str, default: &str) -> Option<String> {
        let line = self.line(&format!("{prompt} [{default}]: ")).await?;
        if line.is_empty() {
            Some(default.to_string())
        } else {
            Some(line)
        }
    }

    /// Hold the current screen until Enter
    pub async fn pause(&mut self) {
        println!("{}", "Press Enter to continue...".dimmed());
        let _ = self.line("").await;
    }

    /// Input fed from a fixed list of lines instead of the terminal
    #[cfg(test)]
    pub fn scripted(lines: &[&str]) -> Self {
        let (requests, _) = std_mpsc::channel();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        for line in lines {
            let _ = line_tx.send(Some(line.to_string()));
        }
        Self {
            requests,
            lines: line_rx,
            pending: false,
        }
    }
}
