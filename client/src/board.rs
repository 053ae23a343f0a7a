//! Game board: renders the snapshot and turns typed commands into moves.
//!
//! The board is seeded with a full snapshot, then kept current by push
//! deltas on its channel (when it has one), by a status fetch after every
//! move and, on networked boards, by a status poll while another participant
//! holds the turn. All legality checks run locally before anything is sent.

use std::sync::Arc;
use std::time::Duration;

use colored::*;
use duel_common::*;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::multiplexer::ChannelFeed;
use crate::reconciler::{Outcome, Reconciler};
use crate::state::SessionState;
use crate::ui::*;

const GRID_COLUMNS: i64 = 10;

pub struct BoardOptions {
    pub identity: LocalIdentity,
    /// This terminal triggers automated turns
    pub drives_automated: bool,
    /// Push channel carrying deltas for this game
    pub channel: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

enum Event {
    Line(Option<String>),
    Push(PushMessage),
    AutomatedTurn,
    Poll,
}

pub async fn play(session: &mut SessionState, seed: Snapshot, options: BoardOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut board = Board::new(seed, options, session.config.ai_think(), session.config.poll_interval());
    info!("entering game {}", board.game_id);

    let mut feed = board
        .options
        .channel
        .as_deref()
        .map(|channel| ChannelFeed::open(&session.push, channel));

    let result = board.run(session, &mut feed).await;

    if let Some(feed) = feed {
        feed.close();
    }

    board.reconciler.clear();
    if result? {
        show_result(session, &board.snapshot).await?;
    }
    Ok(())
}

struct Board {
    game_id: GameId,
    options: BoardOptions,
    reconciler: Reconciler,
    snapshot: Arc<Snapshot>,
    selection: Selection,
    notice: Option<Notice>,
    finished: bool,
    automated_at: Option<Instant>,
    think: Duration,
    poll_at: Option<Instant>,
    poll: Duration,
}

impl Board {
    fn new(seed: Snapshot, options: BoardOptions, think: Duration, poll: Duration) -> Self {
        let mut reconciler = Reconciler::new();
        let game_id = seed.game_id.clone();
        let outcome = reconciler.apply_status_fetch(seed.clone());
        let snapshot = reconciler.snapshot().cloned().unwrap_or_else(|| Arc::new(seed));

        let mut board = Board {
            game_id,
            options,
            reconciler,
            snapshot,
            selection: Selection::new(),
            notice: None,
            finished: false,
            automated_at: None,
            think,
            poll_at: None,
            poll,
        };
        board.absorb(outcome);
        board.schedule_poll();
        board
    }

    /// Returns true when the game reached its end while on the board
    async fn run(
        &mut self,
        session: &mut SessionState,
        feed: &mut Option<ChannelFeed>,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        while !self.finished {
            self.schedule_poll();
            self.render()?;
            session.input.request("> ");

            let event = tokio::select! {
                line = session.input.next() => Event::Line(line),
                message = next_push(feed) => Event::Push(message),
                _ = until(self.automated_at) => Event::AutomatedTurn,
                _ = until(self.poll_at) => Event::Poll,
            };

            match event {
                Event::Line(None) => return Ok(false),
                Event::Line(Some(line)) => {
                    if let Flow::Quit = self.command(session, &line).await {
                        return Ok(false);
                    }
                }
                Event::Push(message) => self.on_push(session, message).await,
                Event::AutomatedTurn => self.run_automated(session).await,
                Event::Poll => self.poll(session).await,
            }
        }
        Ok(true)
    }

    fn absorb(&mut self, outcome: Outcome) {
        if let Some(snapshot) = self.reconciler.snapshot() {
            self.snapshot = snapshot.clone();
        }
        if outcome.turn_changed {
            self.selection.clear();
        }
        if outcome.terminal {
            self.finished = true;
        }
        self.schedule_automated(outcome.turn_changed);
    }

    fn schedule_automated(&mut self, turn_changed: bool) {
        let due = self.options.drives_automated
            && !self.snapshot.game_over
            && self.snapshot.current().is_some_and(|p| p.is_ai && p.is_alive);
        if !due {
            if self.automated_at.take().is_some() {
                debug!("automated turn timer cancelled");
            }
            return;
        }
        if turn_changed || self.automated_at.is_none() {
            self.automated_at = Some(Instant::now() + self.think);
        }
    }

    /// Arm the status poll while a networked board waits on someone else
    fn schedule_poll(&mut self) {
        let waiting = self.options.channel.is_some()
            && !self.finished
            && check_turn(&self.snapshot, &self.options.identity).is_err();
        if !waiting {
            self.poll_at = None;
        } else if self.poll_at.is_none() {
            self.poll_at = Some(Instant::now() + self.poll);
        }
    }

    async fn poll(&mut self, session: &SessionState) {
        self.poll_at = None;
        match session.api.game_status(&self.game_id).await {
            Ok(fetched) => self.absorb_polled(fetched),
            Err(e) => warn!("status poll for {} failed: {e}", self.game_id),
        }
    }

    /// Polled snapshots go through the delta path so an unchanged game is a no-op
    fn absorb_polled(&mut self, fetched: Snapshot) {
        let outcome = self.reconciler.apply_delta(fetched);
        self.absorb(outcome);
    }

    async fn refresh(&mut self, session: &SessionState) {
        match session.api.game_status(&self.game_id).await {
            Ok(fetched) => {
                let outcome = self.reconciler.apply_status_fetch(fetched);
                self.absorb(outcome);
            }
            Err(e) => {
                warn!("status fetch for {} failed: {e}", self.game_id);
                self.notice = Some(Notice::error(format!("Could not refresh the game: {e}")));
            }
        }
    }

    async fn command(&mut self, session: &SessionState, line: &str) -> Flow {
        match line {
            "q" => return Flow::Quit,
            "c" => self.submit(session).await,
            "p" => self.pass(session).await,
            "r" => self.reverse(session).await,
            "f" => self.refresh(session).await,
            "" => {}
            other => match other.parse::<i64>() {
                Ok(number) => self.toggle(number),
                Err(_) => self.notice = Some(Notice::warning(format!("Unknown command: {other}"))),
            },
        }
        Flow::Continue
    }

    fn toggle(&mut self, number: i64) {
        let identity = self.options.identity;
        let result = check_turn(&self.snapshot, &identity).and_then(|_| self.selection.toggle(&self.snapshot, number));
        self.notice = Some(match result {
            Ok(Toggle::Added(n)) => Notice::info(format!("Selected {n}")),
            Ok(Toggle::Removed(n)) => Notice::info(format!("Removed {n}")),
            Err(e) => Notice::warning(e.to_string()),
        });
    }

    async fn submit(&mut self, session: &SessionState) {
        let (player_id, numbers) = match check_submit(&self.snapshot, &self.options.identity, &self.selection) {
            Ok(checked) => checked,
            Err(e) => {
                self.notice = Some(Notice::warning(e.to_string()));
                return;
            }
        };

        match session.api.call_numbers(&self.game_id, player_id, numbers.clone()).await {
            Ok(result) => {
                self.selection.clear();
                self.notice = Some(describe_call(&self.snapshot, player_id, &numbers, &result));
            }
            Err(e) => {
                self.notice = Some(Notice::error(format!("Call failed: {e}")));
                return;
            }
        }
        self.refresh(session).await;
    }

    async fn pass(&mut self, session: &SessionState) {
        let player_id = match check_pass(&self.snapshot, &self.options.identity) {
            Ok(id) => id,
            Err(e) => {
                self.notice = Some(Notice::warning(e.to_string()));
                return;
            }
        };

        match session.api.pass(&self.game_id, player_id).await {
            Ok(result) => self.notice = Some(describe_pass(&self.snapshot, player_id, &result)),
            Err(e) => {
                self.notice = Some(Notice::error(format!("Pass failed: {e}")));
                return;
            }
        }
        self.refresh(session).await;
    }

    async fn reverse(&mut self, session: &SessionState) {
        let player_id = match check_reverse(&self.snapshot, &self.options.identity) {
            Ok(id) => id,
            Err(e) => {
                self.notice = Some(Notice::warning(e.to_string()));
                return;
            }
        };

        match session.api.reverse(&self.game_id, player_id).await {
            Ok(result) => self.notice = Some(describe_reverse(&self.snapshot, player_id, &result)),
            Err(e) => {
                self.notice = Some(Notice::error(format!("Reverse failed: {e}")));
                return;
            }
        }
        self.refresh(session).await;
    }

    async fn run_automated(&mut self, session: &SessionState) {
        self.automated_at = None;
        let Some(actor) = self.snapshot.current().map(|p| p.id) else {
            return;
        };

        match session.api.ai_action(&self.game_id).await {
            Ok(result) => {
                if !result.is_accepted() {
                    warn!("server refused automated turn of {actor} in {}", self.game_id);
                }
                self.notice = Some(describe_automated(&self.snapshot, actor, &result));
            }
            Err(e) => {
                warn!("automated turn in {} failed: {e}", self.game_id);
                self.notice = Some(Notice::error(format!("Automated turn failed: {e}")));
            }
        }
        self.refresh(session).await;
    }

    async fn on_push(&mut self, session: &SessionState, message: PushMessage) {
        match message {
            PushMessage::GameUpdate { game } => {
                let outcome = self.reconciler.apply_delta(game);
                self.absorb(outcome);
            }
            PushMessage::Refresh => self.refresh(session).await,
            PushMessage::RoomUpdate { room } if room.game_id.as_ref() == Some(&self.game_id) => {
                self.refresh(session).await;
            }
            other => debug!("board ignoring push {other:?}"),
        }
    }

    fn render(&self) -> std::io::Result<()> {
        let state = &self.snapshot;
        let allowed = allowed_actions(state, &self.options.identity, &self.selection);

        clear_screen()?;
        print_header(&format!("ROUND {}", state.current_round));

        let direction = if state.is_clockwise() { "clockwise" } else { "counter-clockwise" };
        println!(
            "  Range {}   Direction {}",
            format!("[{}, {}]", state.low(), state.high()).bright_white().bold(),
            direction.bright_white()
        );
        println!();

        let mut number = state.low();
        while number <= state.high() {
            let row_end = (number + GRID_COLUMNS - 1).min(state.high());
            let cells: Vec<String> = (number..=row_end)
                .map(|n| {
                    let cell = format!("{n:>4}");
                    if state.is_called(n) {
                        cell.dimmed().strikethrough().to_string()
                    } else if self.selection.contains(n) {
                        cell.black().on_bright_yellow().to_string()
                    } else if allowed.numbers.contains(&n) {
                        cell.bright_green().bold().to_string()
                    } else {
                        cell
                    }
                })
                .collect();
            println!("  {}", cells.join(""));
            number = row_end + 1;
        }
        println!();

        for player in &state.players {
            let marker = if player.id == state.current_player { "▶".bright_yellow() } else { " ".normal() };
            let mut line = player.name.clone();
            if player.is_ai {
                line.push_str(" (AI)");
            }
            if let LocalIdentity::Seat(id) = self.options.identity {
                if id == player.id {
                    line.push_str(" (you)");
                }
            }
            let line = format!("{line:<24}");
            let name = if player.is_alive { line.bright_white() } else { line.dimmed().strikethrough() };
            let pass = if player.pass_available { "pass".green() } else { "pass".dimmed() };
            let reverse = if player.reverse_available { "reverse".green() } else { "reverse".dimmed() };
            println!("  {marker} {name} {pass} {reverse}");
        }
        println!();

        if let Some(hints) = &state.hints {
            for hint in hints {
                println!("  {}", hint.italic().dimmed());
            }
            println!();
        }

        match check_turn(state, &self.options.identity) {
            Ok(player) => println!("{}", format!("{}'s turn", player.name).cyan().bold()),
            Err(_) => {
                let name = state.current().map(|p| p.name.as_str()).unwrap_or("?");
                println!("{}", format!("Waiting for {name}...").dimmed());
            }
        }
        if !self.selection.is_empty() {
            let picked: Vec<String> = self.selection.numbers().iter().map(|n| n.to_string()).collect();
            println!("Selected: {}", picked.join(", ").bright_yellow());
        }

        let command = |label: &str, enabled: bool| if enabled { label.normal() } else { label.dimmed() };
        println!(
            "{} | {} | {} | {} | f refresh | q quit",
            command("<n> toggle", !allowed.numbers.is_empty()),
            command("c call", allowed.submit),
            command("p pass", allowed.pass),
            command("r reverse", allowed.reverse)
        );

        print_notice(&self.notice);
        Ok(())
    }
}

fn player_name(state: &Snapshot, id: ParticipantId) -> String {
    state.player(id).map(|p| p.name.clone()).unwrap_or_else(|| format!("Player {id}"))
}

fn describe_call(state: &Snapshot, actor: ParticipantId, numbers: &[i64], result: &CallResult) -> Notice {
    if !result.success {
        return Notice::error("The server rejected the call");
    }
    let called: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
    let name = player_name(state, actor);
    if result.hit_secret {
        let out = player_name(state, result.eliminated_player.unwrap_or(actor));
        // A hit opens a new round, so the numbers may already be gone
        return Notice::warning(if called.is_empty() {
            format!("{name} hit the password! {out} is out")
        } else {
            format!("{name} called {} and hit the password! {out} is out", called.join(", "))
        });
    }
    let mut text = format!("{name} called {}", called.join(", "));
    if let Some((low, high)) = result.new_range {
        text.push_str(&format!(", range is now [{low}, {high}]"));
    }
    Notice::success(text)
}

/// Automated call results list every called number, keep only the new ones
fn describe_automated(state: &Snapshot, actor: ParticipantId, result: &ActionResult) -> Notice {
    if !result.is_accepted() {
        return Notice::error(format!("The server refused {}'s automated turn", player_name(state, actor)));
    }
    match result {
        ActionResult::Call(call) => {
            let numbers: Vec<i64> = call.called_numbers.iter().copied().filter(|n| !state.is_called(*n)).collect();
            describe_call(state, actor, &numbers, call)
        }
        ActionResult::Pass(pass) => describe_pass(state, actor, pass),
        ActionResult::Reverse(reverse) => describe_reverse(state, actor, reverse),
    }
}

fn describe_pass(state: &Snapshot, actor: ParticipantId, result: &PassResult) -> Notice {
    if !result.success {
        return Notice::error("The server rejected the pass");
    }
    Notice::success(format!(
        "{} passed, {} is next",
        player_name(state, actor),
        player_name(state, result.next_player)
    ))
}

fn describe_reverse(state: &Snapshot, actor: ParticipantId, result: &ReverseResult) -> Notice {
    if !result.success {
        return Notice::error("The server rejected the reverse");
    }
    Notice::success(format!("{} reversed the direction", player_name(state, actor)))
}

async fn show_result(session: &mut SessionState, state: &Snapshot) -> Result<(), Box<dyn std::error::Error>> {
    clear_screen()?;
    print_header("GAME OVER");

    match state.winner_player() {
        Some(winner) => println!("  {}", format!("{} wins!", winner.name).bright_green().bold()),
        None => println!("  {}", "No winner was recorded".dimmed()),
    }
    println!("  Rounds played: {}", state.current_round.to_string().bright_yellow());

    let eliminated: Vec<&str> = state.players.iter().filter(|p| !p.is_alive).map(|p| p.name.as_str()).collect();
    if !eliminated.is_empty() {
        println!("  Eliminated: {}", eliminated.join(", ").dimmed());
    }
    println!();

    session.input.pause().await;
    Ok(())
}

async fn next_push(feed: &mut Option<ChannelFeed>) -> PushMessage {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::reconciler::fixtures::*;

    use super::*;

    fn options(identity: LocalIdentity, drives_automated: bool) -> BoardOptions {
        BoardOptions {
            identity,
            drives_automated,
            channel: None,
        }
    }

    const THINK: Duration = Duration::from_secs(1);
    const POLL: Duration = Duration::from_secs(2);

    fn new_board(state: Snapshot, options: BoardOptions) -> Board {
        Board::new(state, options, THINK, POLL)
    }

    fn networked(identity: LocalIdentity, drives_automated: bool) -> BoardOptions {
        BoardOptions {
            channel: Some("room_7".to_string()),
            ..options(identity, drives_automated)
        }
    }

    fn against_automated() -> Snapshot {
        let mut state = snapshot(&[]);
        state.players[1] = player(2, "Bot", true);
        state
    }

    #[tokio::test(start_paused = true)]
    async fn test_automated_turn_is_scheduled_only_for_driver() {
        let mut state = against_automated();
        state.current_player = 2;

        let board = new_board(state.clone(), options(LocalIdentity::HotSeat, true));
        assert_eq!(board.automated_at, Some(Instant::now() + THINK));

        let board = new_board(state, options(LocalIdentity::Seat(1), false));
        assert!(board.automated_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_change_clears_selection_and_timer() {
        let mut state = against_automated();
        let mut board = new_board(state.clone(), options(LocalIdentity::HotSeat, true));
        board.toggle(1);
        assert_eq!(board.selection.numbers(), &[1]);
        assert!(board.automated_at.is_none());

        state.current_player = 2;
        let outcome = board.reconciler.apply_delta(state.clone());
        board.absorb(outcome);
        assert!(board.selection.is_empty());
        assert!(board.automated_at.is_some());

        state.current_player = 1;
        state.called_numbers = vec![1];
        let outcome = board.reconciler.apply_delta(state);
        board.absorb(outcome);
        assert!(board.automated_at.is_none());
    }

    #[tokio::test]
    async fn test_toggle_out_of_turn_is_rejected() {
        let state = snapshot(&[]);
        let mut board = new_board(state, options(LocalIdentity::Seat(2), false));
        board.toggle(1);

        assert!(board.selection.is_empty());
        let notice = board.notice.unwrap();
        assert_eq!(notice.tone, Tone::Warning);
        assert_eq!(notice.text, MoveError::NotYourTurn.to_string());
    }

    #[tokio::test]
    async fn test_terminal_delta_finishes_board() {
        let mut state = snapshot(&[1, 2]);
        let mut board = new_board(state.clone(), options(LocalIdentity::Seat(1), false));
        assert!(!board.finished);

        state.game_over = true;
        state.winner = Some(1);
        let outcome = board.reconciler.apply_delta(state);
        board.absorb(outcome);
        assert!(board.finished);
        assert_eq!(board.snapshot.winner, Some(1));
    }

    #[test]
    fn test_describe_call_reports_elimination() {
        let state = snapshot(&[1, 2]);
        let result = CallResult {
            success: true,
            hit_secret: true,
            eliminated_player: Some(2),
            game_over: false,
            next_player: Some(1),
            called_numbers: vec![1, 2, 3],
            winner: None,
            new_range: None,
        };
        let notice = describe_call(&state, 2, &[3], &result);
        assert_eq!(notice.tone, Tone::Warning);
        assert!(notice.text.contains("Bob is out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_only_while_someone_else_holds_the_turn() {
        let state = snapshot(&[]);

        let board = new_board(state.clone(), networked(LocalIdentity::Seat(2), false));
        assert_eq!(board.poll_at, Some(Instant::now() + POLL));

        let board = new_board(state.clone(), networked(LocalIdentity::Seat(1), false));
        assert!(board.poll_at.is_none());

        let board = new_board(state, options(LocalIdentity::Seat(2), false));
        assert!(board.poll_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polled_snapshot_moves_turn_and_arms_automated() {
        let mut state = snapshot(&[]);
        state.players.push(player(3, "Bot", true));
        state.current_player = 2;

        let mut board = new_board(state.clone(), networked(LocalIdentity::Seat(1), true));
        assert!(board.automated_at.is_none());
        assert!(board.poll_at.is_some());

        let before = board.snapshot.clone();
        board.absorb_polled(state.clone());
        assert!(Arc::ptr_eq(&before, &board.snapshot));
        assert!(board.automated_at.is_none());

        state.called_numbers = vec![1, 2];
        state.current_player = 3;
        board.absorb_polled(state);

        assert_eq!(board.snapshot.current_player, 3);
        assert_eq!(board.automated_at, Some(Instant::now() + THINK));
        board.schedule_poll();
        assert!(board.poll_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_when_game_ends() {
        let mut state = snapshot(&[]);
        state.current_player = 2;
        let mut board = new_board(state.clone(), networked(LocalIdentity::Seat(1), false));
        assert!(board.poll_at.is_some());

        state.game_over = true;
        state.winner = Some(2);
        board.absorb_polled(state);
        board.schedule_poll();

        assert!(board.finished);
        assert!(board.poll_at.is_none());
    }

    #[test]
    fn test_hit_after_new_round_omits_empty_numbers() {
        let state = snapshot(&[]);
        let result = CallResult {
            success: true,
            hit_secret: true,
            eliminated_player: Some(2),
            game_over: false,
            next_player: Some(1),
            called_numbers: vec![],
            winner: None,
            new_range: Some((1, 100)),
        };
        let notice = describe_automated(&state, 2, &ActionResult::Call(result));
        assert_eq!(notice.tone, Tone::Warning);
        assert_eq!(notice.text, "Bob hit the password! Bob is out");
    }

    #[test]
    fn test_refused_automated_turn_is_reported() {
        let state = snapshot(&[]);
        let result = ActionResult::Pass(PassResult {
            success: false,
            next_player: 2,
        });
        let notice = describe_automated(&state, 2, &result);
        assert_eq!(notice.tone, Tone::Error);
        assert!(notice.text.contains("refused"));
    }
}
