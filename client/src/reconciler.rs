//! Local copy of the authoritative game snapshot.
//!
//! The snapshot is seeded by a status fetch and kept current by push deltas.
//! A delta that carries nothing new leaves the stored `Arc` untouched, so
//! callers can skip redrawing with a pointer comparison.

use std::collections::HashSet;
use std::sync::Arc;

use duel_common::{GameId, Snapshot};
use tracing::{debug, info};

/// Whether two snapshots agree on every server-owned field
pub fn same_state(a: &Snapshot, b: &Snapshot) -> bool {
    a.current_round == b.current_round
        && a.current_player == b.current_player
        && a.number_range == b.number_range
        && a.direction == b.direction
        && a.game_over == b.game_over
        && a.players == b.players
        && a.called_set() == b.called_set()
}

/// Merge `incoming` over `previous`.
///
/// Returns `previous` itself when nothing changed. Otherwise the result is
/// `incoming` taken wholesale, keeping the previous hints when the delta
/// carries none.
pub fn apply_delta(previous: Option<&Arc<Snapshot>>, incoming: Snapshot) -> Arc<Snapshot> {
    let Some(previous) = previous else {
        return Arc::new(incoming);
    };
    if same_state(previous, &incoming) {
        return previous.clone();
    }

    let mut merged = incoming;
    if merged.hints.is_none() {
        merged.hints = previous.hints.clone();
    }
    Arc::new(merged)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The stored snapshot was replaced
    pub changed: bool,
    /// First observation of this game being over
    pub terminal: bool,
    /// The participant on turn is different from before
    pub turn_changed: bool,
}

#[derive(Default)]
pub struct Reconciler {
    snapshot: Option<Arc<Snapshot>>,
    finished: HashSet<GameId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    pub fn apply_delta(&mut self, incoming: Snapshot) -> Outcome {
        if let Some(current) = &self.snapshot {
            if current.game_id != incoming.game_id {
                debug!("ignoring delta for game {} while showing {}", incoming.game_id, current.game_id);
                return Outcome::default();
            }
        }
        let next = apply_delta(self.snapshot.as_ref(), incoming);
        self.settle(next)
    }

    /// A full fetch always supersedes whatever is stored
    pub fn apply_status_fetch(&mut self, fetched: Snapshot) -> Outcome {
        self.settle(Arc::new(fetched))
    }

    /// Drop the snapshot when the owning view goes away
    pub fn clear(&mut self) {
        self.snapshot = None;
    }

    fn settle(&mut self, next: Arc<Snapshot>) -> Outcome {
        let previous = self.snapshot.take();
        let changed = !previous.as_ref().is_some_and(|p| Arc::ptr_eq(p, &next));
        let turn_changed = previous.as_ref().is_some_and(|p| {
            p.game_id != next.game_id || p.current_player != next.current_player
        });

        let terminal = next.game_over && self.finished.insert(next.game_id.clone());
        if terminal {
            info!("game {} finished, winner={:?}", next.game_id, next.winner);
        }

        self.snapshot = Some(next);
        Outcome {
            changed,
            terminal,
            turn_changed,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use duel_common::Player;

    use super::*;

    pub fn player(id: i64, name: &str, is_ai: bool) -> Player {
        Player {
            id,
            name: name.to_string(),
            is_alive: true,
            is_ai,
            pass_available: true,
            reverse_available: true,
        }
    }

    pub fn snapshot(called: &[i64]) -> Snapshot {
        Snapshot {
            game_id: "g-1".to_string(),
            current_round: 1,
            current_player: 1,
            number_range: (1, 100),
            called_numbers: called.to_vec(),
            players: vec![player(1, "Alice", false), player(2, "Bob", false)],
            direction: 1,
            game_over: false,
            winner: None,
            hints: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_first_delta_is_taken_as_is() {
        let incoming = snapshot(&[1, 2]);
        let merged = apply_delta(None, incoming.clone());
        assert_eq!(*merged, incoming);
    }

    #[test]
    fn test_identical_delta_keeps_reference() {
        let previous = Arc::new(snapshot(&[1, 2, 3]));
        let mut incoming = snapshot(&[3, 1, 2]);
        incoming.hints = Some(vec!["careful".to_string()]);

        let merged = apply_delta(Some(&previous), incoming);
        assert!(Arc::ptr_eq(&merged, &previous));
    }

    #[test]
    fn test_changed_delta_replaces_server_fields() {
        let mut previous = snapshot(&[1, 2]);
        previous.hints = Some(vec!["go low".to_string()]);
        let previous = Arc::new(previous);

        let mut incoming = snapshot(&[1, 2, 3]);
        incoming.current_player = 2;
        incoming.players[0].pass_available = false;

        let merged = apply_delta(Some(&previous), incoming);
        assert_eq!(merged.called_numbers, vec![1, 2, 3]);
        assert_eq!(merged.current_player, 2);
        assert!(!merged.players[0].pass_available);
        assert_eq!(merged.hints, Some(vec!["go low".to_string()]));
    }

    #[test]
    fn test_incoming_hints_win() {
        let mut previous = snapshot(&[]);
        previous.hints = Some(vec!["old".to_string()]);
        let previous = Arc::new(previous);

        let mut incoming = snapshot(&[1]);
        incoming.hints = Some(vec!["new".to_string()]);

        let merged = apply_delta(Some(&previous), incoming);
        assert_eq!(merged.hints, Some(vec!["new".to_string()]));
    }

    #[test]
    fn test_terminal_fires_once_per_game() {
        let mut reconciler = Reconciler::new();
        assert!(!reconciler.apply_status_fetch(snapshot(&[])).terminal);

        let mut over = snapshot(&[1, 2, 3]);
        over.game_over = true;
        over.winner = Some(2);
        assert!(reconciler.apply_delta(over.clone()).terminal);

        over.current_round = 2;
        let outcome = reconciler.apply_delta(over.clone());
        assert!(outcome.changed);
        assert!(!outcome.terminal);
        assert!(!reconciler.apply_status_fetch(over).terminal);
    }

    #[test]
    fn test_status_fetch_replaces_even_when_equal() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_status_fetch(snapshot(&[1]));
        let before = reconciler.snapshot().unwrap().clone();

        let outcome = reconciler.apply_status_fetch(snapshot(&[1]));
        assert!(outcome.changed);
        assert!(!Arc::ptr_eq(&before, reconciler.snapshot().unwrap()));
    }

    #[test]
    fn test_turn_change_is_reported() {
        let mut reconciler = Reconciler::new();
        assert!(!reconciler.apply_status_fetch(snapshot(&[])).turn_changed);

        let mut next = snapshot(&[1]);
        assert!(!reconciler.apply_delta(next.clone()).turn_changed);

        next.current_player = 2;
        assert!(reconciler.apply_delta(next).turn_changed);
    }

    #[test]
    fn test_delta_for_other_game_is_ignored() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_status_fetch(snapshot(&[]));

        let mut stray = snapshot(&[1, 2]);
        stray.game_id = "g-2".to_string();
        assert_eq!(reconciler.apply_delta(stray), Outcome::default());
        assert_eq!(reconciler.snapshot().unwrap().game_id, "g-1");
    }

    proptest! {
        #[test]
        fn prop_equal_deltas_are_no_ops(
            called in proptest::collection::btree_set(1i64..=100, 0..20),
            round in 1u32..10,
            current in 1i64..=2,
        ) {
            let mut base = snapshot(&called.iter().copied().collect::<Vec<_>>());
            base.current_round = round;
            base.current_player = current;
            let previous = Arc::new(base.clone());

            let mut shuffled = base;
            shuffled.called_numbers.reverse();
            shuffled.hints = Some(vec!["noise".to_string()]);

            let merged = apply_delta(Some(&previous), shuffled);
            prop_assert!(Arc::ptr_eq(&merged, &previous));
        }

        #[test]
        fn prop_terminal_fires_at_most_once(flags in proptest::collection::vec(any::<bool>(), 1..30)) {
            let mut reconciler = Reconciler::new();
            let mut fired = 0;
            for (round, over) in flags.iter().enumerate() {
                let mut next = snapshot(&[]);
                next.current_round = round as u32 + 1;
                next.game_over = *over;
                if reconciler.apply_delta(next).terminal {
                    fired += 1;
                }
            }
            let expected = if flags.iter().any(|f| *f) { 1 } else { 0 };
            prop_assert_eq!(fired, expected);
        }
    }
}
