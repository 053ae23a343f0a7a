//! Shared push connections, one per channel, consumed by many views.
//!
//! A [`Multiplexer`] is constructed once at start-up with no connections and
//! handed to every view. Views pair `connect`/`disconnect` calls for the
//! channels they need and attach listeners with `subscribe`. Each channel
//! entry owns its socket task, listener list and debounce timer; nothing
//! outside this module touches them.
//!
//! Inbound frames are decoded into [`PushMessage`] first. Frames that do not
//! decode are dropped with a log line. Decoded messages are debounced per
//! channel so a burst collapses into its last message.
//!
//! When a connection drops while its entry is still wanted, the entry is
//! discarded and a fresh one is dialed after a fixed delay, forever, until a
//! `disconnect` releases the channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use duel_common::PushMessage;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::websocket::Connector;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(120);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

pub type Handler = Arc<dyn Fn(&PushMessage) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct MultiplexerSettings {
    pub debounce: Duration,
    pub reconnect_delay: Duration,
}

impl Default for MultiplexerSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

struct Subscriber {
    id: u64,
    handler: Handler,
}

struct ChannelEntry {
    generation: u64,
    ref_count: usize,
    should_reconnect: bool,
    subscribers: Vec<Subscriber>,
    close_tx: Option<oneshot::Sender<()>>,
    debounce: Option<JoinHandle<()>>,
}

impl ChannelEntry {
    fn shut_down(mut self) {
        self.should_reconnect = false;
        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
    }
}

/// A dropped channel waiting for its backoff to elapse
struct PendingReconnect {
    generation: u64,
    subscribers: Vec<Subscriber>,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, ChannelEntry>,
    pending: HashMap<String, PendingReconnect>,
    debounce_overrides: HashMap<String, Duration>,
    next_generation: u64,
    next_subscriber: u64,
}

impl Registry {
    fn subscribers_mut(&mut self, channel: &str) -> Option<&mut Vec<Subscriber>> {
        if let Some(entry) = self.entries.get_mut(channel) {
            return Some(&mut entry.subscribers);
        }
        self.pending.get_mut(channel).map(|pending| &mut pending.subscribers)
    }
}

struct Shared {
    connector: Arc<dyn Connector>,
    settings: MultiplexerSettings,
    registry: Mutex<Registry>,
}

#[derive(Clone)]
pub struct Multiplexer {
    shared: Arc<Shared>,
}

impl Multiplexer {
    pub fn new(connector: Arc<dyn Connector>, settings: MultiplexerSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                settings,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Acquire `channel`, dialing it if no live entry exists
    pub fn connect(&self, channel: &str) {
        let mut registry = self.shared.registry();
        if let Some(entry) = registry.entries.get_mut(channel) {
            entry.ref_count += 1;
            debug!("push channel {channel} shared, refs={}", entry.ref_count);
            return;
        }

        let subscribers = match registry.pending.remove(channel) {
            Some(pending) => {
                pending.timer.abort();
                pending.subscribers
            }
            None => Vec::new(),
        };
        self.shared.open_entry(&mut registry, channel, subscribers);
    }

    /// Release one reference to `channel`, or tear down everything with `None`
    pub fn disconnect(&self, channel: Option<&str>) {
        let mut registry = self.shared.registry();
        let Some(channel) = channel else {
            info!("closing all push channels");
            for (_, entry) in registry.entries.drain() {
                entry.shut_down();
            }
            for (_, pending) in registry.pending.drain() {
                pending.timer.abort();
            }
            return;
        };

        if let Some(entry) = registry.entries.get_mut(channel) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            if entry.ref_count > 0 {
                debug!("push channel {channel} released, refs={}", entry.ref_count);
                return;
            }
            if let Some(entry) = registry.entries.remove(channel) {
                info!("closing push channel {channel}");
                entry.shut_down();
            }
        } else if let Some(pending) = registry.pending.remove(channel) {
            info!("cancelled reconnect of push channel {channel}");
            pending.timer.abort();
        } else {
            debug!("disconnect on idle push channel {channel}");
        }
    }

    /// Attach `handler` to a channel's delivered messages.
    ///
    /// With `channel` omitted the single live channel is used; when zero or
    /// several are live the request is refused and an inert subscription is
    /// returned.
    pub fn subscribe<F>(&self, handler: F, channel: Option<&str>) -> Subscription
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        let mut registry = self.shared.registry();
        let channel = match channel {
            Some(channel) => channel.to_string(),
            None => {
                let live: Vec<&String> = registry.entries.keys().collect();
                if live.len() != 1 {
                    warn!("refusing subscribe without channel: {} live channels", live.len());
                    return Subscription::inert();
                }
                live[0].clone()
            }
        };

        let id = registry.next_subscriber;
        registry.next_subscriber += 1;
        let Some(subscribers) = registry.subscribers_mut(&channel) else {
            warn!("refusing subscribe to unconnected push channel {channel}");
            return Subscription::inert();
        };
        subscribers.push(Subscriber {
            id,
            handler: Arc::new(handler),
        });

        Subscription {
            target: Some((Arc::downgrade(&self.shared), channel, id)),
        }
    }

    /// Subscribe and receive messages on an async channel instead of a callback
    pub fn subscribe_channel(&self, channel: &str) -> (Subscription, mpsc::UnboundedReceiver<PushMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(
            move |message| {
                let _ = tx.send(message.clone());
            },
            Some(channel),
        );
        (subscription, rx)
    }

    /// Override the quiet period for one channel
    pub fn set_debounce(&self, channel: &str, window: Duration) {
        self.shared
            .registry()
            .debounce_overrides
            .insert(channel.to_string(), window);
    }

    pub fn ref_count(&self, channel: &str) -> Option<usize> {
        self.shared.registry().entries.get(channel).map(|e| e.ref_count)
    }

    pub fn is_reconnecting(&self, channel: &str) -> bool {
        self.shared.registry().pending.contains_key(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.shared.registry().entries.keys().cloned().collect();
        channels.sort();
        channels
    }
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_entry(self: &Arc<Self>, registry: &mut Registry, channel: &str, subscribers: Vec<Subscriber>) {
        let generation = registry.next_generation;
        registry.next_generation += 1;

        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(connection_loop(
            Arc::downgrade(self),
            channel.to_string(),
            generation,
            close_rx,
        ));

        registry.entries.insert(
            channel.to_string(),
            ChannelEntry {
                generation,
                ref_count: 1,
                should_reconnect: true,
                subscribers,
                close_tx: Some(close_tx),
                debounce: None,
            },
        );
        debug!("push channel {channel} opened, generation={generation}");
    }

    fn inbound(self: &Arc<Self>, channel: &str, generation: u64, text: &str) {
        let message = match PushMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping undecodable push on {channel}: {e}");
                return;
            }
        };

        let mut registry = self.registry();
        let window = registry
            .debounce_overrides
            .get(channel)
            .copied()
            .unwrap_or(self.settings.debounce);
        let Some(entry) = registry.entries.get_mut(channel) else {
            return;
        };
        if entry.generation != generation {
            return;
        }

        if let Some(previous) = entry.debounce.take() {
            previous.abort();
        }
        let weak = Arc::downgrade(self);
        let channel = channel.to_string();
        entry.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(shared) = weak.upgrade() {
                shared.dispatch(&channel, generation, &message);
            }
        }));
    }

    fn dispatch(&self, channel: &str, generation: u64, message: &PushMessage) {
        let handlers: Vec<Handler> = {
            let registry = self.registry();
            match registry.entries.get(channel) {
                Some(entry) if entry.generation == generation => {
                    entry.subscribers.iter().map(|s| s.handler.clone()).collect()
                }
                _ => return,
            }
        };
        debug!("delivering push on {channel} to {} listeners", handlers.len());
        for handler in handlers {
            handler(message);
        }
    }

    fn connection_lost(self: &Arc<Self>, channel: &str, generation: u64) {
        let mut registry = self.registry();
        let is_current = matches!(
            registry.entries.get(channel),
            Some(entry) if entry.generation == generation && entry.should_reconnect
        );
        if !is_current {
            return;
        }
        let Some(mut entry) = registry.entries.remove(channel) else {
            return;
        };
        if let Some(timer) = entry.debounce.take() {
            timer.abort();
        }

        let delay = self.settings.reconnect_delay;
        warn!("push channel {channel} lost, reconnecting in {delay:?}");
        let weak = Arc::downgrade(self);
        let target = channel.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.reconnect(&target, generation);
            }
        });

        registry.pending.insert(
            channel.to_string(),
            PendingReconnect {
                generation,
                subscribers: std::mem::take(&mut entry.subscribers),
                timer,
            },
        );
    }

    fn reconnect(self: &Arc<Self>, channel: &str, generation: u64) {
        let mut registry = self.registry();
        let is_due = matches!(
            registry.pending.get(channel),
            Some(pending) if pending.generation == generation
        );
        if !is_due {
            return;
        }
        if let Some(pending) = registry.pending.remove(channel) {
            info!("reconnecting push channel {channel}");
            self.open_entry(&mut registry, channel, pending.subscribers);
        }
    }

    fn unsubscribe(&self, channel: &str, id: u64) {
        if let Some(subscribers) = self.registry().subscribers_mut(channel) {
            subscribers.retain(|s| s.id != id);
        }
    }
}

async fn connection_loop(
    shared: Weak<Shared>,
    channel: String,
    generation: u64,
    mut close_rx: oneshot::Receiver<()>,
) {
    let Some(connector) = shared.upgrade().map(|s| s.connector.clone()) else {
        return;
    };

    let connected = tokio::select! {
        _ = &mut close_rx => return,
        result = connector.connect(&channel) => result,
    };

    match connected {
        Err(e) => error!("push channel {channel} failed to connect: {e}"),
        Ok(mut transport) => {
            info!("push channel {channel} connected");
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        if let Err(e) = transport.close().await {
                            debug!("push channel {channel} close: {e}");
                        }
                        return;
                    }
                    frame = transport.recv() => match frame {
                        Some(Ok(text)) => {
                            let Some(shared) = shared.upgrade() else { return };
                            shared.inbound(&channel, generation, &text);
                        }
                        Some(Err(e)) => {
                            error!("push channel {channel} transport error: {e}");
                            break;
                        }
                        None => {
                            info!("push channel {channel} closed by server");
                            break;
                        }
                    }
                }
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        shared.connection_lost(&channel, generation);
    }
}

/// Handle that detaches exactly one listener
pub struct Subscription {
    target: Option<(Weak<Shared>, String, u64)>,
}

impl Subscription {
    fn inert() -> Self {
        Self { target: None }
    }

    /// Whether this subscription was actually attached
    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn unsubscribe(self) {
        if let Some((shared, channel, id)) = self.target {
            if let Some(shared) = shared.upgrade() {
                shared.unsubscribe(&channel, id);
            }
        }
    }
}

/// One view's hold on a channel: a reference from `connect` plus a receiving
/// subscription.
///
/// A reconnect resets the entry's reference count to 1, so another holder's
/// `disconnect` can close a channel this feed still needs. `recv` notices the
/// closed receiver and takes a fresh reference.
pub struct ChannelFeed {
    push: Multiplexer,
    channel: String,
    subscription: Subscription,
    messages: mpsc::UnboundedReceiver<PushMessage>,
}

impl ChannelFeed {
    pub fn open(push: &Multiplexer, channel: &str) -> Self {
        push.connect(channel);
        let (subscription, messages) = push.subscribe_channel(channel);
        Self {
            push: push.clone(),
            channel: channel.to_string(),
            subscription,
            messages,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next delivered message. Cancel safe.
    pub async fn recv(&mut self) -> PushMessage {
        loop {
            if let Some(message) = self.messages.recv().await {
                return message;
            }
            if !self.subscription.is_active() {
                // Never attached, nothing will ever arrive
                return std::future::pending().await;
            }
            warn!("push channel {} closed under a live view, rejoining", self.channel);
            self.push.connect(&self.channel);
            let (subscription, messages) = self.push.subscribe_channel(&self.channel);
            self.subscription = subscription;
            self.messages = messages;
        }
    }

    /// Release the subscription and the reference taken by `open`
    pub fn close(self) {
        self.subscription.unsubscribe();
        self.push.disconnect(Some(&self.channel));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::websocket::{Transport, TransportError};

    use super::*;

    /// Server side of one mock connection
    #[derive(Clone)]
    pub struct MockLink {
        pub channel: String,
        frames: mpsc::UnboundedSender<Option<String>>,
        closed: Arc<AtomicBool>,
    }

    impl MockLink {
        pub fn push(&self, text: &str) {
            let _ = self.frames.send(Some(text.to_string()));
        }

        pub fn drop_connection(&self) {
            let _ = self.frames.send(None);
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    struct MockTransport {
        frames: mpsc::UnboundedReceiver<Option<String>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn recv(&mut self) -> Option<Result<String, TransportError>> {
            match self.frames.recv().await {
                Some(Some(text)) => Some(Ok(text)),
                Some(None) => None,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockConnector {
        links: Mutex<Vec<MockLink>>,
        failures: AtomicUsize,
    }

    impl MockConnector {
        pub fn links(&self, channel: &str) -> Vec<MockLink> {
            self.links
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.channel == channel)
                .cloned()
                .collect()
        }

        pub fn latest(&self, channel: &str) -> MockLink {
            self.links(channel).pop().expect("channel was never dialed")
        }

        pub fn fail_next(&self, count: usize) {
            self.failures.store(count, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, channel: &str) -> Result<Box<dyn Transport>, TransportError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransportError::Closed);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            self.links.lock().unwrap().push(MockLink {
                channel: channel.to_string(),
                frames: tx,
                closed: closed.clone(),
            });
            Ok(Box::new(MockTransport { frames: rx, closed }))
        }
    }

    /// Let spawned connection and timer tasks run
    pub async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn setup() -> (Multiplexer, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::default());
        let mux = Multiplexer::new(connector.clone(), MultiplexerSettings::default());
        (mux, connector)
    }

    fn collect(mux: &Multiplexer, channel: Option<&str>) -> (Subscription, Arc<Mutex<Vec<PushMessage>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = mux.subscribe(move |m| sink.lock().unwrap().push(m.clone()), channel);
        (subscription, seen)
    }

    fn game_started(id: &str) -> String {
        format!(r#"{{"type": "game_started", "game_id": "{id}"}}"#)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_counted_lifecycle() {
        let (mux, connector) = setup();
        mux.connect("room_7");
        mux.connect("room_7");
        settle().await;

        assert_eq!(connector.links("room_7").len(), 1);
        assert_eq!(mux.ref_count("room_7"), Some(2));

        mux.disconnect(Some("room_7"));
        settle().await;
        assert_eq!(mux.ref_count("room_7"), Some(1));
        assert!(!connector.latest("room_7").is_closed());

        mux.disconnect(Some("room_7"));
        settle().await;
        assert_eq!(mux.ref_count("room_7"), None);
        assert!(connector.latest("room_7").is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_to_last_message() {
        let (mux, connector) = setup();
        mux.connect("room_7");
        let (_sub, seen) = collect(&mux, Some("room_7"));
        settle().await;

        let link = connector.latest("room_7");
        link.push(&game_started("a"));
        link.push(&game_started("b"));
        link.push(&game_started("c"));
        settle().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], PushMessage::GameStarted { game_id, .. } if game_id == "c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_frames_are_swallowed() {
        let (mux, connector) = setup();
        mux.connect("lobby");
        let (_sub, seen) = collect(&mux, Some("lobby"));
        settle().await;

        let link = connector.latest("lobby");
        link.push("{not json");
        link.push(r#"{"type": "mystery"}"#);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(seen.lock().unwrap().is_empty());

        link.push(r#"{"type": "refresh"}"#);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock().unwrap(), vec![PushMessage::Refresh]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_channel_debounce_override() {
        let (mux, connector) = setup();
        mux.set_debounce("lobby", Duration::from_millis(500));
        mux.connect("lobby");
        let (_sub, seen) = collect(&mux, Some("lobby"));
        settle().await;

        connector.latest("lobby").push(r#"{"type": "refresh"}"#);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_delay_with_fresh_entry() {
        let (mux, connector) = setup();
        mux.connect("room_7");
        mux.connect("room_7");
        let (_sub, seen) = collect(&mux, Some("room_7"));
        settle().await;

        connector.latest("room_7").drop_connection();
        settle().await;
        assert!(mux.is_reconnecting("room_7"));
        assert_eq!(mux.ref_count("room_7"), None);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(connector.links("room_7").len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.links("room_7").len(), 2);
        assert_eq!(mux.ref_count("room_7"), Some(1));

        connector.latest("room_7").push(r#"{"type": "refresh"}"#);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dial_keeps_retrying() {
        let (mux, connector) = setup();
        connector.fail_next(2);
        mux.connect("lobby");
        settle().await;
        assert!(mux.is_reconnecting("lobby"));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(mux.is_reconnecting("lobby"));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(mux.ref_count("lobby"), Some(1));
        assert_eq!(connector.links("lobby").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let (mux, connector) = setup();
        mux.connect("room_7");
        settle().await;

        connector.latest("room_7").drop_connection();
        settle().await;
        mux.disconnect(Some("room_7"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.links("room_7").len(), 1);
        assert!(!mux.is_reconnecting("room_7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_during_backoff_dials_immediately() {
        let (mux, connector) = setup();
        mux.connect("room_7");
        settle().await;
        connector.latest("room_7").drop_connection();
        settle().await;

        mux.connect("room_7");
        settle().await;
        assert_eq!(connector.links("room_7").len(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.links("room_7").len(), 2);
        assert_eq!(mux.ref_count("room_7"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_without_channel_requires_single_entry() {
        let (mux, connector) = setup();
        let (none, _) = collect(&mux, None);
        assert!(!none.is_active());

        mux.connect("lobby");
        let (single, seen) = collect(&mux, None);
        assert!(single.is_active());

        mux.connect("room_7");
        let (ambiguous, _) = collect(&mux, None);
        assert!(!ambiguous.is_active());
        ambiguous.unsubscribe();

        settle().await;
        connector.latest("lobby").push(r#"{"type": "refresh"}"#);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_removes_only_that_listener() {
        let (mux, connector) = setup();
        mux.connect("lobby");
        let (first, first_seen) = collect(&mux, Some("lobby"));
        let (_second, second_seen) = collect(&mux, Some("lobby"));
        settle().await;

        first.unsubscribe();
        connector.latest("lobby").push(r#"{"type": "refresh"}"#);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(second_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_teardown_closes_everything() {
        let (mux, connector) = setup();
        mux.connect("lobby");
        mux.connect("room_1");
        mux.connect("room_1");
        settle().await;

        mux.disconnect(None);
        settle().await;
        assert!(mux.channels().is_empty());
        assert!(connector.latest("lobby").is_closed());
        assert!(connector.latest("room_1").is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_channel_receiver() {
        let (mux, connector) = setup();
        mux.connect("lobby");
        let (_sub, mut rx) = mux.subscribe_channel("lobby");
        settle().await;

        connector.latest("lobby").push(r#"{"type": "refresh"}"#);
        let message = rx.recv().await.unwrap();
        assert_eq!(message, PushMessage::Refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_rejoins_after_reconnect_and_sibling_release() {
        let (mux, connector) = setup();
        let mut room_view = ChannelFeed::open(&mux, "room_7");
        let board = ChannelFeed::open(&mux, "room_7");
        settle().await;
        assert_eq!(mux.ref_count("room_7"), Some(2));

        connector.latest("room_7").drop_connection();
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(mux.ref_count("room_7"), Some(1));

        board.close();
        settle().await;
        assert_eq!(mux.ref_count("room_7"), None);

        let next = tokio::spawn(async move {
            let message = room_view.recv().await;
            (room_view, message)
        });
        settle().await;
        assert_eq!(mux.ref_count("room_7"), Some(1));

        connector.latest("room_7").push(r#"{"type": "refresh"}"#);
        let (room_view, message) = next.await.unwrap();
        assert_eq!(message, PushMessage::Refresh);

        room_view.close();
        settle().await;
        assert!(mux.channels().is_empty());
    }
}
