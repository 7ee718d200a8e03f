//! Broadcast hub
//!
//! The hub owns the [`EventStore`] and the [`SessionRegistry`]. Every
//! operation that touches the store or fans out to sinks runs under a single
//! lock, which gives each sink a consistent view: events (and announcements)
//! are queued to every sink in the order they were published.
//!
//! Sinks never block the hub. A sink that rejects a push (closed or full) is
//! detached after the fanout completes and the publisher is not told.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glisten_core::config::{GlistenConfig, ReadMode};
use glisten_core::{Event, HubError, SessionId, SinkError};

use crate::registry::{SessionEntry, SessionRegistry};
use crate::sink::{Delivery, Sink};
use crate::store::EventStore;

/// Behavior switches for a hub
#[derive(Debug, Clone, Default)]
pub struct HubOptions {
    /// Store read backing [`BroadcastHub::latest`]
    pub read_mode: ReadMode,
    /// Announce joins and leaves to the other sessions
    pub announce_presence: bool,
    /// Maximum number of attached sessions
    pub max_sessions: Option<usize>,
    /// Maximum number of retained events
    pub max_events: Option<usize>,
}

impl From<&GlistenConfig> for HubOptions {
    fn from(config: &GlistenConfig) -> Self {
        Self {
            read_mode: config.read_mode,
            announce_presence: config.announce_presence,
            max_sessions: config.max_sessions,
            max_events: config.max_events,
        }
    }
}

/// Point-in-time counters, served by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently attached sessions
    pub sessions: usize,
    /// Events currently retained
    pub retained_events: usize,
    /// Sequence number the next event will receive
    pub next_sequence: u64,
    /// Events published since start
    pub published: u64,
    /// Sessions detached because a push failed
    pub dropped_sessions: u64,
    /// Read mode of the pull endpoint
    pub read_mode: String,
}

/// Accepts events and pushes them to every attached session
pub struct BroadcastHub {
    /// Event history; the lock also serializes fanout
    store: Mutex<EventStore>,
    /// Attached sessions
    sessions: SessionRegistry,
    /// Behavior switches
    options: HubOptions,
    /// Events published since start
    published: AtomicU64,
    /// Sessions detached after a failed push
    dropped: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with default options
    pub fn new() -> Self {
        Self::with_options(HubOptions::default())
    }

    /// Create a hub with the given options
    pub fn with_options(options: HubOptions) -> Self {
        let store = match options.max_events {
            Some(max) => EventStore::with_capacity_limit(max),
            None => EventStore::new(),
        };

        Self {
            store: Mutex::new(store),
            sessions: SessionRegistry::with_limit(options.max_sessions),
            options,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a hub configured from the daemon configuration
    pub fn from_config(config: &GlistenConfig) -> Self {
        Self::with_options(HubOptions::from(config))
    }

    /// Hub options
    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    /// Store an event and push it to every session attached right now
    ///
    /// Sessions attached after this call do not receive the event. Sink
    /// failures detach the failing session and are otherwise invisible to
    /// the caller.
    pub fn publish(&self, payload: impl Into<String>) -> Event {
        let (event, failed) = {
            let mut store = self.store.lock();
            let event = store.append(payload);
            let targets = self.sessions.snapshot();
            let failed = fanout(&targets, &Delivery::Event(event.clone()), None);
            (event, failed)
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Published event #{}", event.sequence);

        self.reap(failed);
        event
    }

    /// Attach a sink and return its session ID
    ///
    /// With presence announcements enabled, the other sessions are told
    /// about the newcomer. The announcement is not stored.
    pub fn attach(
        &self,
        label: impl Into<String>,
        sink: Arc<dyn Sink>,
    ) -> Result<SessionId, HubError> {
        self.attach_with_greeting(label, sink, None)
    }

    /// Attach a sink whose first delivery is `greeting`
    ///
    /// The greeting is pushed under the publish lock, so no event published
    /// concurrently can overtake it.
    pub fn attach_with_greeting(
        &self,
        label: impl Into<String>,
        sink: Arc<dyn Sink>,
        greeting: Option<String>,
    ) -> Result<SessionId, HubError> {
        let label = label.into();

        let (id, failed) = {
            let _store = self.store.lock();
            let id = match self.sessions.attach(label.clone(), Arc::clone(&sink)) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Rejected session for {}: {}", label, e);
                    return Err(e);
                }
            };

            let mut failed = Vec::new();
            if let Some(text) = greeting {
                if let Err(e) = sink.push(Delivery::Notice(text)) {
                    failed.push((id, e));
                }
            }

            if self.options.announce_presence {
                let targets = self.sessions.snapshot();
                let notice = Delivery::Notice(format!("*** {} joined", label));
                failed.extend(fanout(&targets, &notice, Some(id)));
            }
            (id, failed)
        };

        tracing::info!("Session {} attached ({})", id, label);
        self.reap(failed);
        Ok(id)
    }

    /// Detach a session
    ///
    /// Returns `false` if the session was not attached; that is not an
    /// error. A fanout already in progress may still deliver to it.
    pub fn detach(&self, id: SessionId) -> bool {
        match self.sessions.detach(id) {
            Some(entry) => {
                tracing::info!("Session {} detached ({})", id, entry.label);
                self.announce_leave(&entry);
                true
            }
            None => {
                tracing::trace!("Detach of unknown session {} ignored", id);
                false
            }
        }
    }

    /// Push a message directly to one session, e.g. a greeting
    ///
    /// Returns `false` if the session is not attached or the push failed,
    /// in which case the session is detached.
    pub fn send_to(&self, id: SessionId, text: impl Into<String>) -> bool {
        let result = {
            let _store = self.store.lock();
            self.sessions
                .get(id)
                .map(|entry| entry.sink.push(Delivery::Notice(text.into())))
        };

        match result {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                self.reap(vec![(id, e)]);
                false
            }
            None => false,
        }
    }

    /// Oldest retained event, not removed
    pub fn first(&self) -> Result<Event, HubError> {
        self.store.lock().first().cloned()
    }

    /// Remove and return the newest event
    pub fn pop_latest(&self) -> Result<Event, HubError> {
        self.store.lock().pop_latest()
    }

    /// The current event according to the configured [`ReadMode`]
    ///
    /// `Peek` returns [`first`](Self::first), `Drain` returns
    /// [`pop_latest`](Self::pop_latest).
    pub fn latest(&self) -> Result<Event, HubError> {
        match self.options.read_mode {
            ReadMode::Peek => self.first(),
            ReadMode::Drain => self.pop_latest(),
        }
    }

    /// Remove the first retained event with this payload
    pub fn delete(&self, payload: &str) -> bool {
        self.store.lock().delete(payload)
    }

    /// Retained events in publish order
    pub fn events(&self) -> Vec<Event> {
        self.store.lock().iter().cloned().collect()
    }

    /// Check whether a session is attached
    pub fn is_attached(&self, id: SessionId) -> bool {
        self.sessions.contains(id)
    }

    /// Number of attached sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Current counters
    pub fn stats(&self) -> HubStats {
        let store = self.store.lock();
        HubStats {
            sessions: self.sessions.len(),
            retained_events: store.len(),
            next_sequence: store.next_sequence(),
            published: self.published.load(Ordering::Relaxed),
            dropped_sessions: self.dropped.load(Ordering::Relaxed),
            read_mode: self.options.read_mode.to_string(),
        }
    }

    fn announce_leave(&self, entry: &SessionEntry) {
        if !self.options.announce_presence {
            return;
        }

        let failed = {
            let _store = self.store.lock();
            let targets = self.sessions.snapshot();
            let notice = Delivery::Notice(format!("*** {} left", entry.label));
            fanout(&targets, &notice, Some(entry.id))
        };
        self.reap(failed);
    }

    /// Detach sessions whose push failed
    ///
    /// Runs outside the store lock. Leave announcements can fail further
    /// sinks, so this keeps going until nothing is left to remove.
    fn reap(&self, mut failed: Vec<(SessionId, SinkError)>) {
        while let Some((id, err)) = failed.pop() {
            let Some(entry) = self.sessions.detach(id) else {
                continue;
            };

            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Dropping session {} ({}): {}", id, entry.label, err);

            if self.options.announce_presence {
                let _store = self.store.lock();
                let targets = self.sessions.snapshot();
                let notice = Delivery::Notice(format!("*** {} left", entry.label));
                failed.extend(fanout(&targets, &notice, Some(id)));
            }
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Push one delivery to every target, collecting the ones that failed
fn fanout(
    targets: &[SessionEntry],
    delivery: &Delivery,
    except: Option<SessionId>,
) -> Vec<(SessionId, SinkError)> {
    targets
        .iter()
        .filter(|entry| Some(entry.id) != except)
        .filter_map(|entry| entry.sink.push(delivery.clone()).err().map(|e| (entry.id, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use std::sync::atomic::AtomicBool;
    use std::sync::Weak;
    use tokio::sync::mpsc;

    fn attach_channel(hub: &BroadcastHub, label: &str) -> (SessionId, mpsc::Receiver<Delivery>) {
        let (sink, rx) = ChannelSink::channel(16);
        let id = hub.attach(label, Arc::new(sink)).unwrap();
        (id, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Delivery>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            out.push(match delivery {
                Delivery::Event(event) => event.payload,
                Delivery::Notice(text) => text,
            });
        }
        out
    }

    /// Sink that always fails
    struct BrokenSink {
        pushes: AtomicU64,
    }

    impl Sink for BrokenSink {
        fn push(&self, _delivery: Delivery) -> Result<(), SinkError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Closed)
        }
    }

    /// Sink that detaches another session from inside a fanout
    struct DetachingSink {
        hub: Mutex<Weak<BroadcastHub>>,
        victim: Mutex<Option<SessionId>>,
        fired: AtomicBool,
    }

    impl Sink for DetachingSink {
        fn push(&self, _delivery: Delivery) -> Result<(), SinkError> {
            if !self.fired.swap(true, Ordering::SeqCst) {
                if let (Some(hub), Some(victim)) = (self.hub.lock().upgrade(), *self.victim.lock()) {
                    hub.detach(victim);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_publish_reaches_all_attached_sessions() {
        let hub = BroadcastHub::new();
        let mut receivers: Vec<_> = (0..3)
            .map(|i| attach_channel(&hub, &format!("s{}", i)).1)
            .collect();

        let event = hub.publish("deploy");
        assert_eq!(event.sequence, 0);

        for rx in receivers.iter_mut() {
            assert_eq!(drain(rx), vec!["deploy"]);
        }
    }

    #[test]
    fn test_late_attach_sees_only_future_events() {
        let hub = BroadcastHub::new();
        let (_a, mut rx_a) = attach_channel(&hub, "a");
        hub.publish("x");
        let (_b, mut rx_b) = attach_channel(&hub, "b");
        hub.publish("y");

        assert_eq!(drain(&mut rx_a), vec!["x", "y"]);
        assert_eq!(drain(&mut rx_b), vec!["y"]);
    }

    #[test]
    fn test_publish_with_no_sessions_still_stores() {
        let hub = BroadcastHub::new();
        hub.publish("lonely");
        assert_eq!(hub.first().unwrap().payload, "lonely");
    }

    #[test]
    fn test_failing_sink_is_detached() {
        let hub = BroadcastHub::new();
        let broken = Arc::new(BrokenSink {
            pushes: AtomicU64::new(0),
        });
        let broken_id = hub.attach("broken", broken.clone()).unwrap();
        let (_ok, mut rx) = attach_channel(&hub, "ok");

        hub.publish("one");
        hub.publish("two");

        assert!(!hub.is_attached(broken_id));
        assert_eq!(broken.pushes.load(Ordering::SeqCst), 1);
        assert_eq!(drain(&mut rx), vec!["one", "two"]);
        assert_eq!(hub.stats().dropped_sessions, 1);
    }

    #[test]
    fn test_full_sink_is_detached_without_blocking_others() {
        let hub = BroadcastHub::new();
        let (slow_sink, _slow_rx) = ChannelSink::channel(1);
        let slow = hub.attach("slow", Arc::new(slow_sink)).unwrap();
        let (_fast, mut rx) = attach_channel(&hub, "fast");

        hub.publish("1");
        hub.publish("2");
        hub.publish("3");

        assert!(!hub.is_attached(slow));
        assert_eq!(drain(&mut rx), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_detach_during_fanout() {
        let hub = Arc::new(BroadcastHub::new());
        let detacher = Arc::new(DetachingSink {
            hub: Mutex::new(Weak::new()),
            victim: Mutex::new(None),
            fired: AtomicBool::new(false),
        });
        *detacher.hub.lock() = Arc::downgrade(&hub);

        hub.attach("detacher", detacher.clone()).unwrap();
        let (victim, mut victim_rx) = attach_channel(&hub, "victim");
        let (_other, mut other_rx) = attach_channel(&hub, "other");
        *detacher.victim.lock() = Some(victim);

        hub.publish("in-flight");
        hub.publish("after");

        assert!(!hub.is_attached(victim));
        assert_eq!(drain(&mut other_rx), vec!["in-flight", "after"]);
        // The in-flight event may or may not arrive; nothing later does
        let seen = drain(&mut victim_rx);
        assert!(!seen.contains(&"after".to_string()));
    }

    #[test]
    fn test_detach_is_idempotent() {
        let hub = BroadcastHub::new();
        let (id, _rx) = attach_channel(&hub, "a");

        assert!(hub.detach(id));
        assert!(!hub.detach(id));
        assert!(!hub.detach(SessionId::new(42)));
    }

    #[test]
    fn test_detached_session_receives_nothing() {
        let hub = BroadcastHub::new();
        let (id, mut rx) = attach_channel(&hub, "a");
        hub.detach(id);
        hub.publish("x");

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_pop_latest_scenario() {
        let hub = BroadcastHub::new();
        hub.publish("alpha");
        hub.publish("beta");

        assert_eq!(hub.pop_latest().unwrap().payload, "beta");
        assert_eq!(hub.pop_latest().unwrap().payload, "alpha");
        assert_eq!(hub.pop_latest(), Err(HubError::EmptyStore));
    }

    #[test]
    fn test_latest_follows_read_mode() {
        let peek = BroadcastHub::new();
        peek.publish("alpha");
        peek.publish("beta");
        assert_eq!(peek.latest().unwrap().payload, "alpha");
        assert_eq!(peek.latest().unwrap().payload, "alpha");

        let drain_hub = BroadcastHub::with_options(HubOptions {
            read_mode: ReadMode::Drain,
            ..Default::default()
        });
        drain_hub.publish("alpha");
        drain_hub.publish("beta");
        assert_eq!(drain_hub.latest().unwrap().payload, "beta");
        assert_eq!(drain_hub.latest().unwrap().payload, "alpha");
        assert_eq!(drain_hub.latest(), Err(HubError::EmptyStore));
    }

    #[test]
    fn test_empty_reads() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.first(), Err(HubError::EmptyStore));
        assert_eq!(hub.latest(), Err(HubError::EmptyStore));
    }

    #[test]
    fn test_delete_by_value() {
        let hub = BroadcastHub::new();
        hub.publish("keep");
        hub.publish("drop");

        assert!(hub.delete("drop"));
        assert!(!hub.delete("drop"));
        assert_eq!(
            hub.events().iter().map(|e| e.payload.as_str()).collect::<Vec<_>>(),
            vec!["keep"]
        );
    }

    #[test]
    fn test_presence_announcements() {
        let hub = BroadcastHub::with_options(HubOptions {
            announce_presence: true,
            ..Default::default()
        });
        let (_alice, mut rx_alice) = attach_channel(&hub, "alice");
        let (bob, mut rx_bob) = attach_channel(&hub, "bob");
        hub.publish("hello");
        hub.detach(bob);

        assert_eq!(
            drain(&mut rx_alice),
            vec!["*** bob joined", "hello", "*** bob left"]
        );
        assert_eq!(drain(&mut rx_bob), vec!["hello"]);
        // Announcements are not stored
        assert_eq!(hub.events().len(), 1);
    }

    #[test]
    fn test_send_to_single_session() {
        let hub = BroadcastHub::new();
        let (a, mut rx_a) = attach_channel(&hub, "a");
        let (_b, mut rx_b) = attach_channel(&hub, "b");

        assert!(hub.send_to(a, "Welcome"));
        assert!(!hub.send_to(SessionId::new(99), "nobody"));

        assert_eq!(drain(&mut rx_a), vec!["Welcome"]);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_greeting_is_first_delivery() {
        let hub = BroadcastHub::with_options(HubOptions {
            announce_presence: true,
            ..Default::default()
        });
        let (_a, mut rx_a) = attach_channel(&hub, "a");
        hub.publish("before");

        let (sink, mut rx_b) = ChannelSink::channel(16);
        hub.attach_with_greeting("b", Arc::new(sink), Some("Welcome, b!".into()))
            .unwrap();
        hub.publish("after");

        assert_eq!(drain(&mut rx_b), vec!["Welcome, b!", "after"]);
        assert_eq!(drain(&mut rx_a), vec!["before", "*** b joined", "after"]);
        assert_eq!(hub.events().len(), 2);
    }

    #[test]
    fn test_failed_greeting_detaches() {
        let hub = BroadcastHub::new();
        let sink = Arc::new(BrokenSink {
            pushes: AtomicU64::new(0),
        });

        let id = hub
            .attach_with_greeting("b", sink.clone(), Some("hello".into()))
            .unwrap();

        assert!(!hub.is_attached(id));
        assert_eq!(sink.pushes.load(Ordering::SeqCst), 1);
        assert_eq!(hub.stats().dropped_sessions, 1);
    }

    #[tokio::test]
    async fn test_greeting_not_overtaken_by_concurrent_publish() {
        let hub = Arc::new(BroadcastHub::new());
        let stop = Arc::new(AtomicBool::new(false));

        let publisher = {
            let hub = Arc::clone(&hub);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::SeqCst) {
                    hub.publish(format!("e{}", i));
                    i += 1;
                }
            })
        };

        for n in 0..50 {
            let (sink, mut rx) = ChannelSink::channel(1024);
            let id = hub
                .attach_with_greeting(format!("s{}", n), Arc::new(sink), Some("hello".into()))
                .unwrap();
            tokio::task::yield_now().await;
            hub.detach(id);

            assert_eq!(rx.try_recv(), Ok(Delivery::Notice("hello".into())));
        }

        stop.store(true, Ordering::SeqCst);
        publisher.join().unwrap();
    }

    #[test]
    fn test_session_limit() {
        let hub = BroadcastHub::with_options(HubOptions {
            max_sessions: Some(1),
            ..Default::default()
        });
        let (_a, _rx) = attach_channel(&hub, "a");
        let (sink, _rx_b) = ChannelSink::channel(1);

        assert_eq!(
            hub.attach("b", Arc::new(sink)),
            Err(HubError::SessionLimitExceeded(1))
        );
        assert_eq!(hub.session_count(), 1);
    }

    #[test]
    fn test_stats() {
        let hub = BroadcastHub::new();
        let (_a, _rx) = attach_channel(&hub, "a");
        hub.publish("one");
        hub.publish("two");
        hub.pop_latest().unwrap();

        let stats = hub.stats();
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.retained_events, 1);
        assert_eq!(stats.next_sequence, 2);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.read_mode, "peek");
    }

    #[tokio::test]
    async fn test_concurrent_publishers_keep_order_per_sink() {
        let hub = Arc::new(BroadcastHub::new());
        let (sink_a, mut rx_a) = ChannelSink::channel(512);
        let (sink_b, mut rx_b) = ChannelSink::channel(512);
        hub.attach("a", Arc::new(sink_a)).unwrap();
        hub.attach("b", Arc::new(sink_b)).unwrap();

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    hub.publish(format!("{}-{}", worker, i));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let sequences = |rx: &mut mpsc::Receiver<Delivery>| {
            let mut seqs = Vec::new();
            while let Ok(Delivery::Event(event)) = rx.try_recv() {
                seqs.push(event.sequence);
            }
            seqs
        };
        let a = sequences(&mut rx_a);
        let b = sequences(&mut rx_b);

        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }
}
