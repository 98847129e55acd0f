//! Per-session fan-out of state frames to open push connections.
//!
//! Publishing never waits on a subscriber. Each subscriber owns a bounded
//! queue. A subscriber whose queue is full or closed is pruned: its stream
//! ends rather than skip a state. The broadcaster only holds senders, so
//! the transport decides how long a connection lives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tab_game::SessionId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What a push connection receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Full session state as JSON.
    State(Arc<str>),
    /// Inert frame that keeps idle connections open.
    KeepAlive,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Frame>,
}

#[derive(Debug)]
struct Topics {
    next_id: AtomicU64,
    buffer: usize,
    by_session: Mutex<HashMap<SessionId, Vec<Subscriber>>>,
}

impl Topics {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<Subscriber>>> {
        // A panic while holding the map cannot leave it half-updated.
        self.by_session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, session_id: &str, id: u64) {
        let mut topics = self.lock();
        if let Some(subscribers) = topics.get_mut(session_id) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                topics.remove(session_id);
            }
        }
    }
}

/// Publish/subscribe registry keyed by session id.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    topics: Arc<Topics>,
}

impl Broadcaster {
    /// Creates a broadcaster whose subscribers queue up to `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: Arc::new(Topics {
                next_id: AtomicU64::new(0),
                buffer: buffer.max(1),
                by_session: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Opens a subscription to `session_id` whose first frame is `snapshot`.
    #[instrument(skip(self, snapshot))]
    pub fn subscribe(&self, session_id: &str, snapshot: Arc<str>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.topics.buffer);
        // The queue is empty and has room for at least one frame.
        let _ = tx.try_send(Frame::State(snapshot));

        let id = self.topics.next_id.fetch_add(1, Ordering::Relaxed);
        self.topics
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        debug!(subscriber = id, "Subscriber added");

        Subscription {
            session_id: session_id.to_string(),
            id,
            rx,
            topics: Arc::downgrade(&self.topics),
        }
    }

    /// Sends `frame` to every subscriber of `session_id` and returns how
    /// many accepted it.
    #[instrument(skip(self, frame))]
    pub fn publish(&self, session_id: &str, frame: Frame) -> usize {
        let mut topics = self.topics.lock();
        let Some(subscribers) = topics.get_mut(session_id) else {
            return 0;
        };
        let delivered = deliver(subscribers, &frame);
        if subscribers.is_empty() {
            topics.remove(session_id);
        }
        debug!(delivered, "Frame published");
        delivered
    }

    /// Sends a keep-alive frame to every subscriber of every session.
    pub fn keep_alive(&self) -> usize {
        let mut topics = self.topics.lock();
        let delivered = topics
            .values_mut()
            .map(|subscribers| deliver(subscribers, &Frame::KeepAlive))
            .sum();
        topics.retain(|_, subscribers| !subscribers.is_empty());
        delivered
    }

    /// Open subscriptions for `session_id`.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.topics.lock().get(session_id).map_or(0, Vec::len)
    }

    /// Starts the periodic keep-alive ticker.
    #[instrument(skip(self))]
    pub fn spawn_keep_alive(&self, period: Duration) -> KeepAliveTask {
        let broadcaster = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let delivered = broadcaster.keep_alive();
                debug!(delivered, "Keep-alive sent");
            }
        });
        info!(period_secs = period.as_secs(), "Keep-alive ticker started");
        KeepAliveTask { handle }
    }
}

fn deliver(subscribers: &mut Vec<Subscriber>, frame: &Frame) -> usize {
    let mut delivered = 0;
    subscribers.retain(|subscriber| match subscriber.tx.try_send(frame.clone()) {
        Ok(()) => {
            delivered += 1;
            true
        }
        Err(TrySendError::Full(_)) => {
            warn!(subscriber = subscriber.id, "Subscriber queue full, pruned");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(subscriber = subscriber.id, "Subscriber gone, pruned");
            false
        }
    });
    delivered
}

/// Receiving end of one push connection. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    session_id: SessionId,
    id: u64,
    rx: mpsc::Receiver<Frame>,
    topics: Weak<Topics>,
}

impl Subscription {
    /// Session this subscription follows.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next frame, or `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(topics) = self.topics.upgrade() {
            topics.remove(&self.session_id, self.id);
            debug!(session_id = %self.session_id, subscriber = self.id, "Subscriber removed");
        }
    }
}

/// Handle on the keep-alive ticker; stops it when dropped.
#[derive(Debug)]
pub struct KeepAliveTask {
    handle: JoinHandle<()>,
}

impl KeepAliveTask {
    /// Stops the ticker and waits for it to wind down.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for KeepAliveTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(json: &str) -> Frame {
        Frame::State(Arc::from(json))
    }

    #[tokio::test]
    async fn snapshot_first_then_published_frames() {
        let broadcaster = Broadcaster::new(8);
        let mut sub = broadcaster.subscribe("g", Arc::from("{\"n\":0}"));
        assert_eq!(broadcaster.publish("g", state("{\"n\":1}")), 1);
        assert_eq!(broadcaster.publish("other", state("{}")), 0);

        assert_eq!(sub.recv().await, Some(state("{\"n\":0}")));
        assert_eq!(sub.recv().await, Some(state("{\"n\":1}")));
    }

    #[tokio::test]
    async fn dropped_subscription_unsubscribes() {
        let broadcaster = Broadcaster::new(8);
        let sub = broadcaster.subscribe("g", Arc::from("{}"));
        assert_eq!(broadcaster.subscriber_count("g"), 1);
        drop(sub);
        assert_eq!(broadcaster.subscriber_count("g"), 0);
        assert_eq!(broadcaster.publish("g", state("{}")), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_the_subscriber() {
        let broadcaster = Broadcaster::new(1);
        let mut slow = broadcaster.subscribe("g", Arc::from("first"));
        let mut fast = broadcaster.subscribe("g", Arc::from("first"));
        fast.recv().await;

        assert_eq!(broadcaster.publish("g", state("second")), 1);
        assert_eq!(broadcaster.subscriber_count("g"), 1);
        assert_eq!(fast.recv().await, Some(state("second")));

        // The slow stream ends after what it already queued.
        assert_eq!(slow.recv().await, Some(state("first")));
        assert_eq!(slow.recv().await, None);
    }

    #[tokio::test]
    async fn keep_alive_reaches_every_session() {
        let broadcaster = Broadcaster::new(4);
        let mut a = broadcaster.subscribe("a", Arc::from("{}"));
        let mut b = broadcaster.subscribe("b", Arc::from("{}"));
        assert_eq!(broadcaster.keep_alive(), 2);

        a.recv().await;
        b.recv().await;
        assert_eq!(a.recv().await, Some(Frame::KeepAlive));
        assert_eq!(b.recv().await, Some(Frame::KeepAlive));
    }

    #[tokio::test]
    async fn ticker_emits_periodically() {
        let broadcaster = Broadcaster::new(4);
        let mut sub = broadcaster.subscribe("g", Arc::from("{}"));
        sub.recv().await;

        let task = broadcaster.spawn_keep_alive(Duration::from_millis(10));
        let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("tick within timeout");
        assert_eq!(frame, Some(Frame::KeepAlive));
        task.shutdown().await;
    }
}
