use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tracing::{debug, error, info, warn};

use super::queue::DeadlineQueue;
use crate::{
    models::{Error, Session, now_millis},
    store::Store,
};

/// Performs the disable action when a session expires
pub trait SessionExpirer: Send + Sync + 'static {
    fn disable(&self, session: Session) -> impl Future<Output = Result<(), Error>> + Send;
}

enum Command {
    Schedule(Session),
    Clear(String),
}

/// Handle to the session actor.
///
/// A single task owns every deadline and arms one timer for the earliest;
/// this handle only sends it commands and reads the live session map.
#[derive(Clone)]
pub struct SessionScheduler {
    tx: mpsc::UnboundedSender<Command>,
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionScheduler {
    /// Load persisted sessions and start the actor.
    ///
    /// Sessions whose expiry already passed fire as soon as the actor runs.
    pub async fn init<E: SessionExpirer>(store: Arc<Store>, expirer: E) -> Self {
        let persisted = store.sessions.read().await;
        let sessions = Arc::new(DashMap::new());
        let mut queue = DeadlineQueue::new();

        let now_ms = now_millis();
        let mut overdue = 0;
        for session in persisted {
            if session.is_expired(now_ms) {
                overdue += 1;
            }
            queue.arm(session.key.clone(), deadline_for(session.expires_at, now_ms));
            sessions.insert(session.key.clone(), session);
        }

        info!(
            "Restored {} sessions ({} already expired)",
            sessions.len(),
            overdue
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let actor = Actor {
            rx,
            fired_tx,
            fired_rx,
            queue,
            firing: HashMap::new(),
            sessions: Arc::clone(&sessions),
            store,
            expirer: Arc::new(expirer),
        };
        tokio::spawn(actor.run());

        Self { tx, sessions }
    }

    /// Upsert a session and (re)arm its timer
    pub fn schedule(&self, session: Session) {
        if self.tx.send(Command::Schedule(session)).is_err() {
            error!("Session scheduler is not running");
        }
    }

    /// Cancel a session's timer and forget it
    pub fn clear(&self, key: &str) {
        if self.tx.send(Command::Clear(key.to_string())).is_err() {
            error!("Session scheduler is not running");
        }
    }

    pub fn get(&self, key: &str) -> Option<Session> {
        self.sessions.get(key).map(|s| s.clone())
    }

    /// Renew a live session's expiry; returns the renewed session
    pub fn touch(&self, key: &str, ttl: Duration) -> Option<Session> {
        let mut session = self.get(key)?;
        session.renew(ttl);
        self.schedule(session.clone());
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Translate an epoch-ms expiry into a timer deadline, clamped at now
fn deadline_for(expires_at: i64, now_ms: i64) -> Instant {
    let remaining = (expires_at - now_ms).max(0) as u64;
    Instant::now() + Duration::from_millis(remaining)
}

struct Actor<E> {
    rx: mpsc::UnboundedReceiver<Command>,
    fired_tx: mpsc::UnboundedSender<String>,
    fired_rx: mpsc::UnboundedReceiver<String>,
    queue: DeadlineQueue,
    /// Expired sessions whose disable is still in flight; persisted until it returns
    firing: HashMap<String, Session>,
    sessions: Arc<DashMap<String, Session>>,
    store: Arc<Store>,
    expirer: Arc<E>,
}

impl<E: SessionExpirer> Actor<E> {
    async fn run(mut self) {
        info!("Session scheduler started");

        loop {
            let next = self.queue.next_deadline();
            let far_future = Instant::now() + Duration::from_secs(86_400);

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => {
                        self.apply(command);
                        self.persist().await;
                    }
                    None => break,
                },
                Some(key) = self.fired_rx.recv() => {
                    if self.firing.remove(&key).is_some() {
                        self.persist().await;
                    }
                }
                _ = sleep_until(next.unwrap_or(far_future)), if next.is_some() => {
                    self.fire_due();
                }
            }
        }

        info!("Session scheduler stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Schedule(session) => {
                let deadline = deadline_for(session.expires_at, now_millis());
                debug!("Arming session {} ({:?})", session.key, session.kind);
                self.queue.arm(session.key.clone(), deadline);
                self.firing.remove(&session.key);
                self.sessions.insert(session.key.clone(), session);
            }
            Command::Clear(key) => {
                self.queue.cancel(&key);
                self.firing.remove(&key);
                if self.sessions.remove(&key).is_some() {
                    debug!("Cleared session {}", key);
                }
            }
        }
    }

    fn fire_due(&mut self) {
        for key in self.queue.pop_due(Instant::now()) {
            let Some((_, session)) = self.sessions.remove(&key) else {
                continue;
            };

            self.firing.insert(key.clone(), session.clone());

            let expirer = Arc::clone(&self.expirer);
            let fired_tx = self.fired_tx.clone();
            tokio::spawn(async move {
                let key = session.key.clone();
                let kind = session.kind;
                match expirer.disable(session).await {
                    Ok(()) => info!("Disabled expired {:?} session {}", kind, key),
                    Err(e) => warn!("Failed to disable expired session {}: {}", key, e),
                }
                // Done either way; a failed disable is not retried
                let _ = fired_tx.send(key);
            });
        }
    }

    async fn persist(&self) {
        let mut snapshot: Vec<Session> = self
            .sessions
            .iter()
            .map(|s| s.value().clone())
            .chain(self.firing.values().cloned())
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));

        if let Err(e) = self.store.sessions.replace(&snapshot).await {
            error!("Failed to persist sessions: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionKind;
    use poise::serenity_prelude::{ChannelId, MessageId};
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Clone, Default)]
    struct Recorder {
        fired: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn fired(&self) -> Vec<String> {
            self.fired.lock().unwrap().clone()
        }
    }

    impl SessionExpirer for Recorder {
        async fn disable(&self, session: Session) -> Result<(), Error> {
            self.fired.lock().unwrap().push(session.key);
            Ok(())
        }
    }

    fn session(message_id: u64, ttl: Duration) -> Session {
        Session::new(
            SessionKind::Leaderboard,
            ChannelId::new(1),
            MessageId::new(message_id),
            ttl,
        )
    }

    async fn open_store(dir: &tempfile::TempDir) -> Arc<Store> {
        Arc::new(Store::open(dir.path()).await.unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_fires_on_init() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut stale = session(7, Duration::ZERO);
        stale.expires_at = now_millis() - 60_000;
        let fresh = session(8, Duration::from_secs(300));
        store
            .sessions
            .replace(&vec![stale, fresh])
            .await
            .unwrap();

        let recorder = Recorder::default();
        let scheduler = SessionScheduler::init(Arc::clone(&store), recorder.clone()).await;

        sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.fired(), vec!["7"]);
        assert!(scheduler.get("7").is_none());
        assert!(scheduler.get("8").is_some());

        let persisted = store.sessions.read().await;
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].key, "8");
    }

    struct Stalled;

    impl SessionExpirer for Stalled {
        async fn disable(&self, _session: Session) -> Result<(), Error> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_kept_on_disk_until_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut stale = session(9, Duration::ZERO);
        stale.expires_at = now_millis() - 1_000;
        store.sessions.replace(&vec![stale]).await.unwrap();

        let scheduler = SessionScheduler::init(Arc::clone(&store), Stalled).await;
        scheduler.schedule(session(10, Duration::from_secs(300)));
        sleep(Duration::from_millis(50)).await;

        assert!(scheduler.get("9").is_none());
        let persisted = store.sessions.read().await;
        let keys: Vec<&str> = persisted.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["10", "9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_previous_timer() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let scheduler = SessionScheduler::init(open_store(&dir).await, recorder.clone()).await;

        scheduler.schedule(session(1, Duration::from_secs(1)));
        scheduler.schedule(session(1, Duration::from_secs(60)));

        sleep(Duration::from_secs(5)).await;
        assert!(recorder.fired().is_empty());
        assert_eq!(scheduler.len(), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(recorder.fired(), vec!["1"]);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(recorder.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_prevents_fire() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let scheduler = SessionScheduler::init(open_store(&dir).await, recorder.clone()).await;

        scheduler.schedule(session(3, Duration::from_secs(10)));
        sleep(Duration::from_millis(10)).await;
        assert!(scheduler.get("3").is_some());

        scheduler.clear("3");
        sleep(Duration::from_secs(30)).await;
        assert!(recorder.fired().is_empty());
        assert!(scheduler.get("3").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_extends_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let scheduler = SessionScheduler::init(open_store(&dir).await, recorder.clone()).await;

        scheduler.schedule(session(4, Duration::from_secs(10)));
        sleep(Duration::from_secs(8)).await;
        assert!(scheduler.touch("4", Duration::from_secs(10)).is_some());

        sleep(Duration::from_secs(8)).await;
        assert!(recorder.fired().is_empty());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(recorder.fired(), vec!["4"]);
        assert!(scheduler.touch("4", Duration::from_secs(10)).is_none());
    }
}
