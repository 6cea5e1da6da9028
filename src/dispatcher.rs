//! Routes inbound events to one worker per user.
//!
//! Events of a single user are handled strictly in arrival order by that
//! user's worker; different users are handled concurrently. A worker exits
//! after a quiet period and is recreated by the next event.

use crate::conversation::{ConversationMachine, InboundEvent};
use crate::session::{SessionStore, UserId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn, Instrument};

struct Worker {
    generation: u64,
    sender: UnboundedSender<InboundEvent>,
}

type WorkerMap = Arc<Mutex<HashMap<UserId, Worker>>>;

pub struct Dispatcher {
    machine: Arc<ConversationMachine>,
    workers: WorkerMap,
    idle_ttl: Duration,
    tasks: Mutex<JoinSet<()>>,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl Dispatcher {
    /// `idle_ttl` is how long a worker waits for another event before exiting.
    pub fn new(machine: Arc<ConversationMachine>, idle_ttl: Duration) -> Self {
        Self {
            machine,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
            tasks: Mutex::new(JoinSet::new()),
            next_generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn machine(&self) -> &Arc<ConversationMachine> {
        &self.machine
    }

    /// How long a worker waits for another event before exiting.
    pub fn worker_idle(&self) -> Duration {
        self.idle_ttl
    }

    /// Number of live workers.
    pub fn active_workers(&self) -> usize {
        lock(&self.workers).len()
    }

    /// Queues an event on its user's worker, starting one if needed. Never blocks.
    pub fn dispatch(&self, event: InboundEvent) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("Dispatcher is shut down, dropping event for user {}", event.user);
            return;
        }

        let user = event.user;
        let mut workers = lock(&self.workers);

        let event = match workers.get(&user) {
            Some(worker) => match worker.sender.send(event) {
                Ok(()) => return,
                // The worker died without deregistering; replace it.
                Err(mpsc::error::SendError(event)) => {
                    warn!("Worker for user {} is gone, restarting", user);
                    event
                }
            },
            None => event,
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is alive until the worker runs.
        let _ = sender.send(event);
        workers.insert(user, Worker { generation, sender });
        drop(workers);

        debug!("Starting worker for user {}", user);
        let task = run_worker(
            user,
            generation,
            receiver,
            self.machine.clone(),
            self.workers.clone(),
            self.idle_ttl,
        )
        .instrument(tracing::info_span!("worker", user = %user));

        let mut tasks = lock(&self.tasks);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Stops accepting events and waits for every queued event to be handled.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);

        // Dropping the senders lets each worker drain its queue and exit.
        let count = {
            let mut workers = lock(&self.workers);
            let count = workers.len();
            workers.clear();
            count
        };
        info!("Waiting for {} workers to finish", count);

        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Worker task failed: {}", e);
            }
        }
    }
}

async fn run_worker(
    user: UserId,
    generation: u64,
    mut receiver: UnboundedReceiver<InboundEvent>,
    machine: Arc<ConversationMachine>,
    workers: WorkerMap,
    idle_ttl: Duration,
) {
    loop {
        let event = match tokio::time::timeout(idle_ttl, receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                // Deregister only when nothing slipped in; dispatch sends under the same lock.
                let mut map = lock(&workers);
                match receiver.try_recv() {
                    Ok(event) => {
                        drop(map);
                        event
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        if map.get(&user).map(|w| w.generation) == Some(generation) {
                            map.remove(&user);
                        }
                        debug!("Worker idle, exiting");
                        break;
                    }
                }
            }
        };

        machine.handle(event).await;
    }
}

/// Periodically forgets sessions idle for longer than `ttl`.
pub fn spawn_sweeper(
    sessions: Arc<SessionStore>,
    interval: Duration,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = sessions.sweep_expired(Utc::now(), ttl);
            if removed > 0 {
                info!("Swept {} idle sessions ({} remain)", removed, sessions.len());
            }
        }
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{EventKind, PipelineConfig};
    use crate::delivery::{ChatId, Surface};
    use crate::session::{ArtifactRef, PendingVideo, SessionState};
    use crate::testing::{RecordingAdapter, Script, ScriptedSegmenter};
    use std::collections::HashSet;

    struct Setup {
        dispatcher: Dispatcher,
        adapter: Arc<RecordingAdapter>,
        segmenter: Arc<ScriptedSegmenter>,
        sessions: Arc<SessionStore>,
        config: PipelineConfig,
        _root: tempfile::TempDir,
    }

    fn setup(segmenter: ScriptedSegmenter, idle_ttl: Duration) -> Setup {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            temp_dir: root.path().join("tmp"),
            clips_dir: root.path().join("clips"),
            download_timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(5),
            segment_bounds: crate::segmenter::SegmentBounds::default(),
        };
        let adapter = Arc::new(RecordingAdapter::new(Surface::standard()));
        let segmenter = Arc::new(segmenter);
        let sessions = Arc::new(SessionStore::default());
        let machine = Arc::new(ConversationMachine::new(
            sessions.clone(),
            adapter.clone(),
            segmenter.clone(),
            config.clone(),
        ));
        Setup {
            dispatcher: Dispatcher::new(machine, idle_ttl),
            adapter,
            segmenter,
            sessions,
            config,
            _root: root,
        }
    }

    fn event(user: i64, kind: EventKind) -> InboundEvent {
        InboundEvent {
            user: UserId(user),
            chat: ChatId(user),
            kind,
        }
    }

    fn clip_flow(user: i64, duration: &str) -> Vec<InboundEvent> {
        vec![
            event(
                user,
                EventKind::Video(PendingVideo {
                    artifact: ArtifactRef(format!("file-{}", user)),
                    size_bytes: Some(1024),
                    duration_seconds: 130,
                    width: 640,
                    height: 360,
                }),
            ),
            event(user, EventKind::Command("clip".into())),
            event(user, EventKind::Text(duration.into())),
        ]
    }

    #[tokio::test]
    async fn test_events_of_one_user_are_handled_in_order() {
        let s = setup(ScriptedSegmenter::new(Script::Clips(2)), Duration::from_secs(60));

        // Queued back to back: a worker handling them out of order would
        // see the duration before the clip request.
        for e in clip_flow(1, "45") {
            s.dispatcher.dispatch(e);
        }
        s.dispatcher.shutdown().await;

        let calls = s.segmenter.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].segment.seconds(), 45);
        assert_eq!(s.adapter.videos().len(), 2);
        assert_eq!(
            s.sessions.snapshot(UserId(1)).map(|s| s.state),
            Some(SessionState::Idle)
        );
    }

    #[tokio::test]
    async fn test_users_are_processed_concurrently_and_apart() {
        let s = setup(
            ScriptedSegmenter::new(Script::Clips(2)).with_delay(Duration::from_millis(200)),
            Duration::from_secs(60),
        );

        let mut first = clip_flow(1, "30");
        let mut second = clip_flow(2, "60");
        let duration_1 = first.pop().unwrap();
        let duration_2 = second.pop().unwrap();
        for e in first.into_iter().chain(second) {
            s.dispatcher.dispatch(e);
        }
        s.dispatcher.dispatch(duration_1);
        s.dispatcher.dispatch(duration_2);
        s.dispatcher.shutdown().await;

        assert_eq!(s.segmenter.max_in_flight(), 2);

        let calls = s.segmenter.calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].output_dir, calls[1].output_dir);
        assert_ne!(calls[0].input, calls[1].input);

        let dirs: HashSet<_> = calls.iter().map(|c| c.output_dir.clone()).collect();
        assert!(dirs.contains(&s.config.user_clips_dir(UserId(1))));
        assert!(dirs.contains(&s.config.user_clips_dir(UserId(2))));

        // Each user received exactly their own clips.
        for user in [1, 2] {
            let own_dir = s.config.user_clips_dir(UserId(user));
            let videos: Vec<_> = s
                .adapter
                .videos()
                .into_iter()
                .filter(|(chat, _, _)| *chat == ChatId(user))
                .collect();
            assert_eq!(videos.len(), 2);
            assert!(videos.iter().all(|(_, path, _)| path.starts_with(&own_dir)));
        }
    }

    #[tokio::test]
    async fn test_idle_worker_exits_and_is_recreated() {
        let s = setup(ScriptedSegmenter::new(Script::Clips(1)), Duration::from_millis(50));

        s.dispatcher.dispatch(event(7, EventKind::Command("start".into())));
        assert_eq!(s.dispatcher.active_workers(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(s.dispatcher.active_workers(), 0);

        s.dispatcher.dispatch(event(7, EventKind::Command("help".into())));
        s.dispatcher.shutdown().await;

        assert_eq!(s.adapter.texts().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_dropped() {
        let s = setup(ScriptedSegmenter::new(Script::Clips(1)), Duration::from_secs(60));
        s.dispatcher.shutdown().await;

        s.dispatcher.dispatch(event(3, EventKind::Command("start".into())));

        assert_eq!(s.dispatcher.active_workers(), 0);
        assert!(s.adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_forgets_idle_sessions() {
        let sessions = Arc::new(SessionStore::default());
        sessions.store_video(
            UserId(1),
            PendingVideo {
                artifact: ArtifactRef("a".into()),
                size_bytes: Some(1),
                duration_seconds: 1,
                width: 1,
                height: 1,
            },
        );
        sessions.set_last_active(UserId(1), Utc::now() - chrono::Duration::hours(2));

        let handle = spawn_sweeper(
            sessions.clone(),
            Duration::from_millis(20),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(sessions.is_empty());
    }
}
