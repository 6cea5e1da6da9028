//! Per-user conversation state.
//!
//! Sessions live only in memory. A user without a session is waiting for a
//! video; the store bounds its size with idle expiry and a hard cap.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Identity of a user as given by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transport handle to an uploaded file that has not been downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef(pub String);

/// An uploaded video waiting to be clipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVideo {
    pub artifact: ArtifactRef,
    /// `None` when the transport did not report a size.
    pub size_bytes: Option<u64>,
    pub duration_seconds: u32,
    pub width: u32,
    pub height: u32,
}

/// Stage of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    /// A video is stored; the user has not asked to clip it yet.
    VideoReceived,
    /// The user asked to clip and we are waiting for the clip length.
    AwaitingDuration,
}

/// Conversation record of one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub state: SessionState,
    pub pending: Option<PendingVideo>,
    pub last_active: DateTime<Utc>,
}

impl UserSession {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: SessionState::Idle,
            pending: None,
            last_active: now,
        }
    }
}

/// In-memory map from user to session.
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, UserSession>>,
    max_sessions: usize,
}

impl SessionStore {
    /// Create a store holding at most `max_sessions` sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Copy of the user's session, if any.
    pub fn snapshot(&self, user: UserId) -> Option<UserSession> {
        self.read().get(&user).cloned()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a freshly uploaded video, replacing any earlier one.
    ///
    /// Returns the state the session was in before.
    pub fn store_video(&self, user: UserId, video: PendingVideo) -> SessionState {
        self.update(user, |session| {
            let previous = session.state;
            session.pending = Some(video);
            session.state = SessionState::VideoReceived;
            previous
        })
    }

    /// Moves the user to `AwaitingDuration`.
    ///
    /// Returns `false` and leaves the session untouched when no video is stored.
    pub fn request_duration(&self, user: UserId) -> bool {
        let now = Utc::now();
        let mut sessions = self.write();
        match sessions.get_mut(&user) {
            Some(session) if session.pending.is_some() => {
                session.state = SessionState::AwaitingDuration;
                session.last_active = now;
                true
            }
            Some(session) => {
                session.last_active = now;
                false
            }
            None => false,
        }
    }

    /// Returns the user to `Idle` and forgets the stored video.
    pub fn reset(&self, user: UserId) {
        let mut sessions = self.write();
        if let Some(session) = sessions.get_mut(&user) {
            session.state = SessionState::Idle;
            session.pending = None;
            session.last_active = Utc::now();
        }
    }

    /// Records activity without changing state.
    pub fn touch(&self, user: UserId) {
        if let Some(session) = self.write().get_mut(&user) {
            session.last_active = Utc::now();
        }
    }

    /// Forgets sessions idle for longer than `ttl`. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36_500));
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, s| now.signed_duration_since(s.last_active) <= ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Expired {} idle sessions", removed);
        }
        removed
    }

    fn update<R>(&self, user: UserId, f: impl FnOnce(&mut UserSession) -> R) -> R {
        let now = Utc::now();
        let mut sessions = self.write();

        if !sessions.contains_key(&user) && sessions.len() >= self.max_sessions {
            Self::evict_oldest(&mut sessions);
        }

        let session = sessions.entry(user).or_insert_with(|| UserSession::new(now));
        session.last_active = now;
        f(session)
    }

    /// Drops the least recently active session, preferring idle ones.
    fn evict_oldest(sessions: &mut HashMap<UserId, UserSession>) {
        let victim = sessions
            .iter()
            .min_by_key(|(_, s)| (s.state != SessionState::Idle, s.last_active))
            .map(|(user, _)| *user);

        if let Some(user) = victim {
            debug!("Session cap reached, evicting user {}", user);
            sessions.remove(&user);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, UserSession>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, UserSession>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn set_last_active(&self, user: UserId, at: DateTime<Utc>) {
        if let Some(session) = self.write().get_mut(&user) {
            session.last_active = at;
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}
