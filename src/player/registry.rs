use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::Sender;
use parking_lot::Mutex;

pub type SessionId = u64;

struct SessionHandle {
    cancel: Sender<()>,
    session: SessionId,
}

/// Listener → active playback session map. All shared playback state lives
/// here; the lock is only held for register/replace/remove, never across a
/// sleep. The cancellation channel is a single-slot crossbeam channel, so
/// signalling is non-blocking and redundant stop requests coalesce.
pub struct SessionRegistry<L> {
    sessions: Mutex<HashMap<L, SessionHandle>>,
    next_session: AtomicU64,
}

impl<L: Eq + Hash> SessionRegistry<L> {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(0),
        }
    }

    /// Registers a new session for `listener`, preempting any session it
    /// already has. The old session is signalled before the replacement is
    /// visible, all under one lock acquisition, so at most one session per
    /// listener is ever live.
    pub fn register(&self, listener: L, cancel: Sender<()>) -> SessionId {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.lock();
        if let Some(old) = sessions.remove(&listener) {
            let _ = old.cancel.try_send(());
        }
        sessions.insert(listener, SessionHandle { cancel, session });
        session
    }

    /// Signals and removes the listener's session. Returns whether one was
    /// active.
    pub fn stop(&self, listener: &L) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.remove(listener) {
            Some(handle) => {
                let _ = handle.cancel.try_send(());
                true
            }
            None => false,
        }
    }

    /// Removes the listener's entry only if it still belongs to `session`.
    /// Used by a session's own cleanup so a finished playback never tears
    /// down the session that replaced it.
    pub fn remove_if(&self, listener: &L, session: SessionId) {
        let mut sessions = self.sessions.lock();
        if sessions.get(listener).is_some_and(|h| h.session == session) {
            sessions.remove(listener);
        }
    }

    pub fn contains(&self, listener: &L) -> bool {
        self.sessions.lock().contains_key(listener)
    }
}

impl<L: Eq + Hash> Default for SessionRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}
