use crate::{
    config::SessionLimits,
    error::{AlchemistError, Result},
    form::FormController,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

struct SessionEntry {
    form: FormController,
    last_seen: Instant,
    last_used: u64,
}

#[derive(Default)]
struct Sessions {
    entries: HashMap<Uuid, SessionEntry>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Idle forms with no request in flight are dropped.
    fn sweep(&mut self, limits: &SessionLimits, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.form.is_loading() || now.duration_since(entry.last_seen) < limits.idle_ttl
        });
        before - self.entries.len()
    }

    fn evict_least_recent(&mut self) -> Option<Uuid> {
        let id = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| *id)?;
        self.entries.remove(&id);
        Some(id)
    }
}

/// In-memory form sessions, one per open browser tab.
///
/// The lock is only held inside [`SessionStore::with_form`]; model calls
/// happen between two such calls. Sessions idle for longer than
/// [`SessionLimits::idle_ttl`] are swept, and the least recently used one is
/// evicted when [`SessionLimits::max_sessions`] is reached.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::default(),
            limits,
        }
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let mut sessions = self.lock();

        let swept = sessions.sweep(&self.limits, now);
        if swept > 0 {
            log::info!("Expired {} idle form session(s)", swept);
        }
        while sessions.entries.len() >= self.limits.max_sessions {
            match sessions.evict_least_recent() {
                Some(evicted) => log::warn!("Session limit reached, evicted {}", evicted),
                None => break,
            }
        }

        let last_used = sessions.tick();
        sessions.entries.insert(
            id,
            SessionEntry {
                form: FormController::new(),
                last_seen: now,
                last_used,
            },
        );
        log::info!("Created form session {}", id);
        id
    }

    pub fn with_form<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut FormController) -> Result<R>,
    ) -> Result<R> {
        let mut sessions = self.lock();
        let last_used = sessions.tick();
        let entry = sessions
            .entries
            .get_mut(&id)
            .ok_or_else(|| AlchemistError::NotFound(format!("session {}", id)))?;
        entry.last_seen = Instant::now();
        entry.last_used = last_used;
        f(&mut entry.form)
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        self.lock()
            .entries
            .remove(&id)
            .map(|_| log::info!("Closed form session {}", id))
            .ok_or_else(|| AlchemistError::NotFound(format!("session {}", id)))
    }

    /// Drops every idle session; returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        self.lock().sweep(&self.limits, Instant::now())
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // a panic inside `with_form` leaves only that form half-updated
    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormPhase;
    use crate::models::ImageDataUri;
    use crate::uploader::ImageSlot;
    use std::time::Duration;

    #[test]
    fn test_create_and_access() {
        let store = SessionStore::new();
        let id = store.create();

        let phase = store.with_form(id, |form| Ok(form.phase().clone())).unwrap();
        assert_eq!(phase, FormPhase::Empty);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let store = SessionStore::new();
        let err = store.with_form(Uuid::new_v4(), |_| Ok(())).unwrap_err();
        assert!(matches!(err, AlchemistError::NotFound(_)));
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new();
        let id = store.create();

        store.remove(id).unwrap();
        assert!(store.is_empty());
        assert!(store.remove(id).is_err());
    }

    #[test]
    fn test_idle_sessions_are_swept_unless_in_flight() {
        let store = SessionStore::with_limits(SessionLimits::new().with_idle_ttl(Duration::ZERO));
        let idle = store.create();
        let busy = store.create();
        assert!(store.with_form(idle, |_| Ok(())).is_err());

        store
            .with_form(busy, |form| {
                let image = ImageDataUri::new("image/png", "AAA");
                form.handle_upload(ImageSlot::Content, None, Some(&image));
                form.handle_upload(ImageSlot::Style, None, Some(&image));
                form.begin_submit().map(|_| ())
            })
            .unwrap();

        assert_eq!(store.sweep_idle(), 0);
        assert_eq!(store.len(), 1);

        let busy_phase = store.with_form(busy, |form| Ok(form.phase().clone())).unwrap();
        assert_eq!(busy_phase, FormPhase::Submitting);
    }

    #[test]
    fn test_least_recently_used_session_is_evicted_at_capacity() {
        let store = SessionStore::with_limits(SessionLimits::new().with_max_sessions(2));
        let first = store.create();
        let second = store.create();

        store.with_form(first, |_| Ok(())).unwrap();
        let third = store.create();

        assert_eq!(store.len(), 2);
        assert!(store.with_form(second, |_| Ok(())).is_err());
        assert!(store.with_form(first, |_| Ok(())).is_ok());
        assert!(store.with_form(third, |_| Ok(())).is_ok());
    }
}
