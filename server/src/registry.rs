use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::Sender;

use exam_protocol::ExamMsg;

use crate::session::Session;

// Bounded table of current sessions, indexed by slot.
// This is the only state shared across connection tasks;
// every read or write goes through the single mutex, and the
// lock is never held across socket i/o (see Delivery).
pub struct Registry {
    slots: Vec<Option<Session>>,
    active: usize, // occupied and authenticated slots
}

pub struct RegistryShared {
    registry: Arc<Mutex<Registry>>,
}

impl RegistryShared {
    pub fn new(capacity: usize) -> Self {
        RegistryShared {
            registry: Arc::new(Mutex::new(Registry::new(capacity))),
        }
    }
}

impl Clone for RegistryShared {
    fn clone(&self) -> Self {
        RegistryShared {
            registry: Arc::clone(&self.registry),
        }
    }
}

// bring in auto deref functionality so lock() is
// accessible directly on the shared handle
impl Deref for RegistryShared {
    type Target = Arc<Mutex<Registry>>;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Registry {
            slots: (0..capacity).map(|_| None).collect(),
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    // scan for the first empty slot; None means the server is full
    pub fn acquire(&mut self, outbox: Sender<ExamMsg>) -> Option<usize> {
        let idx = self.slots.iter().position(|s| s.is_none())?;
        self.slots[idx] = Some(Session::new(outbox));
        Some(idx)
    }

    // mark a slot authenticated and record its username
    pub fn authenticate(&mut self, slot: usize, username: String) {
        if let Some(Some(session)) = self.slots.get_mut(slot) {
            session.authenticate(username);
            self.active += 1;
        }
    }

    // clear a slot entirely; the freed slot may be reused immediately
    pub fn release(&mut self, slot: usize) -> Option<Session> {
        let session = self.slots.get_mut(slot)?.take()?;
        if session.is_authenticated() {
            self.active -= 1;
        }
        Some(session)
    }

    pub fn outbox_of(&self, slot: usize) -> Option<Sender<ExamMsg>> {
        self.slots.get(slot)?.as_ref().map(Session::outbox)
    }

    // usernames of authenticated sessions, in slot index order
    pub fn roster(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.is_authenticated())
            .filter_map(|s| s.username().map(str::to_string))
            .collect()
    }

    // outbound channels of authenticated sessions, snapshot for fan-out
    pub fn broadcast_targets(&self) -> Vec<Sender<ExamMsg>> {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.is_authenticated())
            .map(Session::outbox)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn outbox() -> Sender<ExamMsg> {
        mpsc::channel(1).0
    }

    #[test]
    fn acquire_stops_at_capacity() {
        let mut registry = Registry::new(2);
        assert_eq!(registry.acquire(outbox()), Some(0));
        assert_eq!(registry.acquire(outbox()), Some(1));
        assert_eq!(registry.acquire(outbox()), None);
    }

    #[test]
    fn released_slot_is_reused() {
        let mut registry = Registry::new(2);
        let first = registry.acquire(outbox()).unwrap();
        let _second = registry.acquire(outbox()).unwrap();

        assert!(registry.release(first).is_some());
        assert_eq!(registry.acquire(outbox()), Some(first));
    }

    #[test]
    fn active_counts_only_authenticated_slots() {
        let mut registry = Registry::new(3);
        let a = registry.acquire(outbox()).unwrap();
        let b = registry.acquire(outbox()).unwrap();
        assert_eq!(registry.active(), 0);

        registry.authenticate(a, "student1".to_string());
        registry.authenticate(b, "student2".to_string());
        assert_eq!(registry.active(), 2);

        let released = registry.release(a).unwrap();
        assert!(released.is_authenticated());
        assert_eq!(registry.active(), 1);
    }

    #[test]
    fn releasing_unauthenticated_slot_keeps_count() {
        let mut registry = Registry::new(2);
        let a = registry.acquire(outbox()).unwrap();
        let b = registry.acquire(outbox()).unwrap();
        registry.authenticate(b, "student2".to_string());

        registry.release(a);
        assert_eq!(registry.active(), 1);
    }

    #[test]
    fn roster_follows_slot_order() {
        let mut registry = Registry::new(4);
        let a = registry.acquire(outbox()).unwrap();
        let b = registry.acquire(outbox()).unwrap();
        let c = registry.acquire(outbox()).unwrap();

        registry.authenticate(c, "student3".to_string());
        registry.authenticate(a, "student1".to_string());

        // b never authenticated, so it does not appear
        let _ = b;
        assert_eq!(registry.roster(), vec!["student1".to_string(), "student3".to_string()]);
        assert_eq!(registry.broadcast_targets().len(), 2);
    }

    #[test]
    fn release_of_empty_slot_is_none() {
        let mut registry = Registry::new(1);
        assert!(registry.release(0).is_none());
    }
}
