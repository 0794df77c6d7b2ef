use std::collections::BTreeMap;

use tracing::debug;

use super::BodyId;
use crate::render::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub normal: Vec2,
    /// Cleared by a pre-solve listener to skip collision response for this step.
    pub enabled: bool,
}

impl Contact {
    pub fn new(body_a: BodyId, body_b: BodyId, normal: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            normal,
            enabled: true,
        }
    }

    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    pub fn other(&self, body: BodyId) -> Option<BodyId> {
        if self.body_a == body {
            Some(self.body_b)
        } else if self.body_b == body {
            Some(self.body_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal: f32,
    pub tangent: f32,
}

pub trait ContactListener: Send {
    fn begin_contact(&mut self, _contact: &Contact) {}

    fn end_contact(&mut self, _contact: &Contact) {}

    fn pre_solve(&mut self, _contact: &mut Contact) {}

    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Fans every contact event out to all registered sub-listeners, in key order.
///
/// Registration is last-writer-wins per key.
#[derive(Default)]
pub struct ContactDispatcher {
    listeners: BTreeMap<String, Box<dyn ContactListener>>,
}

impl ContactDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the listener previously registered under `key`, if any.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        listener: Box<dyn ContactListener>,
    ) -> Option<Box<dyn ContactListener>> {
        let key = key.into();
        let replaced = self.listeners.insert(key.clone(), listener);
        if replaced.is_some() {
            debug!(key = key.as_str(), "contact_listener_replaced");
        }
        replaced
    }

    pub fn unregister(&mut self, key: &str) -> Option<Box<dyn ContactListener>> {
        self.listeners.remove(key)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.listeners.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl ContactListener for ContactDispatcher {
    fn begin_contact(&mut self, contact: &Contact) {
        for listener in self.listeners.values_mut() {
            listener.begin_contact(contact);
        }
    }

    fn end_contact(&mut self, contact: &Contact) {
        for listener in self.listeners.values_mut() {
            listener.end_contact(contact);
        }
    }

    fn pre_solve(&mut self, contact: &mut Contact) {
        for listener in self.listeners.values_mut() {
            listener.pre_solve(contact);
        }
    }

    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        for listener in self.listeners.values_mut() {
            listener.post_solve(contact, impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ContactListener for Recorder {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.log
                .lock()
                .expect("log")
                .push(format!("{}:begin", self.name));
        }

        fn end_contact(&mut self, _contact: &Contact) {
            self.log
                .lock()
                .expect("log")
                .push(format!("{}:end", self.name));
        }
    }

    struct Disabler;

    impl ContactListener for Disabler {
        fn pre_solve(&mut self, contact: &mut Contact) {
            contact.enabled = false;
        }
    }

    fn contact() -> Contact {
        Contact::new(BodyId(1), BodyId(2), Vec2::new(0.0, 1.0))
    }

    #[test]
    fn every_listener_receives_every_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = ContactDispatcher::new();
        dispatcher.register(
            "b",
            Box::new(Recorder {
                name: "b",
                log: log.clone(),
            }),
        );
        dispatcher.register(
            "a",
            Box::new(Recorder {
                name: "a",
                log: log.clone(),
            }),
        );

        dispatcher.begin_contact(&contact());
        dispatcher.end_contact(&contact());

        let log = log.lock().expect("log");
        assert_eq!(*log, vec!["a:begin", "b:begin", "a:end", "b:end"]);
    }

    #[test]
    fn registration_is_last_writer_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = ContactDispatcher::new();
        let first = dispatcher.register(
            "hits",
            Box::new(Recorder {
                name: "first",
                log: log.clone(),
            }),
        );
        assert!(first.is_none());
        let replaced = dispatcher.register(
            "hits",
            Box::new(Recorder {
                name: "second",
                log: log.clone(),
            }),
        );
        assert!(replaced.is_some());
        assert_eq!(dispatcher.len(), 1);

        dispatcher.begin_contact(&contact());
        assert_eq!(*log.lock().expect("log"), vec!["second:begin"]);
    }

    #[test]
    fn pre_solve_listener_can_disable_contact() {
        let mut dispatcher = ContactDispatcher::new();
        dispatcher.register("sensor", Box::new(Disabler));
        let mut contact = contact();
        dispatcher.pre_solve(&mut contact);
        assert!(!contact.enabled);
    }

    #[test]
    fn unregister_removes_listener() {
        let mut dispatcher = ContactDispatcher::new();
        dispatcher.register("sensor", Box::new(Disabler));
        assert!(dispatcher.unregister("sensor").is_some());
        assert!(dispatcher.unregister("sensor").is_none());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn contact_other_resolves_partner() {
        let contact = contact();
        assert_eq!(contact.other(BodyId(1)), Some(BodyId(2)));
        assert_eq!(contact.other(BodyId(2)), Some(BodyId(1)));
        assert_eq!(contact.other(BodyId(3)), None);
        assert!(contact.involves(BodyId(2)));
    }
}
