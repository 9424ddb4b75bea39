//! Registry change notifications.
//!
//! The core publishes typed events through a plain observer list; external
//! collaborators subscribe without the core depending on their types.

use std::fmt;

use crate::name::TagName;

/// A change published after a successful mutation pass commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag became explicitly declared for the first time.
    TagAdded(TagName),
    /// The tree (and net index) was rebuilt.
    TreeRebuilt,
    /// A source and its definitions were removed.
    SourceRemoved(String),
}

type Observer = Box<dyn Fn(&TagEvent) + Send + Sync>;

/// Observer list for [`TagEvent`]s.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Vec<Observer>,
}

impl EventDispatcher {
    pub fn subscribe(&mut self, observer: impl Fn(&TagEvent) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn emit(&self, event: &TagEvent) {
        for observer in &self.observers {
            observer(event);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_observer_sees_every_event() {
        let mut dispatcher = EventDispatcher::default();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            dispatcher.subscribe(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }
        dispatcher.emit(&TagEvent::TreeRebuilt);
        dispatcher.emit(&TagEvent::TagAdded(TagName::new("a.b")));
        assert_eq!(hits.load(Ordering::Relaxed), 4);
    }
}
