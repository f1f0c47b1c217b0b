use std::collections::HashMap;

use crate::types::{WatchKind, WatchSink};

pub(crate) struct WatchSubscriber {
    pub sink: WatchSink,
    pub payload: u64,
}

/// Client-side watch multimap: `(kind, path)` to subscribers in insertion
/// order.
///
/// The server keeps at most one watch per session/path/kind; additional local
/// subscribers coalesce onto it and are all notified by the one fire.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    entries: HashMap<(WatchKind, String), Vec<WatchSubscriber>>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber. Returns true when this is the first local
    /// subscriber for the key, i.e. the server-side watch must be armed.
    pub(crate) fn subscribe(
        &mut self,
        kind: WatchKind,
        path: &str,
        subscriber: WatchSubscriber,
    ) -> bool {
        let list =
            self.entries.entry((kind, path.to_string())).or_default();
        let arm = list.is_empty();
        list.push(subscriber);
        arm
    }

    /// Removes and returns every subscriber for the key. A server fire is
    /// one-shot, so all local aliases are invalidated together.
    pub(crate) fn fire(
        &mut self,
        kind: WatchKind,
        path: &str,
    ) -> Vec<WatchSubscriber> {
        self.entries.remove(&(kind, path.to_string())).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn drain(
        &mut self
    ) -> Vec<((WatchKind, String), Vec<WatchSubscriber>)> {
        self.entries.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::{WatchRegistry, WatchSubscriber};
    use crate::types::WatchKind;

    fn subscriber(payload: u64) -> WatchSubscriber {
        let (sink, _rx) = mpsc::unbounded_channel();
        WatchSubscriber { sink, payload }
    }

    #[test]
    fn only_first_subscriber_arms_the_server_watch() {
        let mut registry = WatchRegistry::new();
        assert!(registry.subscribe(WatchKind::Data, "/a", subscriber(1)));
        assert!(!registry.subscribe(WatchKind::Data, "/a", subscriber(2)));
        // a different kind on the same path is its own server watch
        assert!(registry.subscribe(WatchKind::Child, "/a", subscriber(3)));
    }

    #[test]
    fn fire_removes_the_whole_key_in_order() {
        let mut registry = WatchRegistry::new();
        registry.subscribe(WatchKind::Child, "/a", subscriber(1));
        registry.subscribe(WatchKind::Child, "/a", subscriber(2));
        registry.subscribe(WatchKind::Data, "/a", subscriber(3));

        let fired = registry.fire(WatchKind::Child, "/a");
        let payloads: Vec<u64> =
            fired.iter().map(|sub| sub.payload).collect();
        assert_eq!(payloads, vec![1, 2]);
        assert!(registry.fire(WatchKind::Child, "/a").is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn refires_after_rearm() {
        let mut registry = WatchRegistry::new();
        registry.subscribe(WatchKind::Data, "/a", subscriber(1));
        registry.fire(WatchKind::Data, "/a");
        // the key is gone, so the next subscription arms again
        assert!(registry.subscribe(WatchKind::Data, "/a", subscriber(2)));
    }
}
