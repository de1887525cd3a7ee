// evmqtt Subscription Registry
// Topic pattern matching and handler dispatch

use std::panic::{self, AssertUnwindSafe};

use parking_lot::RwLock;

use super::MessageHandler;

/// Check an MQTT topic against a subscription pattern.
///
/// `+` matches exactly one level, `#` (last level only) matches any number of
/// remaining levels including none. Wildcards at the first level do not match
/// topics starting with `$`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (pattern.starts_with('+') || pattern.starts_with('#')) {
        return false;
    }

    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Ordered list of `(pattern, handler)` subscriptions.
///
/// Dispatch invokes every matching handler in registration order. A handler
/// that panics is caught and logged; the remaining handlers still run.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<Vec<(String, MessageHandler)>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pattern: &str, handler: MessageHandler) {
        self.entries.write().push((pattern.to_string(), handler));
    }

    /// Registered patterns, deduplicated, in registration order
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        for (pattern, _) in self.entries.read().iter() {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
        patterns
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver a message to every matching handler. Returns the number of
    /// handlers that completed without panicking.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        // Clone the matching handlers so none run under the registry lock
        let handlers: Vec<MessageHandler> = self
            .entries
            .read()
            .iter()
            .filter(|(pattern, _)| topic_matches(pattern, topic))
            .map(|(_, handler)| handler.clone())
            .collect();

        if handlers.is_empty() {
            log::debug!("No subscription matches topic '{}'", topic);
            return 0;
        }

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(topic, payload))) {
                Ok(()) => delivered += 1,
                Err(cause) => {
                    let reason = cause
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| cause.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    log::error!("Message handler for '{}' panicked: {}", topic, reason);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("a/b/c", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b/d"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("home/+/switch/set", "home/kbd/switch/set"));
        assert!(!topic_matches("home/+/switch/set", "home/a/b/switch/set"));
        assert!(topic_matches("+", "x"));
        assert!(!topic_matches("+", "x/y"));
        assert!(topic_matches("a/+", "a/"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("home/#", "home/kbd/switch/set"));
        assert!(topic_matches("home/#", "home"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("home/#", "office/kbd"));
        // '#' only valid as the last level
        assert!(!topic_matches("home/#/set", "home/a/set"));
    }

    #[test]
    fn test_dollar_topics_not_matched_by_leading_wildcard() {
        assert!(!topic_matches("#", "$SYS/broker/uptime"));
        assert!(!topic_matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(topic_matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn test_dispatch_to_matching_handlers() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        registry.add(
            "base/+/switch/set",
            Arc::new(move |_: &str, _: &[u8]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = hits.clone();
        registry.add(
            "other/#",
            Arc::new(move |_: &str, _: &[u8]| {
                counter.fetch_add(100, Ordering::SeqCst);
            }),
        );

        assert_eq!(registry.dispatch("base/kbd/switch/set", b"ON"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.dispatch("nowhere", b"ON"), 0);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.add("t", Arc::new(|_: &str, _: &[u8]| panic!("handler failure")));
        let counter = hits.clone();
        registry.add(
            "t",
            Arc::new(move |_: &str, _: &[u8]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(registry.dispatch("t", b""), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Registry still usable afterwards
        assert_eq!(registry.dispatch("t", b""), 1);
    }

    #[test]
    fn test_patterns_deduplicated() {
        let registry = SubscriptionRegistry::new();
        registry.add("a", Arc::new(|_: &str, _: &[u8]| {}));
        registry.add("b", Arc::new(|_: &str, _: &[u8]| {}));
        registry.add("a", Arc::new(|_: &str, _: &[u8]| {}));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.patterns(), vec!["a", "b"]);
    }
}
