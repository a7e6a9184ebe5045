use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin cursor over a credential list that may change between calls.
pub struct Rotator {
    next: AtomicUsize,
}

impl Rotator {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }

    pub fn pick<'a>(&self, keys: &'a [String]) -> Option<&'a str> {
        if keys.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        Some(keys[idx % keys.len()].as_str())
    }
}

impl Default for Rotator {
    fn default() -> Self {
        Self::new()
    }
}
