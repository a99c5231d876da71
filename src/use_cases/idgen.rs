use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default length of generated room identifiers.
pub const DEFAULT_ID_LENGTH: usize = 5;

/// Allocates short unique uppercase-alphanumeric room identifiers.
///
/// Conceptually owned by the lobby actor; the internal mutex exists so the
/// structure stays sound if a handle ever escapes that actor.
pub struct RoomIdGenerator {
    inner: Mutex<Inner>,
}

struct Inner {
    active: HashSet<String>,
    length: usize,
}

impl RoomIdGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_ID_LENGTH)
    }

    pub fn with_length(length: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: HashSet::new(),
                length: length.max(1),
            }),
        }
    }

    /// Samples uniformly until an unused id appears and reserves it. The id
    /// length grows once more than half the current space is occupied, which
    /// keeps the rejection loop expected-O(1).
    pub fn generate(&self) -> String {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.active.len() * 2 >= capacity(inner.length) {
            inner.length += 1;
        }
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (0..inner.length)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                .collect();
            if !inner.active.contains(&id) {
                inner.active.insert(id.clone());
                return id;
            }
        }
    }

    /// Releases a previously generated id for reuse.
    pub fn dispose(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.active.remove(id);
    }

    #[cfg(test)]
    fn active_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active
            .len()
    }
}

impl Default for RoomIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn capacity(length: usize) -> usize {
    ALPHABET.len().saturating_pow(length.min(12) as u32)
}
