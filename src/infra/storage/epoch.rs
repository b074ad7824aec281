//! Monotonic change counters for the entry and feedback data.
//!
//! Caches remember the epoch they were built from and rebuild when the
//! current value differs.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

pub type Epoch = u64;

#[derive(Debug)]
pub struct Epochs {
    entry: AtomicU64,
    extra: AtomicU64,
}

impl Default for Epochs {
    fn default() -> Self {
        Self::new()
    }
}

impl Epochs {
    /// Both counters start at 1 so a cache built at epoch 0 is always stale.
    pub fn new() -> Self {
        Self {
            entry: AtomicU64::new(1),
            extra: AtomicU64::new(1),
        }
    }

    pub fn entry(&self) -> Epoch {
        self.entry.load(Ordering::SeqCst)
    }

    pub fn extra(&self) -> Epoch {
        self.extra.load(Ordering::SeqCst)
    }

    /// Returns the new entry epoch.
    pub fn bump_entry(&self) -> Epoch {
        let epoch = self.entry.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, kind = "entry", "Epoch advanced");
        epoch
    }

    /// Returns the new extra epoch.
    pub fn bump_extra(&self) -> Epoch {
        let epoch = self.extra.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, kind = "extra", "Epoch advanced");
        epoch
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn bumps_are_visible_across_threads() {
        let epochs = Arc::new(Epochs::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let epochs = Arc::clone(&epochs);
                thread::spawn(move || {
                    for _ in 0..100 {
                        epochs.bump_entry();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(epochs.entry(), 401);
        assert_eq!(epochs.extra(), 1);
    }
}
