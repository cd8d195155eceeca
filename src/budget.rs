use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Global production target shared by all producers.
///
/// `claimed` is the single serialization point between producers and is held
/// only for the compare-and-increment. `published` trails it and counts
/// claims whose item has actually reached the queue (or the bins).
pub struct SampleBudget {
    target: u64,
    claimed: Mutex<u64>,
    published: AtomicU64,
}

impl SampleBudget {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            claimed: Mutex::new(0),
            published: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Claims one sample. Returns its 1-based ordinal, or `None` once the
    /// target has been reached.
    pub fn try_claim(&self) -> Option<u64> {
        let mut claimed = self.claimed.lock();
        if *claimed == self.target {
            return None;
        }
        *claimed += 1;
        Some(*claimed)
    }

    /// Marks one claimed sample as delivered. Returns `true` for the delivery
    /// that completes the target.
    pub fn publish(&self) -> bool {
        self.published.fetch_add(1, Ordering::AcqRel) + 1 == self.target
    }

    pub fn claimed(&self) -> u64 {
        *self.claimed.lock()
    }

    /// Every sample has been claimed and delivered; nothing more will arrive.
    pub fn is_drained(&self) -> bool {
        self.published.load(Ordering::Acquire) == self.target
    }
}
