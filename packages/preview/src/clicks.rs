//! Click de-duplication for preview surfaces.
//!
//! Each item remembers when it was last counted. The clock is injected so the
//! window can be tested without sleeping.

use pagesync_model::ItemId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug)]
pub struct ClickGuard<C: Clock = SystemClock> {
    clock: C,
    window: Duration,
    last_seen: Mutex<HashMap<ItemId, Instant>>,
}

impl ClickGuard<SystemClock> {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(SystemClock, window)
    }
}

impl<C: Clock> ClickGuard<C> {
    pub fn with_clock(clock: C, window: Duration) -> Self {
        Self {
            clock,
            window,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record a click; `false` when it falls inside the window of the last
    /// counted click on the same item
    pub fn register(&self, id: &ItemId) -> bool {
        let now = self.clock.now();
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);

        match last_seen.get(id) {
            Some(previous) if now.duration_since(*previous) < self.window => false,
            _ => {
                last_seen.insert(id.clone(), now);
                true
            }
        }
    }

    pub fn forget(&self, id: &ItemId) {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_repeat_inside_window_is_dropped() {
        let clock = Arc::new(ManualClock::new());
        let guard = ClickGuard::with_clock(clock.clone(), Duration::from_secs(1));
        let id = ItemId::from("blog");

        assert!(guard.register(&id));
        clock.advance(Duration::from_millis(400));
        assert!(!guard.register(&id));
        clock.advance(Duration::from_millis(700));
        assert!(guard.register(&id));
    }

    #[test]
    fn test_items_are_tracked_independently() {
        let clock = Arc::new(ManualClock::new());
        let guard = ClickGuard::with_clock(clock, Duration::from_secs(1));

        assert!(guard.register(&ItemId::from("a")));
        assert!(guard.register(&ItemId::from("b")));
        assert!(!guard.register(&ItemId::from("a")));
    }

    #[test]
    fn test_forget_resets_an_item() {
        let guard = ClickGuard::with_clock(ManualClock::new(), Duration::from_secs(60));
        let id = ItemId::from("a");

        assert!(guard.register(&id));
        guard.forget(&id);
        assert!(guard.register(&id));
    }
}
