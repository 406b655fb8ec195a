use std::time::{Duration, Instant};

/// Deadline tracker for "save after the user stops typing".
///
/// Callers feed it instants instead of owning a timer, so the same logic
/// runs under tokio, in a terminal loop and in tests.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Input happened at `now`; push the deadline out.
    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once per quiet period: when the deadline has passed at `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_millis(1000));

        d.poke(start);
        d.poke(start + Duration::from_millis(600));
        assert!(!d.fire(start + Duration::from_millis(1200)));
        assert!(d.fire(start + Duration::from_millis(1600)));
        assert!(!d.fire(start + Duration::from_millis(5000)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_millis(300));
        d.poke(start);
        d.cancel();
        assert!(!d.is_pending());
        assert!(!d.fire(start + Duration::from_secs(1)));
    }
}
