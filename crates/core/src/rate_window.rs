//! Minimum spacing between successive upstream dispatches.
//!
//! The upstream allows one generation per `WAIT_TIME_SECONDS`. The window
//! adds a fixed safety margin on top so clock skew on either side never
//! lets two dispatches land inside the same upstream window.

use std::time::{Duration, Instant};

/// Padding added to the configured wait time.
pub const WAIT_SAFETY_MARGIN: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    spacing: Duration,
}

impl RateWindow {
    /// Window for the configured `WAIT_TIME_SECONDS`, including the safety
    /// margin.
    pub fn from_wait_secs(wait_secs: u64) -> Self {
        Self {
            spacing: Duration::from_secs(wait_secs) + WAIT_SAFETY_MARGIN,
        }
    }

    /// Window with an exact spacing and no margin.
    pub fn with_spacing(spacing: Duration) -> Self {
        Self { spacing }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Earliest instant the next dispatch may start, given when the previous
    /// one started. With no previous dispatch the slot is free immediately.
    pub fn next_slot(&self, last_dispatch: Option<Instant>, now: Instant) -> Instant {
        match last_dispatch {
            Some(last) => (last + self.spacing).max(now),
            None => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_secs_includes_margin() {
        let window = RateWindow::from_wait_secs(10);
        assert_eq!(window.spacing(), Duration::from_millis(11_000));
    }

    #[test]
    fn zero_wait_still_has_margin() {
        assert_eq!(RateWindow::from_wait_secs(0).spacing(), WAIT_SAFETY_MARGIN);
    }

    #[test]
    fn first_dispatch_is_immediate() {
        let window = RateWindow::from_wait_secs(5);
        let now = Instant::now();
        assert_eq!(window.next_slot(None, now), now);
    }

    #[test]
    fn next_slot_waits_for_window() {
        let window = RateWindow::with_spacing(Duration::from_secs(3));
        let last = Instant::now();
        let now = last + Duration::from_secs(1);
        assert_eq!(window.next_slot(Some(last), now), last + Duration::from_secs(3));
    }

    #[test]
    fn expired_window_dispatches_now() {
        let window = RateWindow::with_spacing(Duration::from_secs(3));
        let last = Instant::now();
        let now = last + Duration::from_secs(10);
        assert_eq!(window.next_slot(Some(last), now), now);
    }
}
