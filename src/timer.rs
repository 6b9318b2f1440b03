//! Countdown timer bank
//!
//! Each timer counts down in runtime ticks and publishes a
//! [`TIMER`](crate::event::kind::TIMER) event carrying its index in `p8` and
//! a cookie in `p16` when it reaches zero. Every start draws a fresh cookie
//! and every stop writes [`INVALID_COOKIE`], so a timeout event that was
//! already queued when its timer was restarted or stopped no longer matches
//! and is dropped by the state-machine runner.

use tracing::trace;

use crate::event::{kind, Event};

/// Cookie held by a stopped timer. Never issued by `start`.
pub const INVALID_COOKIE: u16 = 0xFFFF;

/// Destination for events produced by timers
pub trait EventSink {
    /// Queue an event; false when the queue is full
    fn publish(&self, ev: Event) -> bool;

    /// Record an event in the trace buffer only
    fn trace(&self, ev: Event);
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    counter: u16,
    cookie: u16,
}

impl TimerEntry {
    const IDLE: TimerEntry = TimerEntry {
        counter: 0,
        cookie: INVALID_COOKIE,
    };
}

/// Fixed set of `N` one-shot timers
#[derive(Debug, Clone)]
pub struct TimerBank<const N: usize> {
    entries: [TimerEntry; N],
    last_cookie: u16,
}

impl<const N: usize> TimerBank<N> {
    pub const fn new() -> Self {
        Self {
            entries: [TimerEntry::IDLE; N],
            last_cookie: 0,
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    fn next_cookie(&mut self) -> u16 {
        self.last_cookie = self.last_cookie.wrapping_add(1);
        if self.last_cookie == INVALID_COOKIE {
            self.last_cookie = 0;
        }
        self.last_cookie
    }

    /// Start timer `index` for `ticks` ticks and return its new cookie.
    /// A zero period publishes the timeout immediately. Returns `None` for
    /// an index outside the bank.
    pub fn start(&mut self, index: u8, ticks: u16, sink: &impl EventSink) -> Option<u16> {
        let slot = usize::from(index);
        if slot >= N {
            return None;
        }
        sink.trace(Event::new(kind::DEBUG_TIMER_ARM, index, ticks));
        let cookie = self.next_cookie();
        self.entries[slot] = TimerEntry {
            counter: ticks,
            cookie,
        };
        trace!(index, ticks, cookie, "timer armed");
        if ticks == 0 {
            sink.publish(Event::new(kind::TIMER, index, cookie));
        }
        Some(cookie)
    }

    /// Stop timer `index`. Any timeout event already queued becomes stale.
    pub fn stop(&mut self, index: u8, sink: &impl EventSink) {
        let Some(entry) = self.entries.get_mut(usize::from(index)) else {
            return;
        };
        if entry.counter > 0 {
            sink.trace(Event::new(kind::DEBUG_TIMER_STOP, index, entry.counter));
        }
        *entry = TimerEntry::IDLE;
    }

    /// Advance every running timer by one tick, publishing those that expire
    pub fn service(&mut self, sink: &impl EventSink) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.counter == 0 {
                continue;
            }
            entry.counter -= 1;
            if entry.counter == 0 {
                sink.publish(Event::new(kind::TIMER, index as u8, entry.cookie));
            }
        }
    }

    /// Ticks left on timer `index`; zero when idle or expired
    pub fn remaining(&self, index: u8) -> u16 {
        self.entries
            .get(usize::from(index))
            .map_or(0, |entry| entry.counter)
    }

    /// True once timer `index` is no longer counting
    pub fn is_done(&self, index: u8) -> bool {
        self.remaining(index) == 0
    }

    /// Current cookie of timer `index`
    pub fn cookie(&self, index: u8) -> Option<u16> {
        self.entries.get(usize::from(index)).map(|entry| entry.cookie)
    }

    /// True if `ev` is the timeout of the current start of its timer
    pub fn is_current(&self, ev: Event) -> bool {
        ev.id() == kind::TIMER && self.cookie(ev.p8()) == Some(ev.p16())
    }
}

impl<const N: usize> Default for TimerBank<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        published: RefCell<Vec<Event>>,
        traced: RefCell<Vec<Event>>,
    }

    impl EventSink for Recorder {
        fn publish(&self, ev: Event) -> bool {
            self.published.borrow_mut().push(ev);
            true
        }

        fn trace(&self, ev: Event) {
            self.traced.borrow_mut().push(ev);
        }
    }

    #[test]
    fn test_zero_timeout_fires_immediately() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<2>::new();
        let cookie = timers.start(1, 0, &sink).unwrap();
        assert_eq!(cookie, 1);
        assert_eq!(*sink.published.borrow(), vec![Event::new(kind::TIMER, 1, cookie)]);
        assert!(timers.is_done(1));
        assert!(timers.is_current(Event::new(kind::TIMER, 1, cookie)));
    }

    #[test]
    fn test_countdown_publishes_once() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<2>::new();
        let cookie = timers.start(0, 3, &sink).unwrap();
        assert_eq!(timers.remaining(0), 3);

        timers.service(&sink);
        timers.service(&sink);
        assert_eq!(timers.remaining(0), 1);
        assert!(sink.published.borrow().is_empty());

        timers.service(&sink);
        timers.service(&sink);
        assert_eq!(*sink.published.borrow(), vec![Event::new(kind::TIMER, 0, cookie)]);
        assert!(timers.is_done(0));
    }

    #[test]
    fn test_stop_suppresses_timeout() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<1>::new();
        let cookie = timers.start(0, 2, &sink).unwrap();
        timers.stop(0, &sink);
        for _ in 0..5 {
            timers.service(&sink);
        }
        assert!(sink.published.borrow().is_empty());
        assert_eq!(timers.cookie(0), Some(INVALID_COOKIE));
        assert!(!timers.is_current(Event::new(kind::TIMER, 0, cookie)));
    }

    #[test]
    fn test_debug_trace_records() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<1>::new();
        timers.start(0, 5, &sink);
        timers.stop(0, &sink);
        // Stopping an idle timer leaves no record.
        timers.stop(0, &sink);
        assert_eq!(
            *sink.traced.borrow(),
            vec![
                Event::new(kind::DEBUG_TIMER_ARM, 0, 5),
                Event::new(kind::DEBUG_TIMER_STOP, 0, 5),
            ]
        );
    }

    #[test]
    fn test_restart_invalidates_cookie() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<1>::new();
        let first = timers.start(0, 0, &sink).unwrap();
        let second = timers.start(0, 10, &sink).unwrap();
        assert_ne!(first, second);
        assert!(!timers.is_current(Event::new(kind::TIMER, 0, first)));
        assert!(timers.is_current(Event::new(kind::TIMER, 0, second)));
    }

    #[test]
    fn test_cookie_skips_invalid_value() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<1>::new();
        timers.last_cookie = INVALID_COOKIE - 1;
        assert_eq!(timers.start(0, 1, &sink), Some(0));
        assert_eq!(timers.start(0, 1, &sink), Some(1));
    }

    #[test]
    fn test_out_of_range_index() {
        let sink = Recorder::default();
        let mut timers = TimerBank::<1>::new();
        assert_eq!(timers.start(3, 1, &sink), None);
        timers.stop(3, &sink);
        assert_eq!(timers.cookie(3), None);
        assert!(timers.is_done(3));
        assert!(sink.traced.borrow().is_empty());
    }
}
