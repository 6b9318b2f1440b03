//! Event queue and trace buffer
//!
//! Both are shared between interrupt-style producers and the main loop, so
//! every method takes `&self` and touches the underlying [`RingQueue`] only
//! inside a `critical_section::with` scope. The scope covers the index update
//! and nothing else; events are copied out before any processing happens.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::event::{kind, Event};
use crate::ring::RingQueue;

/// FIFO of pending events with a front-insertion path
pub struct EventQueue<const N: usize> {
    ring: Mutex<RefCell<RingQueue<Event, N>>>,
}

impl<const N: usize> EventQueue<N> {
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(RingQueue::new())),
        }
    }

    /// Append at the tail. The nil event is ignored and reported as success;
    /// a full queue rejects the event and returns false.
    pub fn enqueue(&self, ev: Event) -> bool {
        if ev.is_nil() {
            return true;
        }
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).put(ev).is_ok())
    }

    /// Insert at the head so the event is dequeued next
    pub fn enqueue_front(&self, ev: Event) -> bool {
        if ev.is_nil() {
            return true;
        }
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).push(ev).is_ok())
    }

    /// Oldest event, if any
    pub fn dequeue(&self) -> Option<Event> {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).get())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).clear());
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Trace mask
// ============================================================================

/// Bytes in the trace mask, one bit per possible event id
pub const TRACE_MASK_SIZE: usize = 256 / 8;

/// Per-id enable bits for the trace buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceMask {
    bits: [u8; TRACE_MASK_SIZE],
}

impl TraceMask {
    /// Core ids posted on every timer tick or arm
    pub const HIGH_RATE: &'static [u8] = &[kind::TIMER, kind::DEBUG_TIMER_ARM];

    /// Mask with every id disabled
    pub const fn new() -> Self {
        Self {
            bits: [0; TRACE_MASK_SIZE],
        }
    }

    /// Disable every id
    pub fn clear(&mut self) {
        self.bits = [0; TRACE_MASK_SIZE];
    }

    pub fn set(&mut self, id: u8, enabled: bool) {
        let (byte, bit) = (usize::from(id / 8), id & 7);
        if enabled {
            self.bits[byte] |= 1 << bit;
        } else {
            self.bits[byte] &= !(1 << bit);
        }
    }

    pub fn get(&self, id: u8) -> bool {
        self.bits[usize::from(id / 8)] & (1 << (id & 7)) != 0
    }

    /// Enable every id in `ids`
    pub fn set_list(&mut self, ids: &[u8]) {
        for &id in ids {
            self.set(id, true);
        }
    }

    /// Disable every id in `ids`
    pub fn clear_list(&mut self, ids: &[u8]) {
        for &id in ids {
            self.set(id, false);
        }
    }

    /// Enable every id after NIL up to, but not including, `count`.
    ///
    /// This includes the high-rate [`kind::TIMER`] and [`kind::DEBUG_TIMER_ARM`]
    /// ids, which can fill the trace within a few ticks. Follow with
    /// `clear_list(TraceMask::HIGH_RATE)` to keep them out.
    pub fn set_default(&mut self, count: u8) {
        for id in 1..count {
            self.set(id, true);
        }
    }

    /// Raw mask bytes, id `n` is bit `n & 7` of byte `n / 8`
    pub fn as_bytes(&self) -> &[u8; TRACE_MASK_SIZE] {
        &self.bits
    }
}

impl Default for TraceMask {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Trace buffer
// ============================================================================

/// One traced event and when it was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TraceItem {
    /// Milliseconds from the runtime clock
    pub timestamp: u32,
    pub event: Event,
}

#[derive(Debug)]
struct TraceState<const N: usize> {
    ring: RingQueue<TraceItem, N>,
    mask: TraceMask,
    overwritten: u32,
}

/// Diagnostic ring that keeps the newest `N` traced events
pub struct TraceBuffer<const N: usize> {
    state: Mutex<RefCell<TraceState<N>>>,
}

impl<const N: usize> TraceBuffer<N> {
    /// Empty buffer with every id masked off
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(TraceState {
                ring: RingQueue::new(),
                mask: TraceMask::new(),
                overwritten: 0,
            })),
        }
    }

    /// Record `event` if its id is enabled. Never fails; when full the oldest
    /// item is dropped.
    pub fn write(&self, timestamp: u32, event: Event) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.mask.get(event.id()) {
                return;
            }
            if state.ring.put_overwrite(TraceItem { timestamp, event }).is_some() {
                state.overwritten = state.overwritten.wrapping_add(1);
            }
        });
    }

    /// Oldest trace item, if any
    pub fn read(&self) -> Option<TraceItem> {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).ring.get())
    }

    /// Drop all buffered items
    pub fn clear(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.ring.clear();
            state.overwritten = 0;
        });
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).ring.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items lost to overwrite since the last clear
    pub fn overwritten(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).overwritten)
    }

    /// Copy of the current mask
    pub fn mask(&self) -> TraceMask {
        critical_section::with(|cs| self.state.borrow_ref(cs).mask)
    }

    /// Edit the mask in place
    pub fn update_mask<R>(&self, f: impl FnOnce(&mut TraceMask) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs).mask))
    }
}

impl<const N: usize> Default for TraceBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
