//! # Event Runtime
//!
//! [`Runtime`] bundles the event queue, the trace buffer, the timer bank and a
//! clock into one owned value. A node typically runs it like this:
//!
//! ```rust
//! use rs485_node_core::{Event, Runtime, sim::SimClock};
//!
//! let rt: Runtime<SimClock, 8, 16, 4> = Runtime::new(SimClock::new());
//! rt.publish(Event::simple(10));
//!
//! // Main loop:
//! //   - call `service_timers()` at the configured tick rate
//! //   - pull events with `next_event()` and `dispatch` them to machines
//! while let Some(ev) = rt.next_event() {
//!     assert_eq!(ev.id(), 10);
//! }
//! ```
//!
//! Every published event is also offered to the trace buffer, which keeps it
//! if its id is enabled in the trace mask. A rejected publish is traced as
//! `DEBUG_QUEUE_FULL` with the rejected id in `p8`.

use tracing::warn;

use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::event::{kind, Event};
use crate::queue::{EventQueue, TraceBuffer, TraceItem, TraceMask};
use crate::sm::{self, Services, StateMachine};
use crate::timer::{EventSink, TimerBank};

/// Default event queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Default trace buffer depth.
pub const DEFAULT_TRACE_DEPTH: usize = 16;

/// Default number of timers.
pub const DEFAULT_TIMER_COUNT: usize = 4;

/// Shared view of the queue and trace used as the timers' event sink
struct Publisher<'a, C: Clock, const Q: usize, const T: usize> {
    queue: &'a EventQueue<Q>,
    trace: &'a TraceBuffer<T>,
    clock: &'a C,
}

impl<C: Clock, const Q: usize, const T: usize> Publisher<'_, C, Q, T> {
    fn enqueue(&self, ev: Event, front: bool) -> bool {
        if ev.is_nil() {
            return true;
        }
        let now = self.clock.millis();
        self.trace.write(now, ev);
        let queued = if front {
            self.queue.enqueue_front(ev)
        } else {
            self.queue.enqueue(ev)
        };
        if !queued {
            warn!(id = ev.id(), "event queue full");
            self.trace
                .write(now, Event::new(kind::DEBUG_QUEUE_FULL, ev.id(), 0));
        }
        queued
    }
}

impl<C: Clock, const Q: usize, const T: usize> EventSink for Publisher<'_, C, Q, T> {
    fn publish(&self, ev: Event) -> bool {
        self.enqueue(ev, false)
    }

    fn trace(&self, ev: Event) {
        self.trace.write(self.clock.millis(), ev);
    }
}

/// Event queue, trace buffer and timer bank driven from one main loop
pub struct Runtime<
    C: Clock,
    const Q: usize = DEFAULT_QUEUE_DEPTH,
    const T: usize = DEFAULT_TRACE_DEPTH,
    const NT: usize = DEFAULT_TIMER_COUNT,
> {
    queue: EventQueue<Q>,
    trace: TraceBuffer<T>,
    timers: TimerBank<NT>,
    clock: C,
    config: RuntimeConfig,
}

impl<C: Clock, const Q: usize, const T: usize, const NT: usize> Runtime<C, Q, T, NT> {
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, RuntimeConfig::default())
    }

    pub fn with_config(clock: C, config: RuntimeConfig) -> Self {
        Self {
            queue: EventQueue::new(),
            trace: TraceBuffer::new(),
            timers: TimerBank::new(),
            clock,
            config,
        }
    }

    fn publisher(&self) -> Publisher<'_, C, Q, T> {
        Publisher {
            queue: &self.queue,
            trace: &self.trace,
            clock: &self.clock,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Queue an event at the tail. Nil events are ignored.
    pub fn publish(&self, ev: Event) -> bool {
        self.publisher().enqueue(ev, false)
    }

    /// Queue an event ahead of everything already waiting
    pub fn publish_front(&self, ev: Event) -> bool {
        self.publisher().enqueue(ev, true)
    }

    pub fn next_event(&self) -> Option<Event> {
        self.queue.dequeue()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue, offering every event to each machine in turn.
    /// Returns the number of events taken from the queue.
    pub fn run_pending(&mut self, machines: &mut [&mut dyn StateMachine]) -> usize {
        let mut count = 0;
        while let Some(ev) = self.queue.dequeue() {
            for machine in machines.iter_mut() {
                sm::dispatch(&mut **machine, ev, self);
            }
            count += 1;
        }
        count
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Advance all timers by one tick. Call at `config().tick_rate_hz`.
    pub fn service_timers(&mut self) {
        let sink = Publisher {
            queue: &self.queue,
            trace: &self.trace,
            clock: &self.clock,
        };
        self.timers.service(&sink);
    }

    pub fn timer_start(&mut self, index: u8, ticks: u16) -> Option<u16> {
        let sink = Publisher {
            queue: &self.queue,
            trace: &self.trace,
            clock: &self.clock,
        };
        self.timers.start(index, ticks, &sink)
    }

    pub fn timer_stop(&mut self, index: u8) {
        let sink = Publisher {
            queue: &self.queue,
            trace: &self.trace,
            clock: &self.clock,
        };
        self.timers.stop(index, &sink);
    }

    pub fn timers(&self) -> &TimerBank<NT> {
        &self.timers
    }

    // ========================================================================
    // Trace
    // ========================================================================

    /// Write to the trace buffer without queueing
    pub fn trace_write(&self, ev: Event) {
        self.trace.write(self.clock.millis(), ev);
    }

    pub fn trace_read(&self) -> Option<TraceItem> {
        self.trace.read()
    }

    pub fn trace_clear(&self) {
        self.trace.clear();
    }

    pub fn trace_mask(&self) -> TraceMask {
        self.trace.mask()
    }

    /// Edit the trace mask in place
    pub fn trace_mask_mut<R>(&self, f: impl FnOnce(&mut TraceMask) -> R) -> R {
        self.trace.update_mask(f)
    }

    pub fn trace_buffer(&self) -> &TraceBuffer<T> {
        &self.trace
    }
}

impl<C: Clock, const Q: usize, const T: usize, const NT: usize> Services for Runtime<C, Q, T, NT> {
    fn publish(&mut self, ev: Event) -> bool {
        Runtime::publish(self, ev)
    }

    fn publish_front(&mut self, ev: Event) -> bool {
        Runtime::publish_front(self, ev)
    }

    fn trace(&mut self, ev: Event) {
        self.trace_write(ev);
    }

    fn timer_start(&mut self, index: u8, ticks: u16) -> Option<u16> {
        Runtime::timer_start(self, index, ticks)
    }

    fn timer_stop(&mut self, index: u8) {
        Runtime::timer_stop(self, index);
    }

    fn timer_remaining(&self, index: u8) -> u16 {
        self.timers.remaining(index)
    }

    fn timer_is_done(&self, index: u8) -> bool {
        self.timers.is_done(index)
    }

    fn timer_is_current(&self, ev: Event) -> bool {
        self.timers.is_current(ev)
    }

    fn ticks_from_ms(&self, ms: u32) -> u16 {
        self.config.ticks_from_ms(ms)
    }

    fn now_ms(&self) -> u32 {
        self.clock.millis()
    }
}
