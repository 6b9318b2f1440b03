//! State-machine runner
//!
//! A state machine is any type implementing [`StateMachine`]. It owns an
//! [`SmContext`] holding its current state and instance id, and reacts to
//! events by returning a [`Transition`]. The runner functions here take care
//! of everything around that call:
//!
//! - [`init`] puts the machine in state 0 and delivers `SM_ENTRY`.
//! - [`dispatch`] filters stale timer events and self events addressed to
//!   another instance, calls the machine, and on a transition delivers
//!   `SM_EXIT` to the old state and `SM_ENTRY` to the new one before returning.
//! - [`post_self`] queues an `SM_SELF` event at the front of the queue.
//!
//! Machines reach the queue, the trace buffer and the timer bank through the
//! [`Services`] trait, implemented by [`Runtime`](crate::runtime::Runtime).

use tracing::{debug, trace};

use crate::event::{kind, Event};

/// Current state and instance id of one machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmContext {
    pub state: u8,
    pub id: u8,
}

/// Outcome of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Remain in the current state
    Stay,
    /// Exit the current state and enter the given one
    To(u8),
}

/// Runtime capabilities available to a state machine while it handles an event
pub trait Services {
    /// Queue an event at the tail; false when the queue is full
    fn publish(&mut self, ev: Event) -> bool;

    /// Queue an event at the head; false when the queue is full
    fn publish_front(&mut self, ev: Event) -> bool;

    /// Write an event to the trace buffer without queueing it
    fn trace(&mut self, ev: Event);

    /// Start timer `index`; returns the cookie its timeout will carry
    fn timer_start(&mut self, index: u8, ticks: u16) -> Option<u16>;

    fn timer_stop(&mut self, index: u8);

    fn timer_remaining(&self, index: u8) -> u16;

    fn timer_is_done(&self, index: u8) -> bool;

    /// True if `ev` is the timeout of the latest start of its timer
    fn timer_is_current(&self, ev: Event) -> bool;

    /// Convert milliseconds to timer ticks
    fn ticks_from_ms(&self, ms: u32) -> u16;

    /// Milliseconds from the runtime clock
    fn now_ms(&self) -> u32;
}

pub trait StateMachine {
    fn context(&self) -> &SmContext;

    fn context_mut(&mut self) -> &mut SmContext;

    /// Handle one event in the current state
    fn on_event(&mut self, ev: Event, sys: &mut dyn Services) -> Transition;

    fn state(&self) -> u8 {
        self.context().state
    }

    fn id(&self) -> u8 {
        self.context().id
    }
}

/// Reset `sm` to state 0 with instance id `id` and deliver `SM_ENTRY`.
/// Any transition returned from the entry handler is ignored.
pub fn init<M: StateMachine + ?Sized>(sm: &mut M, id: u8, sys: &mut dyn Services) {
    *sm.context_mut() = SmContext { state: 0, id };
    debug!(id, "state machine init");
    let _ = sm.on_event(Event::simple(kind::SM_ENTRY), sys);
}

/// Deliver `ev` to `sm`. Returns false if the event was filtered out.
pub fn dispatch<M: StateMachine + ?Sized>(sm: &mut M, ev: Event, sys: &mut dyn Services) -> bool {
    match ev.id() {
        kind::TIMER if !sys.timer_is_current(ev) => {
            trace!(timer = ev.p8(), cookie = ev.p16(), "stale timer event dropped");
            return false;
        }
        kind::SM_SELF if ev.p8() != sm.id() => return false,
        _ => {}
    }

    if let Transition::To(next) = sm.on_event(ev, sys) {
        let _ = sm.on_event(Event::simple(kind::SM_EXIT), sys);
        let id = sm.id();
        sys.trace(Event::new(kind::DEBUG_SM_STATE_CHANGE, id, u16::from(next)));
        debug!(id, from = sm.state(), to = next, "state change");
        sm.context_mut().state = next;
        let _ = sm.on_event(Event::simple(kind::SM_ENTRY), sys);
    }
    true
}

/// Queue an `SM_SELF` event for `ctx` ahead of everything else
pub fn post_self(ctx: &SmContext, sys: &mut dyn Services) -> bool {
    sys.publish_front(Event::new(kind::SM_SELF, ctx.id, 0))
}
