//! Master-comms supervisor
//!
//! A slave node watches for traffic from its bus master. Every request for us
//! is published as [`MASTER_COMMS`]; the supervisor restarts a 4 s timer on
//! each one. If the timer runs out it moves to [`ST_NO_MASTER`] and switches
//! the status indicator to the no-comms pattern until the master returns.
//!
//! ```text
//!            MASTER_COMMS (restart timer)
//!              +-----+
//!              v     |
//!          +---------+--+   timer    +--------------+
//!  init -->|   RUN      |----------->|  NO_MASTER   |
//!          +------------+<-----------+--------------+
//!                        MASTER_COMMS
//! ```

use tracing::info;

use crate::event::{kind, Event, EventInfo};
use crate::link::LinkEvent;
use crate::sm::{post_self, Services, SmContext, StateMachine, Transition};

/// Published on every request addressed to this node
pub const MASTER_COMMS: u8 = kind::FIRST_APP;

/// Application events defined by this module, for an [`EventCatalog`](crate::event::EventCatalog)
pub const APP_EVENTS: &[EventInfo] = &[EventInfo::new(
    MASTER_COMMS,
    "MASTER_COMMS",
    "Request from master received, used for comms timeout",
)];

/// Time without master traffic before the node reports lost comms
pub const TIMEOUT_MS_MASTER_COMMS: u32 = 4000;

pub const ST_RUN: u8 = 0;
pub const ST_NO_MASTER: u8 = 1;

/// Pattern shown on the node's status LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedPattern {
    Ok,
    NoComms,
}

/// Output showing the supervisor's view of the bus
pub trait StatusIndicator {
    fn set(&mut self, pattern: LedPattern);
}

impl<F: FnMut(LedPattern)> StatusIndicator for F {
    fn set(&mut self, pattern: LedPattern) {
        self(pattern)
    }
}

/// Map a link event to the supervisor event it implies, if any
pub fn master_comms_event(event: LinkEvent) -> Option<Event> {
    match event {
        LinkEvent::RequestForUs => Some(Event::simple(MASTER_COMMS)),
        _ => None,
    }
}

pub struct Supervisor<I: StatusIndicator> {
    ctx: SmContext,
    indicator: I,
    timer: u8,
}

impl<I: StatusIndicator> Supervisor<I> {
    /// Supervisor using timer 0
    pub fn new(indicator: I) -> Self {
        Self::with_timer(indicator, 0)
    }

    pub fn with_timer(indicator: I, timer: u8) -> Self {
        Self {
            ctx: SmContext::default(),
            indicator,
            timer,
        }
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn is_master_lost(&self) -> bool {
        self.ctx.state == ST_NO_MASTER
    }

    fn on_run(&mut self, ev: Event, sys: &mut dyn Services) -> Transition {
        match ev.id() {
            kind::SM_ENTRY | MASTER_COMMS => {
                post_self(&self.ctx, sys);
                Transition::Stay
            }
            kind::SM_SELF => {
                self.indicator.set(LedPattern::Ok);
                let ticks = sys.ticks_from_ms(TIMEOUT_MS_MASTER_COMMS);
                sys.timer_start(self.timer, ticks);
                Transition::Stay
            }
            kind::TIMER if ev.p8() == self.timer => Transition::To(ST_NO_MASTER),
            _ => Transition::Stay,
        }
    }

    fn on_no_master(&mut self, ev: Event) -> Transition {
        match ev.id() {
            kind::SM_ENTRY => {
                info!(id = self.ctx.id, "master comms lost");
                self.indicator.set(LedPattern::NoComms);
                Transition::Stay
            }
            MASTER_COMMS => Transition::To(ST_RUN),
            _ => Transition::Stay,
        }
    }
}

impl<I: StatusIndicator> StateMachine for Supervisor<I> {
    fn context(&self) -> &SmContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut SmContext {
        &mut self.ctx
    }

    fn on_event(&mut self, ev: Event, sys: &mut dyn Services) -> Transition {
        match self.ctx.state {
            ST_RUN => self.on_run(ev, sys),
            ST_NO_MASTER => self.on_no_master(ev),
            _ => Transition::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventCatalog;
    use crate::runtime::Runtime;
    use crate::sim::SimClock;
    use crate::sm::init;

    #[derive(Default)]
    struct Led {
        history: Vec<LedPattern>,
    }

    impl StatusIndicator for Led {
        fn set(&mut self, pattern: LedPattern) {
            self.history.push(pattern);
        }
    }

    type Rt = Runtime<SimClock, 8, 16, 2>;

    fn run(rt: &mut Rt, sup: &mut Supervisor<Led>) {
        rt.run_pending(&mut [sup as &mut dyn StateMachine]);
    }

    fn tick(rt: &mut Rt, sup: &mut Supervisor<Led>, count: u32) {
        for _ in 0..count {
            rt.service_timers();
            run(rt, sup);
        }
    }

    fn start() -> (Rt, Supervisor<Led>) {
        let mut rt = Rt::new(SimClock::new());
        let mut sup = Supervisor::new(Led::default());
        init(&mut sup, 1, &mut rt);
        run(&mut rt, &mut sup);
        (rt, sup)
    }

    #[test]
    fn test_entry_arms_timer() {
        let (rt, sup) = start();
        assert_eq!(sup.state(), ST_RUN);
        assert_eq!(sup.indicator().history, vec![LedPattern::Ok]);
        assert_eq!(rt.timers().remaining(0), 40);
    }

    #[test]
    fn test_silence_reports_no_master() {
        let (mut rt, mut sup) = start();
        tick(&mut rt, &mut sup, 39);
        assert_eq!(sup.state(), ST_RUN);
        tick(&mut rt, &mut sup, 1);
        assert!(sup.is_master_lost());
        assert_eq!(
            sup.indicator().history,
            vec![LedPattern::Ok, LedPattern::NoComms]
        );
    }

    #[test]
    fn test_comms_restart_timer() {
        let (mut rt, mut sup) = start();
        tick(&mut rt, &mut sup, 30);
        rt.publish(Event::simple(MASTER_COMMS));
        run(&mut rt, &mut sup);
        assert_eq!(rt.timers().remaining(0), 40);
        tick(&mut rt, &mut sup, 39);
        assert_eq!(sup.state(), ST_RUN);
    }

    #[test]
    fn test_comms_return_recovers() {
        let (mut rt, mut sup) = start();
        tick(&mut rt, &mut sup, 40);
        assert!(sup.is_master_lost());

        rt.publish(Event::simple(MASTER_COMMS));
        run(&mut rt, &mut sup);
        assert_eq!(sup.state(), ST_RUN);
        assert_eq!(sup.indicator().history.last(), Some(&LedPattern::Ok));
        assert_eq!(rt.timers().remaining(0), 40);
    }

    #[test]
    fn test_other_timer_ignored() {
        let mut rt = Rt::new(SimClock::new());
        let mut sup = Supervisor::with_timer(Led::default(), 1);
        init(&mut sup, 1, &mut rt);
        run(&mut rt, &mut sup);
        rt.timer_start(0, 0);
        run(&mut rt, &mut sup);
        assert_eq!(sup.state(), ST_RUN);
        assert_eq!(rt.timers().remaining(1), 40);
    }

    #[test]
    fn test_link_event_mapping() {
        assert_eq!(
            master_comms_event(LinkEvent::RequestForUs),
            Some(Event::simple(MASTER_COMMS))
        );
        assert_eq!(master_comms_event(LinkEvent::RequestForOther), None);
        assert_eq!(master_comms_event(LinkEvent::ResponseOk), None);
    }

    #[test]
    fn test_catalog_names_app_events() {
        let catalog = EventCatalog::new(APP_EVENTS);
        assert_eq!(catalog.name(MASTER_COMMS), "MASTER_COMMS");
        assert_eq!(catalog.name(kind::TIMER), "TIMER");
        assert_eq!(catalog.count(), 11);
    }
}
