//! Event value type and event metadata
//!
//! An [`Event`] is an 8-bit id with an 8-bit and a 16-bit parameter. It packs
//! into a `u32` as `p16 << 16 | p8 << 8 | id`, the layout the trace tooling
//! and the timer cookie scheme rely on.
//!
//! ## Core event ids
//!
//! | Id | Name | p8 | p16 |
//! |----|------|----|-----|
//! | 0 | `NIL` | | |
//! | 1 | `DEBUG_SM_STATE_CHANGE` | machine id | new state |
//! | 2 | `SM_ENTRY` | | |
//! | 3 | `SM_EXIT` | | |
//! | 4 | `SM_SELF` | machine id | |
//! | 5 | `TIMER` | timer index | cookie |
//! | 6 | `DEBUG_TIMER_ARM` | timer index | ticks |
//! | 7 | `DEBUG_TIMER_STOP` | timer index | |
//! | 8 | `DEBUG_QUEUE_FULL` | rejected id | |
//! | 9 | `DEBUG` | | |
//!
//! Application events start at [`kind::FIRST_APP`].

/// Core event ids
pub mod kind {
    pub const NIL: u8 = 0;
    pub const DEBUG_SM_STATE_CHANGE: u8 = 1;
    pub const SM_ENTRY: u8 = 2;
    pub const SM_EXIT: u8 = 3;
    pub const SM_SELF: u8 = 4;
    pub const TIMER: u8 = 5;
    pub const DEBUG_TIMER_ARM: u8 = 6;
    pub const DEBUG_TIMER_STOP: u8 = 7;
    pub const DEBUG_QUEUE_FULL: u8 = 8;
    pub const DEBUG: u8 = 9;
    /// First id free for application events
    pub const FIRST_APP: u8 = 10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    id: u8,
    p8: u8,
    p16: u16,
}

impl Event {
    /// The null event
    pub const NIL: Event = Event::new(kind::NIL, 0, 0);

    #[inline]
    pub const fn new(id: u8, p8: u8, p16: u16) -> Self {
        Self { id, p8, p16 }
    }

    /// Event with both parameters zero
    #[inline]
    pub const fn simple(id: u8) -> Self {
        Self::new(id, 0, 0)
    }

    #[inline]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    pub const fn p8(&self) -> u8 {
        self.p8
    }

    #[inline]
    pub const fn p16(&self) -> u16 {
        self.p16
    }

    #[inline]
    pub const fn is_nil(&self) -> bool {
        self.id == kind::NIL
    }

    /// Packed form: `p16 << 16 | p8 << 8 | id`
    #[inline]
    pub const fn to_bits(self) -> u32 {
        (self.p16 as u32) << 16 | (self.p8 as u32) << 8 | self.id as u32
    }

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            id: bits as u8,
            p8: (bits >> 8) as u8,
            p16: (bits >> 16) as u16,
        }
    }
}

impl From<Event> for u32 {
    fn from(ev: Event) -> u32 {
        ev.to_bits()
    }
}

impl From<u32> for Event {
    fn from(bits: u32) -> Event {
        Event::from_bits(bits)
    }
}

// ============================================================================
// Event metadata
// ============================================================================

/// Name and description of one event id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInfo {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
}

impl EventInfo {
    pub const fn new(id: u8, name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            name,
            description,
        }
    }
}

pub const CORE_EVENTS: &[EventInfo] = &[
    EventInfo::new(kind::NIL, "NIL", "Null event, queue empty"),
    EventInfo::new(
        kind::DEBUG_SM_STATE_CHANGE,
        "DEBUG_SM_STATE_CHANGE",
        "State change, p8 machine id, p16 new state",
    ),
    EventInfo::new(kind::SM_ENTRY, "SM_ENTRY", "Sent by the runner on state entry"),
    EventInfo::new(kind::SM_EXIT, "SM_EXIT", "Sent by the runner on state exit"),
    EventInfo::new(kind::SM_SELF, "SM_SELF", "Self event, p8 machine id"),
    EventInfo::new(kind::TIMER, "TIMER", "Timer expired, p8 timer index, p16 cookie"),
    EventInfo::new(
        kind::DEBUG_TIMER_ARM,
        "DEBUG_TIMER_ARM",
        "Timer started, p8 timer index, p16 ticks",
    ),
    EventInfo::new(kind::DEBUG_TIMER_STOP, "DEBUG_TIMER_STOP", "Timer stopped, p8 timer index"),
    EventInfo::new(kind::DEBUG_QUEUE_FULL, "DEBUG_QUEUE_FULL", "Queue full, p8 rejected id"),
    EventInfo::new(kind::DEBUG, "DEBUG", "Generic debug event"),
];

/// Static lookup table of event names: the core set plus application events
#[derive(Debug, Clone, Copy)]
pub struct EventCatalog {
    core: &'static [EventInfo],
    app: &'static [EventInfo],
}

impl EventCatalog {
    pub const fn new(app: &'static [EventInfo]) -> Self {
        Self {
            core: CORE_EVENTS,
            app,
        }
    }

    pub fn info(&self, id: u8) -> Option<&'static EventInfo> {
        self.iter().find(|e| e.id == id)
    }

    /// Event name, `""` for unknown ids
    pub fn name(&self, id: u8) -> &'static str {
        self.info(id).map(|e| e.name).unwrap_or("")
    }

    /// Event description, `""` for unknown ids
    pub fn description(&self, id: u8) -> &'static str {
        self.info(id).map(|e| e.description).unwrap_or("")
    }

    /// Number of defined ids, counting from NIL
    pub fn count(&self) -> usize {
        self.core.len() + self.app.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static EventInfo> {
        let (core, app) = (self.core, self.app);
        core.iter().chain(app.iter())
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_packing() {
        let ev = Event::new(0x12, 0x34, 0x5678);
        assert_eq!(ev.to_bits(), 0x5678_3412);
        assert_eq!(Event::from_bits(0x5678_3412), ev);
        assert_eq!(u32::from(ev), 0x5678_3412);
        assert_eq!(Event::from(0xFFFF_FF00u32).id(), kind::NIL);
    }

    #[test]
    fn test_nil_event() {
        assert!(Event::NIL.is_nil());
        assert!(Event::default().is_nil());
        assert!(!Event::simple(kind::DEBUG).is_nil());
        assert!(Event::new(kind::NIL, 1, 2).is_nil());
    }

    #[test]
    fn test_core_table_matches_ids() {
        for (i, info) in CORE_EVENTS.iter().enumerate() {
            assert_eq!(usize::from(info.id), i);
        }
        assert_eq!(CORE_EVENTS.len(), usize::from(kind::FIRST_APP));
    }

    #[test]
    fn test_catalog_lookup() {
        static APP: &[EventInfo] = &[EventInfo::new(kind::FIRST_APP, "MASTER_COMMS", "Master polled us")];
        let catalog = EventCatalog::new(APP);
        assert_eq!(catalog.name(kind::TIMER), "TIMER");
        assert_eq!(catalog.name(kind::FIRST_APP), "MASTER_COMMS");
        assert_eq!(catalog.description(kind::FIRST_APP), "Master polled us");
        assert_eq!(catalog.name(200), "");
        assert_eq!(catalog.count(), 11);
        assert_eq!(catalog.iter().count(), 11);
    }
}
