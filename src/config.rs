//! # Link and Runtime Configuration
//!
//! Plain builder-style structs. Queue, trace and timer sizes are const
//! generics on [`Runtime`](crate::runtime::Runtime); everything that can be
//! chosen at start-up lives here.
//!
//! ## Inter-byte timeout
//!
//! A frame ends after 1.5 character times of silence, never less than
//! 750 µs. A character is 10 bits on the wire.
//!
//! | Baud | Char time | Timeout |
//! |------|-----------|---------|
//! | 9600 | 1041 µs | 1561 µs |
//! | 19200 | 520 µs | 780 µs |
//! | 38400 | 260 µs | 750 µs |

use crate::constants::{
    BITS_PER_CHAR, MAX_SLAVE_ID, MIN_INTER_BYTE_TIMEOUT_US, UNASSIGNED_SLAVE_ID,
};
use crate::error::{ModbusError, ModbusResult};

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Default time a master waits for a response (milliseconds).
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 100;

/// Default timer tick rate (Hz).
pub const DEFAULT_TICK_RATE_HZ: u32 = 10;

/// Link engine settings.
///
/// # Example
///
/// ```rust
/// use rs485_node_core::LinkConfig;
///
/// let config = LinkConfig::new()
///     .with_baud_rate(9600)
///     .with_response_timeout_ms(250)
///     .with_slave_id(0x11);
///
/// assert_eq!(config.inter_byte_timeout_us(), 1561);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Response timeout for master requests (milliseconds).
    pub response_timeout_ms: u32,
    /// Our slave id; 0 means unassigned and the node never answers.
    pub slave_id: u8,
    /// Log every frame sent and received as hex.
    pub packet_logging: bool,
}

impl LinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_response_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// Duration of one character on the wire (microseconds).
    pub fn char_time_us(&self) -> u32 {
        BITS_PER_CHAR * 1_000_000 / self.baud_rate.max(1)
    }

    /// Silence that terminates a frame (microseconds).
    pub fn inter_byte_timeout_us(&self) -> u32 {
        (self.char_time_us() * 15 / 10).max(MIN_INTER_BYTE_TIMEOUT_US)
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.baud_rate == 0 {
            return Err(ModbusError::configuration("baud rate must be non-zero"));
        }
        if self.response_timeout_ms == 0 {
            return Err(ModbusError::configuration(
                "response timeout must be non-zero",
            ));
        }
        if self.slave_id > MAX_SLAVE_ID {
            return Err(ModbusError::configuration(format!(
                "slave id {} out of range 0..={}",
                self.slave_id, MAX_SLAVE_ID
            )));
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            slave_id: UNASSIGNED_SLAVE_ID,
            packet_logging: false,
        }
    }
}

/// Event runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Rate at which `service_timers` is called (Hz).
    pub tick_rate_hz: u32,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_rate_hz(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    /// Length of one tick (milliseconds).
    pub fn tick_ms(&self) -> u32 {
        1000 / self.tick_rate_hz.max(1)
    }

    /// Convert a period in milliseconds to ticks, saturating at `u16::MAX`.
    pub fn ticks_from_ms(&self, ms: u32) -> u16 {
        let ticks = ms / self.tick_ms().max(1);
        u16::try_from(ticks).unwrap_or(u16::MAX)
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if !(1..=1000).contains(&self.tick_rate_hz) {
            return Err(ModbusError::configuration(format!(
                "tick rate {} Hz out of range 1..=1000",
                self.tick_rate_hz
            )));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }
}
