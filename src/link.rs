//! # Modbus RTU Link Engine
//!
//! [`ModbusLink`] frames bytes on a half-duplex RS-485 bus. It has no thread
//! of its own: the main loop calls [`ModbusLink::service`] as often as it can,
//! and each call
//!
//! 1. reports [`LinkEvent::ResponseTimeout`] if a master request has waited
//!    longer than the response timeout,
//! 2. ends the current frame once the line has been silent for the
//!    inter-byte timeout, classifies it and reports it to the handler,
//! 3. moves at most one received byte into the receive buffer.
//!
//! ## Roles
//!
//! | Situation | Frame classified as |
//! |-----------|---------------------|
//! | Waiting for a response, frame matches request | `ResponseOk` |
//! | Waiting for a response, frame does not match | `ResponseCorrupt(fault)` |
//! | Not waiting, valid frame for our slave id | `RequestForUs` |
//! | Not waiting, valid frame for another id | `RequestForOther` |
//! | Not waiting, frame fails basic checks | `RequestInvalid(fault)` |
//!
//! ## Expected responses
//!
//! | Request | Response length |
//! |---------|-----------------|
//! | FC06 write single register | 8 bytes, an exact echo of the request |
//! | FC03 read holding registers | 5 + 2 × count bytes, byte count = 2 × count |
//! | anything else | no response awaited |

use tracing::{debug, trace, warn};

use crate::clock::{elapsed, Clock};
use crate::config::LinkConfig;
use crate::constants::{
    BYTE_COUNT_OFFSET, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    FUNCTION_CODE_OFFSET, MAX_FRAME_SIZE, MAX_SLAVE_ID, READ_RESPONSE_OVERHEAD, SLAVE_ID_OFFSET, VALUE_OFFSET,
    WRITE_SINGLE_FRAME_LEN,
};
use crate::error::{FrameFault, ModbusError, ModbusResult, ResponseFault};
use crate::event::Event;
use crate::frame::{verify_frame, Frame, FrameBuilder, RelayCommand};
use crate::logging::log_frame;
use crate::transport::Transport;

// ============================================================================
// Events reported to the application
// ============================================================================

/// Outcome of one received frame or of a response wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Response matched the outstanding request
    ResponseOk,
    /// No response arrived within the response timeout
    ResponseTimeout,
    /// A response arrived but failed validation
    ResponseCorrupt(ResponseFault),
    /// Valid request addressed to our slave id
    RequestForUs,
    /// Valid request addressed to another slave
    RequestForOther,
    /// Frame received while idle that failed basic checks
    RequestInvalid(FrameFault),
}

impl LinkEvent {
    pub const CODE_REQUEST_FOR_US: u8 = 4;
    pub const CODE_REQUEST_FOR_OTHER: u8 = 5;
    pub const CODE_RESPONSE_OK: u8 = 8;
    pub const CODE_RESPONSE_TIMEOUT: u8 = 9;

    /// `p16` of [`to_event`](Self::to_event) for frames received while idle
    pub const CLASS_REQUEST: u16 = 0;
    /// `p16` of [`to_event`](Self::to_event) for the end of a master request
    pub const CLASS_RESPONSE: u16 = 1;

    /// Numeric reason code
    pub const fn code(self) -> u8 {
        match self {
            LinkEvent::ResponseOk => Self::CODE_RESPONSE_OK,
            LinkEvent::ResponseTimeout => Self::CODE_RESPONSE_TIMEOUT,
            LinkEvent::ResponseCorrupt(fault) => fault.code(),
            LinkEvent::RequestForUs => Self::CODE_REQUEST_FOR_US,
            LinkEvent::RequestForOther => Self::CODE_REQUEST_FOR_OTHER,
            LinkEvent::RequestInvalid(fault) => fault.code(),
        }
    }

    /// True for events that end a master request
    pub const fn is_response(self) -> bool {
        matches!(
            self,
            LinkEvent::ResponseOk | LinkEvent::ResponseTimeout | LinkEvent::ResponseCorrupt(_)
        )
    }

    /// Pack into a runtime event: reason code in `p8`, class in `p16`.
    ///
    /// Frame fault codes are shared by both roles, so only the class tells
    /// `ResponseCorrupt(Frame(f))` apart from `RequestInvalid(f)`.
    pub const fn to_event(self, id: u8) -> Event {
        let class = if self.is_response() {
            Self::CLASS_RESPONSE
        } else {
            Self::CLASS_REQUEST
        };
        Event::new(id, self.code(), class)
    }
}

/// Receiver of link events
pub trait LinkHandler {
    /// `frame` is the received frame, empty for a response timeout
    fn on_link_event(&mut self, event: LinkEvent, frame: &[u8]);
}

impl<F: FnMut(LinkEvent, &[u8])> LinkHandler for F {
    fn on_link_event(&mut self, event: LinkEvent, frame: &[u8]) {
        self(event, frame)
    }
}

/// Link traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_sent: u32,
    pub frames_received: u32,
    pub responses_ok: u32,
    pub response_timeouts: u32,
    pub responses_corrupt: u32,
    pub requests_for_us: u32,
    pub requests_for_other: u32,
    pub invalid_frames: u32,
    pub rx_overflows: u32,
    pub transport_errors: u32,
}

// ============================================================================
// Response validation
// ============================================================================

/// Total response length a master should wait for after sending `request`.
/// Zero means no response is awaited.
pub fn expected_response_len(request: &[u8]) -> usize {
    match request.get(FUNCTION_CODE_OFFSET) {
        Some(&FC_WRITE_SINGLE_REGISTER) => WRITE_SINGLE_FRAME_LEN,
        Some(&FC_READ_HOLDING_REGISTERS) => match request.get(VALUE_OFFSET..VALUE_OFFSET + 2) {
            Some(count) => {
                READ_RESPONSE_OVERHEAD + 2 * usize::from(u16::from_be_bytes([count[0], count[1]]))
            }
            None => 0,
        },
        _ => 0,
    }
}

/// Check `response` against the `request` that produced it.
///
/// Only FC03 and FC06 responses can be checked; any other request function
/// code yields [`ResponseFault::Unverifiable`] whatever the response holds.
pub fn verify_response(request: &[u8], response: &[u8]) -> Result<(), ResponseFault> {
    let fc = request.get(FUNCTION_CODE_OFFSET).copied().unwrap_or(0);
    if fc != FC_WRITE_SINGLE_REGISTER && fc != FC_READ_HOLDING_REGISTERS {
        return Err(ResponseFault::Unverifiable(fc));
    }
    let expected = expected_response_len(request);
    if response.len() != expected {
        return Err(ResponseFault::LengthMismatch {
            expected: expected.min(usize::from(u8::MAX)) as u8,
            actual: response.len().min(usize::from(u8::MAX)) as u8,
        });
    }
    verify_frame(response)?;
    if response[SLAVE_ID_OFFSET] != request[SLAVE_ID_OFFSET] {
        return Err(ResponseFault::BadSlaveId);
    }
    if response[FUNCTION_CODE_OFFSET] != fc {
        return Err(ResponseFault::BadFunctionCode);
    }
    match fc {
        FC_WRITE_SINGLE_REGISTER if response == request => Ok(()),
        FC_READ_HOLDING_REGISTERS
            if usize::from(response[BYTE_COUNT_OFFSET]) == expected - READ_RESPONSE_OVERHEAD =>
        {
            Ok(())
        }
        _ => Err(ResponseFault::PayloadMismatch),
    }
}

fn check_response_fits(request: &[u8]) -> ModbusResult<()> {
    let expected = expected_response_len(request);
    if expected > MAX_FRAME_SIZE {
        return Err(ModbusError::invalid_data(format!(
            "response of {} bytes exceeds frame size {}",
            expected, MAX_FRAME_SIZE
        )));
    }
    if request.get(FUNCTION_CODE_OFFSET) == Some(&FC_READ_HOLDING_REGISTERS)
        && expected == READ_RESPONSE_OVERHEAD
    {
        return Err(ModbusError::invalid_data("read of zero registers"));
    }
    Ok(())
}

// ============================================================================
// Link engine
// ============================================================================

/// Modbus RTU master/slave link over a [`Transport`]
pub struct ModbusLink<T: Transport, C: Clock, H: LinkHandler> {
    transport: T,
    clock: C,
    handler: H,
    config: LinkConfig,
    inter_byte_timeout_us: u32,
    rx: Frame,
    tx: Frame,
    /// Millisecond timestamp of the outstanding master request
    response_started: Option<u32>,
    /// Microsecond timestamp of the last received byte
    last_rx_byte: Option<u32>,
    stats: LinkStats,
}

impl<T: Transport, C: Clock, H: LinkHandler> ModbusLink<T, C, H> {
    pub fn new(transport: T, clock: C, handler: H, config: LinkConfig) -> ModbusResult<Self> {
        config.validate()?;
        let inter_byte_timeout_us = config.inter_byte_timeout_us();
        debug!(
            baud = config.baud_rate,
            inter_byte_timeout_us,
            response_timeout_ms = config.response_timeout_ms,
            slave_id = config.slave_id,
            "link initialised"
        );
        Ok(Self {
            transport,
            clock,
            handler,
            config,
            inter_byte_timeout_us,
            rx: Frame::new(),
            tx: Frame::new(),
            response_started: None,
            last_rx_byte: None,
            stats: LinkStats::default(),
        })
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send bytes as-is: no CRC, no busy check, no response wait
    pub fn send_raw(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        self.transmit(bytes)
    }

    /// Send a slave response. Appends the CRC and waits out any exchange in
    /// progress first.
    pub fn slave_send(&mut self, frame: &[u8]) -> ModbusResult<()> {
        self.wait_idle();
        self.load_tx(frame)?;
        let tx = self.tx.clone();
        self.transmit(tx.as_slice())
    }

    /// Send a master request and start waiting for its response.
    ///
    /// While a previous request is still outstanding this pumps
    /// [`service`](Self::service) until that exchange completes, so the
    /// handler may be called from inside this method. There is no abort
    /// path; the wait ends when a response arrives or the response timeout
    /// elapses.
    ///
    /// FC03 requests for zero registers, or for more than fit in one response
    /// frame, are rejected before anything is sent.
    pub fn master_send(&mut self, frame: &[u8]) -> ModbusResult<()> {
        check_response_fits(frame)?;
        self.wait_idle();
        self.load_tx(frame)?;
        let tx = self.tx.clone();
        self.transmit(tx.as_slice())?;

        if expected_response_len(self.tx.as_slice()) > 0 {
            self.response_started = Some(self.clock.millis());
            trace!("master wait armed");
        }
        Ok(())
    }

    /// FC06 write of one holding register
    pub fn write_holding_register(&mut self, slave_id: u8, address: u16, value: u16) -> ModbusResult<()> {
        let frame = FrameBuilder::write_single_register(slave_id, address, value)?;
        self.master_send(frame.as_slice())
    }

    /// FC03 read of `count` holding registers
    pub fn read_holding_registers(&mut self, slave_id: u8, address: u16, count: u16) -> ModbusResult<()> {
        let frame = FrameBuilder::read_holding_registers(slave_id, address, count)?;
        self.master_send(frame.as_slice())
    }

    /// Command one relay on a relay board. Relay numbers start at 1.
    pub fn relay_board_write(
        &mut self,
        slave_id: u8,
        relay: u8,
        command: RelayCommand,
        delay: u8,
    ) -> ModbusResult<()> {
        let frame = FrameBuilder::relay_board_write(slave_id, relay, command, delay)?;
        self.master_send(frame.as_slice())
    }

    fn wait_idle(&mut self) {
        while self.is_busy() {
            self.service();
        }
    }

    fn load_tx(&mut self, frame: &[u8]) -> ModbusResult<()> {
        self.tx.reset();
        if !self.tx.extend_from_slice(frame) || !self.tx.append_crc() {
            return Err(ModbusError::BufferFull {
                capacity: self.tx.capacity(),
            });
        }
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        fn write_frame<T: Transport>(transport: &mut T, bytes: &[u8]) -> ModbusResult<()> {
            transport.set_transmit_enable(true)?;
            transport.write_all(bytes)?;
            transport.flush()
        }

        let written = write_frame(&mut self.transport, bytes);
        let released = self.transport.set_transmit_enable(false);
        if let Err(err) = written.and(released) {
            self.stats.transport_errors += 1;
            warn!("transmit failed: {}", err);
            return Err(err);
        }

        self.stats.frames_sent += 1;
        if self.config.packet_logging {
            log_frame("send", bytes, bytes.first().copied());
        }
        Ok(())
    }

    // ========================================================================
    // Service
    // ========================================================================

    /// Run one step of the link. Call from the main loop as often as possible.
    pub fn service(&mut self) {
        if let Some(started) = self.response_started {
            if elapsed(self.clock.millis(), started, self.config.response_timeout_ms) {
                self.response_started = None;
                trace!("master wait timed out");
                self.stats.response_timeouts += 1;
                self.handler.on_link_event(LinkEvent::ResponseTimeout, &[]);
            }
        }

        if let Some(last) = self.last_rx_byte {
            if elapsed(self.clock.micros(), last, self.inter_byte_timeout_us) {
                self.last_rx_byte = None;
                trace!("rx silence");
                if !self.rx.is_empty() {
                    self.dispatch_frame();
                }
                self.rx.reset();
            }
        }

        match self.transport.read_byte() {
            Ok(Some(byte)) => {
                let overflowed = self.rx.is_overflow();
                if !self.rx.append(byte) && !overflowed {
                    warn!(capacity = self.rx.capacity(), "rx buffer overflow");
                }
                self.last_rx_byte = Some(self.clock.micros());
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.transport_errors += 1;
                warn!("receive failed: {}", err);
            }
        }
    }

    fn dispatch_frame(&mut self) {
        self.stats.frames_received += 1;
        if self.rx.is_overflow() {
            self.stats.rx_overflows += 1;
        }
        if self.config.packet_logging {
            log_frame("recv", self.rx.as_slice(), self.rx.slave_id());
        }

        let event = if self.response_started.take().is_some() {
            trace!("master wait cleared");
            let result = match self.rx.verify() {
                Err(FrameFault::Overflow) => Err(ResponseFault::Frame(FrameFault::Overflow)),
                _ => verify_response(self.tx.as_slice(), self.rx.as_slice()),
            };
            match result {
                Ok(()) => {
                    self.stats.responses_ok += 1;
                    LinkEvent::ResponseOk
                }
                Err(fault) => {
                    self.stats.responses_corrupt += 1;
                    LinkEvent::ResponseCorrupt(fault)
                }
            }
        } else {
            match self.rx.verify() {
                Err(fault) => {
                    self.stats.invalid_frames += 1;
                    LinkEvent::RequestInvalid(fault)
                }
                Ok(()) if self.rx.slave_id() == Some(self.config.slave_id) => {
                    self.stats.requests_for_us += 1;
                    LinkEvent::RequestForUs
                }
                Ok(()) => {
                    self.stats.requests_for_other += 1;
                    LinkEvent::RequestForOther
                }
            }
        };

        debug!(?event, len = self.rx.len(), "frame received");
        self.handler.on_link_event(event, self.rx.as_slice());
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// True while a master request is awaiting its response
    pub fn is_busy(&self) -> bool {
        self.response_started.is_some()
    }

    pub fn slave_id(&self) -> u8 {
        self.config.slave_id
    }

    /// Set our slave id; 0 unassigns it so no request is ever for us
    pub fn set_slave_id(&mut self, id: u8) -> ModbusResult<()> {
        if id > MAX_SLAVE_ID {
            return Err(ModbusError::configuration(format!(
                "slave id {} out of range 0..={}",
                id, MAX_SLAVE_ID
            )));
        }
        self.config.slave_id = id;
        Ok(())
    }

    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.config.packet_logging = enabled;
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Last frame sent with `master_send` or `slave_send`, CRC included
    pub fn last_request(&self) -> &[u8] {
        self.tx.as_slice()
    }

    /// Bytes received since the end of the last frame
    pub fn pending_rx(&self) -> &[u8] {
        self.rx.as_slice()
    }

    pub fn inter_byte_timeout_us(&self) -> u32 {
        self.inter_byte_timeout_us
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
