//! Single-threaded bus simulation
//!
//! [`SimClock`] and [`SimTransport`] stand in for the hardware timer and the
//! RS-485 port. Both are cheap handles over shared state, so a test keeps one
//! clone to drive time and inject bytes while the link engine owns another.
//! "Interrupts" are just calls made between `service` invocations.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::clock::Clock;
use crate::error::{ModbusError, ModbusResult};
use crate::transport::Transport;

// ============================================================================
// Clock
// ============================================================================

#[derive(Debug, Default)]
struct ClockState {
    micros: Cell<u64>,
    auto_step_us: Cell<u32>,
}

/// Manually driven clock with optional auto-advance
///
/// With auto-advance set, every reading moves time forward by the step, so a
/// busy-wait on the clock always terminates.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    state: Rc<ClockState>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances `step_us` on every reading
    pub fn with_auto_advance(step_us: u32) -> Self {
        let clock = Self::new();
        clock.state.auto_step_us.set(step_us);
        clock
    }

    pub fn set_auto_advance(&self, step_us: u32) {
        self.state.auto_step_us.set(step_us);
    }

    pub fn advance_us(&self, us: u64) {
        self.state.micros.set(self.state.micros.get() + us);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    /// Total elapsed time without auto-advance
    pub fn now_us(&self) -> u64 {
        self.state.micros.get()
    }
}

impl SimClock {
    fn read(&self) -> u64 {
        let now = self.state.micros.get();
        self.state
            .micros
            .set(now + u64::from(self.state.auto_step_us.get()));
        now
    }
}

impl Clock for SimClock {
    fn micros(&self) -> u32 {
        self.read() as u32
    }

    fn millis(&self) -> u32 {
        (self.read() / 1000) as u32
    }
}

// ============================================================================
// Transport
// ============================================================================

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

#[derive(Default)]
struct Wire {
    rx: VecDeque<u8>,
    pending_tx: Vec<u8>,
    sent: Vec<Vec<u8>>,
    tx_enabled: bool,
    fail_writes: bool,
    responder: Option<Responder>,
}

/// Mock serial port recording every frame sent and replaying injected bytes
#[derive(Clone, Default)]
pub struct SimTransport {
    wire: Rc<RefCell<Wire>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be received
    pub fn inject(&self, bytes: &[u8]) {
        self.wire.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Bytes injected but not yet read
    pub fn pending_rx(&self) -> usize {
        self.wire.borrow().rx.len()
    }

    /// Frames sent so far, one entry per flush
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.wire.borrow().sent.clone()
    }

    /// Frames sent so far, clearing the record
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.wire.borrow_mut().sent)
    }

    pub fn is_transmit_enabled(&self) -> bool {
        self.wire.borrow().tx_enabled
    }

    /// Make every following write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.wire.borrow_mut().fail_writes = fail;
    }

    /// Called with each flushed frame; a returned reply is queued for receive
    pub fn set_responder(&self, responder: impl FnMut(&[u8]) -> Option<Vec<u8>> + 'static) {
        self.wire.borrow_mut().responder = Some(Box::new(responder));
    }

    pub fn clear_responder(&self) {
        self.wire.borrow_mut().responder = None;
    }
}

impl Transport for SimTransport {
    fn set_transmit_enable(&mut self, enabled: bool) -> ModbusResult<()> {
        self.wire.borrow_mut().tx_enabled = enabled;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_writes {
            return Err(ModbusError::transport("simulated write failure"));
        }
        if !wire.tx_enabled {
            return Err(ModbusError::transport("write with transmit disabled"));
        }
        wire.pending_tx.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> ModbusResult<()> {
        let mut wire = self.wire.borrow_mut();
        if wire.pending_tx.is_empty() {
            return Ok(());
        }
        let frame = std::mem::take(&mut wire.pending_tx);
        let reply = wire.responder.as_mut().and_then(|respond| respond(&frame));
        if let Some(reply) = reply {
            wire.rx.extend(reply);
        }
        wire.sent.push(frame);
        Ok(())
    }

    fn read_byte(&mut self) -> ModbusResult<Option<u8>> {
        Ok(self.wire.borrow_mut().rx.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_shared_between_clones() {
        let clock = SimClock::new();
        let other = clock.clone();
        clock.advance_ms(3);
        assert_eq!(other.millis(), 3);
        assert_eq!(other.micros(), 3000);
    }

    #[test]
    fn test_clock_auto_advance() {
        let clock = SimClock::with_auto_advance(10);
        assert_eq!(clock.micros(), 0);
        assert_eq!(clock.micros(), 10);
        assert_eq!(clock.now_us(), 20);
        assert_eq!(clock.millis(), 0);
    }

    #[test]
    fn test_transport_records_and_replays() {
        let mut port = SimTransport::new();
        let handle = port.clone();
        handle.set_responder(|frame| Some(frame.to_vec()));

        assert!(port.write_all(&[1, 2]).is_err());
        port.set_transmit_enable(true).unwrap();
        port.write_all(&[1, 2]).unwrap();
        port.write_all(&[3]).unwrap();
        port.flush().unwrap();
        port.set_transmit_enable(false).unwrap();

        assert_eq!(handle.sent(), vec![vec![1, 2, 3]]);
        assert_eq!(handle.pending_rx(), 3);
        assert_eq!(port.read_byte().unwrap(), Some(1));
        assert_eq!(handle.take_sent().len(), 1);
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_transport_write_failure() {
        let mut port = SimTransport::new();
        port.set_transmit_enable(true).unwrap();
        port.set_fail_writes(true);
        assert!(port.write_all(&[0]).is_err());
        assert_eq!(port.read_byte().unwrap(), None);
    }
}
