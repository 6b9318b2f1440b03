//! Serial transport abstraction
//!
//! The link engine talks to the bus through [`Transport`]: a half-duplex
//! RS-485 port with a transmit-enable line, blocking writes and a
//! non-blocking single-byte read.
//!
//! With the `embedded` feature, [`EmbeddedTransport`] adapts any blocking
//! `embedded-io` serial port plus an `embedded-hal` output pin.

use crate::error::ModbusResult;

/// Half-duplex serial port used by [`ModbusLink`](crate::link::ModbusLink)
pub trait Transport {
    /// Drive the transceiver's transmit-enable line
    fn set_transmit_enable(&mut self, enabled: bool) -> ModbusResult<()>;

    /// Blocking write of every byte
    fn write_all(&mut self, bytes: &[u8]) -> ModbusResult<()>;

    /// Block until every written byte has left the wire
    fn flush(&mut self) -> ModbusResult<()>;

    /// One received byte if available, without blocking
    fn read_byte(&mut self) -> ModbusResult<Option<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_transmit_enable(&mut self, enabled: bool) -> ModbusResult<()> {
        (**self).set_transmit_enable(enabled)
    }

    fn write_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> ModbusResult<()> {
        (**self).flush()
    }

    fn read_byte(&mut self) -> ModbusResult<Option<u8>> {
        (**self).read_byte()
    }
}

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedTransport;

#[cfg(feature = "embedded")]
mod embedded {
    use embedded_hal::digital::OutputPin;
    use embedded_io::{Read, ReadReady, Write};

    use super::Transport;
    use crate::error::{ModbusError, ModbusResult};

    fn io_error<E: embedded_io::Error>(err: E) -> ModbusError {
        ModbusError::transport(format!("serial: {:?}", err.kind()))
    }

    fn pin_error<E: embedded_hal::digital::Error>(err: E) -> ModbusError {
        ModbusError::transport(format!("transmit enable: {:?}", err.kind()))
    }

    /// Blocking `embedded-io` serial port plus transmit-enable pin
    pub struct EmbeddedTransport<S, P> {
        serial: S,
        tx_enable: P,
    }

    impl<S, P> EmbeddedTransport<S, P>
    where
        S: Read + Write + ReadReady,
        P: OutputPin,
    {
        pub fn new(serial: S, tx_enable: P) -> Self {
            Self { serial, tx_enable }
        }

        pub fn release(self) -> (S, P) {
            (self.serial, self.tx_enable)
        }
    }

    impl<S, P> Transport for EmbeddedTransport<S, P>
    where
        S: Read + Write + ReadReady,
        P: OutputPin,
    {
        fn set_transmit_enable(&mut self, enabled: bool) -> ModbusResult<()> {
            if enabled {
                self.tx_enable.set_high().map_err(pin_error)
            } else {
                self.tx_enable.set_low().map_err(pin_error)
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> ModbusResult<()> {
            self.serial.write_all(bytes).map_err(io_error)
        }

        fn flush(&mut self) -> ModbusResult<()> {
            self.serial.flush().map_err(io_error)
        }

        fn read_byte(&mut self) -> ModbusResult<Option<u8>> {
            if !self.serial.read_ready().map_err(io_error)? {
                return Ok(None);
            }
            let mut byte = [0u8; 1];
            match self.serial.read(&mut byte).map_err(io_error)? {
                0 => Ok(None),
                _ => Ok(Some(byte[0])),
            }
        }
    }
}
