//! Fixed-capacity frame buffer
//!
//! A [`FrameBuffer`] holds one in-flight RTU frame. It never allocates and
//! never grows past its capacity: a write that does not fit is dropped and the
//! buffer latches an overflow flag, which stays set until [`FrameBuffer::reset`].
//! Frames that overflowed are reported as [`FrameFault::Overflow`] by
//! [`FrameBuffer::verify`].

use heapless::Vec;
use tracing::debug;

use crate::checksum;
use crate::constants::{
    function_code_description, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    FUNCTION_CODE_OFFSET, MAX_FRAME_SIZE, MAX_READ_REGISTERS, MAX_SLAVE_ID, MIN_FRAME_LEN, MIN_SLAVE_ID,
    SLAVE_ID_OFFSET,
};
use crate::error::{FrameFault, ModbusError, ModbusResult};

/// Frame buffer sized for the link engine
pub type Frame = FrameBuffer<MAX_FRAME_SIZE>;

/// Stack-allocated byte accumulator with sticky overflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer<const N: usize> {
    data: Vec<u8, N>,
    overflow: bool,
}

impl<const N: usize> FrameBuffer<N> {
    /// Create an empty buffer
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            overflow: false,
        }
    }

    /// Create a buffer holding `bytes`. Fails if they do not fit.
    pub fn from_slice(bytes: &[u8]) -> ModbusResult<Self> {
        let mut frame = Self::new();
        if !frame.extend_from_slice(bytes) {
            return Err(ModbusError::BufferFull { capacity: N });
        }
        Ok(frame)
    }

    /// Parse a hex string such as `"1103006B00037687"` into a buffer
    pub fn from_hex(hex: &str) -> ModbusResult<Self> {
        let mut frame = Self::new();
        frame.push_hex(hex)?;
        Ok(frame)
    }

    /// Append one byte. Returns false and latches overflow when full.
    #[inline]
    pub fn append(&mut self, byte: u8) -> bool {
        if self.data.push(byte).is_err() {
            self.overflow = true;
            return false;
        }
        true
    }

    /// Append as many bytes as fit; latches overflow if any were dropped
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> bool {
        let fit = bytes.len().min(self.remaining());
        // Cannot fail, `fit` is bounded by the free space.
        let _ = self.data.extend_from_slice(&bytes[..fit]);
        if fit < bytes.len() {
            self.overflow = true;
            return false;
        }
        true
    }

    /// Append a u16 most significant byte first
    #[inline]
    pub fn push_u16_be(&mut self, value: u16) -> bool {
        self.extend_from_slice(&value.to_be_bytes())
    }

    /// Append a u16 least significant byte first
    #[inline]
    pub fn push_u16_le(&mut self, value: u16) -> bool {
        self.extend_from_slice(&value.to_le_bytes())
    }

    /// Append bytes written as hex digit pairs. Whitespace is ignored.
    pub fn push_hex(&mut self, hex: &str) -> ModbusResult<()> {
        let mut digits = hex.chars().filter(|c| !c.is_ascii_whitespace());
        while let Some(hi) = digits.next() {
            let lo = digits
                .next()
                .ok_or_else(|| ModbusError::invalid_data("odd number of hex digits"))?;
            let byte = match (hi.to_digit(16), lo.to_digit(16)) {
                (Some(h), Some(l)) => (h << 4 | l) as u8,
                _ => {
                    return Err(ModbusError::invalid_data(format!(
                        "invalid hex digit in {hi}{lo}"
                    )))
                }
            };
            if !self.append(byte) {
                return Err(ModbusError::BufferFull { capacity: N });
            }
        }
        Ok(())
    }

    /// Append the CRC of the current contents, low byte first
    pub fn append_crc(&mut self) -> bool {
        let crc = checksum::compute(self.as_slice());
        self.push_u16_le(crc)
    }

    /// Read a big-endian u16 at `index`
    #[inline]
    pub fn u16_be_at(&self, index: usize) -> Option<u16> {
        let bytes = self.data.get(index..index + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian u16 at `index`
    #[inline]
    pub fn u16_le_at(&self, index: usize) -> Option<u16> {
        let bytes = self.data.get(index..index + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Byte at `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Empty the buffer and clear the overflow flag
    #[inline]
    pub fn reset(&mut self) {
        self.data.clear();
        self.overflow = false;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Free space in bytes
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.data.len()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// True if a write was dropped since the last reset
    #[inline]
    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Slave id byte, if present
    #[inline]
    pub fn slave_id(&self) -> Option<u8> {
        self.get(SLAVE_ID_OFFSET)
    }

    /// Function code byte, if present
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.get(FUNCTION_CODE_OFFSET)
    }

    /// Basic validity check of the buffered frame
    pub fn verify(&self) -> Result<(), FrameFault> {
        if self.overflow {
            return Err(FrameFault::Overflow);
        }
        verify_frame(self.as_slice())
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AsRef<[u8]> for FrameBuffer<N> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// True for slave ids a node may be assigned (1..=247)
#[inline]
pub fn is_valid_slave_id(id: u8) -> bool {
    (MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&id)
}

/// Basic validity checks on a received frame: length, slave id, then CRC
pub fn verify_frame(frame: &[u8]) -> Result<(), FrameFault> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(FrameFault::InvalidLength);
    }
    if !is_valid_slave_id(frame[SLAVE_ID_OFFSET]) {
        return Err(FrameFault::InvalidSlaveId);
    }
    if !checksum::verify(frame) {
        return Err(FrameFault::InvalidCrc);
    }
    Ok(())
}

// ============================================================================
// Frame builder
// ============================================================================

/// Commands understood by the common 8-channel Modbus relay boards.
/// Sent as the high byte of an FC06 value; the low byte is a delay in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RelayCommand {
    Close = 1,
    Open = 2,
    Toggle = 3,
    Latch = 4,
    Momentary = 5,
    Delay = 6,
}

impl RelayCommand {
    /// Register value carrying this command and a delay
    pub const fn register_value(self, delay: u8) -> u16 {
        (self as u16) << 8 | delay as u16
    }
}

impl TryFrom<u8> for RelayCommand {
    type Error = ModbusError;

    fn try_from(value: u8) -> ModbusResult<Self> {
        match value {
            1 => Ok(RelayCommand::Close),
            2 => Ok(RelayCommand::Open),
            3 => Ok(RelayCommand::Toggle),
            4 => Ok(RelayCommand::Latch),
            5 => Ok(RelayCommand::Momentary),
            6 => Ok(RelayCommand::Delay),
            _ => Err(ModbusError::invalid_data(format!(
                "unknown relay command {value}"
            ))),
        }
    }
}

/// Frame builder - fluent API
///
/// Produces a frame without CRC; the link engine appends it on send.
///
/// ```rust
/// use rs485_node_core::FrameBuilder;
///
/// let frame = FrameBuilder::new()
///     .slave_id(0x11)
///     .function_code(0x06)
///     .word(0x0001)
///     .word(0x00FF)
///     .build()
///     .unwrap();
/// assert_eq!(frame.as_slice(), &[0x11, 0x06, 0x00, 0x01, 0x00, 0xFF]);
/// ```
#[derive(Debug, Default)]
pub struct FrameBuilder {
    frame: Frame,
}

impl FrameBuilder {
    #[inline]
    pub fn new() -> Self {
        Self { frame: Frame::new() }
    }

    /// Set slave id
    #[inline]
    pub fn slave_id(mut self, id: u8) -> Self {
        self.frame.append(id);
        self
    }

    /// Set function code
    #[inline]
    pub fn function_code(mut self, fc: u8) -> Self {
        self.frame.append(fc);
        self
    }

    /// Add a big-endian word
    #[inline]
    pub fn word(mut self, value: u16) -> Self {
        self.frame.push_u16_be(value);
        self
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> Self {
        self.frame.append(b);
        self
    }

    /// Add data
    #[inline]
    pub fn data(mut self, data: &[u8]) -> Self {
        self.frame.extend_from_slice(data);
        self
    }

    /// Build the frame; fails if anything overflowed
    pub fn build(self) -> ModbusResult<Frame> {
        if self.frame.is_overflow() {
            return Err(ModbusError::BufferFull {
                capacity: MAX_FRAME_SIZE,
            });
        }
        if let Some(fc) = self.frame.function_code() {
            debug!(
                "Frame built: FC={:02X} ({}), len={}",
                fc,
                function_code_description(fc),
                self.frame.len()
            );
        }
        Ok(self.frame)
    }

    /// FC06 request: write one holding register
    pub fn write_single_register(slave_id: u8, address: u16, value: u16) -> ModbusResult<Frame> {
        FrameBuilder::new()
            .slave_id(slave_id)
            .function_code(FC_WRITE_SINGLE_REGISTER)
            .word(address)
            .word(value)
            .build()
    }

    /// FC06 request to a relay board. Relay numbers start at 1.
    pub fn relay_board_write(
        slave_id: u8,
        relay: u8,
        command: RelayCommand,
        delay: u8,
    ) -> ModbusResult<Frame> {
        Self::write_single_register(slave_id, u16::from(relay), command.register_value(delay))
    }

    /// FC03 request: read `count` holding registers from `address`.
    ///
    /// `count` must be 1..=[`MAX_READ_REGISTERS`] so the response fits in a frame.
    pub fn read_holding_registers(slave_id: u8, address: u16, count: u16) -> ModbusResult<Frame> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "register count {} outside 1..={}",
                count, MAX_READ_REGISTERS
            )));
        }
        FrameBuilder::new()
            .slave_id(slave_id)
            .function_code(FC_READ_HOLDING_REGISTERS)
            .word(address)
            .word(count)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(hex: &str) -> Result<(), FrameFault> {
        let frame = Frame::from_hex(hex).unwrap();
        frame.verify()
    }

    #[test]
    fn test_frame_basic_operations() {
        let mut frame = FrameBuffer::<4>::new();
        assert!(frame.is_empty());
        assert_eq!(frame.remaining(), 4);
        assert_eq!(frame.capacity(), 4);

        assert!(frame.append(0x11));
        assert!(frame.push_u16_be(0x0306));
        assert_eq!(frame.as_slice(), &[0x11, 0x03, 0x06]);
        assert_eq!(frame.remaining(), 1);
        assert_eq!(frame.u16_be_at(1), Some(0x0306));
        assert_eq!(frame.u16_le_at(1), Some(0x0603));
        assert_eq!(frame.u16_be_at(2), None);
    }

    #[test]
    fn test_overflow_is_sticky_until_reset() {
        let mut frame = FrameBuffer::<2>::new();
        assert!(frame.append(1));
        assert!(frame.append(2));
        assert!(!frame.is_overflow());

        assert!(!frame.append(3));
        assert!(frame.is_overflow());
        assert_eq!(frame.as_slice(), &[1, 2]);

        frame.reset();
        assert!(!frame.is_overflow());
        assert!(frame.is_empty());
        assert!(frame.append(3));
        assert!(!frame.is_overflow());
    }

    #[test]
    fn test_extend_partial_copy() {
        let mut frame = FrameBuffer::<3>::new();
        assert!(!frame.extend_from_slice(&[1, 2, 3, 4]));
        assert_eq!(frame.as_slice(), &[1, 2, 3]);
        assert!(frame.is_overflow());
    }

    #[test]
    fn test_overflowed_frame_reports_overflow() {
        let mut frame = FrameBuffer::<5>::from_hex("4142435085").unwrap();
        assert_eq!(frame.verify(), Ok(()));
        frame.append(0);
        assert_eq!(frame.verify(), Err(FrameFault::Overflow));
    }

    #[test]
    fn test_push_hex_errors() {
        assert!(Frame::from_hex("123").is_err());
        assert!(Frame::from_hex("zz").is_err());
        assert!(FrameBuffer::<1>::from_hex("0102").is_err());
        assert_eq!(Frame::from_hex("01 02").unwrap().as_slice(), &[1, 2]);
    }

    #[test]
    fn test_frame_validity_vectors() {
        assert_eq!(check("4142435085"), Ok(()));
        assert_eq!(check("1103006B00037687"), Ok(()));
        assert_eq!(check("1103006B00038776"), Err(FrameFault::InvalidCrc));
        assert_eq!(check("1103006B00037688"), Err(FrameFault::InvalidCrc));
        assert_eq!(check(""), Err(FrameFault::InvalidLength));
        assert_eq!(check("41b1d1"), Err(FrameFault::InvalidLength));
        assert_eq!(check("0142435151"), Ok(()));
        assert_eq!(check("f74243b163"), Ok(()));
        assert_eq!(check("0042430091"), Err(FrameFault::InvalidSlaveId));
        assert_eq!(check("f842438160"), Err(FrameFault::InvalidSlaveId));
    }

    #[test]
    fn test_slave_id_range() {
        assert!(!is_valid_slave_id(0));
        assert!(is_valid_slave_id(1));
        assert!(is_valid_slave_id(247));
        assert!(!is_valid_slave_id(248));
    }

    #[test]
    fn test_build_write_single_register() {
        let mut frame = FrameBuilder::write_single_register(0x11, 0x0001, 0x00FF).unwrap();
        assert_eq!(frame.as_slice(), &[0x11, 0x06, 0x00, 0x01, 0x00, 0xFF]);
        assert_eq!(frame.function_code(), Some(0x06));
        assert!(frame.append_crc());
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.verify(), Ok(()));
    }

    #[test]
    fn test_build_read_holding_registers() {
        let mut frame = FrameBuilder::read_holding_registers(0x11, 0x006B, 3).unwrap();
        frame.append_crc();
        assert_eq!(frame, Frame::from_hex("1103006B00037687").unwrap());
    }

    #[test]
    fn test_read_count_limited_by_response_size() {
        assert!(FrameBuilder::read_holding_registers(0x11, 0, MAX_READ_REGISTERS).is_ok());
        assert!(matches!(
            FrameBuilder::read_holding_registers(0x11, 0, MAX_READ_REGISTERS + 1),
            Err(ModbusError::InvalidData { .. })
        ));
        assert!(matches!(
            FrameBuilder::read_holding_registers(0x11, 0, 0),
            Err(ModbusError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_relay_board_write() {
        let frame = FrameBuilder::relay_board_write(0x01, 3, RelayCommand::Momentary, 7).unwrap();
        assert_eq!(frame.as_slice(), &[0x01, 0x06, 0x00, 0x03, 0x05, 0x07]);
        assert_eq!(RelayCommand::try_from(2).unwrap(), RelayCommand::Open);
        assert!(RelayCommand::try_from(0).is_err());
        assert!(RelayCommand::try_from(7).is_err());
    }

    #[test]
    fn test_builder_overflow_fails() {
        let result = FrameBuilder::new().data(&[0u8; MAX_FRAME_SIZE + 1]).build();
        assert!(matches!(result, Err(ModbusError::BufferFull { .. })));
    }
}
