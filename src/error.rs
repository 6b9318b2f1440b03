//! Error types and reason codes
//!
//! Two families live here:
//!
//! - [`ModbusError`] is the crate-level error returned from fallible setup and
//!   transport calls (`ModbusResult<T>`).
//! - [`FrameFault`] and [`ResponseFault`] are protocol reason codes. They are
//!   never returned as `Err` from the link engine; they travel to the
//!   application inside a [`LinkEvent`](crate::link::LinkEvent) so the node
//!   can decide whether to retry.
//!
//! ## Reason codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Invalid CRC |
//! | 1 | Frame overflowed the receive buffer |
//! | 2 | Frame shorter than the minimum length |
//! | 3 | Slave id outside 1..=247 |
//! | 10 | Response from the wrong slave |
//! | 11 | Response with the wrong function code |
//! | 12 | Response length differs from the expected length |
//! | 13 | Response payload does not match the request |
//! | 14 | No validation rule for this function code |

use thiserror::Error;

/// Result type for fallible crate operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Crate-level error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Serial transport failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Configuration value out of range
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Malformed input data
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Fixed-capacity buffer is full
    #[error("Buffer full: capacity {capacity} bytes")]
    BufferFull { capacity: usize },
}

impl ModbusError {
    pub fn transport(message: impl Into<String>) -> Self {
        ModbusError::Transport {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ModbusError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        ModbusError::InvalidData {
            message: message.into(),
        }
    }
}

// ============================================================================
// Protocol reason codes
// ============================================================================

/// Basic frame validity failure
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFault {
    #[error("invalid CRC")]
    InvalidCrc,
    #[error("receive buffer overflow")]
    Overflow,
    #[error("frame too short")]
    InvalidLength,
    #[error("slave id out of range")]
    InvalidSlaveId,
}

impl FrameFault {
    /// Numeric reason code
    pub const fn code(self) -> u8 {
        match self {
            FrameFault::InvalidCrc => 0,
            FrameFault::Overflow => 1,
            FrameFault::InvalidLength => 2,
            FrameFault::InvalidSlaveId => 3,
        }
    }
}

/// Reason a master response failed validation against its request
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseFault {
    #[error("response frame invalid: {0}")]
    Frame(FrameFault),
    #[error("response from wrong slave")]
    BadSlaveId,
    #[error("response with wrong function code")]
    BadFunctionCode,
    #[error("response length {actual} != expected {expected}")]
    LengthMismatch { expected: u8, actual: u8 },
    #[error("response payload does not match request")]
    PayloadMismatch,
    #[error("no validation rule for function code {0:#04x}")]
    Unverifiable(u8),
}

impl ResponseFault {
    /// Numeric reason code, distinct across every variant
    pub const fn code(self) -> u8 {
        match self {
            ResponseFault::Frame(fault) => fault.code(),
            ResponseFault::BadSlaveId => 10,
            ResponseFault::BadFunctionCode => 11,
            ResponseFault::LengthMismatch { .. } => 12,
            ResponseFault::PayloadMismatch => 13,
            ResponseFault::Unverifiable(_) => 14,
        }
    }
}

impl From<FrameFault> for ResponseFault {
    fn from(fault: FrameFault) -> Self {
        ResponseFault::Frame(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_fault_codes() {
        assert_eq!(FrameFault::InvalidCrc.code(), 0);
        assert_eq!(FrameFault::Overflow.code(), 1);
        assert_eq!(FrameFault::InvalidLength.code(), 2);
        assert_eq!(FrameFault::InvalidSlaveId.code(), 3);
    }

    #[test]
    fn test_response_fault_codes_are_distinct() {
        let faults = [
            ResponseFault::Frame(FrameFault::InvalidCrc),
            ResponseFault::Frame(FrameFault::Overflow),
            ResponseFault::Frame(FrameFault::InvalidLength),
            ResponseFault::Frame(FrameFault::InvalidSlaveId),
            ResponseFault::BadSlaveId,
            ResponseFault::BadFunctionCode,
            ResponseFault::LengthMismatch {
                expected: 8,
                actual: 7,
            },
            ResponseFault::PayloadMismatch,
            ResponseFault::Unverifiable(0x10),
        ];
        for (i, a) in faults.iter().enumerate() {
            for b in &faults[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_error_display() {
        let err = ModbusError::transport("port closed");
        assert_eq!(err.to_string(), "Transport error: port closed");

        let fault = ResponseFault::LengthMismatch {
            expected: 8,
            actual: 3,
        };
        assert_eq!(fault.to_string(), "response length 3 != expected 8");
    }
}
