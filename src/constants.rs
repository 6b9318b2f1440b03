//! Protocol constants for the RS-485 link
//!
//! Frames on the bus are Modbus RTU ADUs:
//! `[slave id][function code][payload ...][crc lo][crc hi]`.
//! Nodes only need small requests so the frame capacity is kept well below
//! the 256 byte RTU maximum.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Capacity of one in-flight frame, including the CRC
pub const MAX_FRAME_SIZE: usize = 40;

/// Length of the trailing CRC
pub const CRC_LEN: usize = 2;

/// Shortest frame accepted as valid: id + function + one payload byte + CRC
pub const MIN_FRAME_LEN: usize = 5;

/// Byte offset of the slave id
pub const SLAVE_ID_OFFSET: usize = 0;

/// Byte offset of the function code
pub const FUNCTION_CODE_OFFSET: usize = 1;

/// Byte offset of the register address in FC03/FC06 requests
pub const ADDRESS_OFFSET: usize = 2;

/// Byte offset of the value (FC06) or register count (FC03) in requests
pub const VALUE_OFFSET: usize = 4;

/// Byte offset of the byte-count field in an FC03 response
pub const BYTE_COUNT_OFFSET: usize = 2;

/// Length of a complete FC06 request or response frame
pub const WRITE_SINGLE_FRAME_LEN: usize = 8;

/// Fixed overhead of an FC03 response: id + function + byte count + CRC
pub const READ_RESPONSE_OVERHEAD: usize = 5;

/// Largest FC03 register count whose response still fits in one frame
pub const MAX_READ_REGISTERS: u16 = ((MAX_FRAME_SIZE - READ_RESPONSE_OVERHEAD) / 2) as u16;

// ============================================================================
// Slave Addressing
// ============================================================================

/// Lowest assignable slave id
pub const MIN_SLAVE_ID: u8 = 1;

/// Highest assignable slave id
pub const MAX_SLAVE_ID: u8 = 247;

/// Slave id of a node that has not been assigned an address; never answers
pub const UNASSIGNED_SLAVE_ID: u8 = 0;

// ============================================================================
// Function Codes
// ============================================================================

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_READ_EXCEPTION_STATUS: u8 = 0x07;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
pub const FC_REPORT_SLAVE_ID: u8 = 0x11;
pub const FC_MASK_WRITE_REGISTER: u8 = 0x16;
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;

/// Human-readable function code name
pub fn function_code_description(fc: u8) -> &'static str {
    match fc & 0x7F {
        FC_READ_COILS => "Read Coils",
        FC_READ_DISCRETE_INPUTS => "Read Discrete Inputs",
        FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
        FC_READ_INPUT_REGISTERS => "Read Input Registers",
        FC_WRITE_SINGLE_COIL => "Write Single Coil",
        FC_WRITE_SINGLE_REGISTER => "Write Single Register",
        FC_READ_EXCEPTION_STATUS => "Read Exception Status",
        FC_WRITE_MULTIPLE_COILS => "Write Multiple Coils",
        FC_WRITE_MULTIPLE_REGISTERS => "Write Multiple Registers",
        FC_REPORT_SLAVE_ID => "Report Slave ID",
        FC_MASK_WRITE_REGISTER => "Mask Write Register",
        FC_READ_WRITE_MULTIPLE_REGISTERS => "Read/Write Multiple Registers",
        _ => "Unknown Function",
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Bits per character on the wire: start + 8 data + stop
pub const BITS_PER_CHAR: u32 = 10;

/// Floor for the inter-byte silence that ends a frame
pub const MIN_INTER_BYTE_TIMEOUT_US: u32 = 750;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        assert_eq!(READ_RESPONSE_OVERHEAD + 2 * 3, 11);
        assert!(MIN_FRAME_LEN > CRC_LEN);
        assert!(WRITE_SINGLE_FRAME_LEN <= MAX_FRAME_SIZE);
        assert_eq!(MAX_READ_REGISTERS, 17);
        assert!(READ_RESPONSE_OVERHEAD + 2 * usize::from(MAX_READ_REGISTERS) <= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_function_code_description() {
        assert_eq!(function_code_description(0x06), "Write Single Register");
        assert_eq!(function_code_description(0x83), "Read Holding Registers");
        assert_eq!(function_code_description(0x42), "Unknown Function");
    }
}
