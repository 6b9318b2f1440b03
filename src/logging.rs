//! Packet logging helpers

use tracing::debug;

/// Format raw bytes as hex string for packet logging
pub fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log packet with direction
pub fn log_frame(direction: &str, data: &[u8], slave_id: Option<u8>) {
    let hex_string = format_hex_packet(data);
    match slave_id {
        Some(id) => debug!("[MODBUS-RTU] {} slave:{} {}", direction, id, hex_string),
        None => debug!("[MODBUS-RTU] {} {}", direction, hex_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_packet() {
        assert_eq!(format_hex_packet(&[0x11, 0x06, 0x00, 0xFF]), "11 06 00 FF");
        assert_eq!(format_hex_packet(&[]), "");
    }
}
