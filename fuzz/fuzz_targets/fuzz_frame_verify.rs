#![no_main]

use libfuzzer_sys::fuzz_target;
use rs485_node_core::frame::verify_frame;
use rs485_node_core::link::verify_response;
use rs485_node_core::{checksum, Frame};

fuzz_target!(|data: &[u8]| {
    let result = verify_frame(data);
    if result.is_ok() {
        assert!(data.len() >= 5);
        assert!(checksum::verify(data));
    }

    // Any prefix used as a request must classify without panicking.
    let split = data.first().map_or(0, |b| usize::from(*b) % (data.len() + 1));
    let (request, response) = data.split_at(split);
    let _ = verify_response(request, response);

    let mut frame = Frame::new();
    frame.extend_from_slice(data);
    assert_eq!(frame.is_overflow(), data.len() > frame.capacity());
    let _ = frame.verify();
});
