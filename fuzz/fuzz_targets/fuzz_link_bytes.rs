#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rs485_node_core::link::ModbusLink;
use rs485_node_core::sim::{SimClock, SimTransport};
use rs485_node_core::{LinkConfig, LinkEvent};

#[derive(Debug, Arbitrary)]
enum Step {
    Byte(u8),
    Wait(u16),
    ReadRegisters { slave_id: u8, count: u8 },
    WriteRegister { slave_id: u8, value: u16 },
}

fuzz_target!(|steps: Vec<Step>| {
    let port = SimTransport::new();
    let clock = SimClock::new();
    let config = LinkConfig::new().with_slave_id(1);
    let Ok(mut link) = ModbusLink::new(port.clone(), clock.clone(), |_: LinkEvent, _: &[u8]| {}, config) else {
        return;
    };

    for step in steps.into_iter().take(512) {
        match step {
            Step::Byte(b) => port.inject(&[b]),
            Step::Wait(us) => clock.advance_us(u64::from(us)),
            // Sends only while idle; a busy master_send pumps until the
            // response timeout, which this clock would never reach.
            Step::ReadRegisters { slave_id, count } if !link.is_busy() => {
                let _ = link.read_holding_registers(slave_id, 0, u16::from(count));
            }
            Step::WriteRegister { slave_id, value } if !link.is_busy() => {
                let _ = link.write_holding_register(slave_id, 0, value);
            }
            _ => {}
        }
        link.service();
    }
});
