//! RS-485 Node Core Demo
//!
//! Runs a relay node on a simulated bus:
//! - Part 1: a master writes relay registers and the node echoes each write
//! - Part 2: the master goes quiet and the supervisor reports lost comms
//! - Part 3: the master returns and the supervisor recovers
//! - Part 4: the node acts as master towards a simulated relay board
//!
//! Usage: RUST_LOG=debug cargo run --bin demo --features demo

use rs485_node_core::constants::{ADDRESS_OFFSET, CRC_LEN, FC_WRITE_SINGLE_REGISTER, VALUE_OFFSET};
use rs485_node_core::event::kind;
use rs485_node_core::sim::{SimClock, SimTransport};
use rs485_node_core::sm::{self, StateMachine};
use rs485_node_core::supervisor::{master_comms_event, LedPattern, Supervisor, APP_EVENTS};
use rs485_node_core::{
    EventCatalog, Frame, FrameBuilder, LinkConfig, LinkEvent, LinkHandler, ModbusLink,
    ModbusResult, RelayCommand, Runtime,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const NODE_ID: u8 = 0x11;
const RELAY_COUNT: usize = 8;
const SUPERVISOR_ID: u8 = 1;

/// Collects link events for the main loop to act on
#[derive(Default)]
struct Inbox {
    received: Vec<(LinkEvent, Frame)>,
}

impl LinkHandler for Inbox {
    fn on_link_event(&mut self, event: LinkEvent, frame: &[u8]) {
        self.received
            .push((event, Frame::from_slice(frame).unwrap_or_default()));
    }
}

fn show_led(pattern: LedPattern) {
    info!(?pattern, "status led");
}

struct RelayNode {
    port: SimTransport,
    clock: SimClock,
    link: ModbusLink<SimTransport, SimClock, Inbox>,
    rt: Runtime<SimClock>,
    supervisor: Supervisor<fn(LedPattern)>,
    relays: [u16; RELAY_COUNT],
    next_tick_ms: u32,
}

impl RelayNode {
    fn new() -> ModbusResult<Self> {
        let port = SimTransport::new();
        let clock = SimClock::new();
        let config = LinkConfig::new()
            .with_slave_id(NODE_ID)
            .with_packet_logging(true);
        let link = ModbusLink::new(port.clone(), clock.clone(), Inbox::default(), config)?;

        let mut rt = Runtime::new(clock.clone());
        rt.trace_mask_mut(|mask| {
            mask.set(kind::DEBUG_SM_STATE_CHANGE, true);
            mask.set(kind::DEBUG_QUEUE_FULL, true);
        });
        let mut supervisor = Supervisor::new(show_led as fn(LedPattern));
        sm::init(&mut supervisor, SUPERVISOR_ID, &mut rt);

        Ok(Self {
            port,
            clock,
            link,
            rt,
            supervisor,
            relays: [0; RELAY_COUNT],
            next_tick_ms: 0,
        })
    }

    /// One pass of the main loop
    fn step(&mut self) -> ModbusResult<()> {
        self.link.service();

        let received = std::mem::take(&mut self.link.handler_mut().received);
        for (event, frame) in received {
            if event == LinkEvent::RequestForUs {
                self.handle_request(&frame)?;
            }
            if let Some(ev) = master_comms_event(event) {
                self.rt.publish(ev);
            }
        }

        let tick_ms = self.rt.config().tick_ms();
        if self.clock.millis() >= self.next_tick_ms {
            self.rt.service_timers();
            self.next_tick_ms += tick_ms;
        }
        self.rt
            .run_pending(&mut [&mut self.supervisor as &mut dyn StateMachine]);
        Ok(())
    }

    fn handle_request(&mut self, frame: &Frame) -> ModbusResult<()> {
        if frame.function_code() != Some(FC_WRITE_SINGLE_REGISTER) {
            warn!(fc = ?frame.function_code(), "unsupported request");
            return Ok(());
        }
        let (Some(address), Some(value)) = (frame.u16_be_at(ADDRESS_OFFSET), frame.u16_be_at(VALUE_OFFSET)) else {
            return Ok(());
        };
        match usize::from(address).checked_sub(1).and_then(|i| self.relays.get_mut(i)) {
            Some(relay) => {
                *relay = value;
                info!(relay = address, value, "relay written");
            }
            None => warn!(address, "no such relay"),
        }
        // Echo the request without its CRC; the link appends a fresh one.
        self.link.slave_send(&frame.as_slice()[..frame.len() - CRC_LEN])
    }

    /// Advance simulated time in 100 µs main-loop passes
    fn run_for_ms(&mut self, ms: u32) -> ModbusResult<()> {
        for _ in 0..ms * 10 {
            self.clock.advance_us(100);
            self.step()?;
        }
        Ok(())
    }

    /// Put a master request on the wire and return the node's reply
    fn master_request(&mut self, request: &[u8]) -> ModbusResult<Vec<u8>> {
        let mut frame = Frame::from_slice(request)?;
        frame.append_crc();
        self.port.inject(frame.as_slice());
        self.run_for_ms(10)?;
        Ok(self.port.take_sent().into_iter().next().unwrap_or_default())
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!("{}", rs485_node_core::info());

    let mut node = RelayNode::new()?;

    // =========================================================================
    // Part 1: Master writes relays
    // =========================================================================
    info!("part 1: master writes relays");
    for relay in 1..=3u8 {
        let request = FrameBuilder::relay_board_write(NODE_ID, relay, RelayCommand::Close, 0)?;
        let reply = node.master_request(request.as_slice())?;
        info!(relay, echoed = reply.get(..6) == Some(request.as_slice()), "reply");
    }
    let other = FrameBuilder::write_single_register(NODE_ID + 1, 1, 0x0100)?;
    let reply = node.master_request(other.as_slice())?;
    info!(answered = !reply.is_empty(), "request for another node");
    info!(relays = ?node.relays, "relay registers");

    // =========================================================================
    // Part 2: Master goes quiet
    // =========================================================================
    info!("part 2: master silent for 5 s");
    node.run_for_ms(5_000)?;
    info!(lost = node.supervisor.is_master_lost(), "supervisor");

    // =========================================================================
    // Part 3: Master returns
    // =========================================================================
    info!("part 3: master returns");
    let request = FrameBuilder::relay_board_write(NODE_ID, 1, RelayCommand::Open, 0)?;
    node.master_request(request.as_slice())?;
    info!(lost = node.supervisor.is_master_lost(), "supervisor");

    let catalog = EventCatalog::new(APP_EVENTS);
    while let Some(item) = node.rt.trace_read() {
        info!(
            at_ms = item.timestamp,
            event = catalog.name(item.event.id()),
            p8 = item.event.p8(),
            p16 = item.event.p16(),
            "trace"
        );
    }
    info!(stats = ?node.link.stats(), "node link");

    // =========================================================================
    // Part 4: Acting as master
    // =========================================================================
    info!("part 4: master towards a relay board");
    let board = SimTransport::new();
    board.set_responder(|request| Some(request.to_vec()));
    let clock = SimClock::new();
    let mut master = ModbusLink::new(
        board.clone(),
        clock.clone(),
        |event: LinkEvent, _: &[u8]| info!(?event, "master"),
        LinkConfig::new().with_packet_logging(true),
    )?;
    for relay in 1..=2u8 {
        master.relay_board_write(0x01, relay, RelayCommand::Momentary, 2)?;
        while master.is_busy() {
            master.service();
            clock.advance_us(100);
        }
    }

    // Nobody answers FC03 on this board.
    board.clear_responder();
    master.read_holding_registers(0x01, 0, 4)?;
    while master.is_busy() {
        master.service();
        clock.advance_us(100);
    }
    info!(stats = ?master.stats(), "master link");

    Ok(())
}
