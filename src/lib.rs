//! # RS-485 Node Core - Modbus RTU Link and Event Runtime
//!
//! The shared core of a family of small RS-485 bus nodes (relay boards,
//! sensor nodes, a bus controller). It combines two pieces:
//!
//! - **Modbus RTU link engine**: byte-level framing on a half-duplex bus,
//!   inter-byte silence detection, CRC-16/MODBUS validation and master
//!   request/response correlation ([`ModbusLink`]).
//! - **Cooperative event runtime**: a bounded event queue, a filtered trace
//!   log, one-shot tick timers with stale-timeout cookies, and a flat
//!   state-machine runner ([`Runtime`], [`sm`]).
//!
//! Everything is driven from a single main loop. Nothing allocates on the hot
//! path; frames and rings are fixed-capacity.
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Master request | Response check |
//! |------|----------|----------------|----------------|
//! | 0x03 | Read Holding Registers | ✅ | byte count = 2 × count |
//! | 0x06 | Write Single Register | ✅ | exact echo |
//! | other | - | raw | not awaited |
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `std` (default) | host `critical-section` implementation, [`StdClock`] |
//! | `embedded` | [`transport::EmbeddedTransport`] over `embedded-io` + `embedded-hal` |
//! | `defmt` | `defmt::Format` on public value types |
//! | `demo` | the `demo` binary and its `tracing-subscriber` setup |
//!
//! ## Quick Start
//!
//! ```rust
//! use rs485_node_core::{LinkConfig, LinkEvent, ModbusLink, ModbusResult};
//! use rs485_node_core::sim::{SimClock, SimTransport};
//!
//! fn main() -> ModbusResult<()> {
//!     let port = SimTransport::new();
//!     let clock = SimClock::new();
//!     // Answer every request with an echo
//!     port.set_responder(|frame| Some(frame.to_vec()));
//!
//!     let mut link = ModbusLink::new(
//!         port.clone(),
//!         clock.clone(),
//!         |event: LinkEvent, _frame: &[u8]| println!("{:?}", event),
//!         LinkConfig::new(),
//!     )?;
//!
//!     link.write_holding_register(0x11, 0x0001, 0x00FF)?;
//!     while link.is_busy() {
//!         link.service();
//!         clock.advance_us(100);
//!     }
//!     assert_eq!(link.stats().responses_ok, 1);
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus RTU constants
pub mod constants;

/// CRC-16/MODBUS
pub mod checksum;

/// Fixed-capacity frame buffer and request builder
pub mod frame;

/// Runtime configuration structs
pub mod config;

/// Clock abstraction and timeout arithmetic
pub mod clock;

/// Serial transport abstraction
pub mod transport;

/// Packet logging helpers
pub mod logging;

/// Modbus RTU link engine
pub mod link;

// ============================================================================
// Event runtime
// ============================================================================

/// Power-of-two ring buffer
pub mod ring;

/// Event value type and catalog
pub mod event;

/// Event queue and trace buffer
pub mod queue;

/// One-shot tick timers
pub mod timer;

/// State-machine runner
pub mod sm;

/// Queue, trace, timers and clock in one owned value
pub mod runtime;

/// Master comms supervisor state machine
pub mod supervisor;

/// Simulated clock and transport for tests and host builds
pub mod sim;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Error handling ===
pub use error::{FrameFault, ModbusError, ModbusResult, ResponseFault};

// === Link ===
pub use frame::{Frame, FrameBuffer, FrameBuilder, RelayCommand};
pub use link::{LinkEvent, LinkHandler, LinkStats, ModbusLink};
pub use transport::Transport;

// === Configuration ===
pub use config::{LinkConfig, RuntimeConfig};

// === Clock ===
pub use clock::Clock;
#[cfg(feature = "std")]
pub use clock::StdClock;

// === Runtime ===
pub use event::{Event, EventCatalog, EventInfo};
pub use queue::{EventQueue, TraceBuffer, TraceItem, TraceMask};
pub use ring::RingQueue;
pub use runtime::Runtime;
pub use sm::{Services, SmContext, StateMachine, Transition};
pub use timer::TimerBank;

// === Frame limits (commonly needed constants) ===
pub use constants::{MAX_FRAME_SIZE, MAX_SLAVE_ID, MIN_FRAME_LEN, MIN_SLAVE_ID};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("RS-485 Node Core v{} - Modbus RTU link and event runtime", VERSION)
}
