//! Channels
//!
//! Transports that deliver poll messages to a chat and report pressed
//! controls back.

pub mod console;
pub mod memory;
pub mod transport;

pub use console::{run_console, ConsoleTransport};
pub use memory::{RecordedCall, RecordingTransport};
pub use transport::{DynTransport, Transport, TransportError, TransportResult};
