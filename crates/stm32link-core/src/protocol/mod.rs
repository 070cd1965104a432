//! Serial Link Management
//!
//! Connects the host to an STM32 board over a serial port, reassembles the
//! inbound byte stream into text lines and encodes outbound commands.
//!
//! Reads happen on a background thread; frames are handed to the consumer
//! through a FIFO queue drained from the foreground.

pub mod commands;
mod connection;
mod error;
pub mod framing;
mod queue;
mod reader;
pub mod serial;
pub mod transport;

pub use commands::{encode_amplitude_frequency, encode_raw_line, AmpFreq};
pub use connection::{
    ConnectionState, LinkConfig, LinkController, LinkCounters, LinkStatus,
};
pub use error::LinkError;
pub use framing::{Frame, FrameSplitter};
pub use queue::{DeliveryQueue, FrameSink};
pub use reader::{ReaderState, ReaderTiming};
pub use serial::{candidate_ports, list_ports, PortInfo};
pub use transport::{Connector, SerialConnector, SerialTransport, Transport};

/// Baud rates the firmware can be configured for, in autoconnect scan order
pub const BAUD_RATES: [u32; 9] = [
    9600, 19200, 38400, 57600, 115200, 230400, 500000, 1_000_000, 2_000_000,
];

/// Default baud rate for the board
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Read timeout applied to the port; keeps every read call short
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10;

/// Upper bound on a single write
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1000;

/// Reader sleep when nothing was available to read
pub const IDLE_POLL_MS: u64 = 10;

/// Reader sleep after a failed read
pub const READ_ERROR_BACKOFF_MS: u64 = 100;

/// How long `disconnect` waits for the reader thread to exit
pub const READER_JOIN_TIMEOUT_MS: u64 = 100;

/// Consecutive read failures after which the link is considered lost
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 50;

/// Largest single read issued by the reader
pub const READ_CHUNK_SIZE: usize = 1024;
