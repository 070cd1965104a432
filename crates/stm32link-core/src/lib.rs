//! # STM32Link Core Library
//!
//! Core functionality for talking to an STM32 signal generator board over a
//! serial port.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Connection lifecycle and autoconnect over port/baud candidates
//! - A background reader reassembling the byte stream into text lines
//! - A non-blocking FIFO hand-off of received lines to the consumer
//! - Encoding of amplitude/frequency and manual commands
//!
//! ## Example
//!
//! ```rust,ignore
//! use stm32link_core::protocol::{LinkConfig, LinkController};
//!
//! let mut link = LinkController::new();
//! link.connect(LinkConfig::new("/dev/ttyACM0", 115200)?)?;
//!
//! // Set 50% amplitude at 440 Hz
//! link.send_command(50, 440)?;
//!
//! // Called from a periodic tick
//! for line in link.drain() {
//!     println!("{line}");
//! }
//!
//! link.disconnect();
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        AmpFreq, ConnectionState, Frame, LinkConfig, LinkController, LinkCounters, LinkError,
        LinkStatus, BAUD_RATES,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
