//! Connection management
//!
//! Handles the link lifecycle: opening the transport, running the background
//! reader, the locked write path and the autoconnect scan.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    commands::{encode_raw_line, AmpFreq},
    reader::{lock_transport, PortReader, ReaderExit, ReaderState, ReaderTiming, SharedTransport},
    serial::candidate_ports,
    Connector, DeliveryQueue, Frame, LinkError, SerialConnector, BAUD_RATES, DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS, READER_JOIN_TIMEOUT_MS,
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connected, reader running
    Connected,
}

/// Link configuration, fixed for the duration of a connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate, one of [`BAUD_RATES`]
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u64,
}

impl LinkConfig {
    /// Build a config with default timeouts, rejecting unsupported baud rates
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Result<Self, LinkError> {
        if !BAUD_RATES.contains(&baud_rate) {
            return Err(LinkError::InvalidBaudRate(baud_rate));
        }
        Ok(Self {
            port_name: port_name.into(),
            baud_rate,
            ..Self::default()
        })
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

/// Frames received and commands sent since the last successful connect.
///
/// `received` counts frames as the reader delivers them, whether or not they
/// have been drained yet. Frames left over from an earlier connection are
/// not counted again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounters {
    pub received: u64,
    pub sent: u64,
}

/// Snapshot of the link for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub reader: ReaderState,
    pub config: Option<LinkConfig>,
    pub counters: LinkCounters,
}

/// Owns the link to the board.
///
/// One instance per link, owned by whatever drives it; dropping it
/// disconnects.
pub struct LinkController {
    connector: Box<dyn Connector>,
    /// Transport slot shared with the reader
    transport: SharedTransport,
    reader: Option<PortReader>,
    queue: DeliveryQueue,
    state: ConnectionState,
    config: Option<LinkConfig>,
    /// Frames delivered by the current session's reader
    received: Arc<AtomicU64>,
    sent: u64,
    timing: ReaderTiming,
    join_timeout: Duration,
}

impl LinkController {
    /// Controller for real serial ports
    pub fn new() -> Self {
        Self::with_connector(SerialConnector)
    }

    /// Controller over a custom transport source
    pub fn with_connector(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            transport: Arc::new(Mutex::new(None)),
            reader: None,
            queue: DeliveryQueue::new(),
            state: ConnectionState::Disconnected,
            config: None,
            received: Arc::new(AtomicU64::new(0)),
            sent: 0,
            timing: ReaderTiming::default(),
            join_timeout: Duration::from_millis(READER_JOIN_TIMEOUT_MS),
        }
    }

    /// Override reader pacing for subsequent connections
    pub fn with_reader_timing(mut self, timing: ReaderTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Get current connection state.
    ///
    /// A link whose reader has ended on its own reports `Disconnected` even
    /// before the next mutating call tears it down.
    pub fn state(&self) -> ConnectionState {
        match &self.reader {
            Some(reader)
                if self.state == ConnectionState::Connected
                    && reader.state() == ReaderState::Running =>
            {
                ConnectionState::Connected
            }
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Configuration of the current link, if connected
    pub fn config(&self) -> Option<&LinkConfig> {
        self.config.as_ref()
    }

    pub fn counters(&self) -> LinkCounters {
        LinkCounters {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent,
        }
    }

    /// State, reader, config and counters in one snapshot
    pub fn status(&mut self) -> LinkStatus {
        self.reap_lost_link();
        LinkStatus {
            state: self.state,
            reader: self
                .reader
                .as_ref()
                .map(PortReader::state)
                .unwrap_or(ReaderState::Stopped),
            config: self.config.clone(),
            counters: self.counters(),
        }
    }

    /// Open the transport and start the reader.
    ///
    /// Connecting while already connected is an error; disconnect first.
    pub fn connect(&mut self, config: LinkConfig) -> Result<(), LinkError> {
        self.reap_lost_link();
        if self.state == ConnectionState::Connected {
            return Err(LinkError::AlreadyConnected);
        }

        let mut transport = self.connector.open(&config)?;
        if let Err(e) = transport.clear_input_buffer() {
            tracing::debug!("connect: could not clear input buffer: {e}");
        }

        *lock_transport(&self.transport) = Some(transport);

        // Fresh counter per session; a detached reader from an earlier link
        // keeps bumping its own
        let received = Arc::new(AtomicU64::new(0));
        let sink = self.queue.counting_sink(received.clone());
        let reader = match PortReader::spawn(self.transport.clone(), sink, self.timing) {
            Ok(reader) => reader,
            Err(e) => {
                lock_transport(&self.transport).take();
                return Err(LinkError::ConnectionFailed(format!(
                    "could not start reader: {e}"
                )));
            }
        };

        tracing::info!("connected to {} @ {} bps", config.port_name, config.baud_rate);
        self.reader = Some(reader);
        self.config = Some(config);
        self.state = ConnectionState::Connected;
        self.received = received;
        self.sent = 0;
        Ok(())
    }

    /// Stop the reader and close the transport. No-op when disconnected.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.teardown();
        tracing::info!("disconnected");
    }

    /// Write raw bytes to the board
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.reap_lost_link();
        if self.state != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }
        let (read_timeout, write_timeout) = match &self.config {
            Some(config) => (
                Duration::from_millis(config.read_timeout_ms),
                Duration::from_millis(config.write_timeout_ms),
            ),
            None => return Err(LinkError::NotConnected),
        };

        {
            let mut guard = lock_transport(&self.transport);
            let transport = guard.as_mut().ok_or(LinkError::NotConnected)?;
            let result = transport
                .set_timeout(write_timeout)
                .and_then(|_| transport.write_all(bytes));
            if let Err(e) = transport.set_timeout(read_timeout) {
                tracing::warn!("send: could not restore read timeout: {e}");
            }
            result.map_err(|e| LinkError::WriteError(e.to_string()))?;
        }

        tracing::debug!("sent {} bytes: {:?}", bytes.len(), String::from_utf8_lossy(bytes));
        self.sent += 1;
        Ok(())
    }

    /// Validate and send an amplitude/frequency command
    pub fn send_command(&mut self, amplitude: u16, frequency: u16) -> Result<(), LinkError> {
        let command = AmpFreq::new(amplitude, frequency)?;
        self.send(command.encode().as_bytes())
    }

    /// Send manual input normalized to the fixed 9 character field
    pub fn send_raw(&mut self, text: &str) -> Result<(), LinkError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LinkError::InvalidCommand("empty input".into()));
        }
        self.send(encode_raw_line(text).as_bytes())
    }

    /// Everything received since the last drain, oldest first. Never blocks.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.reap_lost_link();
        self.queue.drain_all()
    }

    /// Try every port (outer) and baud rate (inner) in order, stopping at the
    /// first successful connect. Returns the winning configuration.
    pub fn autoconnect(
        &mut self,
        ports: &[String],
        bauds: &[u32],
    ) -> Result<LinkConfig, LinkError> {
        self.reap_lost_link();
        if self.state == ConnectionState::Connected {
            return Err(LinkError::AlreadyConnected);
        }

        for port in ports {
            for &baud in bauds {
                let config = match LinkConfig::new(port.as_str(), baud) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::debug!("autoconnect: skipping {port} @ {baud}: {e}");
                        continue;
                    }
                };
                tracing::debug!("autoconnect: trying {port} @ {baud}");
                match self.connect(config.clone()) {
                    Ok(()) => return Ok(config),
                    Err(e) => tracing::debug!("autoconnect: {port} @ {baud} failed: {e}"),
                }
            }
        }

        tracing::warn!("autoconnect: no port/baud combination answered");
        Err(LinkError::NoDeviceFound)
    }

    /// Autoconnect over the ports present on this machine and every supported baud rate
    pub fn autoconnect_available(&mut self) -> Result<LinkConfig, LinkError> {
        let ports = candidate_ports();
        self.autoconnect(&ports, &BAUD_RATES)
    }

    /// If the reader ended on its own, the link is gone; close it down
    fn reap_lost_link(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let finished = self
            .reader
            .as_ref()
            .map(|r| r.state() == ReaderState::Stopped)
            .unwrap_or(true);
        if finished {
            tracing::warn!("link lost: reader stopped unexpectedly");
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        if let Some(reader) = self.reader.take() {
            match reader.stop(self.join_timeout) {
                Some(ReaderExit::Stopped) | None => {}
                Some(exit) => tracing::debug!("reader had already exited: {:?}", exit),
            }
        }
        // Dropping the transport closes the port
        lock_transport(&self.transport).take();
        self.config = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for LinkController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LinkController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Transport;
    use pretty_assertions::assert_eq;

    struct NoPorts;

    impl Connector for NoPorts {
        fn open(&self, config: &LinkConfig) -> Result<Box<dyn Transport>, LinkError> {
            Err(LinkError::ConnectionFailed(format!(
                "{}: no such device",
                config.port_name
            )))
        }
    }

    #[test]
    fn test_link_config_default() {
        let config = LinkConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
        assert_eq!(config.write_timeout_ms, DEFAULT_WRITE_TIMEOUT_MS);
    }

    #[test]
    fn test_link_config_rejects_unknown_baud() {
        assert!(LinkConfig::new("/dev/ttyACM0", 115200).is_ok());
        assert!(matches!(
            LinkConfig::new("/dev/ttyACM0", 14400),
            Err(LinkError::InvalidBaudRate(14400))
        ));
    }

    #[test]
    fn test_initial_state() {
        let mut link = LinkController::with_connector(NoPorts);
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(link.config().is_none());
        let status = link.status();
        assert_eq!(status.reader, ReaderState::Stopped);
        assert_eq!(status.counters, LinkCounters::default());
    }

    #[test]
    fn test_connect_failure_keeps_disconnected() {
        let mut link = LinkController::with_connector(NoPorts);
        let config = LinkConfig::new("/dev/ttyACM9", 9600).unwrap();
        assert!(matches!(
            link.connect(config),
            Err(LinkError::ConnectionFailed(_))
        ));
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_raw_rejects_blank_input() {
        let mut link = LinkController::with_connector(NoPorts);
        assert!(matches!(
            link.send_raw("   "),
            Err(LinkError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_send_command_validates_before_connection_check() {
        let mut link = LinkController::with_connector(NoPorts);
        assert!(matches!(
            link.send_command(150, 10),
            Err(LinkError::InvalidCommand(_))
        ));
        assert!(matches!(
            link.send_command(50, 10),
            Err(LinkError::NotConnected)
        ));
    }
}
