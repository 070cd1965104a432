//! Background port reader
//!
//! One reader thread runs per connected period. It polls the shared transport,
//! frames what it reads and pushes frames onto the delivery queue. The
//! transport lock is held only around each individual I/O call so foreground
//! writes are never stuck behind a poll.

use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{
    FrameSink, FrameSplitter, Transport, IDLE_POLL_MS, MAX_CONSECUTIVE_READ_ERRORS,
    READ_CHUNK_SIZE, READ_ERROR_BACKOFF_MS,
};

/// Transport slot shared by the controller and its reader.
/// `Some` exactly while the link is connected.
pub(crate) type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

/// Lock the transport slot, recovering from a poisoned lock
pub(crate) fn lock_transport(
    handle: &SharedTransport,
) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reader lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderState {
    Running,
    Stopped,
}

/// Reader pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderTiming {
    /// Sleep when nothing was available
    pub idle_poll: Duration,
    /// Sleep after a failed read
    pub error_backoff: Duration,
    /// Failures in a row that end the reader and mark the link lost
    pub max_consecutive_errors: u32,
}

impl Default for ReaderTiming {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(IDLE_POLL_MS),
            error_backoff: Duration::from_millis(READ_ERROR_BACKOFF_MS),
            max_consecutive_errors: MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

/// Why a reader loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReaderExit {
    /// Stop signal observed
    Stopped,
    /// Transport slot emptied underneath the reader
    Closed,
    /// Too many consecutive read failures
    Failed,
}

enum ReadOutcome {
    Data(usize),
    Idle,
    Closed,
    Failed(io::Error),
}

/// Handle to a running reader thread
pub(crate) struct PortReader {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<ReaderExit>>,
}

impl PortReader {
    /// Start a reader over `handle`, delivering frames to `sink`
    pub(crate) fn spawn(
        handle: SharedTransport,
        sink: FrameSink,
        timing: ReaderTiming,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let thread = thread::Builder::new()
            .name("stm32link-reader".into())
            .spawn(move || run(handle, stop_flag, sink, timing))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub(crate) fn state(&self) -> ReaderState {
        match &self.thread {
            Some(thread) if !thread.is_finished() => ReaderState::Running,
            _ => ReaderState::Stopped,
        }
    }

    /// Signal the reader to stop and wait up to `timeout` for it.
    ///
    /// Returns `None` if the thread did not finish in time; it is then left
    /// detached and exits on its own once it sees the signal or the emptied
    /// transport slot.
    pub(crate) fn stop(mut self, timeout: Duration) -> Option<ReaderExit> {
        self.stop.store(true, Ordering::Release);
        let thread = self.thread.take()?;

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("reader thread still running after {:?}, detaching", timeout);
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }

        match thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                tracing::warn!("reader thread panicked");
                None
            }
        }
    }
}

impl Drop for PortReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn run(
    handle: SharedTransport,
    stop: Arc<AtomicBool>,
    sink: FrameSink,
    timing: ReaderTiming,
) -> ReaderExit {
    let mut splitter = FrameSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut consecutive_errors = 0u32;

    tracing::debug!("reader started");
    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break ReaderExit::Stopped;
        }

        match read_available(&handle, &mut buf) {
            ReadOutcome::Data(n) => {
                consecutive_errors = 0;
                for frame in splitter.feed(&buf[..n]) {
                    sink.push(frame);
                }
            }
            ReadOutcome::Idle => {
                consecutive_errors = 0;
                thread::sleep(timing.idle_poll);
            }
            ReadOutcome::Closed => break ReaderExit::Closed,
            ReadOutcome::Failed(e) => {
                consecutive_errors += 1;
                tracing::warn!(
                    "serial read error ({}/{}): {}",
                    consecutive_errors,
                    timing.max_consecutive_errors,
                    e
                );
                if consecutive_errors >= timing.max_consecutive_errors {
                    break ReaderExit::Failed;
                }
                thread::sleep(timing.error_backoff);
            }
        }
    };

    if let Some(frame) = splitter.flush() {
        sink.push(frame);
    }
    tracing::debug!("reader exited: {:?}", exit);
    exit
}

/// One short read under the transport lock.
///
/// Reads what the transport reports available (capped at the buffer size);
/// if it can't report a count, tries a single byte bounded by the read timeout.
fn read_available(handle: &SharedTransport, buf: &mut [u8]) -> ReadOutcome {
    let mut guard = lock_transport(handle);
    let Some(transport) = guard.as_mut() else {
        return ReadOutcome::Closed;
    };

    let want = match transport.bytes_to_read() {
        Ok(0) => return ReadOutcome::Idle,
        Ok(n) => (n as usize).min(buf.len()),
        Err(e) if e.kind() == ErrorKind::Unsupported => 1,
        Err(e) => return ReadOutcome::Failed(e),
    };

    match transport.read(&mut buf[..want]) {
        Ok(0) => ReadOutcome::Idle,
        Ok(n) => ReadOutcome::Data(n),
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            ReadOutcome::Idle
        }
        Err(e) => ReadOutcome::Failed(e),
    }
}
