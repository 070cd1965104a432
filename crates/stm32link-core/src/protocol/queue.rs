//! Frame hand-off from the reader thread to the consumer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use super::Frame;

/// Unbounded FIFO of decoded frames.
///
/// The consumer end lives in the controller for its whole lifetime, so frames
/// queued before a disconnect can still be drained afterwards. Each reader
/// gets its own [`FrameSink`].
#[derive(Debug)]
pub struct DeliveryQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Producer end of a [`DeliveryQueue`]
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: Sender<Frame>,
    /// Bumped once per pushed frame, if set
    received: Option<Arc<AtomicU64>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// A producer handle for a reader thread
    pub fn sink(&self) -> FrameSink {
        FrameSink {
            tx: self.tx.clone(),
            received: None,
        }
    }

    /// A producer handle that also counts every frame it pushes into `received`
    pub fn counting_sink(&self, received: Arc<AtomicU64>) -> FrameSink {
        FrameSink {
            tx: self.tx.clone(),
            received: Some(received),
        }
    }

    /// Remove and return everything queued right now, oldest first
    pub fn drain_all(&self) -> Vec<Frame> {
        self.rx.try_iter().collect()
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink {
    /// Append to the tail. Never blocks.
    pub fn push(&self, frame: Frame) {
        // Count before the frame becomes visible so a drain never sees an
        // uncounted frame
        if let Some(received) = &self.received {
            received.fetch_add(1, Ordering::Relaxed);
        }
        // The queue owns a receiver for as long as any sink can exist in a
        // live controller; a send error only means the queue was dropped.
        let _ = self.tx.send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn test_drain_empty() {
        let queue = DeliveryQueue::new();
        assert!(queue.drain_all().is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = DeliveryQueue::new();
        let sink = queue.sink();
        sink.push("a".into());
        sink.push("b".into());
        sink.push("a".into());
        assert_eq!(queue.drain_all(), vec!["a", "b", "a"]);
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_drain_while_other_thread_pushes() {
        let queue = DeliveryQueue::new();
        let sink = queue.sink();
        let producer = thread::spawn(move || {
            for i in 0..2000 {
                sink.push(format!("frame {}", i));
                if i % 100 == 0 {
                    thread::yield_now();
                }
            }
        });

        let mut frames = Vec::new();
        while !producer.is_finished() {
            frames.extend(queue.drain_all());
            thread::yield_now();
        }
        producer.join().unwrap();
        frames.extend(queue.drain_all());

        let expected: Vec<String> = (0..2000).map(|i| format!("frame {}", i)).collect();
        assert_eq!(frames, expected);
    }

    #[test]
    fn test_counting_sink() {
        let queue = DeliveryQueue::new();
        let received = Arc::new(AtomicU64::new(0));
        let counted = queue.counting_sink(received.clone());
        counted.push("one".into());
        counted.push("two".into());
        queue.sink().push("uncounted".into());

        assert_eq!(received.load(Ordering::Relaxed), 2);
        assert_eq!(queue.drain_all(), vec!["one", "two", "uncounted"]);
    }

    #[test]
    fn test_frames_survive_sink_drop() {
        let queue = DeliveryQueue::new();
        {
            let sink = queue.sink();
            sink.push("late".into());
        }
        assert_eq!(queue.drain_all(), vec!["late"]);
    }
}
