//! Latest-wins hand-off of measured boards from a sensing loop.
//!
//! A capture thread submits one board per frame; the planning side only ever
//! sees the newest unconsumed one. Older frames are dropped, never queued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Create a connected sender/receiver pair holding at most one frame.
pub fn frame_slot<T>() -> (FrameSender<T>, FrameReceiver<T>) {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        FrameSender {
            tx,
            drain: rx.clone(),
            dropped: dropped.clone(),
        },
        FrameReceiver { rx, dropped },
    )
}

pub struct FrameSender<T> {
    tx: Sender<T>,
    drain: Receiver<T>,
    dropped: Arc<AtomicUsize>,
}

impl<T> FrameSender<T> {
    /// Publish a frame, discarding any frame the receiver has not taken yet.
    /// Returns true when a stale frame was replaced.
    pub fn submit(&self, mut frame: T) -> bool {
        let mut replaced = false;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(back)) => {
                    if self.drain.try_recv().is_ok() {
                        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        log::debug!("dropped stale frame ({n} total)");
                        replaced = true;
                    }
                    frame = back;
                }
                // The sender keeps its own receiving handle, so the channel
                // cannot disconnect while `self` exists.
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct FrameReceiver<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicUsize>,
}

impl<T> FrameReceiver<T> {
    /// The pending frame, if any, without blocking.
    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Block until a frame arrives. `None` once the sender is dropped and
    /// no frame is pending.
    pub fn wait(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Like [`FrameReceiver::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Frames superseded before they were taken.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
