use std::sync::Arc;
use tokio::sync::watch;

use crate::sensor_interface::Frame;

/// Single-entry "latest frame" slot shared by the producer and every consumer.
///
/// Publishing swaps the whole frame in, so readers only ever see complete
/// frames; frames nobody read before the next publish are dropped.
pub struct FrameSlot {
    tx: watch::Sender<Option<Arc<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            rx: self.tx.subscribe(),
            primed: false,
            last_index: None,
            missed: 0,
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of a [`FrameSlot`].
pub struct FrameReader {
    rx: watch::Receiver<Option<Arc<Frame>>>,
    primed: bool,
    last_index: Option<u64>,
    missed: u64,
}

impl FrameReader {
    /// Waits for a publish this reader has not returned yet. Returns `None`
    /// once the slot is dropped and its last frame has been read.
    ///
    /// Every publish is returned at most once, whatever its frame index.
    pub async fn next(&mut self) -> Option<Arc<Frame>> {
        loop {
            if self.primed && self.rx.changed().await.is_err() {
                return None;
            }
            self.primed = true;
            let latest = self.rx.borrow_and_update().clone();
            if let Some(frame) = latest {
                self.missed = match self.last_index {
                    Some(last) if frame.index() > last => frame.index() - last - 1,
                    _ => 0,
                };
                self.last_index = Some(frame.index());
                return Some(frame);
            }
        }
    }

    /// Frame indices skipped between the previous and the latest returned frame.
    pub fn missed(&self) -> u64 {
        self.missed
    }
}
