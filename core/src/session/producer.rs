use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::prelude::{CoreError, CoreResult};
use crate::sensor_interface::{AcquisitionError, FrameSource};
use crate::session::slot::FrameSlot;
use crate::telemetry::{LogManager, MetricsRecorder};

/// Owner of the acquisition loop.
pub struct ProducerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<CoreResult<()>>,
}

impl ProducerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the loop and waits for it. A source blocked inside
    /// `get_next_frame` is only noticed once that call returns.
    pub async fn stop(self) -> CoreResult<()> {
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|err| CoreError::Internal(format!("producer panicked: {}", err)))?
    }

    /// Waits for the loop to end on its own.
    pub async fn wait(self) -> CoreResult<()> {
        self.task
            .await
            .map_err(|err| CoreError::Internal(format!("producer panicked: {}", err)))?
    }
}

/// Pulls frames from `source` on a blocking thread and publishes each one
/// into `slot`. The slot is dropped when the loop ends, which tells every
/// reader that no further frames will come.
///
/// Frames are published as delivered; each consumer checks the layout it
/// needs and only that consumer stops on a mismatch.
pub fn spawn_producer<S>(
    mut source: S,
    slot: FrameSlot,
    metrics: Arc<MetricsRecorder>,
) -> ProducerHandle
where
    S: FrameSource + 'static,
{
    let (stop, stop_rx) = watch::channel(false);

    let task = tokio::task::spawn_blocking(move || {
        let logger = LogManager::new("producer");
        let expected = source.config().clone();
        logger.record(&format!(
            "acquiring {:?} frames every {} s",
            expected.frame_shape(),
            expected.frame_repetition_time_s
        ));

        loop {
            if *stop_rx.borrow() || stop_rx.has_changed().is_err() {
                logger.record("stop requested");
                break;
            }
            match source.get_next_frame() {
                Ok(frame) => {
                    if frame.shape() != expected.frame_shape() {
                        logger.warn(&format!(
                            "frame {} delivered as {:?}, configured {:?}",
                            frame.index(),
                            frame.shape(),
                            expected.frame_shape()
                        ));
                    }
                    metrics.record_processed();
                    slot.publish(frame);
                }
                Err(AcquisitionError::Transient(reason)) => {
                    metrics.record_skipped(1);
                    logger.warn(&format!("frame dropped: {}", reason));
                }
                Err(AcquisitionError::Exhausted) => {
                    logger.record("source exhausted");
                    break;
                }
                Err(AcquisitionError::Fatal(reason)) => {
                    metrics.record_error();
                    logger.error(&format!("acquisition failed: {}", reason));
                    return Err(CoreError::Device(reason));
                }
            }
        }
        Ok(())
    });

    ProducerHandle { stop, task }
}
