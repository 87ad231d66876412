use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::prelude::{CoreError, CoreResult, FrameProcessor};
use crate::session::slot::FrameReader;
use crate::telemetry::{LogManager, MetricsRecorder};

/// Owner of one running consumer loop.
///
/// Dropping the handle closes the stop channel, which ends the loop as well.
pub struct ConsumerHandle {
    name: &'static str,
    stop: watch::Sender<bool>,
    task: JoinHandle<CoreResult<()>>,
}

impl ConsumerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the loop and waits for its outcome.
    pub async fn stop(self) -> CoreResult<()> {
        let name = self.name;
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|err| CoreError::Internal(format!("{} loop panicked: {}", name, err)))?
    }
}

/// Runs `processor` on every frame `frames` yields until stopped, the slot
/// closes, or the processor fails. Each output replaces the previous one in
/// the returned receiver.
pub fn spawn_consumer<P>(
    mut processor: P,
    mut frames: FrameReader,
    poll: Option<Duration>,
    metrics: Arc<MetricsRecorder>,
) -> (ConsumerHandle, watch::Receiver<Option<P::Output>>)
where
    P: FrameProcessor + 'static,
{
    let name = processor.name();
    let (stop, mut stop_rx) = watch::channel(false);
    let (sink, results) = watch::channel(None);

    let task = tokio::spawn(async move {
        let logger = LogManager::new(name);
        logger.record("consumer started");
        loop {
            let next = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                frame = frames.next() => frame,
            };
            let Some(frame) = next else {
                logger.record("frame slot closed");
                break;
            };
            metrics.record_skipped(frames.missed() as usize);

            match processor.process(&frame) {
                Ok(output) => {
                    metrics.record_processed();
                    sink.send_replace(Some(output));
                }
                Err(err) => {
                    metrics.record_error();
                    logger.error(&format!("stopping at frame {}: {}", frame.index(), err));
                    return Err(err);
                }
            }

            if let Some(delay) = poll {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        logger.record("consumer stopped");
        Ok(())
    });

    (ConsumerHandle { name, stop, task }, results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_interface::Frame;
    use crate::session::slot::FrameSlot;
    use ndarray::Array3;

    /// Echoes the frame index, failing on a chosen one.
    struct IndexEcho {
        fail_on: Option<u64>,
    }

    impl FrameProcessor for IndexEcho {
        type Output = u64;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn process(&mut self, frame: &Frame) -> CoreResult<u64> {
            if Some(frame.index()) == self.fail_on {
                return Err(CoreError::Internal("boom".into()));
            }
            Ok(frame.index())
        }
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, Array3::zeros((1, 2, 2)))
    }

    async fn wait_for(results: &mut watch::Receiver<Option<u64>>, index: u64) {
        while *results.borrow_and_update() != Some(index) {
            results.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn publishes_each_result_and_stops_cleanly() {
        let slot = FrameSlot::new();
        let metrics = Arc::new(MetricsRecorder::new());
        let (handle, mut results) = spawn_consumer(
            IndexEcho { fail_on: None },
            slot.reader(),
            None,
            metrics.clone(),
        );
        assert_eq!(handle.name(), "echo");

        slot.publish(frame(0));
        wait_for(&mut results, 0).await;
        slot.publish(frame(1));
        wait_for(&mut results, 1).await;

        handle.stop().await.unwrap();
        assert_eq!(metrics.snapshot().processed, 2);
    }

    #[tokio::test]
    async fn processor_error_ends_the_loop() {
        let slot = FrameSlot::new();
        let metrics = Arc::new(MetricsRecorder::new());
        let (handle, _results) = spawn_consumer(
            IndexEcho { fail_on: Some(0) },
            slot.reader(),
            Some(Duration::from_millis(1)),
            metrics.clone(),
        );
        slot.publish(frame(0));
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(handle.stop().await, Err(CoreError::Internal("boom".into())));
        assert_eq!(metrics.snapshot().errors, 1);
    }

    #[tokio::test]
    async fn closed_slot_ends_the_loop_without_error() {
        let slot = FrameSlot::new();
        let (handle, _results) = spawn_consumer(
            IndexEcho { fail_on: None },
            slot.reader(),
            None,
            Arc::new(MetricsRecorder::new()),
        );
        drop(slot);
        assert_eq!(handle.stop().await, Ok(()));
    }
}
