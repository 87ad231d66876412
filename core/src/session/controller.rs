use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::detection::{
    FallConfig, FallDetector, FallResetHandle, GestureConfig, GestureDetector, PeopleCountConfig,
    PeopleCountDetector, PresenceAndPostureDetector, PresenceConfig,
};
use crate::prelude::{CoreError, CoreResult, FrameConfig, FrameProcessor};
use crate::processing::{AngleConfig, AnglePipeline, BeamConfig, DopplerConfig};
use crate::sensor_interface::{
    AngleReport, FallReport, FrameSource, GestureReport, PeopleCountReport, PostureReport,
    ResultsSnapshot,
};
use crate::session::consumer::{spawn_consumer, ConsumerHandle};
use crate::session::producer::{spawn_producer, ProducerHandle};
use crate::session::slot::FrameSlot;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub enabled: bool,
    /// Pause after each processed frame; zero reacts to every new frame at once.
    pub poll_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_ms: 0,
        }
    }
}

impl ConsumerConfig {
    fn poll(&self) -> Option<Duration> {
        (self.poll_ms > 0).then(|| Duration::from_millis(self.poll_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumersConfig {
    pub angle: ConsumerConfig,
    pub posture: ConsumerConfig,
    pub fall: ConsumerConfig,
    pub people: ConsumerConfig,
    pub gesture: ConsumerConfig,
}

impl Default for ConsumersConfig {
    fn default() -> Self {
        Self {
            angle: ConsumerConfig::default(),
            posture: ConsumerConfig::default(),
            fall: ConsumerConfig::default(),
            people: ConsumerConfig::default(),
            gesture: ConsumerConfig {
                enabled: true,
                poll_ms: 10,
            },
        }
    }
}

/// Everything needed to run one sensing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub frame: FrameConfig,
    pub doppler: DopplerConfig,
    pub beam: BeamConfig,
    pub angle: AngleConfig,
    pub presence: PresenceConfig,
    pub fall: FallConfig,
    pub people: PeopleCountConfig,
    pub gesture: GestureConfig,
    pub consumers: ConsumersConfig,
}

impl SessionConfig {
    pub fn validate(&self) -> CoreResult<()> {
        self.frame.validate()?;
        self.doppler.validate()?;
        self.beam.validate()?;
        self.angle.validate()?;
        self.presence.validate()?;
        self.fall.validate()?;
        self.people.validate()?;
        self.gesture.validate()
    }
}

/// Latest-result receivers, one per consumer. Disabled consumers keep a
/// receiver that never carries a value.
#[derive(Clone)]
pub struct ResultReceivers {
    pub angle: watch::Receiver<Option<AngleReport>>,
    pub posture: watch::Receiver<Option<PostureReport>>,
    pub fall: watch::Receiver<Option<FallReport>>,
    pub people: watch::Receiver<Option<PeopleCountReport>>,
    pub gesture: watch::Receiver<Option<GestureReport>>,
}

impl ResultReceivers {
    pub fn snapshot(&self) -> ResultsSnapshot {
        ResultsSnapshot {
            angle: self.angle.borrow().clone(),
            posture: self.posture.borrow().clone(),
            fall: self.fall.borrow().clone(),
            people: self.people.borrow().clone(),
            gesture: self.gesture.borrow().clone(),
        }
    }
}

/// Producer plus every enabled consumer, started together and stopped together.
pub struct Session {
    producer: ProducerHandle,
    consumers: Vec<ConsumerHandle>,
    results: ResultReceivers,
    fall_reset: Option<FallResetHandle>,
    metrics: BTreeMap<&'static str, Arc<MetricsRecorder>>,
    logger: LogManager,
}

struct Launcher<'a> {
    slot: &'a FrameSlot,
    consumers: Vec<ConsumerHandle>,
    metrics: BTreeMap<&'static str, Arc<MetricsRecorder>>,
}

impl Launcher<'_> {
    fn launch<P>(
        &mut self,
        processor: Option<P>,
        config: &ConsumerConfig,
    ) -> watch::Receiver<Option<P::Output>>
    where
        P: FrameProcessor + 'static,
    {
        let Some(processor) = processor else {
            return watch::channel(None).1;
        };
        let metrics = Arc::new(MetricsRecorder::new());
        self.metrics.insert(processor.name(), metrics.clone());
        let (handle, results) =
            spawn_consumer(processor, self.slot.reader(), config.poll(), metrics);
        self.consumers.push(handle);
        results
    }
}

fn build<P>(enabled: bool, make: impl FnOnce() -> CoreResult<P>) -> CoreResult<Option<P>> {
    if enabled {
        make().map(Some)
    } else {
        Ok(None)
    }
}

impl Session {
    /// Builds every enabled consumer and starts acquisition. Must be called
    /// from inside a Tokio runtime.
    pub fn start<S>(source: S, config: &SessionConfig) -> CoreResult<Self>
    where
        S: FrameSource + 'static,
    {
        config.validate()?;
        let delivered = source.config().frame_shape();
        if delivered != config.frame.frame_shape() {
            return Err(CoreError::InvalidConfig(format!(
                "source delivers {:?} frames, session expects {:?}",
                delivered,
                config.frame.frame_shape()
            )));
        }

        let enabled = &config.consumers;
        let angle = build(enabled.angle.enabled, || {
            AnglePipeline::new(&config.frame, &config.doppler, &config.beam, &config.angle)
        })?;
        let posture = build(enabled.posture.enabled, || {
            PresenceAndPostureDetector::new(&config.frame, &config.presence)
        })?;
        let fall = build(enabled.fall.enabled, || {
            FallDetector::new(&config.frame, &config.fall)
        })?;
        let people = build(enabled.people.enabled, || {
            PeopleCountDetector::new(&config.frame, &config.people)
        })?;
        let gesture = build(enabled.gesture.enabled, || {
            GestureDetector::new(&config.frame, &config.gesture)
        })?;
        let fall_reset = fall.as_ref().map(FallDetector::reset_handle);

        let slot = FrameSlot::new();
        let mut launcher = Launcher {
            slot: &slot,
            consumers: Vec::new(),
            metrics: BTreeMap::new(),
        };
        let results = ResultReceivers {
            angle: launcher.launch(angle, &enabled.angle),
            posture: launcher.launch(posture, &enabled.posture),
            fall: launcher.launch(fall, &enabled.fall),
            people: launcher.launch(people, &enabled.people),
            gesture: launcher.launch(gesture, &enabled.gesture),
        };
        let Launcher {
            consumers,
            mut metrics,
            ..
        } = launcher;

        let producer_metrics = Arc::new(MetricsRecorder::new());
        metrics.insert("producer", producer_metrics.clone());
        let producer = spawn_producer(source, slot, producer_metrics);

        let logger = LogManager::new("session");
        logger.record(&format!(
            "started with {} consumers: {:?}",
            consumers.len(),
            consumers.iter().map(ConsumerHandle::name).collect::<Vec<_>>()
        ));

        Ok(Self {
            producer,
            consumers,
            results,
            fall_reset,
            metrics,
            logger,
        })
    }

    pub fn results(&self) -> ResultReceivers {
        self.results.clone()
    }

    pub fn snapshot(&self) -> ResultsSnapshot {
        self.results.snapshot()
    }

    /// Handle for clearing the fall latch from another task, if the fall
    /// consumer is running.
    pub fn fall_reset_handle(&self) -> Option<FallResetHandle> {
        self.fall_reset.clone()
    }

    /// Asks the fall detector to clear its latch before its next frame.
    /// Returns false when the fall consumer is disabled.
    pub fn request_fall_reset(&self) -> bool {
        match &self.fall_reset {
            Some(handle) => {
                handle.request();
                true
            }
            None => false,
        }
    }

    pub fn metrics(&self) -> BTreeMap<&'static str, MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|(name, recorder)| (*name, recorder.snapshot()))
            .collect()
    }

    /// True while the producer is still acquiring.
    pub fn is_acquiring(&self) -> bool {
        !self.producer.is_finished()
    }

    /// Stops the producer and every consumer, returning the first fatal error
    /// any of them hit.
    pub async fn shutdown(self) -> CoreResult<()> {
        let mut first_error = self.producer.stop().await.err();
        for consumer in self.consumers {
            let name = consumer.name();
            if let Err(err) = consumer.stop().await {
                self.logger.error(&format!("{} ended with: {}", name, err));
                first_error.get_or_insert(err);
            }
        }
        self.logger.record("stopped");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
