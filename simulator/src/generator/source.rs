use crate::generator::profile::{build_frame, Reflector};
use crate::generator::template::Scenario;
use anyhow::Context;
use presencecore::prelude::FrameConfig;
use presencecore::{AcquisitionError, Frame, FrameSource};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for the synthetic radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Half-width of the uniform noise added to each I and Q sample.
    pub noise: f32,
    pub reflectors: Vec<Reflector>,
    /// Every n-th acquisition fails transiently.
    pub drop_every: Option<u64>,
    /// The device dies once this many frames were attempted.
    pub fail_after: Option<u64>,
    /// Sleep so frames arrive at the configured frame period.
    pub realtime: bool,
    pub scenario: Option<Scenario>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            noise: 0.002,
            reflectors: Vec::new(),
            drop_every: None,
            fail_after: None,
            realtime: false,
            scenario: None,
        }
    }
}

impl GeneratorConfig {
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            reflectors: scenario.reflectors(),
            scenario: Some(scenario),
            ..Default::default()
        }
    }
}

/// Frame source that synthesises beat signals instead of reading a device.
pub struct SyntheticRadar {
    frame: FrameConfig,
    config: GeneratorConfig,
    rng: StdRng,
    next_index: u64,
    limit: Option<u64>,
    last_emit: Option<Instant>,
}

impl SyntheticRadar {
    /// `limit` caps the number of acquisitions; `None` runs until failure.
    pub fn new(
        frame: FrameConfig,
        config: GeneratorConfig,
        limit: Option<u64>,
    ) -> anyhow::Result<Self> {
        frame.validate().context("validating synthetic radar frame config")?;
        if !config.noise.is_finite() || config.noise < 0.0 {
            anyhow::bail!("generator noise must be a non-negative number, got {}", config.noise);
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            frame,
            config,
            next_index: 0,
            limit,
            last_emit: None,
        })
    }

    fn pace(&mut self) {
        if !self.config.realtime {
            return;
        }
        let period = Duration::from_secs_f32(self.frame.frame_repetition_time_s);
        if let Some(last) = self.last_emit {
            let due = last + period;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for SyntheticRadar {
    fn config(&self) -> &FrameConfig {
        &self.frame
    }

    fn get_next_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.limit.is_some_and(|limit| self.next_index >= limit) {
            return Err(AcquisitionError::Exhausted);
        }
        let index = self.next_index;
        if let Some(after) = self.config.fail_after {
            if index >= after {
                return Err(AcquisitionError::Fatal(format!(
                    "synthetic device stopped after {} frames",
                    after
                )));
            }
        }
        self.next_index += 1;
        self.pace();

        if let Some(every) = self.config.drop_every.filter(|&every| every > 0) {
            if (index + 1) % every == 0 {
                return Err(AcquisitionError::Transient(format!("frame {} lost", index)));
            }
        }
        Ok(build_frame(
            &self.frame,
            &self.config.reflectors,
            index,
            self.config.noise,
            &mut self.rng,
        ))
    }
}
