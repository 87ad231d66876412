use crate::generator::source::GeneratorConfig;
use crate::generator::template::Scenario;
use anyhow::Context;
use presencecore::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub session: SessionConfig,
    pub generator: GeneratorConfig,
    /// Acquisitions attempted by an offline run.
    pub frames: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::from_args(Scenario::Walker, 40)
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .session
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(scenario: Scenario, frames: u64) -> Self {
        Self {
            session: SessionConfig::default(),
            generator: GeneratorConfig::for_scenario(scenario),
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_uses_scenario_reflectors() {
        let cfg = WorkflowConfig::from_args(Scenario::Crowd, 12);
        assert_eq!(cfg.frames, 12);
        assert_eq!(cfg.generator.reflectors.len(), 3);
        assert_eq!(cfg.session, SessionConfig::default());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"frames: 8\n\
              session:\n  frame:\n    num_chirps: 16\n    num_samples: 32\n  \
              consumers:\n    gesture:\n      enabled: false\n\
              generator:\n  drop_every: 4\n  reflectors:\n    - range_m: 1.2\n      angle_deg: -10.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.frames, 8);
        assert_eq!(cfg.session.frame.num_chirps, 16);
        assert!(!cfg.session.consumers.gesture.enabled);
        assert_eq!(cfg.generator.drop_every, Some(4));
        assert_eq!(cfg.generator.reflectors[0].angle_deg, -10.0);
    }

    #[test]
    fn invalid_session_is_rejected_on_load() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"session:\n  frame:\n    rx_mask: 0\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
