use presencecore::telemetry::MetricsSnapshot;
use presencecore::{ResultsSnapshot, Session};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What `GET /results` returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsModel {
    pub results: ResultsSnapshot,
    pub metrics: BTreeMap<String, MetricsSnapshot>,
    pub acquiring: bool,
}

impl ResultsModel {
    pub fn capture(session: &Session) -> Self {
        Self {
            results: session.snapshot(),
            metrics: session
                .metrics()
                .into_iter()
                .map(|(name, snapshot)| (name.to_string(), snapshot))
                .collect(),
            acquiring: session.is_acquiring(),
        }
    }
}
