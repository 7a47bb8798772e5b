use async_trait::async_trait;
use serde::Serialize;

use crate::classifier::Route;
use crate::job::Job;

/// What a stage did with one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    /// Routed; the job is re-published unchanged to `out_topic`.
    #[serde(rename_all = "camelCase")]
    Classified { route: Route, out_topic: String },
    /// Terminal processing on a worker. Nothing is re-published.
    #[serde(rename_all = "camelCase")]
    Processed { topic: String, work_ms: u64 },
}

impl Outcome {
    /// Topic the job must be forwarded to, if any.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Outcome::Classified { out_topic, .. } => Some(out_topic),
            Outcome::Processed { .. } => None,
        }
    }
}

/// Per-service transform applied by a [`DispatchLoop`](super::DispatchLoop).
///
/// Stages receive the decoded job by reference and must not depend on being
/// called exactly once per job: under either commit policy a job can be
/// redelivered.
#[async_trait]
pub trait Stage: Send {
    /// Name used in logs and completion records.
    fn name(&self) -> &str;

    async fn process(&mut self, job: &Job) -> Outcome;
}
