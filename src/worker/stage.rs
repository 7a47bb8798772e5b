use async_trait::async_trait;

use crate::dispatch::{Outcome, Stage};
use crate::job::Job;
use crate::worker::WorkSimulator;

/// Terminal stage: simulate work for one job. Produces nothing downstream.
#[derive(Debug, Clone)]
pub struct WorkerStage {
    name: String,
    topic: String,
    simulator: WorkSimulator,
}

impl WorkerStage {
    /// `topic` is the route topic this worker consumes; it is reported in
    /// every completion record.
    pub fn new(topic: impl Into<String>, simulator: WorkSimulator) -> Self {
        let topic = topic.into();
        Self {
            name: format!("worker:{}", topic),
            topic,
            simulator,
        }
    }
}

#[async_trait]
impl Stage for WorkerStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, job: &Job) -> Outcome {
        tracing::debug!(job_id = %job.job_id, topic = %self.topic, "Processing job");
        let work_ms = self.simulator.execute().await;
        Outcome::Processed {
            topic: self.topic.clone(),
            work_ms,
        }
    }
}
