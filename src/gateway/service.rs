use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::broker::Producer;
use crate::config::GatewayConfig;
use crate::dispatch::publish_confirmed;
use crate::error::SubmitError;
use crate::gateway::status::{JobState, JobStatus, StatusStore};
use crate::job::{codec, Job, JobId, JobRequest};

/// Returned to the caller once the inbound topic has confirmed the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub topic: String,
}

/// Validates submissions, stamps them and puts them on the inbound topic.
///
/// Cloning shares the producer and the status store.
#[derive(Clone)]
pub struct IngestionGateway {
    producer: Arc<dyn Producer>,
    statuses: Arc<RwLock<StatusStore>>,
    config: GatewayConfig,
}

impl IngestionGateway {
    pub fn new(producer: Arc<dyn Producer>, config: GatewayConfig) -> Self {
        Self {
            producer,
            statuses: Arc::new(RwLock::new(StatusStore::new(config.status_capacity))),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn submit(&self, request: JobRequest) -> Result<SubmitReceipt, SubmitError> {
        let attributes = request.validate()?;
        let job = Job::new(attributes);
        let job_id = job.job_id.clone();
        let topic = self.config.inbound_topic.clone();

        self.statuses.write().await.insert(
            job_id.clone(),
            JobStatus {
                state: JobState::Submitted,
                payload: job.clone(),
            },
        );

        let published = publish_confirmed(
            self.producer.as_ref(),
            &topic,
            job_id.as_str(),
            codec::encode(&job),
            self.config.publish_timeout,
        )
        .await;

        match published {
            Ok(delivery) => {
                tracing::info!(
                    job_id = %job_id,
                    topic = %topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Job submitted"
                );
                Ok(SubmitReceipt { job_id, topic })
            }
            Err(e) => {
                // Nothing reached the topic, so nothing should be reported as submitted.
                self.statuses.write().await.remove(&job_id);
                tracing::error!(job_id = %job_id, topic = %topic, error = %e, "Job dispatch failed");
                Err(e.into())
            }
        }
    }

    /// Status recorded by *this* instance. Ids submitted elsewhere look
    /// exactly like unknown ids.
    pub async fn get_status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.statuses.read().await.get(job_id).cloned()
    }

    /// Number of jobs this instance currently remembers.
    pub async fn tracked_jobs(&self) -> usize {
        self.statuses.read().await.len()
    }

    /// Drop every recorded status. Called when the gateway stops.
    pub async fn shutdown(&self) {
        let mut statuses = self.statuses.write().await;
        tracing::info!(entries = statuses.len(), "Clearing gateway status store");
        statuses.clear();
    }
}
