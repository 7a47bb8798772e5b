use chrono::Utc;
use serde::Serialize;

use crate::dispatch::Outcome;
use crate::job::{Job, JobId};

/// Structured trace of one job leaving a stage.
///
/// With no durable status store, this log line is the only record of what
/// happened to a job downstream of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub job_id: JobId,
    pub stage: String,
    pub outcome: Outcome,
    /// `None` when the stage has no destination topic.
    pub published: Option<bool>,
    pub file_size_mb: u32,
    pub page_count: u32,
    pub image_count: u32,
    pub submitted_at: i64,
    pub completed_at: i64,
}

impl CompletionRecord {
    pub fn new(stage: &str, job: &Job, outcome: Outcome, published: Option<bool>) -> Self {
        Self {
            job_id: job.job_id.clone(),
            stage: stage.to_string(),
            outcome,
            published,
            file_size_mb: job.file_size_mb,
            page_count: job.page_count,
            image_count: job.image_count,
            submitted_at: job.submitted_at,
            completed_at: Utc::now().timestamp(),
        }
    }

    pub fn emit(&self) {
        match &self.outcome {
            Outcome::Classified { route, out_topic } => tracing::info!(
                stage = %self.stage,
                job_id = %self.job_id,
                route = %route,
                out_topic = %out_topic,
                published = ?self.published,
                file_size_mb = self.file_size_mb,
                page_count = self.page_count,
                image_count = self.image_count,
                submitted_at = self.submitted_at,
                ts = self.completed_at,
                "classified"
            ),
            Outcome::Processed { topic, work_ms } => tracing::info!(
                stage = %self.stage,
                job_id = %self.job_id,
                topic = %topic,
                work_ms = *work_ms,
                file_size_mb = self.file_size_mb,
                page_count = self.page_count,
                image_count = self.image_count,
                submitted_at = self.submitted_at,
                ts = self.completed_at,
                "processed"
            ),
        }
    }
}
