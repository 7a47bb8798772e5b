use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broker::{Consumer, Producer, Record};
use crate::config::{CommitPolicy, DispatchConfig};
use crate::dispatch::{publish_confirmed, CompletionRecord, Stage};
use crate::job::codec;

/// Counters returned when a [`DispatchLoop`] stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Records received from the broker, decodable or not.
    pub consumed: u64,
    pub decode_failures: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub poll_errors: u64,
    pub commit_failures: u64,
    /// Jobs that went through the stage and produced a completion record.
    pub completed: u64,
}

/// Consume → transform → produce → commit, one message at a time.
pub struct DispatchLoop<C, S> {
    consumer: C,
    stage: S,
    producer: Option<Arc<dyn Producer>>,
    config: DispatchConfig,
    completions: Option<mpsc::Sender<CompletionRecord>>,
}

impl<C: Consumer, S: Stage> DispatchLoop<C, S> {
    pub fn new(consumer: C, stage: S, config: DispatchConfig) -> Self {
        Self {
            consumer,
            stage,
            producer: None,
            config,
            completions: None,
        }
    }

    /// Producer for stages whose outcome names a destination topic.
    pub fn with_producer(mut self, producer: Arc<dyn Producer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Also forward every completion record to `tx`. A full or closed
    /// channel drops the record; the log line is still written.
    pub fn with_completions(mut self, tx: mpsc::Sender<CompletionRecord>) -> Self {
        self.completions = Some(tx);
        self
    }

    /// Run until `shutdown` is cancelled. A message already taken from the
    /// broker is always finished before the loop checks the token again.
    pub async fn run(mut self, shutdown: CancellationToken) -> LoopStats {
        let mut stats = LoopStats::default();
        tracing::info!(
            stage = self.stage.name(),
            commit_policy = %self.config.commit_policy,
            "Dispatch loop started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                polled = self.consumer.poll(self.config.poll_timeout) => polled,
            };

            let record = match polled {
                None => continue,
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    stats.poll_errors += 1;
                    tracing::warn!(stage = self.stage.name(), error = %e, "Poll failed");
                    continue;
                }
            };

            stats.consumed += 1;
            self.handle(record, &mut stats).await;
        }

        self.consumer.close().await;
        tracing::info!(stage = self.stage.name(), ?stats, "Dispatch loop stopped");
        stats
    }

    async fn handle(&mut self, record: Record, stats: &mut LoopStats) {
        if self.config.commit_policy == CommitPolicy::OnReceipt {
            self.commit(&record, stats).await;
        }

        match codec::decode(&record.payload) {
            Ok(job) => {
                let outcome = self.stage.process(&job).await;

                let published = match outcome.destination() {
                    Some(topic) => Some(
                        self.forward(topic, job.job_id.as_str(), &record, stats)
                            .await,
                    ),
                    None => None,
                };

                let completion =
                    CompletionRecord::new(self.stage.name(), &job, outcome, published);
                completion.emit();
                stats.completed += 1;
                if let Some(tx) = &self.completions {
                    let _ = tx.try_send(completion);
                }
            }
            Err(e) => {
                stats.decode_failures += 1;
                tracing::warn!(
                    stage = self.stage.name(),
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Skipping undecodable record"
                );
            }
        }

        if self.config.commit_policy == CommitPolicy::AfterDispatch {
            self.commit(&record, stats).await;
        }
    }

    /// Re-publish the original bytes. Failures are counted, never retried.
    async fn forward(
        &mut self,
        topic: &str,
        key: &str,
        record: &Record,
        stats: &mut LoopStats,
    ) -> bool {
        let Some(producer) = &self.producer else {
            stats.publish_failures += 1;
            tracing::error!(
                stage = self.stage.name(),
                job_id = key,
                topic,
                "No producer configured, dropping job"
            );
            return false;
        };

        match publish_confirmed(
            producer.as_ref(),
            topic,
            key,
            record.payload.clone(),
            self.config.publish_timeout,
        )
        .await
        {
            Ok(delivery) => {
                stats.published += 1;
                tracing::debug!(
                    job_id = key,
                    topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Forwarded"
                );
                true
            }
            Err(e) => {
                stats.publish_failures += 1;
                tracing::error!(
                    stage = self.stage.name(),
                    job_id = key,
                    topic,
                    error = %e,
                    "Publish failed, job not forwarded"
                );
                false
            }
        }
    }

    async fn commit(&mut self, record: &Record, stats: &mut LoopStats) {
        if let Err(e) = self.consumer.commit(record).await {
            stats.commit_failures += 1;
            tracing::warn!(
                stage = self.stage.name(),
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Commit failed, record may be redelivered"
            );
        }
    }
}
