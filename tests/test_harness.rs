//! Test harness for pipeline integration tests.
//!
//! Provides an in-process pipeline (broker, gateway, classifier, light and
//! heavy workers) plus broker test doubles for fault injection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use doc_router::broker::{Consumer, Delivery, InMemoryBroker, Producer, Record};
use doc_router::classifier::ClassifierStage;
use doc_router::config::{
    BrokerConfig, ConsumerConfig, DispatchConfig, GatewayConfig, TopicConfig, WorkConfig,
    CLASSIFIER_GROUP, HEAVY_WORKER_GROUP, LIGHT_WORKER_GROUP,
};
use doc_router::dispatch::{CompletionRecord, DispatchLoop, LoopStats};
use doc_router::error::{BrokerError, SubmitError};
use doc_router::gateway::{IngestionGateway, SubmitReceipt};
use doc_router::job::{codec, Job, JobAttributes, JobRequest};
use doc_router::worker::{WorkSimulator, WorkerStage};

/// Dispatch settings with short timeouts for faster tests
pub fn fast_dispatch() -> DispatchConfig {
    DispatchConfig::default()
        .with_poll_timeout(Duration::from_millis(50))
        .with_publish_timeout(Duration::from_millis(200))
}

/// Near-instant simulated work
pub fn fast_work() -> WorkConfig {
    WorkConfig::new(1, 3, false).expect("valid work window")
}

pub fn encoded_job(file_size_mb: u32, page_count: u32, image_count: u32) -> Vec<u8> {
    codec::encode(&Job::new(JobAttributes::new(
        file_size_mb,
        page_count,
        image_count,
    )))
}

/// Whole pipeline running on tasks inside the test process.
pub struct TestPipeline {
    pub broker: InMemoryBroker,
    pub gateway: IngestionGateway,
    pub topics: TopicConfig,
    shutdown: CancellationToken,
    completions: mpsc::Receiver<CompletionRecord>,
    loops: Vec<JoinHandle<LoopStats>>,
}

impl TestPipeline {
    pub fn start() -> Self {
        Self::start_with(fast_dispatch())
    }

    pub fn start_with(dispatch: DispatchConfig) -> Self {
        let broker = InMemoryBroker::new(BrokerConfig::default());
        let topics = TopicConfig::default();
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1024);
        let producer: Arc<dyn Producer> = Arc::new(broker.clone());

        let gateway = IngestionGateway::new(
            producer.clone(),
            GatewayConfig::default().with_publish_timeout(Duration::from_millis(500)),
        );

        let mut loops = Vec::new();

        let classifier = DispatchLoop::new(
            broker.consumer(ConsumerConfig::new(
                CLASSIFIER_GROUP,
                vec![topics.inbound.clone()],
            )),
            ClassifierStage::new(topics.clone()),
            dispatch.clone(),
        )
        .with_producer(producer)
        .with_completions(tx.clone());
        loops.push(tokio::spawn(classifier.run(shutdown.clone())));

        for (group, topic) in [
            (LIGHT_WORKER_GROUP, topics.light.clone()),
            (HEAVY_WORKER_GROUP, topics.heavy.clone()),
        ] {
            let worker = DispatchLoop::new(
                broker.consumer(ConsumerConfig::new(group, vec![topic.clone()])),
                WorkerStage::new(topic, WorkSimulator::new(fast_work())),
                dispatch.clone(),
            )
            .with_completions(tx.clone());
            loops.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        Self {
            broker,
            gateway,
            topics,
            shutdown,
            completions: rx,
            loops,
        }
    }

    pub async fn submit(
        &self,
        file_size_mb: i64,
        page_count: i64,
        image_count: i64,
    ) -> Result<SubmitReceipt, SubmitError> {
        self.gateway
            .submit(JobRequest::new(file_size_mb, page_count, image_count))
            .await
    }

    /// Collect completion records until `count` have arrived or `timeout` passes.
    pub async fn collect_completions(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Vec<CompletionRecord> {
        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;
        while collected.len() < count {
            match tokio::time::timeout_at(deadline, self.completions.recv()).await {
                Ok(Some(record)) => collected.push(record),
                _ => break,
            }
        }
        collected
    }

    /// Cancel every loop and return their stats (classifier, light, heavy).
    pub async fn stop(self) -> Vec<LoopStats> {
        self.shutdown.cancel();
        let mut stats = Vec::new();
        for handle in self.loops {
            stats.push(handle.await.expect("dispatch loop panicked"));
        }
        stats
    }
}

// =============================================================================
// Broker test doubles
// =============================================================================

/// Producer whose every send is rejected by the broker.
pub struct RejectingProducer;

#[async_trait]
impl Producer for RejectingProducer {
    async fn send(
        &self,
        _topic: &str,
        _key: &str,
        _payload: Vec<u8>,
    ) -> Result<Delivery, BrokerError> {
        Err(BrokerError::Unavailable("injected failure".to_string()))
    }
}

/// Producer that never confirms. Signals `entered` on every send.
#[derive(Default)]
pub struct StallingProducer {
    pub entered: Arc<Notify>,
}

#[async_trait]
impl Producer for StallingProducer {
    async fn send(
        &self,
        _topic: &str,
        _key: &str,
        _payload: Vec<u8>,
    ) -> Result<Delivery, BrokerError> {
        self.entered.notify_one();
        std::future::pending().await
    }
}

/// Consumer that replays a fixed script of poll results, then reports
/// nothing available. Commits are recorded in order.
pub struct ScriptedConsumer {
    script: VecDeque<Result<Record, BrokerError>>,
    pub commits: Arc<Mutex<Vec<(u32, u64)>>>,
    pub fail_commits: bool,
    pub closed: Arc<Mutex<bool>>,
}

impl ScriptedConsumer {
    pub fn new(script: Vec<Result<Record, BrokerError>>) -> Self {
        Self {
            script: script.into(),
            commits: Arc::new(Mutex::new(Vec::new())),
            fail_commits: false,
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing_commits(mut self) -> Self {
        self.fail_commits = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl Consumer for ScriptedConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Record, BrokerError>> {
        match self.script.pop_front() {
            Some(next) => Some(next),
            None => {
                tokio::time::sleep(timeout).await;
                None
            }
        }
    }

    async fn commit(&mut self, record: &Record) -> Result<(), BrokerError> {
        if self.fail_commits {
            return Err(BrokerError::Unavailable("injected commit failure".to_string()));
        }
        self.commits
            .lock()
            .unwrap()
            .push((record.partition, record.offset));
        Ok(())
    }

    async fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

pub fn record(topic: &str, offset: u64, payload: Vec<u8>) -> Record {
    Record {
        topic: topic.to_string(),
        partition: 0,
        offset,
        key: format!("key-{}", offset),
        payload,
    }
}

/// True once `group` has committed past every record currently in `topic`.
pub async fn all_committed(broker: &InMemoryBroker, topic: &str, group: &str) -> bool {
    for record in broker.records(topic).await {
        match broker.committed(group, &record.topic_partition()).await {
            Some(next) if next > record.offset => {}
            _ => return false,
        }
    }
    true
}

/// Wait for a condition to become true with timeout
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}
