//! Whole pipeline in one process.
//!
//! Hosts an [`InMemoryBroker`], the ingestion gateway, the classifier and
//! one light and one heavy worker, each on its own task. Every component
//! watches the same [`CancellationToken`], so one signal stops them all.
//! The broker can optionally be exposed over HTTP so extra classifier or
//! worker processes can join the same consumer groups.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::broker::{server, Consumer, InMemoryBroker, Producer};
use crate::classifier::ClassifierStage;
use crate::config::{
    BrokerConfig, ConsumerConfig, DispatchConfig, GatewayConfig, TopicConfig, WorkConfig,
    CLASSIFIER_GROUP, HEAVY_WORKER_GROUP, LIGHT_WORKER_GROUP,
};
use crate::dispatch::{CompletionRecord, DispatchLoop, Stage};
use crate::error::Result;
use crate::gateway::{self, IngestionGateway};
use crate::worker::{WorkSimulator, WorkerStage};

#[derive(Debug, Clone)]
pub struct StandaloneConfig {
    pub gateway: GatewayConfig,
    /// Also serve the broker over HTTP on this address.
    pub broker_addr: Option<SocketAddr>,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub dispatch: DispatchConfig,
    pub light_work: WorkConfig,
    pub heavy_work: WorkConfig,
}

impl Default for StandaloneConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            broker_addr: None,
            broker: BrokerConfig::default(),
            dispatch: DispatchConfig::default(),
            light_work: WorkConfig::default(),
            heavy_work: WorkConfig::default(),
            topics: TopicConfig::default(),
        }
    }
}

/// A running standalone pipeline.
pub struct Standalone {
    broker: InMemoryBroker,
    gateway_addr: SocketAddr,
    broker_addr: Option<SocketAddr>,
    tasks: JoinSet<()>,
}

impl Standalone {
    /// Bind every listener and spawn every component.
    ///
    /// Completion records from the classifier and both workers are also
    /// sent to `completions` when given.
    pub async fn start(
        config: StandaloneConfig,
        shutdown: CancellationToken,
        completions: Option<mpsc::Sender<CompletionRecord>>,
    ) -> Result<Self> {
        let broker = InMemoryBroker::new(config.broker.clone());
        let producer: Arc<dyn Producer> = Arc::new(broker.clone());
        let mut tasks = JoinSet::new();

        let broker_addr = match config.broker_addr {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await?;
                let bound = listener.local_addr()?;
                let (broker, shutdown) = (broker.clone(), shutdown.clone());
                tasks.spawn(async move {
                    if let Err(e) = server::serve(listener, broker, shutdown).await {
                        tracing::error!(error = %e, "Broker service failed");
                    }
                });
                Some(bound)
            }
            None => None,
        };

        let gateway_config = GatewayConfig {
            inbound_topic: config.topics.inbound.clone(),
            ..config.gateway.clone()
        };
        let listener = TcpListener::bind(gateway_config.listen_addr).await?;
        let gateway_addr = listener.local_addr()?;
        let gateway = IngestionGateway::new(producer.clone(), gateway_config);
        {
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                if let Err(e) = gateway::serve(listener, gateway, shutdown).await {
                    tracing::error!(error = %e, "Ingestion gateway failed");
                }
            });
        }

        let classifier = DispatchLoop::new(
            broker.consumer(ConsumerConfig::new(
                CLASSIFIER_GROUP,
                vec![config.topics.inbound.clone()],
            )),
            ClassifierStage::new(config.topics.clone()),
            config.dispatch.clone(),
        )
        .with_producer(producer);
        let classifier = attach(classifier, &completions);
        spawn_loop(&mut tasks, classifier, &shutdown);

        for (group, topic, work) in [
            (LIGHT_WORKER_GROUP, &config.topics.light, &config.light_work),
            (HEAVY_WORKER_GROUP, &config.topics.heavy, &config.heavy_work),
        ] {
            let worker = DispatchLoop::new(
                broker.consumer(ConsumerConfig::new(group, vec![topic.clone()])),
                WorkerStage::new(topic.clone(), WorkSimulator::new(work.clone())),
                config.dispatch.clone(),
            );
            let worker = attach(worker, &completions);
            spawn_loop(&mut tasks, worker, &shutdown);
        }

        tracing::info!(
            gateway_addr = %gateway_addr,
            broker_addr = ?broker_addr,
            "Standalone pipeline started"
        );

        Ok(Self {
            broker,
            gateway_addr,
            broker_addr,
            tasks,
        })
    }

    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    pub fn gateway_addr(&self) -> SocketAddr {
        self.gateway_addr
    }

    pub fn broker_addr(&self) -> Option<SocketAddr> {
        self.broker_addr
    }

    /// Wait for every component to stop. Returns once the shutdown token
    /// has been cancelled and all tasks have drained.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Standalone task panicked");
            }
        }
        tracing::info!("Standalone pipeline stopped");
    }
}

fn attach<C, S>(
    dispatch: DispatchLoop<C, S>,
    completions: &Option<mpsc::Sender<CompletionRecord>>,
) -> DispatchLoop<C, S>
where
    C: Consumer,
    S: Stage,
{
    match completions {
        Some(tx) => dispatch.with_completions(tx.clone()),
        None => dispatch,
    }
}

fn spawn_loop<C, S>(
    tasks: &mut JoinSet<()>,
    dispatch: DispatchLoop<C, S>,
    shutdown: &CancellationToken,
) where
    C: Consumer + 'static,
    S: Stage + 'static,
{
    let shutdown = shutdown.clone();
    tasks.spawn(async move {
        dispatch.run(shutdown).await;
    });
}
