use clap::{Args as ClapArgs, Parser, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use doc_router::broker::{server, HttpBroker, InMemoryBroker, Producer};
use doc_router::classifier::ClassifierStage;
use doc_router::client::GatewayClient;
use doc_router::config::{
    BrokerConfig, CommitPolicy, ConsumerConfig, DispatchConfig, GatewayConfig, TopicConfig,
    WorkConfig, CLASSIFIER_GROUP, LIGHT_WORKER_GROUP,
};
use doc_router::dispatch::DispatchLoop;
use doc_router::gateway::{self, IngestionGateway};
use doc_router::job::JobRequest;
use doc_router::loadgen::{self, LoadgenConfig};
use doc_router::logging::{init_tracing, LogFormat};
use doc_router::shutdown::install_shutdown_handler;
use doc_router::standalone::{Standalone, StandaloneConfig};
use doc_router::worker::{WorkSimulator, WorkerStage};

#[derive(Parser, Debug)]
#[command(name = "doc-router")]
#[command(version)]
#[command(about = "Routes document-processing jobs to light and heavy worker pools")]
#[command(propagate_version = true)]
struct Args {
    /// Log output format (text or json)
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the broker service
    Broker(BrokerArgs),

    /// Run the ingestion gateway
    Gateway(GatewayArgs),

    /// Run the classifier service
    Classifier(ClassifierArgs),

    /// Run a worker on one route topic
    Worker(WorkerArgs),

    /// Run broker, gateway, classifier and both worker pools in one process
    Standalone(StandaloneArgs),

    /// Submit synthetic light/heavy traffic to a gateway
    Loadgen(LoadgenArgs),

    /// Job commands against a running gateway
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

// =============================================================================
// Service Arguments
// =============================================================================

#[derive(ClapArgs, Debug)]
struct BrokerArgs {
    /// Address to serve the broker API on
    #[arg(long, env = "BROKER_LISTEN", default_value = "0.0.0.0:9092")]
    listen: SocketAddr,

    /// Partitions per auto-created topic
    #[arg(long, default_value = "3")]
    partitions: u32,

    /// Evict group members not seen for this long
    #[arg(long, default_value = "10000")]
    session_timeout_ms: u64,
}

#[derive(ClapArgs, Debug)]
struct BrokerClientArgs {
    /// Base URL of the broker service
    #[arg(long, env = "BROKER_URL", default_value = "http://127.0.0.1:9092")]
    broker_url: String,
}

#[derive(ClapArgs, Debug)]
struct TopicArgs {
    #[arg(long, env = "TOPIC_IN", default_value = "jobs.in")]
    topic_in: String,

    #[arg(long, env = "TOPIC_LIGHT", default_value = "jobs.light")]
    topic_light: String,

    #[arg(long, env = "TOPIC_HEAVY", default_value = "jobs.heavy")]
    topic_heavy: String,
}

impl TopicArgs {
    fn to_config(&self) -> TopicConfig {
        TopicConfig {
            inbound: self.topic_in.clone(),
            light: self.topic_light.clone(),
            heavy: self.topic_heavy.clone(),
        }
    }
}

#[derive(ClapArgs, Debug)]
struct DispatchArgs {
    /// When consumed messages are acknowledged (on-receipt or after-dispatch)
    #[arg(long, env = "COMMIT_POLICY", default_value = "on-receipt")]
    commit_policy: CommitPolicy,

    #[arg(long, default_value = "1000")]
    poll_timeout_ms: u64,

    #[arg(long, default_value = "1000")]
    publish_timeout_ms: u64,
}

impl DispatchArgs {
    fn to_config(&self) -> DispatchConfig {
        DispatchConfig::default()
            .with_commit_policy(self.commit_policy)
            .with_poll_timeout(Duration::from_millis(self.poll_timeout_ms))
            .with_publish_timeout(Duration::from_millis(self.publish_timeout_ms))
    }
}

#[derive(ClapArgs, Debug)]
struct WorkArgs {
    #[arg(long, env = "WORK_MS_MIN", default_value = "50")]
    work_ms_min: u64,

    #[arg(long, env = "WORK_MS_MAX", default_value = "300")]
    work_ms_max: u64,

    /// Spin the CPU instead of sleeping
    #[arg(long, env = "BUSY_CPU")]
    busy_cpu: bool,
}

impl WorkArgs {
    fn to_config(&self) -> doc_router::error::Result<WorkConfig> {
        WorkConfig::new(self.work_ms_min, self.work_ms_max, self.busy_cpu)
    }
}

#[derive(ClapArgs, Debug)]
struct GatewayArgs {
    #[arg(long, env = "GATEWAY_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    #[command(flatten)]
    broker: BrokerClientArgs,

    #[arg(long, env = "TOPIC_IN", default_value = "jobs.in")]
    topic_in: String,

    /// How long to wait for the broker to confirm a submission
    #[arg(long, default_value = "2000")]
    publish_timeout_ms: u64,
}

#[derive(ClapArgs, Debug)]
struct ClassifierArgs {
    #[command(flatten)]
    broker: BrokerClientArgs,

    #[command(flatten)]
    topics: TopicArgs,

    #[arg(long, env = "GROUP_ID", default_value = CLASSIFIER_GROUP)]
    group_id: String,

    #[command(flatten)]
    dispatch: DispatchArgs,
}

#[derive(ClapArgs, Debug)]
struct WorkerArgs {
    #[command(flatten)]
    broker: BrokerClientArgs,

    /// Route topic to consume
    #[arg(long, env = "TOPIC", default_value = "jobs.light")]
    topic: String,

    #[arg(long, env = "GROUP_ID", default_value = LIGHT_WORKER_GROUP)]
    group_id: String,

    #[command(flatten)]
    work: WorkArgs,

    #[command(flatten)]
    dispatch: DispatchArgs,
}

#[derive(ClapArgs, Debug)]
struct StandaloneArgs {
    /// Gateway listen address
    #[arg(long, env = "GATEWAY_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Also expose the broker API on this address
    #[arg(long, env = "BROKER_LISTEN")]
    broker_listen: Option<SocketAddr>,

    #[arg(long, default_value = "3")]
    partitions: u32,

    #[command(flatten)]
    topics: TopicArgs,

    #[command(flatten)]
    work: WorkArgs,

    #[command(flatten)]
    dispatch: DispatchArgs,
}

#[derive(ClapArgs, Debug)]
struct LoadgenArgs {
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    #[arg(long, default_value = "200")]
    jobs: u32,

    /// Probability that a generated job is heavy
    #[arg(long, default_value = "0.35")]
    heavy_ratio: f64,

    /// Pause between submissions
    #[arg(long, default_value = "10")]
    sleep_ms: u64,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(ClapArgs, Debug)]
struct ClientArgs {
    /// Gateway address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Submit a job
    Submit {
        #[arg(long)]
        file_size_mb: i64,

        #[arg(long)]
        page_count: i64,

        #[arg(long)]
        image_count: i64,
    },
    /// Show the status recorded by the gateway that accepted the job
    Status {
        /// The job ID
        job_id: String,
    },
}

// =============================================================================
// Service Runners
// =============================================================================

async fn run_broker(args: BrokerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = BrokerConfig::default()
        .with_partitions(args.partitions)
        .with_session_timeout(Duration::from_millis(args.session_timeout_ms));

    let shutdown = install_shutdown_handler();
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    server::serve(listener, InMemoryBroker::new(config), shutdown).await?;
    Ok(())
}

async fn run_gateway(args: GatewayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::new(args.listen, args.topic_in)
        .with_publish_timeout(Duration::from_millis(args.publish_timeout_ms));
    let producer: Arc<dyn Producer> = Arc::new(HttpBroker::new(args.broker.broker_url).producer());

    let shutdown = install_shutdown_handler();
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    gateway::serve(listener, IngestionGateway::new(producer, config), shutdown).await?;
    Ok(())
}

async fn run_classifier(args: ClassifierArgs) -> Result<(), Box<dyn std::error::Error>> {
    let topics = args.topics.to_config();
    let broker = HttpBroker::new(args.broker.broker_url);
    let consumer = broker.consumer(ConsumerConfig::new(
        args.group_id.clone(),
        vec![topics.inbound.clone()],
    ));

    tracing::info!(
        broker_url = broker.base_url(),
        group_id = %args.group_id,
        member_id = consumer.member_id(),
        topic_in = %topics.inbound,
        "Starting classifier"
    );

    let shutdown = install_shutdown_handler();
    let stats = DispatchLoop::new(
        consumer,
        ClassifierStage::new(topics),
        args.dispatch.to_config(),
    )
    .with_producer(Arc::new(broker.producer()))
    .run(shutdown)
    .await;

    tracing::info!(consumed = stats.consumed, published = stats.published, "Classifier stopped");
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let work = args.work.to_config()?;
    let broker = HttpBroker::new(args.broker.broker_url);
    let consumer = broker.consumer(ConsumerConfig::new(
        args.group_id.clone(),
        vec![args.topic.clone()],
    ));

    tracing::info!(
        broker_url = broker.base_url(),
        group_id = %args.group_id,
        member_id = consumer.member_id(),
        topic = %args.topic,
        work_ms_min = work.min_ms,
        work_ms_max = work.max_ms,
        busy_cpu = work.busy_cpu,
        "Starting worker"
    );

    let shutdown = install_shutdown_handler();
    let stats = DispatchLoop::new(
        consumer,
        WorkerStage::new(args.topic, WorkSimulator::new(work)),
        args.dispatch.to_config(),
    )
    .run(shutdown)
    .await;

    tracing::info!(consumed = stats.consumed, completed = stats.completed, "Worker stopped");
    Ok(())
}

async fn run_standalone(args: StandaloneArgs) -> Result<(), Box<dyn std::error::Error>> {
    let work = args.work.to_config()?;
    let topics = args.topics.to_config();
    let config = StandaloneConfig {
        gateway: GatewayConfig::new(args.listen, topics.inbound.clone()),
        broker_addr: args.broker_listen,
        broker: BrokerConfig::default().with_partitions(args.partitions),
        topics,
        dispatch: args.dispatch.to_config(),
        light_work: work.clone(),
        heavy_work: work,
    };

    let shutdown = install_shutdown_handler();
    Standalone::start(config, shutdown, None).await?.wait().await;
    Ok(())
}

async fn run_loadgen(args: LoadgenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = GatewayClient::new(args.base_url)?;
    let config = LoadgenConfig::default()
        .with_jobs(args.jobs)
        .with_heavy_ratio(args.heavy_ratio)
        .with_pause(Duration::from_millis(args.sleep_ms));

    let report = loadgen::run(&client, &config).await;
    println!("sent={} ok={}", report.sent, report.ok);
    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

async fn handle_job_submit(
    client: &GatewayClient,
    request: JobRequest,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match client.submit(&request).await {
        Ok(receipt) => match output_format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
            OutputFormat::Table => {
                println!("Job submitted successfully!");
                println!("Job ID: {}", receipt.job_id);
                println!("Topic:  {}", receipt.topic);
            }
        },
        Err(e) => {
            eprintln!("Error: Job submission failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn handle_job_status(
    client: &GatewayClient,
    job_id: String,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(status) = client.status(&job_id).await? else {
        eprintln!("Error: jobId {} not found on {}", job_id, client.base_url());
        eprintln!("Hint: status is only kept by the gateway instance that accepted the job");
        std::process::exit(1);
    };

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            let job = &status.payload;
            println!("Job ID:        {}", job.job_id);
            println!("State:         {:?}", status.state);
            println!("File Size MB:  {}", job.file_size_mb);
            println!("Page Count:    {}", job.page_count);
            println!("Image Count:   {}", job.image_count);
            println!("Submitted At:  {}", job.submitted_at);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Broker(broker_args) => {
            init_tracing(args.log_format);
            run_broker(broker_args).await?;
        }
        Commands::Gateway(gateway_args) => {
            init_tracing(args.log_format);
            run_gateway(gateway_args).await?;
        }
        Commands::Classifier(classifier_args) => {
            init_tracing(args.log_format);
            run_classifier(classifier_args).await?;
        }
        Commands::Worker(worker_args) => {
            init_tracing(args.log_format);
            run_worker(worker_args).await?;
        }
        Commands::Standalone(standalone_args) => {
            init_tracing(args.log_format);
            run_standalone(standalone_args).await?;
        }
        Commands::Loadgen(loadgen_args) => {
            init_tracing(args.log_format);
            run_loadgen(loadgen_args).await?;
        }
        Commands::Job { client, command } => {
            let gateway = GatewayClient::new(client.addr.clone())?;

            match command {
                JobCommands::Submit {
                    file_size_mb,
                    page_count,
                    image_count,
                } => {
                    let request = JobRequest::new(file_size_mb, page_count, image_count);
                    handle_job_submit(&gateway, request, &client.output).await?;
                }
                JobCommands::Status { job_id } => {
                    handle_job_status(&gateway, job_id, &client.output).await?;
                }
            }
        }
    }

    Ok(())
}
