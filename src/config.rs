use std::net::SocketAddr;
use std::time::Duration;

use crate::classifier::Route;
use crate::error::RouterError;

/// Default consumer group of the classifier service.
pub const CLASSIFIER_GROUP: &str = "classifier-v1";
/// Default consumer group of the light worker pool.
pub const LIGHT_WORKER_GROUP: &str = "worker-light-v1";
/// Default consumer group of the heavy worker pool.
pub const HEAVY_WORKER_GROUP: &str = "worker-heavy-v1";

/// Topic names used by the pipeline. Treated as opaque identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Topic the gateway publishes to and the classifier consumes.
    pub inbound: String,
    pub light: String,
    pub heavy: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            inbound: "jobs.in".to_string(),
            light: "jobs.light".to_string(),
            heavy: "jobs.heavy".to_string(),
        }
    }
}

impl TopicConfig {
    /// Destination topic for a classified job.
    pub fn topic_for(&self, route: Route) -> &str {
        match route {
            Route::Light => &self.light,
            Route::Heavy => &self.heavy,
        }
    }
}

/// When a run-loop acknowledges a consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Commit as soon as the message is handed to the loop, before any
    /// publish. A crash before the downstream publish loses the job.
    #[default]
    OnReceipt,
    /// Commit only after the stage ran and its publish was attempted.
    /// A crash before the commit redelivers the job (duplicates downstream).
    AfterDispatch,
}

impl CommitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitPolicy::OnReceipt => "on-receipt",
            CommitPolicy::AfterDispatch => "after-dispatch",
        }
    }
}

impl std::fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "on-receipt" => Ok(CommitPolicy::OnReceipt),
            "after-dispatch" => Ok(CommitPolicy::AfterDispatch),
            other => Err(format!(
                "unknown commit policy '{}', expected on-receipt or after-dispatch",
                other
            )),
        }
    }
}

/// Timing and acknowledgement settings shared by every dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on one broker poll.
    pub poll_timeout: Duration,
    /// Upper bound on waiting for a publish confirmation.
    pub publish_timeout: Duration,
    pub commit_policy: CommitPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            publish_timeout: Duration::from_secs(1),
            commit_policy: CommitPolicy::OnReceipt,
        }
    }
}

impl DispatchConfig {
    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }
}

/// Where a new consumer group starts reading when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

/// Settings for the in-memory broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Partition count for auto-created topics.
    pub partitions: u32,
    pub auto_offset_reset: OffsetReset,
    /// Group members not seen for this long lose their partitions.
    pub session_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            partitions: 3,
            auto_offset_reset: OffsetReset::Earliest,
            session_timeout: Duration::from_secs(10),
        }
    }
}

impl BrokerConfig {
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = session_timeout;
        self
    }
}

/// Identity of one consumer inside a consumer group.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub member_id: String,
    pub topics: Vec<String>,
}

impl ConsumerConfig {
    /// New member of `group_id` with a unique member id.
    pub fn new(group_id: impl Into<String>, topics: Vec<String>) -> Self {
        let group_id = group_id.into();
        let member_id = format!("{}-{}", group_id, uuid::Uuid::new_v4());
        Self {
            group_id,
            member_id,
            topics,
        }
    }

    pub fn with_member_id(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = member_id.into();
        self
    }
}

const DEFAULT_STATUS_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub inbound_topic: String,
    pub publish_timeout: Duration,
    /// Maximum number of entries kept in the per-instance status store.
    pub status_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:8080"
                .parse()
                .expect("default listen address is valid"),
            inbound_topic: TopicConfig::default().inbound,
            publish_timeout: Duration::from_secs(2),
            status_capacity: DEFAULT_STATUS_CAPACITY,
        }
    }
}

impl GatewayConfig {
    pub fn new(listen_addr: SocketAddr, inbound_topic: impl Into<String>) -> Self {
        Self {
            listen_addr,
            inbound_topic: inbound_topic.into(),
            ..Default::default()
        }
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn with_status_capacity(mut self, status_capacity: usize) -> Self {
        self.status_capacity = status_capacity;
        self
    }
}

/// Simulated processing cost of one job on a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkConfig {
    pub min_ms: u64,
    pub max_ms: u64,
    /// Spin the CPU instead of sleeping.
    pub busy_cpu: bool,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            min_ms: 50,
            max_ms: 300,
            busy_cpu: false,
        }
    }
}

impl WorkConfig {
    pub fn new(min_ms: u64, max_ms: u64, busy_cpu: bool) -> Result<Self, RouterError> {
        if min_ms > max_ms {
            return Err(RouterError::Config(format!(
                "work_ms_min ({}) must not exceed work_ms_max ({})",
                min_ms, max_ms
            )));
        }
        Ok(Self {
            min_ms,
            max_ms,
            busy_cpu,
        })
    }
}
