//! In-memory partitioned log with consumer groups.
//!
//! ## Model
//! - **Topics** are auto-created on first use with `BrokerConfig::partitions`
//!   partitions. A record's partition is a hash of its key, so every record
//!   for one job id lands in the same partition and keeps its order.
//! - **Consumer groups** keep one committed offset per partition. Members of
//!   a group compete: the group's partitions are dealt out over its live
//!   members (sorted by member id), so each partition has one reader.
//! - **Members** track their own read positions, which run ahead of the
//!   committed offset until they commit. A member that has not fetched for
//!   `session_timeout` is evicted; its partitions move to the remaining
//!   members, which resume from the committed offset.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::broker::{Consumer, Delivery, Producer, Record, TopicPartition};
use crate::config::{BrokerConfig, ConsumerConfig, OffsetReset};
use crate::error::BrokerError;

struct StoredRecord {
    key: String,
    payload: Vec<u8>,
}

struct MemberState {
    last_seen: Instant,
    positions: HashMap<TopicPartition, u64>,
    /// Round-robin cursor over the member's assigned partitions.
    cursor: usize,
}

impl MemberState {
    fn new(now: Instant) -> Self {
        Self {
            last_seen: now,
            positions: HashMap::new(),
            cursor: 0,
        }
    }
}

#[derive(Default)]
struct GroupState {
    committed: HashMap<TopicPartition, u64>,
    members: HashMap<String, MemberState>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    groups: HashMap<String, GroupState>,
}

impl BrokerState {
    fn ensure_topic(&mut self, topic: &str, partitions: u32) {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| (0..partitions).map(|_| Vec::new()).collect());
    }

    fn append(&mut self, topic: &str, key: &str, payload: Vec<u8>, partitions: u32) -> Delivery {
        self.ensure_topic(topic, partitions);
        let logs = self.topics.entry(topic.to_string()).or_default();
        let partition = partition_for(key, logs.len() as u32);
        let log = &mut logs[partition as usize];
        log.push(StoredRecord {
            key: key.to_string(),
            payload,
        });
        Delivery {
            topic: topic.to_string(),
            partition,
            offset: (log.len() - 1) as u64,
        }
    }

    fn next_record(
        &mut self,
        config: &BrokerConfig,
        group_id: &str,
        member_id: &str,
        topics: &[String],
        now: Instant,
    ) -> Option<Record> {
        for topic in topics {
            self.ensure_topic(topic, config.partitions);
        }

        let BrokerState {
            topics: logs,
            groups,
        } = self;

        let mut assignable: Vec<TopicPartition> = Vec::new();
        for topic in topics {
            let partitions = logs.get(topic).map(|p| p.len() as u32).unwrap_or(0);
            assignable.extend((0..partitions).map(|p| TopicPartition::new(topic.clone(), p)));
        }
        assignable.sort();
        assignable.dedup();

        let GroupState { committed, members } = groups.entry(group_id.to_string()).or_default();

        members
            .entry(member_id.to_string())
            .or_insert_with(|| MemberState::new(now))
            .last_seen = now;
        members.retain(|id, member| {
            id == member_id || now.duration_since(member.last_seen) < config.session_timeout
        });

        let mut member_ids: Vec<String> = members.keys().cloned().collect();
        member_ids.sort();
        let member_count = member_ids.len();
        let index = member_ids.iter().position(|id| id == member_id)?;

        let assigned: Vec<TopicPartition> = assignable
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % member_count == index)
            .map(|(_, tp)| tp)
            .collect();

        let member = members.get_mut(member_id)?;
        // Partitions that moved away are re-read from the committed offset
        // if they ever come back.
        member.positions.retain(|tp, _| assigned.contains(tp));

        for step in 0..assigned.len() {
            let slot = (member.cursor + step) % assigned.len();
            let tp = &assigned[slot];
            let log = &logs[&tp.topic][tp.partition as usize];

            let position = *member.positions.entry(tp.clone()).or_insert_with(|| {
                committed
                    .get(tp)
                    .copied()
                    .unwrap_or(match config.auto_offset_reset {
                        OffsetReset::Earliest => 0,
                        OffsetReset::Latest => log.len() as u64,
                    })
            });

            if let Some(stored) = log.get(position as usize) {
                member.positions.insert(tp.clone(), position + 1);
                member.cursor = (slot + 1) % assigned.len();
                return Some(Record {
                    topic: tp.topic.clone(),
                    partition: tp.partition,
                    offset: position,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                });
            }
        }

        None
    }
}

struct Shared {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
    appended: Notify,
}

/// Cheaply cloneable handle; all clones share one log.
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl InMemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(BrokerState::default()),
                appended: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Append a record and wake every waiting fetch.
    pub async fn produce(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<Delivery, BrokerError> {
        if topic.trim().is_empty() {
            return Err(BrokerError::UnknownTopicOrPartition(
                "empty topic name".to_string(),
            ));
        }

        let delivery = {
            let mut state = self.shared.state.lock().await;
            state.append(topic, key, payload, self.shared.config.partitions)
        };
        self.shared.appended.notify_waiters();

        tracing::trace!(
            topic = %delivery.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            key,
            "Record appended"
        );
        Ok(delivery)
    }

    /// Next record for `member_id` of `group_id`, waiting up to `timeout`.
    ///
    /// Also serves as the member's heartbeat.
    pub async fn fetch(
        &self,
        group_id: &str,
        member_id: &str,
        topics: &[String],
        timeout: Duration,
    ) -> Option<Record> {
        let deadline = Instant::now() + timeout;

        loop {
            // Registered before checking so an append in between still wakes us.
            let appended = self.shared.appended.notified();

            {
                let mut state = self.shared.state.lock().await;
                if let Some(record) = state.next_record(
                    &self.shared.config,
                    group_id,
                    member_id,
                    topics,
                    Instant::now(),
                ) {
                    return Some(record);
                }
            }

            if Instant::now() >= deadline {
                return None;
            }
            let _ = tokio::time::timeout_at(deadline, appended).await;
        }
    }

    /// Set the group's committed offset (the next offset to read) for a partition.
    pub async fn commit(
        &self,
        group_id: &str,
        tp: &TopicPartition,
        next_offset: u64,
    ) -> Result<(), BrokerError> {
        let mut state = self.shared.state.lock().await;

        let partitions = state.topics.get(&tp.topic).map(|p| p.len() as u32);
        match partitions {
            Some(n) if tp.partition < n => {}
            _ => return Err(BrokerError::UnknownTopicOrPartition(tp.to_string())),
        }

        state
            .groups
            .entry(group_id.to_string())
            .or_default()
            .committed
            .insert(tp.clone(), next_offset);
        Ok(())
    }

    pub async fn committed(&self, group_id: &str, tp: &TopicPartition) -> Option<u64> {
        let state = self.shared.state.lock().await;
        state
            .groups
            .get(group_id)
            .and_then(|g| g.committed.get(tp).copied())
    }

    /// Remove a member right away instead of waiting for its session to expire.
    pub async fn leave(&self, group_id: &str, member_id: &str) {
        let mut state = self.shared.state.lock().await;
        if let Some(group) = state.groups.get_mut(group_id) {
            group.members.remove(member_id);
        }
    }

    /// Every record of `topic`, partition by partition.
    pub async fn records(&self, topic: &str) -> Vec<Record> {
        let state = self.shared.state.lock().await;
        let Some(logs) = state.topics.get(topic) else {
            return Vec::new();
        };

        logs.iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(offset, stored)| Record {
                    topic: topic.to_string(),
                    partition: partition as u32,
                    offset: offset as u64,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                })
            })
            .collect()
    }

    pub fn consumer(&self, config: ConsumerConfig) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            config,
        }
    }
}

#[async_trait]
impl Producer for InMemoryBroker {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<Delivery, BrokerError> {
        self.produce(topic, key, payload).await
    }
}

/// One group member reading directly from an [`InMemoryBroker`].
pub struct MemoryConsumer {
    broker: InMemoryBroker,
    config: ConsumerConfig,
}

impl MemoryConsumer {
    pub fn member_id(&self) -> &str {
        &self.config.member_id
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Record, BrokerError>> {
        self.broker
            .fetch(
                &self.config.group_id,
                &self.config.member_id,
                &self.config.topics,
                timeout,
            )
            .await
            .map(Ok)
    }

    async fn commit(&mut self, record: &Record) -> Result<(), BrokerError> {
        self.broker
            .commit(
                &self.config.group_id,
                &record.topic_partition(),
                record.offset + 1,
            )
            .await
    }

    /// Leave the group so its partitions are reassigned immediately.
    async fn close(&mut self) {
        self.broker
            .leave(&self.config.group_id, &self.config.member_id)
            .await;
    }
}

/// FNV-1a over the key bytes. Stable across processes and runs.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = key
        .bytes()
        .fold(OFFSET_BASIS, |hash, b| (hash ^ b as u32).wrapping_mul(PRIME));
    hash % partitions.max(1)
}
