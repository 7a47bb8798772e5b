//! HTTP contract between the broker service and its clients.
//!
//! Payloads are opaque bytes and travel base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::broker::Record;
use crate::error::BrokerError;

pub const ENDPOINT_HEALTH: &str = "/healthz";

/// Longest long-poll the service will hold a fetch open for.
pub const MAX_FETCH_WAIT_MS: u64 = 30_000;

pub fn records_path(topic: &str) -> String {
    format!("/v1/topics/{}/records", topic)
}

pub fn fetch_path(group_id: &str) -> String {
    format!("/v1/groups/{}/fetch", group_id)
}

pub fn commit_path(group_id: &str) -> String {
    format!("/v1/groups/{}/commit", group_id)
}

pub fn leave_path(group_id: &str) -> String {
    format!("/v1/groups/{}/leave", group_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub key: String,
    pub value: String,
}

impl ProduceRequest {
    pub fn new(key: &str, payload: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            value: STANDARD.encode(payload),
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>, BrokerError> {
        decode_value(&self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub member_id: String,
    pub topics: Vec<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub value: String,
}

impl From<Record> for FetchResponse {
    fn from(record: Record) -> Self {
        Self {
            value: STANDARD.encode(&record.payload),
            topic: record.topic,
            partition: record.partition,
            offset: record.offset,
            key: record.key,
        }
    }
}

impl TryFrom<FetchResponse> for Record {
    type Error = BrokerError;

    fn try_from(response: FetchResponse) -> Result<Self, Self::Error> {
        Ok(Record {
            payload: decode_value(&response.value)?,
            topic: response.topic,
            partition: response.partition,
            offset: response.offset,
            key: response.key,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub topic: String,
    pub partition: u32,
    /// Next offset the group should read.
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub member_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn decode_value(value: &str) -> Result<Vec<u8>, BrokerError> {
    STANDARD
        .decode(value)
        .map_err(|e| BrokerError::Protocol(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_response_carries_payload_bytes() {
        let record = Record {
            topic: "jobs.in".to_string(),
            partition: 2,
            offset: 9,
            key: "job-1".to_string(),
            payload: vec![0, 159, 146, 150],
        };
        let response = FetchResponse::from(record.clone());
        assert_eq!(Record::try_from(response).unwrap(), record);
    }

    #[test]
    fn bad_base64_is_a_protocol_error() {
        let request = ProduceRequest {
            key: "k".to_string(),
            value: "%%%".to_string(),
        };
        assert!(matches!(request.payload(), Err(BrokerError::Protocol(_))));
    }

    #[test]
    fn paths() {
        assert_eq!(records_path("jobs.in"), "/v1/topics/jobs.in/records");
        assert_eq!(fetch_path("classifier-v1"), "/v1/groups/classifier-v1/fetch");
        assert_eq!(commit_path("classifier-v1"), "/v1/groups/classifier-v1/commit");
        assert_eq!(leave_path("classifier-v1"), "/v1/groups/classifier-v1/leave");
    }
}
