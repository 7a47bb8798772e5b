use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::broker::protocol::{
    commit_path, fetch_path, leave_path, records_path, CommitRequest, ErrorResponse,
    FetchRequest, FetchResponse, LeaveRequest, ProduceRequest,
};
use crate::broker::{Consumer, Delivery, Producer, Record};
use crate::config::ConsumerConfig;
use crate::error::BrokerError;

/// Extra time allowed on top of the long-poll wait before a fetch request is abandoned.
const FETCH_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed request so an unreachable broker is not hammered.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Client for the broker service started by `doc-router broker`.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBroker {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn producer(&self) -> HttpProducer {
        HttpProducer {
            broker: self.clone(),
        }
    }

    pub fn consumer(&self, config: ConsumerConfig) -> HttpConsumer {
        HttpConsumer {
            broker: self.clone(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub struct HttpProducer {
    broker: HttpBroker,
}

#[async_trait]
impl Producer for HttpProducer {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<Delivery, BrokerError> {
        let response = self
            .broker
            .client
            .post(self.broker.url(&records_path(topic)))
            .json(&ProduceRequest::new(key, &payload))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        response
            .json::<Delivery>()
            .await
            .map_err(|e| BrokerError::Protocol(e.to_string()))
    }
}

pub struct HttpConsumer {
    broker: HttpBroker,
    config: ConsumerConfig,
}

impl HttpConsumer {
    pub fn member_id(&self) -> &str {
        &self.config.member_id
    }

    async fn fetch(&self, timeout: Duration) -> Result<Option<Record>, BrokerError> {
        let request = FetchRequest {
            member_id: self.config.member_id.clone(),
            topics: self.config.topics.clone(),
            timeout_ms: timeout.as_millis() as u64,
        };

        let response = self
            .broker
            .client
            .post(self.broker.url(&fetch_path(&self.config.group_id)))
            .timeout(timeout + FETCH_GRACE)
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<FetchResponse>()
                    .await
                    .map_err(|e| BrokerError::Protocol(e.to_string()))?;
                Record::try_from(body).map(Some)
            }
            _ => Err(rejected(response).await),
        }
    }
}

#[async_trait]
impl Consumer for HttpConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Record, BrokerError>> {
        match self.fetch(timeout).await {
            Ok(record) => record.map(Ok),
            Err(e) => {
                tokio::time::sleep(RETRY_BACKOFF.min(timeout)).await;
                Some(Err(e))
            }
        }
    }

    async fn commit(&mut self, record: &Record) -> Result<(), BrokerError> {
        let request = CommitRequest {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset + 1,
        };

        let response = self
            .broker
            .client
            .post(self.broker.url(&commit_path(&self.config.group_id)))
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejected(response).await)
        }
    }

    /// Best effort: if the broker is unreachable the session simply expires.
    async fn close(&mut self) {
        let request = LeaveRequest {
            member_id: self.config.member_id.clone(),
        };

        let result = self
            .broker
            .client
            .post(self.broker.url(&leave_path(&self.config.group_id)))
            .json(&request)
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(
                group_id = %self.config.group_id,
                member_id = %self.config.member_id,
                error = %e,
                "Failed to leave consumer group"
            );
        }
    }
}

fn unavailable(e: reqwest::Error) -> BrokerError {
    BrokerError::Unavailable(e.to_string())
}

async fn rejected(response: reqwest::Response) -> BrokerError {
    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        BrokerError::UnknownTopicOrPartition(message)
    } else {
        BrokerError::Protocol(format!("{}: {}", status, message))
    }
}
