use std::time::Duration;

use crate::broker::{Delivery, Producer};
use crate::error::DispatchError;

/// Publish `payload` keyed by `key` and wait at most `timeout` for the
/// broker to confirm it. Never retries.
pub async fn publish_confirmed(
    producer: &dyn Producer,
    topic: &str,
    key: &str,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<Delivery, DispatchError> {
    match tokio::time::timeout(timeout, producer.send(topic, key, payload)).await {
        Ok(Ok(delivery)) => Ok(delivery),
        Ok(Err(source)) => Err(DispatchError::Rejected {
            topic: topic.to_string(),
            source,
        }),
        Err(_) => Err(DispatchError::Timeout {
            topic: topic.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
