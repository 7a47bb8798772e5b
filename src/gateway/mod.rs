//! Ingestion gateway: the pipeline's only external entry point.
//!
//! [`IngestionGateway`] validates a [`JobRequest`](crate::job::JobRequest),
//! assigns a fresh job id and timestamp, and publishes the job to the
//! inbound topic keyed by that id. A per-instance [`StatusStore`] remembers
//! what this instance accepted; it is never shared and never updated by
//! downstream stages.
//!
//! # HTTP API
//!
//! | Method | Path             | Response                                   |
//! |--------|------------------|--------------------------------------------|
//! | POST   | `/jobs`          | `200 {jobId, topic}`, `400`, `503`          |
//! | GET    | `/jobs/{jobId}`  | `200 {state, payload}`, `404`               |
//! | GET    | `/healthz`       | `200 {ok: true}`                            |

pub mod http;
pub mod request_id;
pub mod service;
pub mod status;

pub use http::{router, serve};
pub use service::{IngestionGateway, SubmitReceipt};
pub use status::{JobState, JobStatus, StatusStore};
