//! Size-aware routing of document-processing jobs.
//!
//! Jobs enter through the ingestion [`gateway`], are published to an inbound
//! topic, classified as light or heavy by the [`classifier`] stage and
//! re-published to a route-specific topic, where a [`worker`] pool picks
//! them up. Every hop goes through the [`broker`]; no stage calls another.
//!
//! The classifier and the workers share one consume/transform/produce
//! run-loop, [`dispatch::DispatchLoop`].

pub mod broker;
pub mod classifier;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod job;
pub mod loadgen;
pub mod logging;
pub mod shutdown;
pub mod standalone;
pub mod worker;
