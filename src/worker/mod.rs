//! Worker pool: terminal consumers of the light and heavy route topics.
//!
//! A worker is a [`DispatchLoop`](crate::dispatch::DispatchLoop) driving a
//! [`WorkerStage`]. Each pool (light or heavy) is its own consumer group, so
//! scaling a pool means starting more members in that group.
//!
//! # Components
//!
//! - [`WorkSimulator`]: draws a duration from `[work_ms_min, work_ms_max]`
//!   and either sleeps or spins a CPU-bound loop on a blocking thread
//! - [`WorkerStage`]: wraps the simulator and reports a `processed` outcome
//!
//! Workers publish nothing; the completion record is the only output.

pub mod executor;
pub mod stage;

pub use executor::WorkSimulator;
pub use stage::WorkerStage;
