//! The consume → transform → produce run-loop shared by every stage.
//!
//! # Components
//!
//! - [`DispatchLoop`]: polls a [`Consumer`](crate::broker::Consumer), decodes
//!   each record, hands the job to a [`Stage`], publishes to the stage's
//!   destination (if any) and commits according to the
//!   [`CommitPolicy`](crate::config::CommitPolicy).
//! - [`Stage`]: the per-service transform (classifier or worker).
//! - [`CompletionRecord`]: the structured per-job trace each loop emits.
//! - [`publish_confirmed`]: keyed publish with a bounded wait for the
//!   broker's confirmation, also used by the ingestion gateway.
//!
//! # Failure handling
//!
//! | Condition            | Effect                                             |
//! |----------------------|----------------------------------------------------|
//! | poll error           | logged, next poll                                  |
//! | undecodable payload  | logged, skipped, still committed                   |
//! | publish fails/timeout| logged, input still committed, never retried here |
//! | commit fails         | logged, the message may be redelivered             |

mod completion;
mod dispatch_loop;
mod publish;
mod stage;

pub use completion::CompletionRecord;
pub use dispatch_loop::{DispatchLoop, LoopStats};
pub use publish::publish_confirmed;
pub use stage::{Outcome, Stage};
