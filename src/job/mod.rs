pub mod codec;
pub mod record;

pub use codec::{decode, encode};
pub use record::{Job, JobAttributes, JobId, JobRequest};
