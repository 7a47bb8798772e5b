//! Wire form of a [`Job`]: a JSON object with named camelCase fields.
//!
//! Every stage encodes and decodes through this module so a record reads the
//! same at every hop. Unknown fields are ignored on decode.

use crate::error::DecodeError;
use crate::job::Job;

pub fn encode(job: &Job) -> Vec<u8> {
    // SAFETY: `Job` only holds strings and integers, which always serialize.
    serde_json::to_vec(job).expect("job record is always serializable")
}

pub fn decode(bytes: &[u8]) -> Result<Job, DecodeError> {
    let job: Job = serde_json::from_slice(bytes)?;

    if job.job_id.is_empty() {
        return Err(DecodeError::InvalidField("jobId is empty".to_string()));
    }
    job.attributes()
        .validate()
        .map_err(|e| DecodeError::InvalidField(e.to_string()))?;

    Ok(job)
}
