use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const FILE_SIZE_MB_MIN: i64 = 1;
pub const FILE_SIZE_MB_MAX: i64 = 500;
pub const PAGE_COUNT_MIN: i64 = 1;
pub const PAGE_COUNT_MAX: i64 = 5000;
pub const IMAGE_COUNT_MIN: i64 = 0;
pub const IMAGE_COUNT_MAX: i64 = 5000;

/// Opaque job identifier. Also the broker message key at every hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Fresh random identifier, assigned once at ingestion.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared size of a document. The only input to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobAttributes {
    pub file_size_mb: u32,
    pub page_count: u32,
    pub image_count: u32,
}

impl JobAttributes {
    pub fn new(file_size_mb: u32, page_count: u32, image_count: u32) -> Self {
        Self {
            file_size_mb,
            page_count,
            image_count,
        }
    }

    /// Check every attribute against the ingestion bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range(
            "fileSizeMb",
            self.file_size_mb as i64,
            FILE_SIZE_MB_MIN,
            FILE_SIZE_MB_MAX,
        )?;
        check_range(
            "pageCount",
            self.page_count as i64,
            PAGE_COUNT_MIN,
            PAGE_COUNT_MAX,
        )?;
        check_range(
            "imageCount",
            self.image_count as i64,
            IMAGE_COUNT_MIN,
            IMAGE_COUNT_MAX,
        )?;
        Ok(())
    }
}

/// Job request as received from an external client.
///
/// Fields are optional and signed so that missing or negative values reach
/// [`JobRequest::validate`] and come back as a [`ValidationError`] instead of
/// a generic deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub file_size_mb: Option<i64>,
    pub page_count: Option<i64>,
    pub image_count: Option<i64>,
}

impl JobRequest {
    pub fn new(file_size_mb: i64, page_count: i64, image_count: i64) -> Self {
        Self {
            file_size_mb: Some(file_size_mb),
            page_count: Some(page_count),
            image_count: Some(image_count),
        }
    }

    pub fn validate(&self) -> Result<JobAttributes, ValidationError> {
        let file_size_mb = require(
            "fileSizeMb",
            self.file_size_mb,
            FILE_SIZE_MB_MIN,
            FILE_SIZE_MB_MAX,
        )?;
        let page_count = require(
            "pageCount",
            self.page_count,
            PAGE_COUNT_MIN,
            PAGE_COUNT_MAX,
        )?;
        let image_count = require(
            "imageCount",
            self.image_count,
            IMAGE_COUNT_MIN,
            IMAGE_COUNT_MAX,
        )?;
        Ok(JobAttributes::new(file_size_mb, page_count, image_count))
    }
}

fn require(
    field: &'static str,
    value: Option<i64>,
    min: i64,
    max: i64,
) -> Result<u32, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?;
    check_range(field, value, min, max)?;
    // Bounds are well inside u32.
    Ok(value as u32)
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Canonical pipeline record.
///
/// Built once by the gateway and passed by reference through every stage;
/// stages re-publish the same value and never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub file_size_mb: u32,
    pub page_count: u32,
    pub image_count: u32,
    /// Epoch seconds. Records from older gateways carry this as `ts`.
    #[serde(alias = "ts")]
    pub submitted_at: i64,
}

impl Job {
    pub fn new(attributes: JobAttributes) -> Self {
        Self::with_id(JobId::generate(), attributes, Utc::now().timestamp())
    }

    pub fn with_id(job_id: JobId, attributes: JobAttributes, submitted_at: i64) -> Self {
        Self {
            job_id,
            file_size_mb: attributes.file_size_mb,
            page_count: attributes.page_count,
            image_count: attributes.image_count,
            submitted_at,
        }
    }

    pub fn attributes(&self) -> JobAttributes {
        JobAttributes::new(self.file_size_mb, self.page_count, self.image_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_within_bounds_validates() {
        let attrs = JobRequest::new(10, 5, 0).validate().unwrap();
        assert_eq!(attrs, JobAttributes::new(10, 5, 0));
    }

    #[test]
    fn request_accepts_inclusive_upper_bounds() {
        let attrs = JobRequest::new(500, 5000, 5000).validate().unwrap();
        assert_eq!(attrs, JobAttributes::new(500, 5000, 5000));
    }

    #[test]
    fn request_rejects_oversized_file() {
        let err = JobRequest::new(600, 5, 2).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: "fileSizeMb",
                value: 600,
                min: 1,
                max: 500,
            }
        );
    }

    #[test]
    fn request_rejects_zero_pages_and_negative_images() {
        assert!(matches!(
            JobRequest::new(1, 0, 0).validate(),
            Err(ValidationError::OutOfRange { field: "pageCount", .. })
        ));
        assert!(matches!(
            JobRequest::new(1, 1, -1).validate(),
            Err(ValidationError::OutOfRange { field: "imageCount", .. })
        ));
    }

    #[test]
    fn request_rejects_missing_field() {
        let req = JobRequest {
            file_size_mb: Some(10),
            page_count: None,
            image_count: Some(1),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::Missing { field: "pageCount" }
        );
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = Job::new(JobAttributes::new(10, 5, 2));
        let b = Job::new(JobAttributes::new(10, 5, 2));
        assert_ne!(a.job_id, b.job_id);
        assert!(!a.job_id.is_empty());
    }

    #[test]
    fn job_exposes_its_attributes() {
        let job = Job::with_id(JobId::from("j-1"), JobAttributes::new(80, 5, 2), 1_700_000_000);
        assert_eq!(job.attributes(), JobAttributes::new(80, 5, 2));
        assert_eq!(job.submitted_at, 1_700_000_000);
    }
}
