//! Job identifiers.
//!
//! Ids are supplied by the caller (the front end's `step_id`), so unlike a
//! generated id they have to be validated on the way in.

use serde::Serialize;
use std::fmt;

use super::errors::JobError;

/// Identifier of a synthesis job.
///
/// Unique within one registry at a time. Once a record is evicted the same id
/// may be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Parse a caller-supplied id.
    ///
    /// The id becomes part of an artifact file name, so blank ids and ids
    /// that could name another directory are rejected.
    pub fn parse(value: impl Into<String>) -> Result<Self, JobError> {
        let value = value.into();
        let unsafe_name = value == "."
            || value == ".."
            || value.contains(['/', '\\', '\0']);
        if value.trim().is_empty() || unsafe_name {
            return Err(JobError::InvalidId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
