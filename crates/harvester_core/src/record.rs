use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::TargetId;

/// Field name to value. Ordered so output is deterministic.
pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    /// The target was processed and had nothing to extract. Not a failure.
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Network,
    Tls,
    Cancelled,
    InvalidUrl,
    HttpStatus(u16),
    MalformedContent,
    MalformedInput,
}

impl FailureKind {
    /// Whether another fetch attempt could plausibly succeed.
    /// Client errors are final except request timeout and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Network | FailureKind::Tls => true,
            FailureKind::HttpStatus(code) => !(400..500).contains(code) || matches!(code, 408 | 429),
            FailureKind::Cancelled
            | FailureKind::InvalidUrl
            | FailureKind::MalformedContent
            | FailureKind::MalformedInput => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Tls => write!(f, "tls error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::MalformedContent => write!(f, "malformed content"),
            FailureKind::MalformedInput => write!(f, "malformed input row"),
        }
    }
}

/// The single terminal result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedRecord {
    pub target_id: TargetId,
    pub status: RecordStatus,
    /// One map per extracted item: a single map for a contact email, one per
    /// listing entry for a listing query. Empty unless `status` is `Ok`.
    pub fields: Vec<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub retries: u32,
}

impl ExtractedRecord {
    pub fn found(target_id: TargetId, fields: Vec<Fields>) -> Self {
        Self {
            target_id,
            status: RecordStatus::Ok,
            fields,
            failure: None,
            retries: 0,
        }
    }

    pub fn not_found(target_id: TargetId) -> Self {
        Self {
            target_id,
            status: RecordStatus::NotFound,
            fields: Vec::new(),
            failure: None,
            retries: 0,
        }
    }

    pub fn failed(target_id: TargetId, kind: FailureKind) -> Self {
        Self {
            target_id,
            status: RecordStatus::Error,
            fields: Vec::new(),
            failure: Some(kind),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Value of `name` in the first field map, if any.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.fields
            .first()
            .and_then(|fields| fields.get(name))
            .map(String::as_str)
    }
}
