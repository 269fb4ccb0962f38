//! Decoded clinical alert types.

use std::{fmt::Display, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most severe.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// informational, no action expected
    Info,
    /// needs attention soon
    Warning,
    /// needs immediate attention
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A decoded alert notification, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// alert identifier
    pub id: String,
    /// identifier of the patient the alert concerns
    pub patient_id: String,
    /// alert severity
    pub severity: Severity,
    /// human readable title
    pub title: String,
    /// key of the rule that raised the alert
    pub rule_key: String,
    /// client-side receipt timestamp, assigned at decode time
    pub received_at: SystemTime,
}
