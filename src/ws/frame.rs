//! Alert stream wire frame types.

use std::time::SystemTime;

use serde::Deserialize;
use snafu::prelude::*;

use super::alert::{Alert, Severity};

/// frame type value carrying a new alert
pub(crate) const ALERT_CREATED_TYPE: &str = "ALERT_CREATED";

/// Error when parse frame text as a typed frame
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ParseFrameError {
    /// text is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// source error
        source: serde_json::Error,
    },

    /// frame json is not an object
    #[snafu(display("parsed frame is not object: {json}"))]
    FrameNotObject {
        /// json string
        json: String,
    },

    /// frame json has no type field
    #[snafu(display("frame has no type field: {json}"))]
    NoFrameType {
        /// json string
        json: String,
    },

    /// frame json type field is not string type
    #[snafu(display("frame has non-string type field: {json}"))]
    FrameTypeNotString {
        /// json string
        json: String,
    },

    /// frame json has no data field
    #[snafu(display("frame has no data field: {json}"))]
    NoFrameData {
        /// json string
        json: String,
    },

    /// frame data is not a valid alert payload
    #[snafu(display("parse frame data to alert failed: {source}"))]
    ParseAlertFailed {
        /// source error
        source: serde_json::Error,
    },
}

/// wire shape of the data field of an `ALERT_CREATED` frame
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertData {
    alert_id: String,
    patient_id: String,
    severity: Severity,
    title: String,
    rule_key: String,
}

/// One decoded inbound frame.
#[derive(Debug)]
pub(crate) enum Frame {
    /// an alert delivery frame
    AlertCreated(Alert),
    /// a well-formed frame of a type this client does not know
    Unrecognized {
        /// the frame type value
        kind: String,
    },
}

impl Frame {
    /// Decode frame text to a frame.
    ///
    /// The alert receipt timestamp is assigned here, at decode time.
    pub fn decode(text: &str) -> Result<Self, ParseFrameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).context(error::ParseJSONFailed)?;

        let obj = value.as_object().with_context(|| error::FrameNotObject {
            json: text.to_string(),
        })?;

        let kind = obj
            .get("type")
            .with_context(|| error::NoFrameType {
                json: text.to_string(),
            })?
            .as_str()
            .with_context(|| error::FrameTypeNotString {
                json: text.to_string(),
            })?;

        if kind != ALERT_CREATED_TYPE {
            return Ok(Self::Unrecognized {
                kind: kind.to_string(),
            });
        }

        let data = obj.get("data").with_context(|| error::NoFrameData {
            json: text.to_string(),
        })?;

        let data: AlertData =
            serde_json::from_value(data.clone()).context(error::ParseAlertFailed)?;

        Ok(Self::AlertCreated(Alert {
            id: data.alert_id,
            patient_id: data.patient_id,
            severity: data.severity,
            title: data.title,
            rule_key: data.rule_key,
            received_at: SystemTime::now(),
        }))
    }
}
