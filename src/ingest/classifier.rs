//! Event payload classification.
//!
//! Device firmware is inconsistent about framing: some devices publish a
//! flat JSON object, others wrap the interesting fields in a `data` field
//! whose value is itself a JSON-encoded string (double encoding). The
//! classifier resolves both shapes into an event type and an optional
//! numeric value.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("payload is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// `"unknown"` when no usable `event` field was found.
    pub event_type: String,
    pub value: Option<f64>,
}

impl Classification {
    pub fn is_motion(&self) -> bool {
        matches!(self.event_type.as_str(), "motion" | "motion_detected")
    }
}

/// Classify a raw message body.
///
/// A `data` field holding a string is treated as a second JSON document and
/// its fields take precedence. A `data` field that is absent, already an
/// object, or a string that does not parse is not an error; lookup falls
/// back to the outer object. Only an unparseable outer payload fails.
pub fn classify(payload: &[u8]) -> Result<Classification, ClassifyError> {
    let outer: Value = serde_json::from_slice(payload)?;

    let nested: Option<Value> = outer
        .get("data")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok());

    let event_type = non_empty_str(nested.as_ref(), "event")
        .or_else(|| non_empty_str(Some(&outer), "event"))
        .unwrap_or("unknown")
        .to_owned();

    // Motion events always carry a value: an explicit count when the device
    // reports one (nested takes precedence), otherwise 1. Other event types
    // carry no value.
    let value = if matches!(event_type.as_str(), "motion" | "motion_detected") {
        let count = nested
            .as_ref()
            .and_then(|n| n.get("count"))
            .and_then(Value::as_f64)
            .or_else(|| outer.get("count").and_then(Value::as_f64));
        Some(count.unwrap_or(1.0))
    } else {
        None
    };

    Ok(Classification { event_type, value })
}

fn non_empty_str<'a>(obj: Option<&'a Value>, key: &str) -> Option<&'a str> {
    obj.and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_motion_payload_with_count() {
        let c = classify(br#"{"event":"motion_detected","count":3}"#).unwrap();
        assert_eq!(c.event_type, "motion_detected");
        assert_eq!(c.value, Some(3.0));
    }

    #[test]
    fn nested_data_takes_precedence() {
        let c = classify(br#"{"data":"{\"event\":\"motion_detected\",\"count\":5}"}"#).unwrap();
        assert_eq!(c.event_type, "motion_detected");
        assert_eq!(c.value, Some(5.0));
    }

    #[test]
    fn nested_count_without_event_stays_unknown_and_unvalued() {
        let c = classify(br#"{"data":"{\"count\":5}"}"#).unwrap();
        assert_eq!(c.event_type, "unknown");
        assert_eq!(c.value, None);
    }

    #[test]
    fn motion_without_count_defaults_to_one() {
        let c = classify(br#"{"event":"motion"}"#).unwrap();
        assert_eq!(c.event_type, "motion");
        assert_eq!(c.value, Some(1.0));
    }

    #[test]
    fn nested_count_preferred_over_outer() {
        let c =
            classify(br#"{"count":9,"data":"{\"event\":\"motion\",\"count\":2}"}"#).unwrap();
        assert_eq!(c.value, Some(2.0));
    }

    #[test]
    fn outer_count_used_when_nested_has_none() {
        let c = classify(br#"{"count":7,"data":"{\"event\":\"motion\"}"}"#).unwrap();
        assert_eq!(c.value, Some(7.0));
    }

    #[test]
    fn data_as_object_is_ignored_for_nesting() {
        let c = classify(br#"{"event":"door_open","data":{"event":"motion"}}"#).unwrap();
        assert_eq!(c.event_type, "door_open");
        assert_eq!(c.value, None);
    }

    #[test]
    fn unparseable_data_string_falls_back_to_outer() {
        let c = classify(br#"{"event":"motion","data":"not json"}"#).unwrap();
        assert_eq!(c.event_type, "motion");
        assert_eq!(c.value, Some(1.0));
    }

    #[test]
    fn empty_event_string_falls_back() {
        let c = classify(br#"{"event":"","data":"{\"event\":\"\"}"}"#).unwrap();
        assert_eq!(c.event_type, "unknown");
    }

    #[test]
    fn non_motion_event_has_no_value() {
        let c = classify(br#"{"event":"temperature","count":4}"#).unwrap();
        assert_eq!(c.event_type, "temperature");
        assert_eq!(c.value, None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let err = classify(b"{not json").unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedPayload(_)));
    }
}
