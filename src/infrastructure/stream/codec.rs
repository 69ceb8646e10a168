//! Feed Codec
//!
//! Decodes inbound JSON frames into [`FeedMessage`]s and serializes
//! outbound [`ControlRequest`]s. Decoding is total over its input: an
//! unknown message kind, a missing required field, or a wrong field type
//! classifies as a [`CodecError`] instead of panicking, so the session can
//! skip one bad frame without tearing down.

use super::messages::{AuthOkBody, ControlRequest, ErrorBody, FeedMessage, StatusBody, SubscribedBody};

/// Codec errors. Every variant means "this one frame is unusable".
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid JSON, or a field is missing or mistyped.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame carries a `type` this client does not understand.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// The frame has no `type` discriminator.
    #[error("frame has no message kind")]
    MissingKind,

    /// The frame is valid JSON but not an object.
    #[error("expected a JSON object, got: {0}")]
    NotAnObject(String),
}

/// JSON codec for the status feed.
#[derive(Debug, Default, Clone)]
pub struct FeedCodec;

impl FeedCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] classifying why the frame is unusable;
    /// never panics on any input.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        if !value.is_object() {
            let head: String = text.trim().chars().take(40).collect();
            return Err(CodecError::NotAnObject(head));
        }

        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(CodecError::MissingKind)?
            .to_owned();

        match kind.as_str() {
            "welcome" => Ok(FeedMessage::Welcome),
            "auth_ok" => {
                let body: AuthOkBody = serde_json::from_value(value)?;
                Ok(FeedMessage::AuthOk {
                    session: body.session,
                })
            }
            "subscribed" => {
                let body: SubscribedBody = serde_json::from_value(value)?;
                Ok(FeedMessage::Subscribed {
                    entities: body.entities,
                })
            }
            "error" => {
                let body: ErrorBody = serde_json::from_value(value)?;
                Ok(FeedMessage::Error {
                    code: body.code,
                    msg: body.msg,
                })
            }
            "status" => {
                let body: StatusBody = serde_json::from_value(value)?;
                Ok(FeedMessage::Status(body.into()))
            }
            other => Err(CodecError::UnknownKind(other.to_string())),
        }
    }

    /// Encode an outbound control request as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (cannot happen for valid
    /// request values).
    pub fn encode(&self, request: &ControlRequest) -> Result<String, CodecError> {
        Ok(serde_json::to_string(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::Status;
    use test_case::test_case;

    #[test]
    fn decodes_welcome() {
        let codec = FeedCodec::new();
        let msg = codec.decode(r#"{"type":"welcome"}"#).unwrap();
        assert_eq!(msg, FeedMessage::Welcome);
    }

    #[test]
    fn decodes_auth_ok_with_session() {
        let codec = FeedCodec::new();
        let msg = codec
            .decode(r#"{"type":"auth_ok","session":"s-123"}"#)
            .unwrap();
        assert_eq!(
            msg,
            FeedMessage::AuthOk {
                session: "s-123".to_string(),
            }
        );
    }

    #[test]
    fn decodes_status_update() {
        let codec = FeedCodec::new();
        let msg = codec
            .decode(
                r#"{"type":"status","entity":"district","status":"Degraded","ts":"2026-03-01T08:15:00Z"}"#,
            )
            .unwrap();

        match msg {
            FeedMessage::Status(update) => {
                assert_eq!(update.entity, "district");
                assert_eq!(update.status, Status::Degraded);
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn decodes_error_frame() {
        let codec = FeedCodec::new();
        let msg = codec
            .decode(r#"{"type":"error","code":401,"msg":"bad credentials"}"#)
            .unwrap();
        assert_eq!(
            msg,
            FeedMessage::Error {
                code: 401,
                msg: "bad credentials".to_string(),
            }
        );
    }

    #[test]
    fn unknown_kind_is_classified() {
        let codec = FeedCodec::new();
        let err = codec.decode(r#"{"type":"telemetry","x":1}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKind(k) if k == "telemetry"));
    }

    #[test]
    fn missing_kind_is_classified() {
        let codec = FeedCodec::new();
        let err = codec.decode(r#"{"entity":"district"}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingKind));
    }

    // Missing required field, wrong field type, truncated JSON, non-object.
    #[test_case(r#"{"type":"status","entity":"district"}"# ; "missing fields")]
    #[test_case(r#"{"type":"status","entity":"district","status":"Degraded","ts":42}"# ; "wrong ts type")]
    #[test_case(r#"{"type":"status","entity":7,"status":"Degraded","ts":"2026-03-01T08:15:00Z"}"# ; "wrong entity type")]
    #[test_case(r#"{"type":"st"# ; "truncated")]
    #[test_case("[1,2,3]" ; "array not object")]
    #[test_case("" ; "empty")]
    fn malformed_frames_never_panic(input: &str) {
        let codec = FeedCodec::new();
        assert!(codec.decode(input).is_err());
    }

    #[test]
    fn encode_round_trips_through_decode_path() {
        let codec = FeedCodec::new();
        let json = codec
            .encode(&ControlRequest::Subscribe {
                entities: vec!["victoria".to_string()],
            })
            .unwrap();
        // Outbound frames are valid JSON objects with a type tag.
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "subscribe");
    }
}
