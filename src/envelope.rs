//! Response envelope handling.
//!
//! The backend wraps payloads as `{ ok, data | error, traceId }`. Some endpoints
//! answer with a bare body instead; both shapes are accepted through one client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, NormalizedResult, FALLBACK_MESSAGE};
use crate::transport::RawResponse;

/// Wire-level response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A response body after envelope detection
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Envelope(Envelope),
    Raw(Value),
}

/// How a response is recognized as an envelope
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EnvelopePolicy {
    /// Any object carrying `ok` plus `data` or `error` is an envelope.
    ///
    /// A bare payload that happens to have such keys is misread as an
    /// envelope; use [`EnvelopePolicy::ContentType`] when the backend can mark
    /// its envelopes explicitly.
    #[default]
    Structural,
    /// Only responses whose content type starts with this media type are
    /// envelopes; everything else is a bare payload.
    ContentType(String),
}

impl EnvelopePolicy {
    pub fn classify(&self, response: &RawResponse) -> ResponseBody {
        match self {
            EnvelopePolicy::Structural => sniff(&response.body),
            EnvelopePolicy::ContentType(media_type) => {
                let marked = response
                    .content_type
                    .as_deref()
                    .is_some_and(|ct| media_type_matches(ct, media_type));
                if !marked {
                    return ResponseBody::Raw(response.body.clone());
                }
                match Envelope::from_value(&response.body) {
                    Some(envelope) => ResponseBody::Envelope(envelope),
                    // A marked but malformed envelope must not pass through as data.
                    None => ResponseBody::Envelope(Envelope {
                        ok: false,
                        data: None,
                        error: Some(EnvelopeError {
                            code: Some("MALFORMED_ENVELOPE".to_string()),
                            message: Some("Malformed response envelope".to_string()),
                            details: None,
                        }),
                        trace_id: None,
                    }),
                }
            }
        }
    }
}

fn sniff(body: &Value) -> ResponseBody {
    let is_envelope = body.as_object().is_some_and(|obj| {
        obj.contains_key("ok") && (obj.contains_key("data") || obj.contains_key("error"))
    });

    if is_envelope {
        if let Some(envelope) = Envelope::from_value(body) {
            return ResponseBody::Envelope(envelope);
        }
        debug!("Body has envelope keys but a non-boolean ok; passing through");
    }

    ResponseBody::Raw(body.clone())
}

fn media_type_matches(content_type: &str, media_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|ct| ct.eq_ignore_ascii_case(media_type.trim()))
}

/// Turns a successful transport response into data or an application error
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    policy: EnvelopePolicy,
}

impl ResponseNormalizer {
    pub fn new(policy: EnvelopePolicy) -> Self {
        Self { policy }
    }

    pub fn normalize(&self, response: &RawResponse) -> NormalizedResult<Value> {
        match self.policy.classify(response) {
            ResponseBody::Envelope(envelope) => envelope.into_result(),
            ResponseBody::Raw(body) => Ok(body),
        }
    }
}

impl Envelope {
    /// Read an envelope field by field. Only `ok` has to be a boolean; an
    /// `error` or `traceId` of an unexpected shape contributes nothing.
    pub fn from_value(body: &Value) -> Option<Envelope> {
        let ok = body.get("ok")?.as_bool()?;
        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
        let error = body.get("error").filter(|e| !e.is_null()).map(|e| EnvelopeError {
            code: text(e.get("code")),
            message: text(e.get("message")),
            details: e.get("details").cloned(),
        });

        Some(Envelope {
            ok,
            data: body.get("data").cloned(),
            error,
            trace_id: text(body.get("traceId")),
        })
    }

    pub fn into_result(self) -> NormalizedResult<Value> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }

        let (code, message) = match self.error {
            Some(error) => (error.code, error.message),
            None => (None, None),
        };
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        Err(ApiError::application(code, message).with_trace_id(self.trace_id))
    }
}

/// Error details carried by a failed response body, whatever its shape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub trace_id: Option<String>,
}

impl FailureDetails {
    pub fn from_body(body: &Value) -> Self {
        let error = body.get("error");
        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

        Self {
            code: text(error.and_then(|e| e.get("code"))),
            message: text(error.and_then(|e| e.get("message"))).filter(|m| !m.is_empty()),
            trace_id: text(body.get("traceId")),
        }
    }

    /// Whether the body carried a recognizable error object
    pub fn is_recognized(&self) -> bool {
        self.code.is_some() || self.message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn structural() -> ResponseNormalizer {
        ResponseNormalizer::default()
    }

    #[test]
    fn ok_envelope_unwraps_data() {
        let data = json!({"matches": [1, 2, 3], "total": 3});
        let response = RawResponse::json(200, json!({"ok": true, "data": data.clone()}));

        assert_eq!(structural().normalize(&response).unwrap(), data);
    }

    #[test]
    fn ok_envelope_without_data_is_null() {
        let response = RawResponse::json(200, json!({"ok": true, "error": null}));
        assert_eq!(structural().normalize(&response).unwrap(), Value::Null);
    }

    #[test]
    fn failed_envelope_is_application_error() {
        let response = RawResponse::json(
            200,
            json!({"ok": false, "error": {"code": "NOT_FOUND", "message": "m"}, "traceId": "t-1"}),
        );

        let err = structural().normalize(&response).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Application {
                code: Some("NOT_FOUND".into())
            }
        );
        assert_eq!(err.message, "m");
        assert_eq!(err.trace_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn failed_envelope_without_message_uses_fallback() {
        let response = RawResponse::json(200, json!({"ok": false, "error": {"code": "X"}}));

        let err = structural().normalize(&response).unwrap_err();
        assert_eq!(err.message, FALLBACK_MESSAGE);
    }

    #[test]
    fn bare_body_passes_through() {
        let response = RawResponse::json(200, json!({"foo": 1}));
        assert_eq!(structural().normalize(&response).unwrap(), json!({"foo": 1}));
    }

    #[test]
    fn ok_key_alone_is_not_an_envelope() {
        let response = RawResponse::json(200, json!({"ok": true, "count": 2}));
        assert_eq!(
            structural().normalize(&response).unwrap(),
            json!({"ok": true, "count": 2})
        );
    }

    #[test]
    fn non_bool_ok_passes_through() {
        let body = json!({"ok": "yes", "data": 1});
        let response = RawResponse::json(200, body.clone());
        assert_eq!(structural().normalize(&response).unwrap(), body);
    }

    #[test]
    fn failed_envelope_with_loose_error_shape_is_still_an_error() {
        let bodies = [
            json!({"ok": false, "error": "boom"}),
            json!({"ok": false, "error": {"code": 500, "message": "x"}}),
            json!({"ok": false, "error": {"message": ["x"]}, "traceId": 3}),
        ];
        let expected = ["Request failed", "x", "Request failed"];

        for (body, message) in bodies.iter().zip(expected) {
            let err = structural()
                .normalize(&RawResponse::json(200, body.clone()))
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Application { code: None }, "{}", body);
            assert_eq!(err.message, message, "{}", body);
        }
    }

    #[test]
    fn ok_envelope_ignores_odd_trace_id() {
        let response = RawResponse::json(200, json!({"ok": true, "data": [1], "traceId": 7}));
        assert_eq!(structural().normalize(&response).unwrap(), json!([1]));
    }

    #[test]
    fn ok_envelope_returns_any_payload_unchanged() {
        let payloads = [
            json!(0),
            json!(42.5),
            json!(false),
            json!(true),
            json!(""),
            json!("T1 wins"),
            json!([[1, [2, 3]], [], [{"kda": 4.2}]]),
            json!({}),
            json!({"ok": false, "error": "nested payload, not protocol"}),
        ];

        for data in payloads {
            let response = RawResponse::json(200, json!({"ok": true, "data": data.clone()}));
            assert_eq!(structural().normalize(&response).unwrap(), data);
        }
    }

    #[test]
    fn content_type_policy_ignores_unmarked_bodies() {
        let normalizer = ResponseNormalizer::new(EnvelopePolicy::ContentType(
            "application/vnd.lolstats.envelope+json".into(),
        ));
        let body = json!({"ok": false, "data": {"winner": "T1"}});

        assert_eq!(
            normalizer.normalize(&RawResponse::json(200, body.clone())).unwrap(),
            body
        );
    }

    #[test]
    fn content_type_policy_unwraps_marked_bodies() {
        let normalizer = ResponseNormalizer::new(EnvelopePolicy::ContentType(
            "application/vnd.lolstats.envelope+json".into(),
        ));
        let response = RawResponse {
            status: 200,
            content_type: Some("application/vnd.lolstats.envelope+json; charset=utf-8".into()),
            body: json!({"ok": true, "data": [1]}),
        };

        assert_eq!(normalizer.normalize(&response).unwrap(), json!([1]));
    }

    #[test]
    fn content_type_policy_rejects_malformed_envelope() {
        let normalizer =
            ResponseNormalizer::new(EnvelopePolicy::ContentType("application/x-envelope".into()));
        let response = RawResponse {
            status: 200,
            content_type: Some("application/x-envelope".into()),
            body: json!({"payload": 1}),
        };

        let err = normalizer.normalize(&response).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Application {
                code: Some("MALFORMED_ENVELOPE".into())
            }
        );
    }

    #[test]
    fn failure_details_read_error_object() {
        let details = FailureDetails::from_body(
            &json!({"ok": false, "error": {"code": "CONFLICT", "message": "taken"}, "traceId": "abc"}),
        );
        assert_eq!(details.code.as_deref(), Some("CONFLICT"));
        assert_eq!(details.message.as_deref(), Some("taken"));
        assert_eq!(details.trace_id.as_deref(), Some("abc"));
        assert!(details.is_recognized());

        assert!(!FailureDetails::from_body(&json!("Bad Gateway")).is_recognized());
    }
}
