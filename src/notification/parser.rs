// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of raw notification batches and event payloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{BatchKind, NotificationBatch, UndecodableResponse};
use crate::error::{MalformedBatchError, ParseError};

/// Splits a raw batch body into typed event collections.
///
/// An empty body, or an object without any known key, yields an empty batch.
/// Each event is decoded on its own: an event with a bad shape is logged,
/// counted in [`NotificationBatch::rejected`] and skipped, and the rest of the
/// batch is kept. A rejected `async-responses` event that still carries a
/// string `id` is also recorded in
/// [`NotificationBatch::undecodable_responses`].
///
/// # Errors
///
/// Returns [`MalformedBatchError`] if the body is not a JSON object.
pub fn parse_batch(raw: &[u8]) -> Result<NotificationBatch, MalformedBatchError> {
    let mut batch = NotificationBatch::default();

    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(batch);
    }

    let object = match serde_json::from_slice::<Value>(raw)? {
        Value::Object(object) => object,
        other => return Err(MalformedBatchError::NotAnObject(json_type_name(&other))),
    };

    for kind in BatchKind::ALL {
        match kind {
            BatchKind::AsyncResponses => {
                let mut undecodable = Vec::new();
                batch.async_responses =
                    collect_with(&object, kind, &mut batch.rejected, |item, error| {
                        if let Some(response) = undecodable_response(item, error) {
                            undecodable.push(response);
                        }
                    });
                batch.undecodable_responses = undecodable;
            }
            BatchKind::Notifications => {
                batch.notifications = collect(&object, kind, &mut batch.rejected);
            }
            BatchKind::Registrations => {
                batch.registrations = collect(&object, kind, &mut batch.rejected);
            }
            BatchKind::RegistrationUpdates => {
                batch.registration_updates = collect(&object, kind, &mut batch.rejected);
            }
            BatchKind::Deregistrations => {
                batch.deregistrations = collect(&object, kind, &mut batch.rejected);
            }
            BatchKind::RegistrationsExpired => {
                batch.registrations_expired = collect(&object, kind, &mut batch.rejected);
            }
        }
    }

    let unknown: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|key| key.parse::<BatchKind>().is_err())
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(keys = ?unknown, "Ignoring unknown batch keys");
    }

    Ok(batch)
}

/// Decodes a base64 event payload.
///
/// A missing or empty payload decodes to an empty buffer.
///
/// # Errors
///
/// Returns [`ParseError::Base64`] if the payload is not valid base64.
pub fn decode_payload(payload: Option<&str>) -> Result<Vec<u8>, ParseError> {
    match payload.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(encoded) => STANDARD.decode(encoded).map_err(ParseError::from),
    }
}

/// Decodes every element of one collection, skipping the ones that fail.
fn collect<T: DeserializeOwned>(
    object: &Map<String, Value>,
    kind: BatchKind,
    rejected: &mut usize,
) -> Vec<T> {
    collect_with(object, kind, rejected, |_, _| {})
}

/// Like [`collect`], handing every element that fails to `on_reject`.
fn collect_with<T, F>(
    object: &Map<String, Value>,
    kind: BatchKind,
    rejected: &mut usize,
    mut on_reject: F,
) -> Vec<T>
where
    T: DeserializeOwned,
    F: FnMut(&Value, &serde_json::Error),
{
    let Some(value) = object.get(kind.key()) else {
        return Vec::new();
    };

    let Value::Array(items) = value else {
        tracing::warn!(
            kind = %kind,
            found = json_type_name(value),
            "Batch collection is not an array, skipping it"
        );
        *rejected += 1;
        return Vec::new();
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match T::deserialize(item) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(kind = %kind, index, error = %e, "Skipping malformed event");
                *rejected += 1;
                on_reject(item, &e);
            }
        }
    }
    events
}

fn undecodable_response(item: &Value, error: &serde_json::Error) -> Option<UndecodableResponse> {
    let id = item.get("id").and_then(Value::as_str)?;
    Some(UndecodableResponse {
        id: id.to_string(),
        status: item
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok()),
        reason: error.to_string(),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_async_response() {
        let batch = parse_batch(
            br#"{"async-responses":[{"id":"T42","status":200,"payload":"aGVsbG8=","ct":"text/plain","max-age":60}]}"#,
        )
        .unwrap();
        assert_eq!(batch.async_responses.len(), 1);
        let response = &batch.async_responses[0];
        assert_eq!(response.id, "T42");
        assert_eq!(response.status, 200);
        assert_eq!(response.ct.as_deref(), Some("text/plain"));
        assert_eq!(response.max_age, Some(60));
        assert!(response.error.is_none());
    }

    #[test]
    fn parse_every_kind() {
        let raw = br#"{
            "async-responses": [{"id":"T1","status":410,"error":"endpoint not found"}],
            "notifications": [{"ep":"d1","path":"/3/0/1","payload":""}],
            "registrations": [{"ep":"d1","ept":"test","resources":[{"path":"/3/0/1","obs":true}]}],
            "reg-updates": [{"ep":"d2"}],
            "de-registrations": ["d3"],
            "registrations-expired": ["d4", "d5"]
        }"#;
        let batch = parse_batch(raw).unwrap();
        assert_eq!(batch.len_of(BatchKind::AsyncResponses), 1);
        assert_eq!(batch.len_of(BatchKind::Notifications), 1);
        assert_eq!(batch.registrations[0].resources[0].path, "/3/0/1");
        assert_eq!(batch.registration_updates[0].ep, "d2");
        assert_eq!(batch.deregistrations, vec!["d3"]);
        assert_eq!(batch.registrations_expired, vec!["d4", "d5"]);
        assert_eq!(batch.event_count(), 7);
        assert_eq!(batch.rejected, 0);
    }

    #[test]
    fn unknown_keys_yield_empty_batch() {
        let batch = parse_batch(br#"{"something-else":[1,2,3]}"#).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.rejected, 0);
    }

    #[test]
    fn empty_body_yields_empty_batch() {
        assert!(parse_batch(b"").unwrap().is_empty());
        assert!(parse_batch(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_batch(b"{not json"),
            Err(MalformedBatchError::Json(_))
        ));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(matches!(
            parse_batch(b"[1,2]"),
            Err(MalformedBatchError::NotAnObject("array"))
        ));
    }

    #[test]
    fn bad_event_does_not_drop_the_batch() {
        let raw = br#"{"async-responses":[{"status":200},{"id":"T2","status":200}]}"#;
        let batch = parse_batch(raw).unwrap();
        assert_eq!(batch.async_responses.len(), 1);
        assert_eq!(batch.async_responses[0].id, "T2");
        assert_eq!(batch.rejected, 1);
    }

    #[test]
    fn undecodable_response_keeps_its_token() {
        let raw = br#"{"async-responses":[{"id":"T1","status":"200","payload":""},{"status":"x"}]}"#;
        let batch = parse_batch(raw).unwrap();
        assert!(batch.async_responses.is_empty());
        assert_eq!(batch.rejected, 2);
        assert_eq!(batch.undecodable_responses.len(), 1);
        assert_eq!(batch.undecodable_responses[0].id, "T1");
        assert_eq!(batch.undecodable_responses[0].status, None);
        assert!(!batch.is_empty());
    }

    #[test]
    fn collection_that_is_not_an_array_is_skipped() {
        let raw = br#"{"notifications":{"ep":"d1"},"de-registrations":["d1"]}"#;
        let batch = parse_batch(raw).unwrap();
        assert!(batch.notifications.is_empty());
        assert_eq!(batch.deregistrations, vec!["d1"]);
        assert_eq!(batch.rejected, 1);
    }

    #[test]
    fn decode_payload_values() {
        assert_eq!(decode_payload(Some("aGVsbG8=")).unwrap(), b"hello");
        assert!(decode_payload(None).unwrap().is_empty());
        assert!(decode_payload(Some("")).unwrap().is_empty());
        assert!(matches!(
            decode_payload(Some("%%%")),
            Err(ParseError::Base64(_))
        ));
    }
}
