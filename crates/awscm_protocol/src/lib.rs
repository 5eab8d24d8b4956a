/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queue body written by the unidirectional REST integration.
///
/// `headers` and `querystring` are base64 of a form-encoded `k=v&k=v` string,
/// `body` is base64 of the raw request entity.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UnidirectionalMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub querystring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Queue body written by the bidirectional workflow task.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BidirectionalEnvelope {
    #[serde(rename = "Input")]
    pub input: HttpEvent,
    #[serde(rename = "Token")]
    pub token: String,
}

/// HTTP API (payload format 2.0) event, only the fields the relay reads.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpEvent {
    pub raw_path: String,
    #[serde(default)]
    pub raw_query_string: String,
    pub request_context: RequestContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub http: RequestContextHttp,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RequestContextHttp {
    pub method: String,
}

/// Task output handed back to the workflow; the HTTP API turns it into the
/// caller's response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_reads_capitalised_keys() {
        let raw = r#"{"Input":{"rawPath":"/a","rawQueryString":"x=1","requestContext":{"http":{"method":"POST"}},"headers":{},"body":"hi"},"Token":"tok1","Extra":1}"#;
        let env: BidirectionalEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.token, "tok1");
        assert_eq!(env.input.raw_path, "/a");
        assert_eq!(env.input.raw_query_string, "x=1");
        assert_eq!(env.input.request_context.http.method, "POST");
        assert_eq!(env.input.headers, Some(BTreeMap::new()));
        assert_eq!(env.input.body.as_deref(), Some("hi"));
        assert!(!env.input.is_base64_encoded);
    }

    #[test]
    fn completion_payload_uses_workflow_field_names() {
        let payload = CompletionPayload {
            status_code: 200,
            headers: BTreeMap::from([("Content-Type".to_string(), "text/plain".to_string())]),
            body: "ok".to_string(),
            is_base64_encoded: false,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["statusCode"], 200);
        assert_eq!(v["headers"]["Content-Type"], "text/plain");
        assert_eq!(v["body"], "ok");
        assert_eq!(v["isBase64Encoded"], false);
    }

    #[test]
    fn unidirectional_fields_are_optional() {
        let msg: UnidirectionalMessage = serde_json::from_str(r#"{"path":"/x","ignored":true}"#).unwrap();
        assert_eq!(msg.path.as_deref(), Some("/x"));
        assert!(msg.method.is_none());
        assert!(msg.headers.is_none());
    }
}
