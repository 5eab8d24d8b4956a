/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::config::RelayMode;
use crate::dispatch::LocalResponse;
use crate::error::DecodeError;
use awscm_protocol::{BidirectionalEnvelope, CompletionPayload, UnidirectionalMessage};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use bytes::Bytes;
use http::Method;
use std::collections::BTreeMap;

/// Canonical request handed to the local dispatcher.
///
/// `headers` and `query` are `None` when the message carried no such field;
/// that is different from a present but empty mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRequest {
    pub method: Method,
    pub path: String,
    pub headers: Option<BTreeMap<String, String>>,
    pub query: Option<BTreeMap<String, String>>,
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    /// Unidirectional: the local response is discarded.
    Forward(LocalRequest),
    /// Bidirectional: the local response completes `token`.
    Reply { request: LocalRequest, token: String },
}

impl DecodedMessage {
    pub fn request(&self) -> &LocalRequest {
        match self {
            DecodedMessage::Forward(request) => request,
            DecodedMessage::Reply { request, .. } => request,
        }
    }
}

/// Decodes a queue body. The envelope shape is chosen by `mode`, never by
/// inspecting the payload.
pub fn decode(mode: RelayMode, body: &str) -> Result<DecodedMessage, DecodeError> {
    match mode {
        RelayMode::Unidirectional => decode_unidirectional(body).map(DecodedMessage::Forward),
        RelayMode::Bidirectional => decode_bidirectional(body),
    }
}

fn decode_unidirectional(body: &str) -> Result<LocalRequest, DecodeError> {
    let msg: UnidirectionalMessage = serde_json::from_str(body)?;
    let method = parse_method(msg.method.as_deref())?;
    let headers = match present(msg.headers.as_deref()) {
        Some(raw) => Some(first_values(&decode_text("headers", raw)?)),
        None => None,
    };
    let query = match present(msg.querystring.as_deref()) {
        Some(raw) => Some(first_values(&decode_text("querystring", raw)?)),
        None => None,
    };
    let body = match present(msg.body.as_deref()) {
        Some(raw) => Some(Bytes::from(decode_b64("body", raw)?)),
        None => None,
    };
    Ok(LocalRequest {
        method,
        path: msg.path.unwrap_or_else(|| "/".to_string()),
        headers,
        query,
        body,
    })
}

fn decode_bidirectional(body: &str) -> Result<DecodedMessage, DecodeError> {
    let envelope: BidirectionalEnvelope = serde_json::from_str(body)?;
    let event = envelope.input;
    let method = parse_method(Some(&event.request_context.http.method))?;
    let path = if event.raw_query_string.is_empty() {
        event.raw_path
    } else {
        format!("{}?{}", event.raw_path, event.raw_query_string)
    };
    let body = match event.body {
        Some(raw) if event.is_base64_encoded => Some(Bytes::from(decode_b64("body", &raw)?)),
        Some(raw) => Some(Bytes::from(raw)),
        None => None,
    };
    Ok(DecodedMessage::Reply {
        request: LocalRequest {
            method,
            path,
            headers: event.headers,
            query: None,
            body,
        },
        token: envelope.token,
    })
}

/// Serialises a local response into the task output the workflow expects.
pub fn encode_completion(response: &LocalResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CompletionPayload {
        status_code: response.status,
        headers: response.headers.clone(),
        body: response.body.clone(),
        is_base64_encoded: false,
    })
}

pub fn decode_completion(output: &str) -> Result<LocalResponse, DecodeError> {
    let payload: CompletionPayload = serde_json::from_str(output)?;
    let body = if payload.is_base64_encoded {
        let bytes = decode_b64("body", &payload.body)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::Utf8 { field: "body" })?
    } else {
        payload.body
    };
    Ok(LocalResponse {
        status: payload.status_code,
        headers: payload.headers,
        body,
    })
}

fn present(field: Option<&str>) -> Option<&str> {
    field.filter(|v| !v.is_empty())
}

fn parse_method(raw: Option<&str>) -> Result<Method, DecodeError> {
    match raw {
        None => Ok(Method::GET),
        Some(m) => Method::from_bytes(m.as_bytes()).map_err(|_| DecodeError::Method(m.to_string())),
    }
}

fn decode_b64(field: &'static str, raw: &str) -> Result<Vec<u8>, DecodeError> {
    B64.decode(raw.trim().as_bytes())
        .map_err(|source| DecodeError::Base64 { field, source })
}

fn decode_text(field: &'static str, raw: &str) -> Result<String, DecodeError> {
    String::from_utf8(decode_b64(field, raw)?).map_err(|_| DecodeError::Utf8 { field })
}

/// Form-decodes `k=v&k=v`, keeping the first value of a repeated key. Pairs
/// with an empty value are dropped.
pub fn first_values(form: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (k, v) in url::form_urlencoded::parse(form.as_bytes()) {
        if v.is_empty() {
            continue;
        }
        out.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    out
}
