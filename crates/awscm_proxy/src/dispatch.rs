/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::codec::LocalRequest;
use anyhow::{Context, Result};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as HttpClient;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Sends decoded requests to the operator's local server. No timeout and no
/// retry: a failure goes straight back to the caller.
#[derive(Clone)]
pub struct LocalDispatcher {
    base_url: String,
    http: HttpClient,
}

impl LocalDispatcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build local http client")?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: &str, http: HttpClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn target_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn dispatch(&self, req: &LocalRequest) -> Result<LocalResponse> {
        let url = self.target_url(&req.path);
        let mut builder = self.http.request(req.method.clone(), &url);
        if let Some(headers) = &req.headers {
            builder = builder.headers(outbound_headers(headers));
        }
        if let Some(query) = &req.query {
            builder = builder.query(query);
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .with_context(|| format!("{} {url}", req.method))?;
        let status = resp.status().as_u16();
        let headers = collapse_headers(resp.headers());
        let body = resp.text().await.context("read local response body")?;
        Ok(LocalResponse {
            status,
            headers,
            body,
        })
    }
}

fn outbound_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (k, v) in headers {
        match (
            HeaderName::from_bytes(k.as_bytes()),
            HeaderValue::from_str(v),
        ) {
            (Ok(name), Ok(value)) => {
                // framing is recomputed from the body we actually send
                if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
                    continue;
                }
                out.append(name, value);
            }
            _ => debug!(header = %k, "skipping invalid header"),
        }
    }
    out
}

fn collapse_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (k, v) in headers {
        let Ok(v) = v.to_str() else { continue };
        out.entry(k.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(v);
            })
            .or_insert_with(|| v.to_string());
    }
    out
}
