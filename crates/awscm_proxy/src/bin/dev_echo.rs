/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tracing::info;

// Local echo server for trying the relay by hand:
//   dev_echo [addr]   (default 127.0.0.1:8000)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("serving HTTP on {}", listener.local_addr()?);

    let app = Router::new().fallback(echo);
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut out = format!("{method} {uri}\n");
    for (k, v) in &headers {
        out.push_str(&format!("{k}: {}\n", String::from_utf8_lossy(v.as_bytes())));
    }
    out.push('\n');
    out.push_str(&String::from_utf8_lossy(&body));
    info!(%method, %uri, bytes = body.len(), "echo");
    ([("X-tra", "header"), ("Content-Type", "text/plain")], out)
}
