/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::codec::encode_completion;
use crate::dispatch::LocalResponse;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TaskTokenService: Send + Sync {
    async fn complete_success(&self, token: &str, output: &str) -> Result<()>;
}

/// Reports local responses back to the workflow that is holding the caller's
/// request open. The workflow step fails the request on its own after about
/// 30 seconds, so completion has to follow dispatch immediately.
#[derive(Clone)]
pub struct CompletionNotifier {
    tasks: Arc<dyn TaskTokenService>,
}

impl CompletionNotifier {
    pub fn new(tasks: Arc<dyn TaskTokenService>) -> Self {
        Self { tasks }
    }

    /// One-shot: a token that was already redeemed is rejected by the
    /// workflow service and the error is returned as is.
    pub async fn complete(&self, token: &str, response: &LocalResponse) -> Result<()> {
        let output = encode_completion(response).context("encode completion payload")?;
        self.tasks
            .complete_success(token, &output)
            .await
            .context("send task success")
    }
}
