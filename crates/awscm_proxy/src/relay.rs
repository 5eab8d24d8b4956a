/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::codec::{self, DecodedMessage};
use crate::config::RelayMode;
use crate::dispatch::LocalDispatcher;
use crate::notifier::CompletionNotifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait QueueService: Send + Sync {
    async fn receive(&self, queue_url: &str, max_messages: i32, wait_secs: i32) -> Result<Vec<QueuedMessage>>;
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub max_messages: i32,
    pub wait_secs: i32,
    pub error_backoff: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_secs: 20,
            error_backoff: Duration::from_secs(5),
        }
    }
}

pub struct Relay {
    queue: Arc<dyn QueueService>,
    queue_url: String,
    mode: RelayMode,
    dispatcher: LocalDispatcher,
    notifier: Option<CompletionNotifier>,
    settings: RelaySettings,
}

impl Relay {
    /// `notifier` is required to answer bidirectional messages; without it
    /// they are dispatched and then fail to complete.
    pub fn new(
        queue: Arc<dyn QueueService>,
        queue_url: impl Into<String>,
        mode: RelayMode,
        dispatcher: LocalDispatcher,
        notifier: Option<CompletionNotifier>,
    ) -> Self {
        Self {
            queue,
            queue_url: queue_url.into(),
            mode,
            dispatcher,
            notifier,
            settings: RelaySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Polls until `shutdown` flips to true. Shutdown is checked between
    /// blocking calls only, so an in-flight poll or dispatch always finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = %self.queue_url,
            target = %self.dispatcher.base_url(),
            mode = self.mode.as_str(),
            "relay started"
        );
        while !*shutdown.borrow() {
            if let Err(e) = self.poll_once(&shutdown).await {
                error!("error polling/forwarding: {e:#}");
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.error_backoff) => {}
                    _ = wait_for_shutdown(&mut shutdown) => {}
                }
            }
        }
        info!("relay stopped");
    }

    /// One receive/process/delete cycle. Returns how many messages were taken
    /// off the queue. Errors are queue transport errors; per-message failures
    /// are logged and the message is still deleted.
    pub async fn poll_once(&self, shutdown: &watch::Receiver<bool>) -> Result<usize> {
        let messages = self
            .queue
            .receive(&self.queue_url, self.settings.max_messages, self.settings.wait_secs)
            .await
            .context("receive messages")?;
        let mut handled = 0;
        for message in &messages {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.forward(message).await {
                error!(message_id = %message.id, "failed to forward message: {e:#}");
                info!(message_id = %message.id, "message body: {}", message.body);
            }
            self.queue
                .delete(&self.queue_url, &message.receipt_handle)
                .await
                .with_context(|| format!("delete message {}", message.id))?;
            handled += 1;
        }
        Ok(handled)
    }

    async fn forward(&self, message: &QueuedMessage) -> Result<()> {
        let decoded = codec::decode(self.mode, &message.body)?;
        let request = decoded.request();
        let response = self.dispatcher.dispatch(request).await?;
        info!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "forwarded"
        );
        if let DecodedMessage::Reply { token, .. } = &decoded {
            let notifier = self
                .notifier
                .as_ref()
                .context("bidirectional message but no completion notifier configured")?;
            notifier.complete(token, &response).await?;
        }
        Ok(())
    }
}

/// Resolves once `shutdown` reads true. Never resolves if the sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
