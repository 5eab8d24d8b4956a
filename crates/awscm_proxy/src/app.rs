/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::aws::AwsContext;
use crate::config::{RelayConfig, RelayMode};
use crate::dispatch::LocalDispatcher;
use crate::intercept::Interceptor;
use crate::notifier::CompletionNotifier;
use crate::relay::{wait_for_shutdown, Relay, RelaySettings};
use crate::stack::{self, StackController, StackOutputs, StackSettings};
use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

pub fn stack_controller(cfg: &RelayConfig, ctx: &AwsContext) -> Result<StackController> {
    let template = stack::load_template(cfg.mode, cfg.template_path.as_deref())?;
    let mut settings = StackSettings::new(cfg.stack_name.clone(), template);
    settings.update_on_start = cfg.update_stack;
    Ok(StackController::new(ctx.stacks.clone(), settings))
}

/// Brings the stack up, prints the public endpoint and, when a local endpoint
/// is configured, relays until `shutdown` flips. Returns `Ok(None)` when
/// interrupted before the stack was ready.
pub async fn run(
    cfg: &RelayConfig,
    ctx: &AwsContext,
    controller: &StackController,
    relay_settings: RelaySettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<Option<StackOutputs>> {
    let outputs = tokio::select! {
        outputs = controller.ensure() => outputs?,
        _ = wait_for_shutdown(&mut shutdown) => {
            info!("shutting down before stack was ready");
            return Ok(None);
        }
    };
    println!("Public endpoint: {}", outputs.endpoint_url);

    let (Some(upstream), Some(target)) = (cfg.local_endpoint.as_deref(), cfg.forward_target()) else {
        return Ok(Some(outputs));
    };

    let interceptor = match &cfg.intercept {
        Some(intercept) => Some(Interceptor::spawn(intercept, upstream)?),
        None => None,
    };
    let target = interceptor
        .as_ref()
        .map(|i| i.local_endpoint().to_string())
        .unwrap_or(target);

    let notifier = match cfg.mode {
        RelayMode::Bidirectional => Some(CompletionNotifier::new(ctx.tasks.clone())),
        RelayMode::Unidirectional => None,
    };
    let relay = Relay::new(
        ctx.queue.clone(),
        outputs.queue_url.clone(),
        cfg.mode,
        LocalDispatcher::new(&target)?,
        notifier,
    )
    .with_settings(relay_settings);
    relay.run(shutdown).await;

    if let Some(interceptor) = interceptor {
        interceptor.shutdown().await;
    }
    Ok(Some(outputs))
}
