/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use awscm_proxy::app;
use awscm_proxy::aws::AwsContext;
use awscm_proxy::config::{Cli, RelayConfig};
use awscm_proxy::error::StackError;
use awscm_proxy::relay::RelaySettings;
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cfg = match RelayConfig::from_cli(Cli::parse()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(status) = e.downcast_ref::<StackError>().and_then(StackError::failed_status) {
                eprintln!("Stack deployment failed with status: {status}");
            } else {
                error!("error occurred: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: RelayConfig) -> Result<()> {
    let ctx = AwsContext::load(cfg.region.clone()).await;
    let controller = app::stack_controller(&cfg, &ctx)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let result = app::run(&cfg, &ctx, &controller, RelaySettings::default(), shutdown_rx).await;
    if cfg.delete_stack {
        controller.teardown().await;
    }
    result.map(|_| ())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
