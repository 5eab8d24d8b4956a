/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::config::InterceptConfig;
use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// A running interception proxy in reverse mode in front of the local
/// endpoint. The child is killed when this value is dropped, whichever way
/// the relay exits.
pub struct Interceptor {
    child: Child,
    listen_endpoint: String,
}

impl Interceptor {
    pub fn spawn(cfg: &InterceptConfig, upstream: &str) -> Result<Self> {
        let mode = format!("reverse:{upstream}@{}", cfg.port);
        Self::spawn_program(cfg.program(), &["--mode", &mode], cfg.listen_endpoint())
    }

    fn spawn_program(program: &str, args: &[&str], listen_endpoint: String) -> Result<Self> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {program}"))?;
        info!(program, pid = ?child.id(), listen = %listen_endpoint, "interception proxy started");
        Ok(Self {
            child,
            listen_endpoint,
        })
    }

    /// Endpoint the relay should target instead of the real local server.
    pub fn local_endpoint(&self) -> &str {
        &self.listen_endpoint
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("stop interception proxy: {e}");
        }
    }
}
