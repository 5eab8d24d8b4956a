/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;

pub const DEFAULT_STACK_NAME: &str = "awscm-proxy";

#[derive(Debug, Parser)]
#[command(
    name = "awscm-proxy",
    version,
    about = "A quick, cheap, secure, and straightforward serverless localhost proxy"
)]
pub struct Cli {
    /// Create a bidirectional proxy. The local response is returned to the
    /// external requester; a 503 is returned after a timeout of about 30
    /// seconds. Without it the proxy answers 200 immediately and ignores the
    /// local response.
    #[arg(long)]
    pub bidirectional: bool,

    /// Start and use mitmproxy on the given localhost port
    #[arg(long, value_name = "PORT")]
    pub mitmproxy: Option<u16>,

    /// Start mitmproxy with the web GUI
    #[arg(long)]
    pub mitmweb: bool,

    /// Name of the CloudFormation stack to create/reuse
    #[arg(long, env = "AWSCM_STACK_NAME", default_value = DEFAULT_STACK_NAME)]
    pub stack_name: String,

    /// Update the AWS resources on start
    #[arg(long)]
    pub update_stack: bool,

    /// Delete the AWS resources on exit. By default they are left intact and
    /// reused on subsequent invocations.
    #[arg(long)]
    pub delete_stack: bool,

    /// Deploy this template file instead of the built-in one
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// AWS region (defaults to the standard AWS configuration chain)
    #[arg(long, env = "AWSCM_REGION")]
    pub region: Option<String>,

    /// Fully qualified local HTTP endpoint (e.g. http://localhost:8000). If
    /// omitted, the AWS resources are created and the process exits.
    pub local_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Unidirectional,
    Bidirectional,
}

impl RelayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayMode::Unidirectional => "unidirectional",
            RelayMode::Bidirectional => "bidirectional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptConfig {
    pub port: u16,
    pub web_ui: bool,
}

impl InterceptConfig {
    pub fn program(&self) -> &'static str {
        if self.web_ui {
            "mitmweb"
        } else {
            "mitmproxy"
        }
    }

    pub fn listen_endpoint(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Per-process settings; built once from the command line and never mutated.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub mode: RelayMode,
    pub local_endpoint: Option<String>,
    pub stack_name: String,
    pub update_stack: bool,
    pub delete_stack: bool,
    pub intercept: Option<InterceptConfig>,
    pub template_path: Option<PathBuf>,
    pub region: Option<String>,
}

impl RelayConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.mitmweb && cli.mitmproxy.is_none() {
            bail!("--mitmweb requires --mitmproxy <PORT>");
        }
        if cli.mitmproxy.is_some() && cli.local_endpoint.is_none() {
            bail!("--mitmproxy requires a local endpoint to forward to");
        }
        let stack_name = cli.stack_name.trim().to_string();
        if stack_name.is_empty() {
            bail!("stack name must not be empty");
        }
        let local_endpoint = match cli.local_endpoint {
            Some(raw) => Some(validate_endpoint(&raw)?),
            None => None,
        };
        Ok(Self {
            mode: if cli.bidirectional {
                RelayMode::Bidirectional
            } else {
                RelayMode::Unidirectional
            },
            local_endpoint,
            stack_name,
            update_stack: cli.update_stack,
            delete_stack: cli.delete_stack,
            intercept: cli.mitmproxy.map(|port| InterceptConfig {
                port,
                web_ui: cli.mitmweb,
            }),
            template_path: cli.template,
            region: cli.region,
        })
    }

    /// Where the relay sends requests: the interception tool when one is
    /// configured, otherwise the operator's endpoint.
    pub fn forward_target(&self) -> Option<String> {
        match (&self.intercept, &self.local_endpoint) {
            (Some(intercept), Some(_)) => Some(intercept.listen_endpoint()),
            (None, Some(endpoint)) => Some(endpoint.clone()),
            _ => None,
        }
    }
}

fn validate_endpoint(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("invalid local endpoint {raw:?}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("local endpoint must be http or https, got {}", url.scheme());
    }
    if url.host_str().is_none() {
        bail!("local endpoint {raw:?} has no host");
    }
    Ok(raw.to_string())
}
