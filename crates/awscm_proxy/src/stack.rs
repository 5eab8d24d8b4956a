/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::config::RelayMode;
use crate::error::StackError;
use async_trait::async_trait;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const ENDPOINT_OUTPUT: &str = "Endpoint";
pub const QUEUE_URL_OUTPUT: &str = "QueueUrl";
pub const CAPABILITY_IAM: &str = "CAPABILITY_IAM";

const DEPLOYMENT_RESOURCE_LINE: &str = "  RestApiDeployment:";

const UNIDIRECTIONAL_TEMPLATE: &str = include_str!("../templates/unidirectional-proxy.yaml");
const BIDIRECTIONAL_TEMPLATE: &str = include_str!("../templates/bidirectional-proxy.yaml");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub status: String,
    pub outputs: HashMap<String, String>,
}

#[async_trait]
pub trait StackService: Send + Sync {
    /// `StackError::NotFound` when no stack of that name exists (yet).
    async fn describe(&self, name: &str) -> Result<StackDescription, StackError>;
    async fn create(&self, name: &str, template: &str, capabilities: &[&str]) -> Result<(), StackError>;
    /// `StackError::NoChanges` when the template matches what is deployed.
    async fn update(&self, name: &str, template: &str, capabilities: &[&str]) -> Result<(), StackError>;
    async fn delete(&self, name: &str) -> Result<(), StackError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackPhase {
    Absent,
    Creating,
    Updating,
    Deleting,
    Ready,
    Failed(String),
}

impl StackPhase {
    /// Next phase after observing `status` while an operation is running.
    pub fn observe(&self, status: &str) -> StackPhase {
        if *self == StackPhase::Deleting {
            return match status {
                "DELETE_COMPLETE" => StackPhase::Absent,
                "DELETE_FAILED" => StackPhase::Failed(status.to_string()),
                _ => StackPhase::Deleting,
            };
        }
        match classify_status(status) {
            StatusClass::Ready => StackPhase::Ready,
            StatusClass::Failed => StackPhase::Failed(status.to_string()),
            StatusClass::InProgress => self.clone(),
        }
    }

    /// Phase of a stack found at startup. Only a running operation is waited
    /// on; any settled status is taken as usable.
    fn observe_existing(&self, status: &str) -> StackPhase {
        if status == "DELETE_COMPLETE" {
            return StackPhase::Absent;
        }
        if !status.ends_with("_IN_PROGRESS") {
            return self.clone();
        }
        if status.starts_with("DELETE") {
            StackPhase::Deleting
        } else if status.starts_with("UPDATE") {
            StackPhase::Updating
        } else {
            StackPhase::Creating
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InProgress,
    Ready,
    Failed,
}

pub fn classify_status(status: &str) -> StatusClass {
    match status {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" => StatusClass::Ready,
        "CREATE_FAILED"
        | "ROLLBACK_COMPLETE"
        | "ROLLBACK_FAILED"
        | "UPDATE_FAILED"
        | "UPDATE_ROLLBACK_COMPLETE"
        | "UPDATE_ROLLBACK_FAILED"
        | "DELETE_COMPLETE"
        | "DELETE_FAILED" => StatusClass::Failed,
        _ => StatusClass::InProgress,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    pub endpoint_url: String,
    pub queue_url: String,
}

impl StackOutputs {
    fn from_map(outputs: &HashMap<String, String>) -> Result<Self, StackError> {
        let endpoint_url = outputs
            .get(ENDPOINT_OUTPUT)
            .cloned()
            .ok_or(StackError::MissingOutput(ENDPOINT_OUTPUT))?;
        let queue_url = outputs
            .get(QUEUE_URL_OUTPUT)
            .cloned()
            .ok_or(StackError::MissingOutput(QUEUE_URL_OUTPUT))?;
        Ok(Self {
            endpoint_url,
            queue_url,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StackSettings {
    pub name: String,
    pub template: String,
    pub update_on_start: bool,
    pub poll_interval: Duration,
}

impl StackSettings {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            update_on_start: false,
            poll_interval: Duration::from_secs(15),
        }
    }
}

pub fn builtin_template(mode: RelayMode) -> &'static str {
    match mode {
        RelayMode::Unidirectional => UNIDIRECTIONAL_TEMPLATE,
        RelayMode::Bidirectional => BIDIRECTIONAL_TEMPLATE,
    }
}

/// Template body for this run: the file at `path` when given, otherwise the
/// built-in template for `mode`.
pub fn load_template(mode: RelayMode, path: Option<&Path>) -> Result<String, StackError> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| StackError::Template {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(builtin_template(mode).to_string()),
    }
}

/// Gives the REST API deployment resource a fresh logical id so every deploy
/// produces a new deployment instead of colliding with the previous one.
pub fn transform_template(template: &str) -> String {
    let suffix = hex::encode(thread_rng().gen::<[u8; 6]>());
    let mut out = String::with_capacity(template.len() + 16);
    for line in template.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content == DEPLOYMENT_RESOURCE_LINE {
            out.push_str(&format!("  RestApiDeployment{suffix}:"));
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

pub struct StackController {
    stacks: Arc<dyn StackService>,
    settings: StackSettings,
}

impl StackController {
    pub fn new(stacks: Arc<dyn StackService>, settings: StackSettings) -> Self {
        Self { stacks, settings }
    }

    /// Creates or reuses the stack, waits until it is stable and returns its
    /// outputs. Reusing a ready stack without an update issues no provisioning
    /// calls.
    pub async fn ensure(&self) -> Result<StackOutputs, StackError> {
        let name = &self.settings.name;
        let mut phase = match self.stacks.describe(name).await {
            Ok(desc) => StackPhase::Ready.observe_existing(&desc.status),
            Err(StackError::NotFound(_)) => StackPhase::Absent,
            Err(e) => return Err(e),
        };
        if phase == StackPhase::Deleting {
            info!(stack = %name, "previous stack is still being deleted");
            phase = self.wait_for(StackPhase::Deleting).await?;
        }

        match phase {
            StackPhase::Absent => {
                info!(stack = %name, "creating stack");
                self.deploy(StackPhase::Creating).await?;
            }
            StackPhase::Ready if self.settings.update_on_start => {
                info!(stack = %name, "updating stack");
                self.deploy(StackPhase::Updating).await?;
            }
            StackPhase::Ready => {}
            in_progress => {
                info!(stack = %name, phase = ?in_progress, "stack operation already in progress");
                self.wait_for(in_progress).await?;
                if self.settings.update_on_start {
                    info!(stack = %name, "updating stack");
                    self.deploy(StackPhase::Updating).await?;
                }
            }
        }
        info!(stack = %name, "using stack");

        let desc = self.stacks.describe(name).await?;
        StackOutputs::from_map(&desc.outputs)
    }

    async fn deploy(&self, phase: StackPhase) -> Result<(), StackError> {
        let name = &self.settings.name;
        let template = transform_template(&self.settings.template);
        let submitted = match phase {
            StackPhase::Creating => self.stacks.create(name, &template, &[CAPABILITY_IAM]).await,
            _ => self.stacks.update(name, &template, &[CAPABILITY_IAM]).await,
        };
        match submitted {
            Ok(()) => self.wait_for(phase).await.map(|_| ()),
            Err(StackError::NoChanges(_)) => {
                info!(stack = %name, "stack already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Polls until `phase` settles. Returns `Ready`, or `Absent` once a
    /// deletion has finished.
    async fn wait_for(&self, mut phase: StackPhase) -> Result<StackPhase, StackError> {
        let name = &self.settings.name;
        info!(stack = %name, phase = ?phase, "waiting for stack operation to complete");
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            match self.stacks.describe(name).await {
                Ok(desc) => {
                    info!(stack = %name, status = %desc.status, "stack status");
                    phase = phase.observe(&desc.status);
                }
                Err(StackError::NotFound(_)) if phase == StackPhase::Deleting => {
                    info!(stack = %name, "stack deleted");
                    phase = StackPhase::Absent;
                }
                // a just-submitted create may not be visible yet
                Err(StackError::NotFound(_)) if phase == StackPhase::Creating => {
                    info!(stack = %name, "stack status: CREATE_IN_PROGRESS (not yet visible)");
                }
                Err(e) => return Err(e),
            }
            match phase {
                StackPhase::Ready | StackPhase::Absent => return Ok(phase),
                StackPhase::Failed(status) => return Err(StackError::Failed { status }),
                _ => {}
            }
        }
    }

    /// Fire-and-forget deletion; the outcome of the delete operation itself is
    /// never awaited and errors are only logged.
    pub async fn teardown(&self) {
        let name = &self.settings.name;
        info!(stack = %name, "deleting stack");
        if let Err(e) = self.stacks.delete(name).await {
            error!(stack = %name, "error deleting stack: {e}");
        }
    }
}
