/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::StackError;
use crate::notifier::TaskTokenService;
use crate::relay::{QueueService, QueuedMessage};
use crate::stack::{StackDescription, StackService};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::Capability;
use aws_sdk_cloudformation::Client as CfnClient;
use aws_sdk_sfn::Client as SfnClient;
use aws_sdk_sqs::Client as SqsClient;
use std::collections::HashMap;
use std::sync::Arc;

/// Client handles shared by every component, built once at startup.
#[derive(Clone)]
pub struct AwsContext {
    pub stacks: Arc<dyn StackService>,
    pub queue: Arc<dyn QueueService>,
    pub tasks: Arc<dyn TaskTokenService>,
}

impl AwsContext {
    pub async fn load(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;
        Self {
            stacks: Arc::new(CloudFormationStacks::new(CfnClient::new(&shared))),
            queue: Arc::new(SqsQueue::new(SqsClient::new(&shared))),
            tasks: Arc::new(StepFunctionsTasks::new(SfnClient::new(&shared))),
        }
    }
}

pub struct CloudFormationStacks {
    client: CfnClient,
}

impl CloudFormationStacks {
    pub fn new(client: CfnClient) -> Self {
        Self { client }
    }
}

fn stack_error<E, R>(name: &str, op: &str, err: aws_sdk_cloudformation::error::SdkError<E, R>) -> StackError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = err.message().unwrap_or_default();
    if message.contains("does not exist") {
        return StackError::NotFound(name.to_string());
    }
    if message.contains("No updates are to be performed") {
        return StackError::NoChanges(name.to_string());
    }
    StackError::Service(anyhow::anyhow!("{op} {name}: {}", DisplayErrorContext(&err)))
}

fn capabilities(caps: &[&str]) -> Vec<Capability> {
    caps.iter().map(|c| Capability::from(*c)).collect()
}

#[async_trait]
impl StackService for CloudFormationStacks {
    async fn describe(&self, name: &str) -> Result<StackDescription, StackError> {
        let out = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| stack_error(name, "describe stack", e))?;
        let stack = out
            .stacks()
            .first()
            .ok_or_else(|| StackError::NotFound(name.to_string()))?;
        let status = stack
            .stack_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        let outputs = stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect::<HashMap<_, _>>();
        Ok(StackDescription { status, outputs })
    }

    async fn create(&self, name: &str, template: &str, caps: &[&str]) -> Result<(), StackError> {
        self.client
            .create_stack()
            .stack_name(name)
            .template_body(template)
            .set_capabilities(Some(capabilities(caps)))
            .send()
            .await
            .map_err(|e| stack_error(name, "create stack", e))?;
        Ok(())
    }

    async fn update(&self, name: &str, template: &str, caps: &[&str]) -> Result<(), StackError> {
        self.client
            .update_stack()
            .stack_name(name)
            .template_body(template)
            .set_capabilities(Some(capabilities(caps)))
            .send()
            .await
            .map_err(|e| stack_error(name, "update stack", e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StackError> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| stack_error(name, "delete stack", e))?;
        Ok(())
    }
}

pub struct SqsQueue {
    client: SqsClient,
}

impl SqsQueue {
    pub fn new(client: SqsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn receive(&self, queue_url: &str, max_messages: i32, wait_secs: i32) -> Result<Vec<QueuedMessage>> {
        let out = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_secs)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", aws_sdk_sqs::error::DisplayErrorContext(&e)))
            .context("sqs receive_message")?;
        Ok(out
            .messages()
            .iter()
            .filter_map(|m| {
                Some(QueuedMessage {
                    id: m.message_id().unwrap_or_default().to_string(),
                    receipt_handle: m.receipt_handle()?.to_string(),
                    body: m.body().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", aws_sdk_sqs::error::DisplayErrorContext(&e)))
            .context("sqs delete_message")?;
        Ok(())
    }
}

pub struct StepFunctionsTasks {
    client: SfnClient,
}

impl StepFunctionsTasks {
    pub fn new(client: SfnClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskTokenService for StepFunctionsTasks {
    async fn complete_success(&self, token: &str, output: &str) -> Result<()> {
        self.client
            .send_task_success()
            .task_token(token)
            .output(output)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", aws_sdk_sfn::error::DisplayErrorContext(&e)))
            .context("sfn send_task_success")?;
        Ok(())
    }
}
