/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("stack {0} does not exist")]
    NotFound(String),

    #[error("no updates are to be performed on stack {0}")]
    NoChanges(String),

    #[error("stack deployment failed with status: {status}")]
    Failed { status: String },

    #[error("stack output {0} is missing")]
    MissingOutput(&'static str),

    #[error("read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:#}")]
    Service(anyhow::Error),
}

impl StackError {
    /// Fatal provisioning failure reported with the observed status string.
    pub fn failed_status(&self) -> Option<&str> {
        match self {
            StackError::Failed { status } => Some(status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field {field} is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("field {field} is not valid UTF-8")]
    Utf8 { field: &'static str },

    #[error("invalid HTTP method {0:?}")]
    Method(String),
}
