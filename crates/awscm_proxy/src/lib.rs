/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod app;
pub mod aws;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intercept;
pub mod notifier;
pub mod relay;
pub mod stack;
