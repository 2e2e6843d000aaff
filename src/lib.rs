// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Assemble the Cheese SDK from a prebuilt template and source repositories.
//!
//! The pipeline downloads a prebuilt SDK template once, then clones the
//! Cheese repositories, builds them through their Gradle wrappers, and
//! installs the resulting artifacts into the SDK tree.
//!
//! # See Also
//!
//! 1. [`Pipeline`]
//! 2. [`PipelineConfig`]

pub mod artifact;
pub mod build;
pub mod config;
pub mod path;
pub mod pipeline;
pub mod repo;
pub mod sdk;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineReport, SystemToolchain};
