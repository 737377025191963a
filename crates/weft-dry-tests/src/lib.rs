// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for weft crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store for settings tests
//! - [`fixtures`] - Standard renderer schemas and small scenes
//! - [`host`] - Scriptable host scene with message log and event posting
//! - [`renderer`] - Node-graph renderer with pause accounting

pub mod config;
pub mod fixtures;
pub mod host;
pub mod renderer;

pub use config::InMemoryConfigStore;
pub use fixtures::{basic_scene, flat_shader, standard_schemas, BasicScene};
pub use host::{MockHost, Param};
pub use renderer::{MockNode, MockRenderer};
