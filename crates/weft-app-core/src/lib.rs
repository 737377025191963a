// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for weft hosts (config, persisted settings).
//! Keeps host plugins thin: they supply a store and a profile name.
#![forbid(unsafe_code)]

pub mod config;
pub mod settings;

pub use config::{validate_key, ConfigError, ConfigService, ConfigStore};
pub use settings::SettingsService;
