// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft-core: identity mapping and incremental synchronization of a live host
//! scene into a renderer node graph.
//!
//! A [`TranslationSession`] owns every identity structure (node, shader and
//! instance maps, the group registry, the missing-type set and the binding
//! ledger). [`Translator`] materializes host entities and shading networks
//! through it, [`SceneBuilder`] runs full passes, and [`SyncController`]
//! decides per host edit between patch, rebuild and full teardown.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod bindings;
/// Pass shader topology fingerprints.
pub mod branch;
mod build;
/// Authored type to renderer type decisions.
pub mod catalog;
mod entity;
mod error;
mod group;
mod identity;
mod interrupt;
mod key;
mod layers;
mod missing;
/// Transform motion-key schedule.
pub mod motion;
mod pause;
mod session;
/// Persisted session settings.
pub mod settings;
mod shading;
mod source;
mod sync;

/// Link and reference bookkeeping.
pub use bindings::{BindingLedger, BoundParam, DetachedBinding};
/// Full build passes.
pub use build::{BuildReport, BuildStatus, SceneBuilder, Stage};
/// Error type shared by every translation path.
pub use error::TranslateError;
/// Container expansions.
pub use group::{GroupKey, GroupRegistry};
/// At-most-once translation cache.
pub use identity::IdentityMap;
/// Cooperative cancellation.
pub use interrupt::Interrupt;
/// Identity-map keys.
pub use key::{InstanceKey, KeyTime, MapKey, NodeKey, ShaderKey};
/// Layer stack selection.
pub use layers::{active_layers, LAYER_CONTROL_PARAMS};
/// Once-per-session miss reporting.
pub use missing::MissingTranslationSet;
/// Scoped renderer pause.
pub use pause::RenderPause;
/// Session state and mode.
pub use session::{SessionMode, TranslationSession};
pub use settings::{ModeSetting, OutputMask, SessionSettings};
/// Shading-network translation.
pub use shading::Translator;
/// Parameter source classification.
pub use source::{resolve_source, Source};
/// Interactive synchronization.
pub use sync::{RenderOutcome, SyncAction, SyncController, SyncState};
