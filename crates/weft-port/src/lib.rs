// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port contracts between the weft translator, the host application and the
//! target renderer.
//!
//! This crate defines the domain boundary only. The identity maps, shading
//! translation and synchronization protocol live in `weft-core`.
//!
//! # Design Principles
//!
//! - **The host owns entities** — [`EntityRef`] is an opaque, stable id; the
//!   engine never owns host lifetime.
//! - **The renderer owns nodes** — [`NodeHandle`] is an opaque handle into the
//!   renderer graph; the engine owns only the mapping to it.
//! - **One mutator** — every port call is issued from the host's event thread.
//!   Concurrent render sampling is fenced by [`RenderGraph::pause`] /
//!   [`RenderGraph::resume`].

mod event;
mod host;
mod ident;
mod render;
mod time;
mod value;

pub use event::{EventInbox, HostEvent};
pub use host::{
    Connection, EntityKind, HostScene, MessageLog, Scope, Severity, TextureOptions, WrapMode,
};
pub use ident::{EntityRef, NodeHandle};
pub use render::{NodeEntry, ParamSpec, ParamType, RenderError, RenderGraph};
pub use time::TimeKey;
pub use value::{Value, ValueType};
