// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Classification of what feeds a host parameter.

use rustc_hash::FxHashSet;
use weft_port::{Connection, EntityRef, HostScene, TimeKey, Value};

use crate::error::TranslateError;

/// Terminal source of a parameter after pass-through hops are followed.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    /// Output of another shader.
    Shader {
        /// Upstream shader entity.
        shader: EntityRef,
        /// Named output, if any.
        output: Option<String>,
    },
    /// An image source; becomes an `image` node.
    ImageSource(EntityRef),
    /// A time curve; baked into a value or sample array.
    Curve {
        /// Curve entity.
        curve: EntityRef,
        /// Sampling domain `[start, end]`.
        domain: [f64; 2],
    },
    /// An expression; evaluated at the current time.
    Expression(EntityRef),
    /// Array parameter with independently connected elements.
    ArrayOfSources(Vec<Source>),
    /// Unconnected; the parameter's own value.
    PlainValue(Value),
    /// Unconnected and without a value.
    Unset,
}

/// Resolves the source feeding `entity.parameter` at `time`.
///
/// Follows `Connection::Parameter` hops. A hop that revisits a parameter
/// already on the current path fails with [`TranslateError::Cycle`]; two array
/// elements reaching the same parameter are not a cycle.
pub fn resolve_source(
    host: &dyn HostScene,
    entity: EntityRef,
    parameter: &str,
    time: TimeKey,
) -> Result<Source, TranslateError> {
    let mut hops = FxHashSet::default();
    resolve_parameter(host, entity, parameter, time, &mut hops)
}

fn resolve_parameter(
    host: &dyn HostScene,
    entity: EntityRef,
    parameter: &str,
    time: TimeKey,
    hops: &mut FxHashSet<(EntityRef, String)>,
) -> Result<Source, TranslateError> {
    let hop = (entity, parameter.to_owned());
    if !hops.insert(hop.clone()) {
        return Err(TranslateError::Cycle { entity });
    }
    let resolved = classify(host, entity, parameter, time, hops);
    hops.remove(&hop);
    resolved
}

fn classify(
    host: &dyn HostScene,
    entity: EntityRef,
    parameter: &str,
    time: TimeKey,
    hops: &mut FxHashSet<(EntityRef, String)>,
) -> Result<Source, TranslateError> {
    match host.get_source(entity, parameter) {
        None => Ok(host
            .evaluate(entity, parameter, time)
            .map_or(Source::Unset, Source::PlainValue)),
        Some(Connection::Array(elements)) => {
            let base = host.evaluate(entity, parameter, time);
            let base = base.as_ref().and_then(Value::as_array).unwrap_or(&[]);
            let mut items = Vec::with_capacity(elements.len());
            for (i, element) in elements.into_iter().enumerate() {
                let item = match element {
                    Some(conn) => resolve_connection(host, conn, time, hops)?,
                    None => base
                        .get(i)
                        .cloned()
                        .map_or(Source::Unset, Source::PlainValue),
                };
                items.push(item);
            }
            Ok(Source::ArrayOfSources(items))
        }
        Some(conn) => resolve_connection(host, conn, time, hops),
    }
}

fn resolve_connection(
    host: &dyn HostScene,
    connection: Connection,
    time: TimeKey,
    hops: &mut FxHashSet<(EntityRef, String)>,
) -> Result<Source, TranslateError> {
    Ok(match connection {
        Connection::Parameter { entity, parameter } => {
            return resolve_parameter(host, entity, &parameter, time, hops)
        }
        Connection::Shader { shader, output } => Source::Shader { shader, output },
        Connection::Image { source } => Source::ImageSource(source),
        Connection::Curve { curve, domain } => Source::Curve { curve, domain },
        Connection::Expression { expression } => Source::Expression(expression),
        Connection::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(match element {
                    Some(conn) => resolve_connection(host, conn, time, hops)?,
                    None => Source::Unset,
                });
            }
            Source::ArrayOfSources(items)
        }
    })
}
