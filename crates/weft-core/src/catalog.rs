// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Authored type -> renderer node type.
//!
//! The same decision drives first translation and the patch-vs-rebuild check:
//! an existing node is patched only while its renderer type still equals
//! [`renderer_type`] of the entity's current authored type.

use weft_port::{EntityKind, EntityRef, HostScene};

/// Renderer type used for layer compositing nodes.
pub const LAYER_NODE_TYPE: &str = "layer_rgba";
/// Renderer type of image-source nodes.
pub const IMAGE_NODE_TYPE: &str = "image";
/// Renderer type of one point-cloud primitive.
pub const POINTS_NODE_TYPE: &str = "points";
/// Renderer type of one instance node.
pub const INSTANCE_NODE_TYPE: &str = "ginstance";
/// Renderer type of the options node built from a pass.
pub const OPTIONS_NODE_TYPE: &str = "options";

/// Maps an entity kind and its authored type name to a renderer type.
///
/// Returns `None` when the kind never becomes a node of its own (layers,
/// curves, expressions) or when the authored type has no renderer equivalent.
pub fn renderer_type(kind: EntityKind, authored: Option<&str>) -> Option<String> {
    let mapped = match kind {
        EntityKind::Camera => match authored? {
            "perspective" => "persp_camera",
            "orthographic" => "ortho_camera",
            "fisheye" => "fisheye_camera",
            "spherical" => "spherical_camera",
            "cylindrical" => "cyl_camera",
            _ => return None,
        },
        EntityKind::Light => match authored? {
            "point" => "point_light",
            "spot" => "spot_light",
            "distant" => "distant_light",
            "quad" | "area" => "quad_light",
            "skydome" => "skydome_light",
            _ => return None,
        },
        EntityKind::Shader | EntityKind::Imager | EntityKind::Operator => {
            return authored.filter(|t| !t.is_empty()).map(str::to_owned)
        }
        EntityKind::ImageSource => IMAGE_NODE_TYPE,
        EntityKind::PolyMesh => "polymesh",
        EntityKind::Curves => "curves",
        EntityKind::PointCloud => POINTS_NODE_TYPE,
        EntityKind::Instance => INSTANCE_NODE_TYPE,
        EntityKind::Pass => OPTIONS_NODE_TYPE,
        EntityKind::Layer | EntityKind::Curve | EntityKind::Expression => return None,
    };
    Some(mapped.to_owned())
}

/// Renderer type `entity` would translate to right now.
pub fn expected_type(host: &dyn HostScene, entity: EntityRef) -> Option<String> {
    let kind = host.kind(entity)?;
    renderer_type(kind, host.type_name(entity).as_deref())
}

/// Label used when reporting an untranslatable entity.
pub(crate) fn missing_label(host: &dyn HostScene, entity: EntityRef) -> String {
    host.type_name(entity)
        .or_else(|| host.kind(entity).map(|k| format!("{k:?}")))
        .unwrap_or_else(|| entity.to_string())
}
