// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host scene query surface.

use crate::ident::EntityRef;
use crate::time::TimeKey;
use crate::value::Value;

/// Category of a host entity, as far as translation is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Render pass / render configuration (drives the `options` node).
    Pass,
    /// Scene operator (procedural graph edit executed by the renderer).
    Operator,
    /// Camera.
    Camera,
    /// Image post-processor attached to the output driver.
    Imager,
    /// Light.
    Light,
    /// Shader node.
    Shader,
    /// Image source (texture file reference).
    ImageSource,
    /// Polygon mesh.
    PolyMesh,
    /// Curves / hair.
    Curves,
    /// Procedurally generated point cloud; expands to several primitives.
    PointCloud,
    /// Instance of another geometry or container.
    Instance,
    /// Compositing layer attached to a shader.
    Layer,
    /// Time curve (host-side animation function).
    Curve,
    /// Scripted expression.
    Expression,
}

/// Enumeration scope for [`HostScene::enumerate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every entity in the active scene.
    Scene,
    /// Direct children of the given entity.
    Children(EntityRef),
}

/// What feeds a host parameter, before pass-through resolution.
///
/// `weft-core` walks [`Connection::Parameter`] hops until it reaches one of the
/// terminal variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Connection {
    /// Pass-through wrapper: the parameter just forwards another parameter.
    Parameter {
        /// Owner of the forwarded parameter.
        entity: EntityRef,
        /// Name of the forwarded parameter.
        parameter: String,
    },
    /// Output of another shader.
    Shader {
        /// Upstream shader entity.
        shader: EntityRef,
        /// Output port, if the shader has more than one.
        output: Option<String>,
    },
    /// Image source (texture).
    Image {
        /// Image source entity.
        source: EntityRef,
    },
    /// Time curve sampled over `domain`.
    Curve {
        /// Curve entity.
        curve: EntityRef,
        /// Sampling domain `[start, end]`.
        domain: [f64; 2],
    },
    /// Scripted expression evaluated at the current time.
    Expression {
        /// Expression entity.
        expression: EntityRef,
    },
    /// Array parameter whose elements are connected independently.
    /// `None` elements are unconnected and use the parameter's own value.
    Array(Vec<Option<Connection>>),
}

/// Texture wrap mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    /// Repeat the texture.
    #[default]
    Periodic,
    /// Return black outside `[0, 1]`.
    Black,
    /// Clamp to the edge texel.
    Clamp,
    /// Mirror at the edges.
    Mirror,
    /// Use the mode stored in the file.
    File,
}

impl WrapMode {
    /// Renderer enum name for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Black => "black",
            Self::Clamp => "clamp",
            Self::Mirror => "mirror",
            Self::File => "file",
        }
    }
}

/// Sub-options of an image source, read from the host's texture side-table.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureOptions {
    /// Horizontal wrap mode.
    pub wrap_u: WrapMode,
    /// Vertical wrap mode.
    pub wrap_v: WrapMode,
    /// Mipmap level bias.
    pub mipmap_bias: i32,
    /// Filter name (`closest`, `bilinear`, `bicubic`, `smart_bicubic`).
    pub filter: String,
    /// Color space of the file (`auto`, `sRGB`, `linear`, ...).
    pub color_space: String,
    /// Crop window `[u_min, v_min, u_max, v_max]`, if any.
    pub crop: Option<[f32; 4]>,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            wrap_u: WrapMode::Periodic,
            wrap_v: WrapMode::Periodic,
            mipmap_bias: 0,
            filter: "smart_bicubic".into(),
            color_space: "auto".into(),
            crop: None,
        }
    }
}

/// Message severity for the host's message log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Informational.
    Info,
    /// Something was skipped or degraded.
    Warning,
    /// A user-visible failure.
    Error,
}

/// The host's user-facing message log.
pub trait MessageLog {
    /// Append a message to the log.
    fn report(&self, severity: Severity, message: &str);
}

/// Read-only query surface of the host scene.
///
/// Every method must be callable re-entrantly from inside a translation pass:
/// translating one shader queries others. Methods return `None`/empty for
/// unknown entities rather than failing.
pub trait HostScene: MessageLog {
    /// Lists entities in `scope`, optionally filtered by kind, in authored order.
    fn enumerate(&self, scope: Scope, filter: Option<EntityKind>) -> Vec<EntityRef>;

    /// Returns the entity's kind, or `None` if it no longer exists.
    fn kind(&self, entity: EntityRef) -> Option<EntityKind>;

    /// Returns the entity's unique full name.
    fn name(&self, entity: EntityRef) -> Option<String>;

    /// Returns the entity's authored type (shader type, light type, ...).
    fn type_name(&self, entity: EntityRef) -> Option<String>;

    /// Evaluates `parameter` on `entity` at `time`.
    fn evaluate(&self, entity: EntityRef, parameter: &str, time: TimeKey) -> Option<Value>;

    /// Returns what feeds `parameter`, or `None` if it is unconnected.
    fn get_source(&self, entity: EntityRef, parameter: &str) -> Option<Connection>;

    /// Lists the translatable parameter names of `entity`, in authored order.
    fn get_properties(&self, entity: EntityRef) -> Vec<String>;

    /// Samples a time curve at abscissa `x`.
    fn sample_curve(&self, curve: EntityRef, x: f64) -> Option<Value> {
        let _ = (curve, x);
        None
    }

    /// Lists the compositing layers attached to `shader`, top to bottom.
    fn layers(&self, shader: EntityRef) -> Vec<EntityRef> {
        let _ = shader;
        Vec::new()
    }

    /// Returns the texture side-table options for an image source.
    fn texture_options(&self, image: EntityRef) -> Option<TextureOptions> {
        let _ = image;
        None
    }

    /// Resolves the file path of an image source at `time`.
    fn resolve_path(&self, image: EntityRef, time: TimeKey) -> Option<String> {
        let _ = (image, time);
        None
    }

    /// Returns `true` if the entity's translation does not depend on time.
    fn is_time_invariant(&self, entity: EntityRef) -> bool {
        let _ = entity;
        false
    }
}
