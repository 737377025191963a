// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderer schemas and small scenes shared by the integration tests.

use weft_port::{EntityKind, EntityRef, NodeEntry, ParamSpec, ParamType, Value, ValueType};

use crate::host::MockHost;
use crate::renderer::MockRenderer;

fn value(name: &str, ty: ValueType) -> ParamSpec {
    ParamSpec::new(name, ParamType::Value(ty))
}

fn xform() -> Vec<ParamSpec> {
    vec![
        value("matrix", ValueType::Matrix),
        value("motion_start", ValueType::Float),
        value("motion_end", ValueType::Float),
    ]
}

fn entry(type_name: &str, mut params: Vec<ParamSpec>, with_xform: bool) -> NodeEntry {
    if with_xform {
        params.extend(xform());
    }
    NodeEntry {
        type_name: type_name.to_owned(),
        params,
    }
}

/// Node types of a small but complete renderer.
///
/// Cameras, lights and geometry carry `matrix` plus motion range slots.
/// `switch_shader.inputs` is an indexed table with its positions in `index`.
pub fn standard_schemas() -> Vec<NodeEntry> {
    use ValueType::{Float, Int, Node, Rgb, Str, Vector};
    let camera = |t: &str, extra: Vec<ParamSpec>| {
        let mut params = vec![value("near_clip", Float), value("far_clip", Float)];
        params.extend(extra);
        entry(t, params, true)
    };
    let light = |t: &str, extra: Vec<ParamSpec>| {
        let mut params = vec![
            value("color", Rgb),
            value("intensity", Float),
            value("exposure", Float),
        ];
        params.extend(extra);
        entry(t, params, true)
    };
    let geometry = |t: &str, extra: Vec<ParamSpec>| {
        let mut params = vec![
            ParamSpec::new("shader", ParamType::NodeRef),
            value("visibility", Int),
        ];
        params.extend(extra);
        entry(t, params, true)
    };
    vec![
        entry(
            "options",
            vec![
                ParamSpec::new("camera", ParamType::NodeRef),
                ParamSpec::new("background", ParamType::NodeRef),
                ParamSpec::new("atmosphere", ParamType::NodeRef),
                ParamSpec::new("aov_shaders", ParamType::Array(Node)),
                value("xres", Int),
                value("yres", Int),
                value("AA_samples", Int),
            ],
            false,
        ),
        camera("persp_camera", vec![value("fov", Float)]),
        camera("ortho_camera", vec![value("screen_window", Vector)]),
        camera("fisheye_camera", vec![value("fov", Float)]),
        camera("spherical_camera", Vec::new()),
        camera("cyl_camera", vec![value("horizontal_fov", Float)]),
        light("point_light", vec![value("radius", Float)]),
        light("spot_light", vec![value("cone_angle", Float)]),
        light("distant_light", vec![value("angle", Float)]),
        light("quad_light", Vec::new()),
        light("skydome_light", vec![value("resolution", Int)]),
        entry(
            "standard_surface",
            vec![
                value("base", Float),
                value("base_color", Rgb),
                value("specular", Float),
                value("specular_color", Rgb),
                value("emission", Float),
                value("emission_color", Rgb),
                value("opacity", Rgb),
                value("normal", Vector),
            ],
            false,
        ),
        entry("flat", vec![value("color", Rgb)], false),
        entry(
            "image",
            vec![
                value("filename", Str),
                value("swrap", Str),
                value("twrap", Str),
                value("mipmap_bias", Int),
                value("filter", Str),
                value("color_space", Str),
                ParamSpec::new("uvcoords", ParamType::Array(Float)),
                value("multiply", Rgb),
            ],
            false,
        ),
        entry(
            "layer_rgba",
            vec![
                value("base", Rgb),
                value("layer", Rgb),
                value("mix", Float),
            ],
            false,
        ),
        entry(
            "switch_shader",
            vec![
                ParamSpec::new(
                    "inputs",
                    ParamType::IndexedTable {
                        index: "index".into(),
                    },
                ),
                ParamSpec::new("index", ParamType::Array(Int)),
            ],
            false,
        ),
        entry(
            "ramp_float",
            vec![
                ParamSpec::new("position", ParamType::Array(Float)),
                ParamSpec::new("value", ParamType::Array(Float)),
                value("input", Float),
            ],
            false,
        ),
        entry("sky", vec![value("color", Rgb), value("intensity", Float)], false),
        entry("fog", vec![value("density", Float), value("color", Rgb)], false),
        entry("aov_write_rgb", vec![value("aov_input", Rgb), value("aov_name", Str)], false),
        geometry("polymesh", vec![value("subdiv_iterations", Int)]),
        geometry("curves", vec![value("radius", Float)]),
        geometry("points", vec![value("index", Int), value("radius", Float)]),
        geometry("ginstance", vec![ParamSpec::new("node", ParamType::NodeRef)]),
        entry("imager_exposure", vec![value("exposure", Float)], false),
        entry(
            "set_parameter",
            vec![value("selection", Str), value("assignment", Str)],
            false,
        ),
    ]
}

impl MockRenderer {
    /// A renderer with every [`standard_schemas`] type registered.
    pub fn standard() -> Self {
        let mut renderer = Self::new();
        for schema in standard_schemas() {
            renderer.register(&schema.type_name, schema.params);
        }
        renderer
    }
}

/// Entities of [`basic_scene`].
#[derive(Clone, Copy, Debug)]
pub struct BasicScene {
    /// Active pass; its `camera` points at `camera`.
    pub pass: EntityRef,
    /// Perspective camera named `CamA`.
    pub camera: EntityRef,
    /// Point light named `Key`.
    pub light: EntityRef,
    /// `standard_surface` named `Skin`.
    pub surface: EntityRef,
    /// Mesh named `Body` with `Skin` as its material.
    pub mesh: EntityRef,
}

/// A pass, a camera, a light and one shaded mesh.
pub fn basic_scene(host: &MockHost) -> BasicScene {
    let pass = host.add_typed(EntityKind::Pass, "Beauty", "default");
    let camera = host.add_typed(EntityKind::Camera, "CamA", "perspective");
    let light = host.add_typed(EntityKind::Light, "Key", "point");
    let surface = host.add_typed(EntityKind::Shader, "Skin", "standard_surface");
    let mesh = host.add(EntityKind::PolyMesh, "Body");

    host.set(pass, "camera", camera);
    host.set(pass, "xres", 640_i64);
    host.set(pass, "yres", 480_i64);
    host.set(camera, "fov", 54.0_f32);
    host.set(camera, "matrix", Value::IDENTITY);
    host.set(light, "intensity", 2.0_f32);
    host.set(light, "color", Value::Rgb([1.0, 0.9, 0.8]));
    host.set(light, "matrix", Value::IDENTITY);
    host.set(surface, "base", 0.8_f32);
    host.set(surface, "base_color", Value::Rgb([0.8, 0.5, 0.4]));
    host.set(mesh, "matrix", Value::IDENTITY);
    host.connect_shader(mesh, "shader", surface);

    BasicScene {
        pass,
        camera,
        light,
        surface,
        mesh,
    }
}

/// Adds a `flat` shader named `name` with a constant color.
pub fn flat_shader(host: &MockHost, name: &str, rgb: [f32; 3]) -> EntityRef {
    let shader = host.add_typed(EntityKind::Shader, name, "flat");
    host.set(shader, "color", Value::Rgb(rgb));
    shader
}
