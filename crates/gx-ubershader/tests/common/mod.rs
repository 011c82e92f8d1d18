//! Shared fixtures: a light/material uniform set and an interpreter wired with the generated
//! helpers.

#![allow(dead_code)]

use gx_ubershader::interp::{EvalError, Interpreter, Value};
use gx_ubershader::{
    lighting_function, ApiType, LitChannelLayout, VertexLightingVars, I_COMPONENTS, I_LIGHTS,
    I_MATERIALS, XFMEM_ALPHA_FN, XFMEM_COLOR_FN,
};
use hashbrown::HashMap;

pub const VARS: VertexLightingVars<'static> = VertexLightingVars {
    world_pos: "pos",
    normal: "normal_ws",
    in_color_0: "rawcolor0",
    in_color_1: "rawcolor1",
    out_color_0: "out0",
    out_color_1: "out1",
};

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub color: [i32; 4],
    pub cosatt: [f32; 3],
    pub distatt: [f32; 3],
    pub pos: [f32; 3],
    pub dir: [f32; 3],
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: [0; 4],
            cosatt: [1.0, 0.0, 0.0],
            distatt: [1.0, 0.0, 0.0],
            pos: [0.0; 3],
            dir: [0.0, 0.0, 1.0],
        }
    }
}

impl Light {
    fn to_value(self) -> Value {
        let v4 = |v: [f32; 3]| Value::float4([v[0], v[1], v[2], 0.0]);
        Value::record([
            ("color", Value::int4(self.color)),
            ("cosatt", v4(self.cosatt)),
            ("distatt", v4(self.distatt)),
            ("pos", v4(self.pos)),
            ("dir", v4(self.dir)),
        ])
    }
}

/// Everything the generated code reads from uniforms.
#[derive(Debug, Clone)]
pub struct Uniforms {
    pub lights: [Light; 8],
    /// Ambient 0/1, then material 0/1.
    pub materials: [[i32; 4]; 4],
    pub components: u32,
    pub color_words: [u32; 2],
    pub alpha_words: [u32; 2],
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            lights: [Light::default(); 8],
            materials: [[0; 4], [0; 4], [255; 4], [255; 4]],
            components: 0,
            color_words: [0; 2],
            alpha_words: [0; 2],
        }
    }
}

fn word_accessor(words: [u32; 2]) -> impl Fn(&[Value]) -> Result<Value, EvalError> {
    move |args: &[Value]| {
        let chan = args
            .first()
            .and_then(Value::as_uint)
            .ok_or_else(|| EvalError::UnknownIdent("chan".into()))?;
        words
            .get(chan as usize)
            .copied()
            .map(Value::uint)
            .ok_or(EvalError::IndexOutOfBounds {
                index: chan as usize,
                len: words.len(),
            })
    }
}

pub fn interpreter(uniforms: &Uniforms) -> Interpreter {
    let mut interp = Interpreter::new();
    interp.add_function(lighting_function());
    interp.set_global(
        I_LIGHTS,
        Value::array(uniforms.lights.iter().map(|l| l.to_value())),
    );
    interp.set_global(
        I_MATERIALS,
        Value::array(uniforms.materials.iter().map(|&m| Value::int4(m))),
    );
    interp.set_global(I_COMPONENTS, Value::uint(uniforms.components));
    interp.add_native(XFMEM_COLOR_FN, word_accessor(uniforms.color_words));
    interp.add_native(XFMEM_ALPHA_FN, word_accessor(uniforms.alpha_words));
    interp
}

/// Calls `CalculateLighting` and returns its integer contribution.
pub fn calculate_lighting(
    uniforms: &Uniforms,
    index: u32,
    attnfunc: u32,
    diffusefunc: u32,
    pos: [f32; 3],
    normal: [f32; 3],
) -> [i32; 4] {
    let result = interpreter(uniforms)
        .call(
            "CalculateLighting",
            &[
                Value::uint(index),
                Value::uint(attnfunc),
                Value::uint(diffusefunc),
                Value::float3(pos),
                Value::float3(normal),
            ],
        )
        .expect("CalculateLighting evaluates");
    let ints = result.as_ints().expect("int4 result");
    [ints[0], ints[1], ints[2], ints[3]]
}

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color0: [f32; 4],
    pub color1: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            pos: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            color0: [0.0; 4],
            color1: [0.0; 4],
        }
    }
}

/// Runs the generated channel loop for one vertex and returns both output slots.
pub fn run_vertex_lighting(
    uniforms: &Uniforms,
    layout: &LitChannelLayout,
    vertex: &Vertex,
) -> [[f32; 4]; 2] {
    let block = gx_ubershader::vertex_lighting_block(ApiType::OpenGl, layout, &VARS);
    let bindings: HashMap<String, Value> = [
        (VARS.world_pos, Value::float3(vertex.pos)),
        (VARS.normal, Value::float3(vertex.normal)),
        (VARS.in_color_0, Value::float4(vertex.color0)),
        (VARS.in_color_1, Value::float4(vertex.color1)),
        (VARS.out_color_0, Value::float4([0.0; 4])),
        (VARS.out_color_1, Value::float4([0.0; 4])),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value))
    .collect();
    let out = interpreter(uniforms)
        .exec_block(&block, bindings)
        .expect("vertex lighting evaluates");
    let slot = |name: &str| {
        let v = out[name].as_floats().expect("float4 output");
        [v[0], v[1], v[2], v[3]]
    };
    [slot(VARS.out_color_0), slot(VARS.out_color_1)]
}

/// Host model of the final blend: clamp, `(mat * (lacc + (lacc >> 7))) >> 8`, `/ 255`.
pub fn blend(mat: i32, lacc: i32) -> f32 {
    let lacc = lacc.clamp(0, 255);
    ((mat * (lacc + (lacc >> 7))) >> 8) as f32 / 255.0
}
