//! Ubershader source generation for GX fixed-function vertex lighting.
//!
//! Instead of compiling one specialized program per transform-unit configuration, the
//! ubershader reads the packed lighting-channel words at runtime and branches on them. This crate
//! emits the pieces shared by every ubershader variant:
//!
//! 1. the common header ([`write_uber_shader_common_header`]), which only contains a
//!    `bitfieldExtract` polyfill when the backend lacks one;
//! 2. the per-light helper `CalculateLighting` ([`lighting::write_lighting_function`]);
//! 3. the per-vertex channel loop ([`vertex_lighting::write_vertex_lighting`]), spliced into the
//!    caller's vertex body.
//!
//! Every generator builds [`ir`] first and renders it through [`writer`], so the same program can
//! be emitted as HLSL-flavoured source or WGSL and can be run on the CPU with [`interp`].

pub mod bitfield;
pub mod interp;
pub mod ir;
pub mod lighting;
pub mod vertex_lighting;
pub mod writer;
pub mod xf;

use tracing::debug;

pub use bitfield::{bitfield_extract, bitfield_extract_function};
pub use lighting::{lighting_function, write_lighting_function};
pub use vertex_lighting::{vertex_lighting_block, write_vertex_lighting, VertexLightingVars};
pub use xf::{
    AttenuationFunc, BitField, ColorSource, DiffuseFunc, LayoutError, LitChannelConfig,
    LitChannelLayout, VertexComponents,
};

/// Uniform array of light structs (`color`, `cosatt`, `distatt`, `pos`, `dir`).
pub const I_LIGHTS: &str = "clights";
/// Uniform `int4[4]`: ambient registers for channels 0/1, then material registers 0/1.
pub const I_MATERIALS: &str = "cmtrl";
/// Uniform `uint` holding [`VertexComponents`] bits of the current vertex format.
pub const I_COMPONENTS: &str = "components";
/// Accessor returning the packed color lighting word for a channel.
pub const XFMEM_COLOR_FN: &str = "xfmem_color";
/// Accessor returning the packed alpha lighting word for a channel.
pub const XFMEM_ALPHA_FN: &str = "xfmem_alpha";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiType {
    OpenGl,
    Vulkan,
    D3d,
    WebGpu,
}

impl ApiType {
    pub fn dialect(self) -> ShaderDialect {
        match self {
            ApiType::OpenGl | ApiType::Vulkan | ApiType::D3d => ShaderDialect::Hlsl,
            ApiType::WebGpu => ShaderDialect::Wgsl,
        }
    }
}

/// Source language of emitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// HLSL-style C-like source (`float4`, `int4`, `uint`). The GL and Vulkan drivers consume the
    /// same text through type aliases (`#define float4 vec4` and friends) they prepend.
    Hlsl,
    Wgsl,
}

/// Backend capabilities that change the shared header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShaderHostConfig {
    /// The backend has a native bitfield-extract intrinsic.
    pub backend_bitfield: bool,
}

impl ShaderHostConfig {
    pub fn for_api(api: ApiType) -> Self {
        Self {
            // GL 4.0+, SPIR-V and WGSL all expose one; HLSL does not.
            backend_bitfield: !matches!(api, ApiType::D3d),
        }
    }
}

/// Writes the header shared by every ubershader. Only the bitfield polyfill lives here today.
pub fn write_uber_shader_common_header(
    out: &mut String,
    api: ApiType,
    host_config: &ShaderHostConfig,
) {
    let emit_polyfill = !host_config.backend_bitfield;
    debug!(?api, emit_polyfill, "writing ubershader common header");
    if emit_polyfill {
        let dialect = api.dialect();
        writer::write_function(out, dialect, &bitfield_extract_function(dialect));
        out.push('\n');
    }
}
