//! Bitfield extraction for backends that lack a native instruction.
//!
//! GLSL 4.0+/ES 3.1+ and WGSL provide `bitfieldExtract`/`extractBits`. HLSL does not, but fxc and
//! dxc pattern-match the shift/mask sequence below into a single `ubfe`.

use crate::ir::{construct, ident, int, uint, Block, Expr, Function, Param, Ty};
use crate::ShaderDialect;

/// Name of the extraction function called by HLSL-flavoured output.
pub const BITFIELD_EXTRACT_FN: &str = "bitfieldExtract";

/// `(value >> offset) & ((1 << size) - 1)` for `offset` in `0..=31` and `size` in `1..=32`.
///
/// The mask is built as `u32::MAX >> (32 - size)` so a 32-bit field never shifts by the full
/// register width. Outside those ranges the result is whatever the polyfill computes on a GPU:
/// `32 - size` wraps and shift amounts keep their low five bits.
pub fn bitfield_extract(value: u32, offset: u32, size: u32) -> u32 {
    let mask = u32::MAX.wrapping_shr(32u32.wrapping_sub(size));
    value.wrapping_shr(offset) & mask
}

/// The polyfill as IR. Parameter types follow each dialect's native signature
/// (`uint bitfieldExtract(uint, int, int)` for GLSL-compatible HLSL, all-`u32` for WGSL).
pub fn bitfield_extract_function(dialect: ShaderDialect) -> Function {
    // WGSL takes the offset and size as `u32`; the C-like signature takes `int`.
    let offset_ty = match dialect {
        ShaderDialect::Hlsl => Ty::INT,
        ShaderDialect::Wgsl => Ty::UINT,
    };
    let params = vec![
        Param::new("val", Ty::UINT),
        Param::new("off", offset_ty),
        Param::new("size", offset_ty),
    ];
    let as_uint = |e: Expr| match dialect {
        ShaderDialect::Hlsl => construct(Ty::UINT, [e]),
        ShaderDialect::Wgsl => e,
    };
    let width = match dialect {
        ShaderDialect::Hlsl => int(32),
        ShaderDialect::Wgsl => uint(32),
    };

    let mut body = Block::new();
    body.let_(
        "mask",
        Ty::UINT,
        uint(u32::MAX) >> as_uint(width - ident("size")),
    );
    body.ret((ident("val") >> as_uint(ident("off"))) & ident("mask"));

    Function {
        name: BITFIELD_EXTRACT_FN.to_owned(),
        params,
        ret: Ty::UINT,
        body,
    }
}
