//! Per-light contribution helper shared by every ubershader.
//!
//! `CalculateLighting(index, attnfunc, diffusefunc, pos, normal)` returns the integer RGBA
//! contribution of light `index`: `round(attn * shaped(N.L) * color)`. Both codes are runtime
//! values, so every attenuation and diffuse model is present in the emitted text.

use crate::ir::{
    call, construct, float, ident, int, select, uint, Block, Expr, Function, Literal, Param,
    Place, Stmt, SwitchCase, Swizzle, Ty,
};
use crate::xf::{AttenuationFunc, DiffuseFunc};
use crate::{writer, ShaderDialect, I_LIGHTS};

pub const CALCULATE_LIGHTING_FN: &str = "CalculateLighting";

fn light(field: &str) -> Expr {
    ident(I_LIGHTS).index(ident("index")).field(field)
}

fn light_xyz(field: &str) -> Expr {
    light(field).swizzle(Swizzle::XYZ)
}

fn max0(e: Expr) -> Expr {
    call("max", [float(0.0), e])
}

fn dot(a: Expr, b: Expr) -> Expr {
    call("dot", [a, b])
}

fn normalize(e: Expr) -> Expr {
    call("normalize", [e])
}

/// `(1, x, x*x)`
fn quadratic_basis(x: &str, x2: Expr) -> Expr {
    construct(Ty::FLOAT3, [float(1.0), ident(x), x2])
}

fn case(labels: &[u32], comment: &str, body: Block) -> SwitchCase {
    SwitchCase {
        labels: labels.iter().map(|&l| Literal::Uint(l)).collect(),
        comment: Some(comment.to_owned()),
        body,
    }
}

fn set(block: &mut Block, var: &str, value: Expr) {
    block.assign(Place::var(var), value);
}

/// NONE and DIR: unit attenuation towards the light position.
fn directional_case() -> Block {
    let mut b = Block::new();
    set(&mut b, "ldir", light_xyz("pos") - ident("pos"));
    set(&mut b, "attn", float(1.0));
    // A light sitting on the vertex has no direction; fall back to the normal rather than
    // normalising a zero vector.
    let mut degenerate = Block::new();
    set(&mut degenerate, "ldir", ident("normal"));
    let mut regular = Block::new();
    set(&mut regular, "ldir", normalize(ident("ldir")));
    b.if_(
        call("length", [ident("ldir")]).cmp_eq(float(0.0)),
        degenerate,
        Some(regular),
    );
    b
}

/// SPEC: angular attenuation against the light direction, with a back-face cutoff.
fn specular_case() -> Block {
    let mut b = Block::new();
    set(&mut b, "ldir", normalize(light_xyz("pos") - ident("pos")));
    set(&mut b, "attn", max0(dot(ident("normal"), light_xyz("dir"))));
    set(&mut b, "cosAttn", light_xyz("cosatt"));

    // The distance coefficients are normalised unless the *diffuse* function is NONE. This
    // follows the hardware, not the attenuation code.
    let mut raw = Block::new();
    set(&mut raw, "distAttn", light_xyz("distatt"));
    let mut normalized = Block::new();
    set(&mut normalized, "distAttn", normalize(light_xyz("distatt")));
    b.if_(
        ident("diffusefunc").cmp_eq(uint(DiffuseFunc::NONE)),
        raw,
        Some(normalized),
    );

    let basis = || quadratic_basis("attn", ident("attn") * ident("attn"));
    let falloff = max0(dot(ident("cosAttn"), basis())) / dot(ident("distAttn"), basis());
    set(
        &mut b,
        "attn",
        select(
            dot(ident("normal"), ident("ldir")).cmp_ge(float(0.0)),
            falloff,
            float(0.0),
        ),
    );
    b
}

/// SPOT: angular falloff over cosine coefficients, divided by quadratic distance falloff.
fn spot_case() -> Block {
    let mut b = Block::new();
    set(&mut b, "ldir", light_xyz("pos") - ident("pos"));
    set(&mut b, "dist2", dot(ident("ldir"), ident("ldir")));
    set(&mut b, "dist", call("sqrt", [ident("dist2")]));
    set(&mut b, "ldir", ident("ldir") / ident("dist"));
    set(&mut b, "attn", max0(dot(ident("ldir"), light_xyz("dir"))));

    let cosatt = |s: Swizzle| light("cosatt").swizzle(s);
    let angular = cosatt(Swizzle::X)
        + cosatt(Swizzle::Y) * ident("attn")
        + cosatt(Swizzle::Z) * ident("attn") * ident("attn");
    let distance = dot(
        light_xyz("distatt"),
        construct(Ty::FLOAT3, [float(1.0), ident("dist"), ident("dist2")]),
    );
    set(&mut b, "attn", max0(angular) / distance);
    b
}

fn contribution(scale: Expr) -> Expr {
    construct(
        Ty::INT4,
        [call(
            "round",
            [scale * construct(Ty::FLOAT4, [light("color")])],
        )],
    )
}

fn returning(value: Expr) -> Block {
    Block(vec![Stmt::Return(value)])
}

/// `CalculateLighting` as IR.
pub fn lighting_function() -> Function {
    let mut body = Block::new();
    for (name, ty) in [
        ("ldir", Ty::FLOAT3),
        ("cosAttn", Ty::FLOAT3),
        ("distAttn", Ty::FLOAT3),
        ("dist", Ty::FLOAT),
        ("dist2", Ty::FLOAT),
        ("attn", Ty::FLOAT),
    ] {
        body.var(name, ty, None);
    }
    body.blank();

    let mut unknown_attn = Block::new();
    set(&mut unknown_attn, "attn", float(1.0));
    set(&mut unknown_attn, "ldir", ident("normal"));
    body.push(Stmt::Switch {
        selector: ident("attnfunc"),
        cases: vec![
            case(
                &[AttenuationFunc::NONE, AttenuationFunc::DIR],
                "LIGHTATTN_NONE, LIGHTATTN_DIR",
                directional_case(),
            ),
            case(&[AttenuationFunc::SPEC], "LIGHTATTN_SPEC", specular_case()),
            case(&[AttenuationFunc::SPOT], "LIGHTATTN_SPOT", spot_case()),
        ],
        default: Some(unknown_attn),
    });
    body.blank();

    let n_dot_l = || dot(ident("ldir"), ident("normal"));
    body.push(Stmt::Switch {
        selector: ident("diffusefunc"),
        cases: vec![
            case(
                &[DiffuseFunc::NONE],
                "LIGHTDIF_NONE",
                returning(contribution(ident("attn"))),
            ),
            case(
                &[DiffuseFunc::SIGN],
                "LIGHTDIF_SIGN",
                returning(contribution(ident("attn") * n_dot_l())),
            ),
            case(
                &[DiffuseFunc::CLAMP],
                "LIGHTDIF_CLAMP",
                returning(contribution(ident("attn") * max0(n_dot_l()))),
            ),
        ],
        default: Some(returning(construct(
            Ty::INT4,
            [int(0), int(0), int(0), int(0)],
        ))),
    });

    Function {
        name: CALCULATE_LIGHTING_FN.to_owned(),
        params: vec![
            Param::new("index", Ty::UINT),
            Param::new("attnfunc", Ty::UINT),
            Param::new("diffusefunc", Ty::UINT),
            Param::new("pos", Ty::FLOAT3),
            Param::new("normal", Ty::FLOAT3),
        ],
        ret: Ty::INT4,
        body,
    }
}

/// Appends `CalculateLighting` followed by a blank line.
pub fn write_lighting_function(out: &mut String, dialect: ShaderDialect) {
    out.push_str("// Lighting channel calculation helper\n");
    writer::write_function(out, dialect, &lighting_function());
    out.push('\n');
}
