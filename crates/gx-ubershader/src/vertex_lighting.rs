//! Per-vertex color channel loop.
//!
//! For each of the two channels the emitted code decodes the packed color and alpha lighting
//! words, resolves the material and ambient baselines, accumulates the enabled lights, then
//! applies the hardware fixed-point blend and stores the result into one of two output slots.

use tracing::{debug, warn};

use crate::ir::{
    bitfield_extract, call, construct, float, ident, int, select, splat, uint, Block, Expr,
    Literal, LoopHint, Place, Stmt, SwitchCase, Swizzle, Ty,
};
use crate::lighting::CALCULATE_LIGHTING_FN;
use crate::xf::{
    BitField, LitChannelLayout, VertexComponents, NUM_XF_COLOR_CHANNELS, NUM_XF_LIGHTS,
};
use crate::{writer, ApiType, I_COMPONENTS, I_MATERIALS, XFMEM_ALPHA_FN, XFMEM_COLOR_FN};

/// Names of the caller's variables. They are embedded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLightingVars<'a> {
    pub world_pos: &'a str,
    pub normal: &'a str,
    pub in_color_0: &'a str,
    pub in_color_1: &'a str,
    pub out_color_0: &'a str,
    pub out_color_1: &'a str,
}

/// Which half of a channel a lighting word configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Color,
    Alpha,
}

impl Pass {
    fn reg(self) -> &'static str {
        match self {
            Pass::Color => "colorreg",
            Pass::Alpha => "alphareg",
        }
    }

    fn mask(self) -> Swizzle {
        match self {
            Pass::Color => Swizzle::XYZ,
            Pass::Alpha => Swizzle::W,
        }
    }

    /// Integer type matching [`Pass::mask`].
    fn int_ty(self) -> Ty {
        match self {
            Pass::Color => Ty::INT3,
            Pass::Alpha => Ty::INT,
        }
    }
}

struct Emitter<'a> {
    layout: &'a LitChannelLayout,
    vars: &'a VertexLightingVars<'a>,
}

impl Emitter<'_> {
    /// `bitfieldExtract(<reg>, off, size) != 0u`
    fn flag(&self, pass: Pass, field: BitField) -> Expr {
        bitfield_extract(ident(pass.reg()), field).cmp_ne(uint(0))
    }

    /// Channel-selected vertex color components scaled to 0..255 and rounded.
    fn vertex_color(&self, mask: Swizzle, ty: Ty) -> Expr {
        let chosen = select(
            ident("chan").cmp_eq(uint(0)),
            ident(self.vars.in_color_0).swizzle(mask),
            ident(self.vars.in_color_1).swizzle(mask),
        );
        construct(ty, [call("round", [chosen * float(255.0)])])
    }

    fn material(&self) -> Block {
        let mut b = Block::new();

        let mut from_vertex = Block::new();
        from_vertex.assign(
            Place::masked("mat", Swizzle::XYZ),
            self.vertex_color(Swizzle::XYZ, Ty::INT3),
        );
        b.if_(
            self.flag(Pass::Color, self.layout.matsource),
            from_vertex,
            None,
        );

        let mut from_vertex = Block::new();
        from_vertex.assign(
            Place::masked("mat", Swizzle::W),
            self.vertex_color(Swizzle::W, Ty::INT),
        );
        let mut from_register = Block::new();
        from_register.assign(
            Place::masked("mat", Swizzle::W),
            ident(I_MATERIALS)
                .index(ident("chan") + uint(2))
                .swizzle(Swizzle::W),
        );
        b.if_(
            self.flag(Pass::Alpha, self.layout.matsource),
            from_vertex,
            Some(from_register),
        );
        b
    }

    /// Alpha accumulator seed from a vertex color: the channel's own color if present, else
    /// color 0, else opaque. Used by unlit alpha and by lit alpha with a vertex ambient.
    fn alpha_seed_from_vertex(&self) -> Block {
        let lacc_w = || Place::masked("lacc", Swizzle::W);
        let has_col0 = VertexComponents::HAS_COL0.bits();

        let mut own = Block::new();
        own.assign(lacc_w(), self.vertex_color(Swizzle::W, Ty::INT));
        let mut col0 = Block::new();
        col0.assign(
            lacc_w(),
            construct(
                Ty::INT,
                [call(
                    "round",
                    [ident(self.vars.in_color_0).swizzle(Swizzle::W) * float(255.0)],
                )],
            ),
        );
        let mut opaque = Block::new();
        opaque.assign(lacc_w(), int(255));

        let mut fallback = Block::new();
        fallback.if_(
            (ident(I_COMPONENTS) & uint(has_col0)).cmp_ne(uint(0)),
            col0,
            Some(opaque),
        );

        let mut b = Block::new();
        b.if_(
            (ident(I_COMPONENTS) & (uint(has_col0) << ident("chan"))).cmp_ne(uint(0)),
            own,
            Some(fallback),
        );
        b
    }

    fn lit_pass(&self, pass: Pass) -> Block {
        let mut b = Block::new();

        let ambient_vertex = match pass {
            Pass::Color => {
                let mut v = Block::new();
                v.assign(
                    Place::masked("lacc", pass.mask()),
                    self.vertex_color(pass.mask(), pass.int_ty()),
                );
                v
            }
            Pass::Alpha => self.alpha_seed_from_vertex(),
        };
        let mut ambient_register = Block::new();
        ambient_register.assign(
            Place::masked("lacc", pass.mask()),
            ident(I_MATERIALS).index(ident("chan")).swizzle(pass.mask()),
        );
        b.if_(
            self.flag(pass, self.layout.ambsource),
            ambient_vertex,
            Some(ambient_register),
        );
        b.blank();

        let reg = || ident(pass.reg());
        // Each half is a nibble even when the caller's field is wider.
        let nibble = |field: BitField| bitfield_extract(reg(), field) & uint(0xF);
        b.let_(
            "light_mask",
            Ty::UINT,
            nibble(self.layout.light_mask0_3) | (nibble(self.layout.light_mask4_7) << uint(4)),
        );
        b.let_(
            "attnfunc",
            Ty::UINT,
            bitfield_extract(reg(), self.layout.attnfunc),
        );
        b.let_(
            "diffusefunc",
            Ty::UINT,
            bitfield_extract(reg(), self.layout.diffusefunc),
        );

        let contribution = call(
            CALCULATE_LIGHTING_FN,
            [
                ident("light_index"),
                ident("attnfunc"),
                ident("diffusefunc"),
                ident(self.vars.world_pos),
                ident(self.vars.normal),
            ],
        )
        .swizzle(pass.mask());
        let mut accumulate = Block::new();
        accumulate.add_assign(Place::masked("lacc", pass.mask()), contribution);
        let mut per_light = Block::new();
        per_light.if_(
            (ident("light_mask") & (uint(1) << ident("light_index"))).cmp_ne(uint(0)),
            accumulate,
            None,
        );
        b.push(Stmt::For {
            var: "light_index".to_owned(),
            ty: Ty::UINT,
            start: uint(0),
            bound: uint(NUM_XF_LIGHTS),
            hint: LoopHint::None,
            body: per_light,
        });
        b
    }

    fn channel(&self) -> Block {
        let mut b = Block::new();
        b.let_(
            "colorreg",
            Ty::UINT,
            call(XFMEM_COLOR_FN, [ident("chan")]),
        );
        b.let_(
            "alphareg",
            Ty::UINT,
            call(XFMEM_ALPHA_FN, [ident("chan")]),
        );
        b.var(
            "mat",
            Ty::INT4,
            Some(ident(I_MATERIALS).index(ident("chan") + uint(2))),
        );
        b.var(
            "lacc",
            Ty::INT4,
            Some(construct(Ty::INT4, [int(255), int(255), int(255), int(255)])),
        );
        b.blank();

        b.0.extend(self.material().0);
        b.blank();

        for pass in [Pass::Color, Pass::Alpha] {
            // Unlit RGB keeps the 255 seed; unlit alpha takes the vertex alpha when present.
            let unlit = match pass {
                Pass::Color => None,
                Pass::Alpha => Some(self.alpha_seed_from_vertex()),
            };
            b.if_(
                self.flag(pass, self.layout.enablelighting),
                self.lit_pass(pass),
                unlit,
            );
            b.blank();
        }

        b.assign(
            Place::var("lacc"),
            call(
                "clamp",
                [
                    ident("lacc"),
                    splat(Ty::INT4, int(0)),
                    splat(Ty::INT4, int(255)),
                ],
            ),
        );
        b.blank();

        // (a * (b + (b >> 7))) >> 8 approximates a * b / 255 the way the hardware does.
        let lacc = || ident("lacc");
        let blended = (ident("mat") * (lacc() + (lacc() >> splat(Ty::UINT4, uint(7)))))
            >> splat(Ty::UINT4, uint(8));
        b.let_(
            "lit_color",
            Ty::FLOAT4,
            construct(Ty::FLOAT4, [blended]) / float(255.0),
        );

        let store = |slot: &str| {
            let mut s = Block::new();
            s.assign(Place::var(slot), ident("lit_color"));
            s
        };
        b.push(Stmt::Switch {
            selector: ident("chan"),
            cases: vec![
                SwitchCase {
                    labels: vec![Literal::Uint(0)],
                    comment: None,
                    body: store(self.vars.out_color_0),
                },
                SwitchCase {
                    labels: vec![Literal::Uint(1)],
                    comment: None,
                    body: store(self.vars.out_color_1),
                },
            ],
            default: None,
        });
        b
    }
}

/// The channel loop as IR, ready to be spliced into a vertex body that already has the
/// `CalculateLighting` helper and the uniform interface in scope.
pub fn vertex_lighting_block(
    api: ApiType,
    layout: &LitChannelLayout,
    vars: &VertexLightingVars<'_>,
) -> Block {
    let emitter = Emitter { layout, vars };
    let mut block = Block::new();
    block.comment("Lighting");
    block.push(Stmt::For {
        var: "chan".to_owned(),
        ty: Ty::UINT,
        start: uint(0),
        bound: uint(NUM_XF_COLOR_CHANNELS),
        hint: match api {
            ApiType::D3d => LoopHint::DontUnroll,
            ApiType::OpenGl | ApiType::Vulkan | ApiType::WebGpu => LoopHint::None,
        },
        body: emitter.channel(),
    });
    block
}

/// Appends the channel loop at statement level, followed by a blank line.
pub fn write_vertex_lighting(
    out: &mut String,
    api: ApiType,
    layout: &LitChannelLayout,
    vars: &VertexLightingVars<'_>,
) {
    if let Err(err) = layout.validate() {
        warn!(%err, "emitting vertex lighting with an invalid channel layout");
    }
    debug!(?api, ?layout, "writing vertex lighting");
    let block = vertex_lighting_block(api, layout, vars);
    writer::write_block(out, api.dialect(), &block, 0);
    out.push('\n');
}
