mod common;

use common::{blend, run_vertex_lighting, Light, Uniforms, Vertex};
use gx_ubershader::{
    AttenuationFunc, BitField, ColorSource, DiffuseFunc, LitChannelConfig, LitChannelLayout,
    VertexComponents,
};

const XF: LitChannelLayout = LitChannelLayout::XF;

fn word(config: LitChannelConfig) -> u32 {
    config.encode(&XF)
}

fn lit(light_mask: u8, attnfunc: AttenuationFunc, diffusefunc: DiffuseFunc) -> LitChannelConfig {
    LitChannelConfig {
        enablelighting: true,
        light_mask0_3: u32::from(light_mask & 0xF),
        light_mask4_7: u32::from(light_mask >> 4),
        attnfunc,
        diffusefunc,
        ..LitChannelConfig::default()
    }
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
    }
}

#[test]
fn unlit_vertex_color_passes_through() {
    let vertex_material = LitChannelConfig {
        matsource: ColorSource::Vertex,
        ..LitChannelConfig::default()
    };
    let mut uniforms = Uniforms::default();
    uniforms.color_words[0] = word(vertex_material);
    uniforms.alpha_words[0] = word(vertex_material);
    uniforms.materials[3] = [10, 20, 30, 40];
    let vertex = Vertex {
        color0: [0.5, 0.5, 0.5, 1.0],
        ..Vertex::default()
    };

    let [out0, out1] = run_vertex_lighting(&uniforms, &XF, &vertex);
    // Material resolves to (128, 128, 128, 255); the unlit accumulator stays at 255.
    let half = 128.0 / 255.0;
    assert_close(out0, [half, half, half, 1.0]);
    assert!((out0[0] - 0.502).abs() < 1e-3);
    // Channel 1 is register-sourced and unlit: the material register comes back out.
    assert_close(out1, [blend(10, 255), blend(20, 255), blend(30, 255), blend(40, 255)]);
    assert_close(out1, [10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0, 40.0 / 255.0]);
}

#[test]
fn directional_clamped_light_end_to_end() {
    let mut uniforms = Uniforms::default();
    uniforms.lights[0] = Light {
        color: [255, 0, 0, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    };
    uniforms.color_words[0] = word(lit(0b1, AttenuationFunc::Dir, DiffuseFunc::Clamp));

    let [out0, _] = run_vertex_lighting(&uniforms, &XF, &Vertex::default());
    // Ambient register 0 is black, so the light alone produces (255, 0, 0) in the accumulator.
    assert_close(out0, [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn accumulator_is_clamped_before_the_blend() {
    let mut uniforms = Uniforms::default();
    uniforms.lights[0] = Light {
        color: [150, 150, 10, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    };
    uniforms.lights[1] = Light {
        color: [150, 0, 10, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    };
    // Behind the surface: SIGN makes it subtract.
    uniforms.lights[2] = Light {
        color: [0, 0, 30, 0],
        pos: [0.0, 0.0, -10.0],
        ..Light::default()
    };
    uniforms.color_words[0] = word(lit(0b111, AttenuationFunc::None, DiffuseFunc::Sign));

    let [out0, _] = run_vertex_lighting(&uniforms, &XF, &Vertex::default());
    // red 300 -> 255, green 150, blue 20 - 30 = -10 -> 0
    assert_close(out0, [1.0, blend(255, 150), 0.0, 1.0]);
}

#[test]
fn high_nibble_selects_lights_four_to_seven() {
    let mut uniforms = Uniforms::default();
    for (i, light) in uniforms.lights.iter_mut().enumerate() {
        *light = Light {
            color: [10 * (i as i32 + 1), 0, 0, 0],
            pos: [0.0, 0.0, 10.0],
            ..Light::default()
        };
    }
    uniforms.color_words[1] = word(lit(0b0010_0001, AttenuationFunc::Dir, DiffuseFunc::Clamp));

    let [_, out1] = run_vertex_lighting(&uniforms, &XF, &Vertex::default());
    // Lights 0 and 5: 10 + 60.
    assert_close(out1, [blend(255, 70), 0.0, 0.0, 1.0]);
}

#[test]
fn register_ambient_seeds_the_accumulator() {
    let mut uniforms = Uniforms::default();
    uniforms.materials[0] = [64, 32, 16, 200];
    uniforms.materials[2] = [200, 200, 200, 100];
    uniforms.color_words[0] = word(lit(0, AttenuationFunc::None, DiffuseFunc::None));
    uniforms.alpha_words[0] = word(lit(0, AttenuationFunc::None, DiffuseFunc::None));

    let [out0, _] = run_vertex_lighting(&uniforms, &XF, &Vertex::default());
    assert_close(
        out0,
        [blend(200, 64), blend(200, 32), blend(200, 16), blend(100, 200)],
    );
}

#[test]
fn lit_alpha_ambient_follows_vertex_color_presence() {
    let alpha_ambient_from_vertex = LitChannelConfig {
        enablelighting: true,
        ambsource: ColorSource::Vertex,
        ..LitChannelConfig::default()
    };
    let vertex = Vertex {
        color0: [0.0, 0.0, 0.0, 0.2],
        color1: [0.0, 0.0, 0.0, 0.6],
        ..Vertex::default()
    };
    let run = |components: VertexComponents| {
        let mut uniforms = Uniforms::default();
        uniforms.components = components.bits();
        uniforms.alpha_words = [word(alpha_ambient_from_vertex); 2];
        run_vertex_lighting(&uniforms, &XF, &vertex)
    };

    // 0.2 * 255 = 51, 0.6 * 255 = 153
    let both = run(VertexComponents::HAS_COL0 | VertexComponents::HAS_COL1);
    assert_close([both[0][3], both[1][3], 0.0, 0.0], [blend(255, 51), blend(255, 153), 0.0, 0.0]);

    let col0_only = run(VertexComponents::HAS_COL0);
    assert_close(
        [col0_only[0][3], col0_only[1][3], 0.0, 0.0],
        [blend(255, 51), blend(255, 51), 0.0, 0.0],
    );

    let col1_only = run(VertexComponents::HAS_COL1);
    assert_close(
        [col1_only[0][3], col1_only[1][3], 0.0, 0.0],
        [1.0, blend(255, 153), 0.0, 0.0],
    );

    let none = run(VertexComponents::empty());
    assert_close([none[0][3], none[1][3], 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn unlit_alpha_follows_vertex_color_presence() {
    let mut uniforms = Uniforms::default();
    uniforms.materials[2] = [255, 255, 255, 90];
    uniforms.materials[3] = [255, 255, 255, 90];
    let vertex = Vertex {
        color0: [0.0, 0.0, 0.0, 0.2],
        color1: [0.0, 0.0, 0.0, 0.6],
        ..Vertex::default()
    };
    let run = |components: VertexComponents| {
        let mut uniforms = uniforms.clone();
        uniforms.components = components.bits();
        let [out0, out1] = run_vertex_lighting(&uniforms, &XF, &vertex);
        // RGB stays at the unlit seed.
        assert_close([out0[0], out0[1], out0[2], 0.0], [1.0, 1.0, 1.0, 0.0]);
        [out0[3], out1[3]]
    };

    // 0.2 * 255 = 51, 0.6 * 255 = 153
    let both = run(VertexComponents::HAS_COL0 | VertexComponents::HAS_COL1);
    assert_close([both[0], both[1], 0.0, 0.0], [blend(90, 51), blend(90, 153), 0.0, 0.0]);

    let col0_only = run(VertexComponents::HAS_COL0);
    assert_close(
        [col0_only[0], col0_only[1], 0.0, 0.0],
        [blend(90, 51), blend(90, 51), 0.0, 0.0],
    );

    let none = run(VertexComponents::empty());
    assert_close([none[0], none[1], 0.0, 0.0], [blend(90, 255), blend(90, 255), 0.0, 0.0]);
}

#[test]
fn alpha_material_falls_back_to_register() {
    let mut uniforms = Uniforms::default();
    uniforms.materials[3] = [255, 255, 255, 77];
    // Color material from the vertex, alpha from the register.
    uniforms.color_words[1] = word(LitChannelConfig {
        matsource: ColorSource::Vertex,
        ..LitChannelConfig::default()
    });
    let vertex = Vertex {
        color1: [1.0, 0.0, 1.0, 0.9],
        ..Vertex::default()
    };
    let [_, out1] = run_vertex_lighting(&uniforms, &XF, &vertex);
    assert_close(out1, [1.0, 0.0, 1.0, blend(77, 255)]);
}

#[test]
fn relocated_fields_are_read_from_the_caller_layout() {
    // Same fields, shifted up by 16 bits.
    let shifted = |f: BitField| BitField {
        offset: f.offset + 16,
        size: f.size,
    };
    let layout = LitChannelLayout {
        matsource: shifted(XF.matsource),
        enablelighting: shifted(XF.enablelighting),
        light_mask0_3: shifted(XF.light_mask0_3),
        ambsource: shifted(XF.ambsource),
        diffusefunc: shifted(XF.diffusefunc),
        attnfunc: shifted(XF.attnfunc),
        light_mask4_7: shifted(XF.light_mask4_7),
    };
    layout.validate().unwrap();

    let mut uniforms = Uniforms::default();
    uniforms.lights[0] = Light {
        color: [0, 255, 0, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    };
    let config = lit(0b1, AttenuationFunc::Dir, DiffuseFunc::Clamp);
    uniforms.color_words[0] = config.encode(&layout);
    // The XF positions are left as noise that would enable lighting with no lights.
    uniforms.color_words[0] |= 0b10;

    let [out0, _] = run_vertex_lighting(&uniforms, &layout, &Vertex::default());
    assert_close(out0, [0.0, 1.0, 0.0, 1.0]);
    assert_eq!(LitChannelConfig::decode(uniforms.color_words[0], &layout), config);
}

#[test]
fn wide_light_mask_fields_contribute_one_nibble_each() {
    let layout = LitChannelLayout {
        light_mask0_3: BitField {
            offset: 16,
            size: 8,
        },
        ..XF
    };
    layout.validate().unwrap();

    let mut uniforms = Uniforms::default();
    uniforms.lights[4] = Light {
        color: [200, 0, 0, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    };
    // Bit 4 of the low field must not alias light 4.
    let config = LitChannelConfig {
        light_mask0_3: 0x10,
        ..lit(0, AttenuationFunc::Dir, DiffuseFunc::Clamp)
    };
    uniforms.color_words[0] = config.encode(&layout);
    assert_eq!(
        LitChannelConfig::decode(uniforms.color_words[0], &layout).light_mask(),
        0
    );

    let [out0, _] = run_vertex_lighting(&uniforms, &layout, &Vertex::default());
    assert_close(out0, [0.0, 0.0, 0.0, 1.0]);
}
