mod common;

use common::{calculate_lighting, Light, Uniforms};
use gx_ubershader::{AttenuationFunc, DiffuseFunc};

const ORIGIN: [f32; 3] = [0.0; 3];
const UP: [f32; 3] = [0.0, 0.0, 1.0];

fn with_light0(light: Light) -> Uniforms {
    let mut uniforms = Uniforms::default();
    uniforms.lights[0] = light;
    uniforms
}

#[test]
fn spec_back_face_is_black_regardless_of_falloff() {
    for (cosatt, distatt) in [
        ([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, 4.0, 2.0], [0.25, 0.0, 0.0]),
        ([3.0, -1.0, 0.5], [0.0, 0.0, 0.0]),
    ] {
        let uniforms = with_light0(Light {
            color: [255, 255, 255, 255],
            cosatt,
            distatt,
            // Behind the surface, but its direction still faces the normal.
            pos: [0.0, 0.0, -10.0],
            dir: UP,
        });
        for diffuse in [DiffuseFunc::NONE, DiffuseFunc::SIGN, DiffuseFunc::CLAMP] {
            assert_eq!(
                calculate_lighting(&uniforms, 0, AttenuationFunc::SPEC, diffuse, ORIGIN, UP),
                [0, 0, 0, 0],
                "cosatt={cosatt:?} distatt={distatt:?} diffuse={diffuse}"
            );
        }
    }
}

#[test]
fn spec_front_face_uses_angular_falloff() {
    let uniforms = with_light0(Light {
        color: [255, 128, 0, 255],
        pos: [0.0, 0.0, 10.0],
        dir: UP,
        ..Light::default()
    });
    assert_eq!(
        calculate_lighting(
            &uniforms,
            0,
            AttenuationFunc::SPEC,
            DiffuseFunc::NONE,
            ORIGIN,
            UP
        ),
        [255, 128, 0, 255]
    );
}

#[test]
fn spec_distance_coefficients_are_normalised_unless_diffuse_is_none() {
    let uniforms = with_light0(Light {
        color: [200, 200, 200, 200],
        distatt: [2.0, 0.0, 0.0],
        pos: [0.0, 0.0, 10.0],
        dir: UP,
        ..Light::default()
    });
    // Raw (2, 0, 0) halves the light.
    assert_eq!(
        calculate_lighting(
            &uniforms,
            0,
            AttenuationFunc::SPEC,
            DiffuseFunc::NONE,
            ORIGIN,
            UP
        ),
        [100, 100, 100, 100]
    );
    // Normalised to (1, 0, 0) it does not; N.L is 1 here.
    assert_eq!(
        calculate_lighting(
            &uniforms,
            0,
            AttenuationFunc::SPEC,
            DiffuseFunc::CLAMP,
            ORIGIN,
            UP
        ),
        [200, 200, 200, 200]
    );
}

#[test]
fn spot_with_unit_coefficients_is_unattenuated_at_any_distance() {
    for (pos, dir) in [
        ([0.0, 0.0, 0.5], UP),
        ([3.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 100.0, 0.0], [0.0, -1.0, 0.0]),
    ] {
        let uniforms = with_light0(Light {
            color: [200, 100, 50, 25],
            pos,
            dir,
            ..Light::default()
        });
        assert_eq!(
            calculate_lighting(
                &uniforms,
                0,
                AttenuationFunc::SPOT,
                DiffuseFunc::NONE,
                ORIGIN,
                UP
            ),
            [200, 100, 50, 25],
            "pos={pos:?}"
        );
    }
}

#[test]
fn diffuse_none_ignores_the_normal() {
    let mut uniforms = Uniforms::default();
    uniforms.lights[3] = Light {
        color: [90, 180, 45, 255],
        cosatt: [0.5, 0.5, 0.0],
        distatt: [1.0, 0.1, 0.0],
        pos: [2.0, 1.0, 4.0],
        dir: [0.0, 0.6, 0.8],
    };
    let pos = [0.5, -0.5, 1.0];
    let expected = calculate_lighting(
        &uniforms,
        3,
        AttenuationFunc::SPOT,
        DiffuseFunc::NONE,
        pos,
        UP,
    );
    assert_ne!(expected, [0, 0, 0, 0]);
    for normal in [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.6, 0.8, 0.0]] {
        assert_eq!(
            calculate_lighting(
                &uniforms,
                3,
                AttenuationFunc::SPOT,
                DiffuseFunc::NONE,
                pos,
                normal
            ),
            expected,
            "normal={normal:?}"
        );
    }
}

#[test]
fn directional_clamp_full_intensity() {
    let uniforms = with_light0(Light {
        color: [255, 0, 0, 255],
        pos: [0.0, 0.0, 10.0],
        ..Light::default()
    });
    assert_eq!(
        calculate_lighting(
            &uniforms,
            0,
            AttenuationFunc::DIR,
            DiffuseFunc::CLAMP,
            ORIGIN,
            UP
        ),
        [255, 0, 0, 255]
    );
}

#[test]
fn sign_can_subtract_and_clamp_cannot() {
    let uniforms = with_light0(Light {
        color: [255, 10, 0, 255],
        pos: [0.0, 0.0, -10.0],
        ..Light::default()
    });
    let lit = |diffuse| {
        calculate_lighting(&uniforms, 0, AttenuationFunc::NONE, diffuse, ORIGIN, UP)
    };
    assert_eq!(lit(DiffuseFunc::SIGN), [-255, -10, 0, -255]);
    assert_eq!(lit(DiffuseFunc::CLAMP), [0, 0, 0, 0]);
}

#[test]
fn light_on_the_vertex_falls_back_to_the_normal() {
    let uniforms = with_light0(Light {
        color: [40, 80, 120, 160],
        pos: [1.0, 2.0, 3.0],
        ..Light::default()
    });
    for attn in [AttenuationFunc::NONE, AttenuationFunc::DIR] {
        assert_eq!(
            calculate_lighting(&uniforms, 0, attn, DiffuseFunc::SIGN, [1.0, 2.0, 3.0], UP),
            [40, 80, 120, 160]
        );
    }
}

#[test]
fn unknown_codes_use_fallbacks() {
    let uniforms = with_light0(Light {
        color: [30, 60, 90, 120],
        pos: [5.0, 0.0, 0.0],
        ..Light::default()
    });
    // Diffuse code 3 contributes nothing, whatever the attenuation.
    for attn in 0..4 {
        assert_eq!(
            calculate_lighting(&uniforms, 0, attn, 3, ORIGIN, UP),
            [0, 0, 0, 0]
        );
    }
    // An attenuation code outside the enumeration lights along the normal at full strength.
    assert_eq!(
        calculate_lighting(&uniforms, 0, 7, DiffuseFunc::SIGN, ORIGIN, UP),
        [30, 60, 90, 120]
    );
}

#[test]
fn contributions_round_half_to_even() {
    // 0.5 * 5 = 2.5 and 0.5 * 7 = 3.5
    let uniforms = with_light0(Light {
        color: [5, 7, 1, 3],
        distatt: [2.0, 0.0, 0.0],
        pos: [0.0, 0.0, 10.0],
        dir: UP,
        ..Light::default()
    });
    assert_eq!(
        calculate_lighting(
            &uniforms,
            0,
            AttenuationFunc::SPEC,
            DiffuseFunc::NONE,
            ORIGIN,
            UP
        ),
        [2, 4, 0, 2]
    );
}
