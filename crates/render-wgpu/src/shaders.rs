/// Depth-only pass from a light. Only the model matrix of each instance is
/// read; the pipeline culls front faces.
pub const SHADOW_SHADER: &str = r#"
struct ShadowUniforms {
    light_view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> s: ShadowUniforms;

struct ShadowInput {
    @location(0) position: vec3<f32>,
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
};

@vertex
fn vs_shadow(in: ShadowInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(in.model_0, in.model_1, in.model_2, in.model_3);
    return s.light_view_proj * model * vec4<f32>(in.position, 1.0);
}
"#;

/// Scene pass: lit color, view-space normal and linear view depth into three
/// render targets. Lighting matches `pixelgrid_render::shade`.
pub const SCENE_SHADER: &str = r#"
struct SceneUniforms {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    ambient: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    spot_position: vec4<f32>,
    spot_direction: vec4<f32>,
    spot_color: vec4<f32>,
    spot_params: vec4<f32>,
    view_dir: vec4<f32>,
    sun_shadow: mat4x4<f32>,
    spot_shadow: mat4x4<f32>,
    shadow_params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: SceneUniforms;

@group(1) @binding(0)
var sun_shadow_map: texture_depth_2d;
@group(1) @binding(1)
var spot_shadow_map: texture_depth_2d;
@group(1) @binding(2)
var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) normal_0: vec4<f32>,
    @location(7) normal_1: vec4<f32>,
    @location(8) normal_2: vec4<f32>,
    @location(9) base_color: vec4<f32>,
    @location(10) emissive: vec4<f32>,
    @location(11) specular: vec4<f32>,
    @location(12) shadow_flags: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) view_depth: f32,
    @location(3) base_color: vec3<f32>,
    @location(4) emissive: vec3<f32>,
    @location(5) specular: vec4<f32>,
    @location(6) @interpolate(flat) receive: f32,
};

struct SceneTargets {
    @location(0) color: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) depth: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let normal_matrix = mat3x3<f32>(
        instance.normal_0.xyz,
        instance.normal_1.xyz,
        instance.normal_2.xyz,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);
    let view_pos = u.view * world_pos;

    var out: VertexOutput;
    out.clip_position = u.view_proj * world_pos;
    out.world_pos = world_pos.xyz;
    out.world_normal = normal_matrix * vertex.normal;
    out.view_depth = -view_pos.z;
    out.base_color = instance.base_color.rgb;
    out.emissive = instance.emissive.rgb;
    out.specular = instance.specular;
    out.receive = instance.shadow_flags.y;
    return out;
}

// 1 when the point sees the light, 0 when a caster is in the way.
fn shadow_visibility(
    map: texture_depth_2d,
    light_view_proj: mat4x4<f32>,
    enabled: f32,
    world_pos: vec3<f32>,
    n: vec3<f32>,
) -> f32 {
    if (enabled < 0.5) {
        return 1.0;
    }
    let clip = light_view_proj * vec4<f32>(world_pos + n * u.shadow_params.w, 1.0);
    if (clip.w <= 0.0) {
        return 1.0;
    }
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (any(uv < vec2<f32>(0.0)) || any(uv >= vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 1.0;
    }
    return textureSampleCompareLevel(map, shadow_sampler, uv, ndc.z - u.shadow_params.z);
}

fn blinn_phong(shininess: f32, n: vec3<f32>, l: vec3<f32>, v: vec3<f32>) -> f32 {
    let n_dot_l = dot(n, l);
    let half_vector = l + v;
    if (n_dot_l <= 0.0 || dot(half_vector, half_vector) <= 1e-12) {
        return 0.0;
    }
    let h = normalize(half_vector);
    return (shininess + 2.0) / 8.0 * pow(max(dot(n, h), 1e-4), shininess) * n_dot_l;
}

struct SpotSample {
    radiance: vec3<f32>,
    l: vec3<f32>,
};

fn spot_light(world_pos: vec3<f32>) -> SpotSample {
    var out = SpotSample(vec3<f32>(0.0), vec3<f32>(0.0, 1.0, 0.0));
    if (u.spot_position.w < 0.5) {
        return out;
    }
    let to_light = u.spot_position.xyz - world_pos;
    let dist = length(to_light);
    let reach = u.spot_params.z;
    if (dist <= 1e-6 || dist >= reach) {
        return out;
    }
    let l = to_light / dist;
    let cone = smoothstep(u.spot_params.x, u.spot_params.y, dot(-l, u.spot_direction.xyz));
    let falloff = pow(1.0 - dist / reach, u.spot_params.w);
    out.radiance = u.spot_color.rgb * cone * falloff;
    out.l = l;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> SceneTargets {
    let n = normalize(in.world_normal);
    let v = normalize(u.view_dir.xyz);
    let shininess = in.specular.w;

    var sun_vis = 1.0;
    var spot_vis = 1.0;
    if (in.receive > 0.5) {
        sun_vis = shadow_visibility(sun_shadow_map, u.sun_shadow, u.shadow_params.x, in.world_pos, n);
        spot_vis = shadow_visibility(spot_shadow_map, u.spot_shadow, u.shadow_params.y, in.world_pos, n);
    }

    var diffuse = u.ambient.rgb;
    var highlight = vec3<f32>(0.0);

    let sun_l = u.sun_direction.xyz;
    let sun = u.sun_color.rgb * sun_vis;
    diffuse += sun * max(dot(n, sun_l), 0.0);
    highlight += sun * blinn_phong(shininess, n, sun_l, v);

    let spot = spot_light(in.world_pos);
    let spot_radiance = spot.radiance * spot_vis;
    diffuse += spot_radiance * max(dot(n, spot.l), 0.0);
    highlight += spot_radiance * blinn_phong(shininess, n, spot.l, v);

    let view_normal = normalize((u.view * vec4<f32>(n, 0.0)).xyz);

    var out: SceneTargets;
    out.color = vec4<f32>(in.base_color * diffuse + in.specular.rgb * highlight + in.emissive, 1.0);
    out.normal = vec4<f32>(view_normal, 1.0);
    out.depth = vec4<f32>(in.view_depth, 0.0, 0.0, 1.0);
    return out;
}
"#;

/// Fullscreen triangle shared by the two post passes.
const FULLSCREEN_VERTEX: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    return out;
}
"#;

/// Pixelate pass: one fragment per block. Samples the block center and the
/// four neighboring block centers, then darkens by the larger edge cue.
const PIXELATE_BODY: &str = r#"
struct PixelateUniforms {
    grid: vec4<u32>,
    strengths: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> p: PixelateUniforms;
@group(0) @binding(1)
var color_tex: texture_2d<f32>;
@group(0) @binding(2)
var normal_tex: texture_2d<f32>;
@group(0) @binding(3)
var depth_tex: texture_2d<f32>;

const PI: f32 = 3.14159265358979;

fn normal_angle(a: vec3<f32>, b: vec3<f32>) -> f32 {
    if (all(a == b)) {
        return 0.0;
    }
    return acos(clamp(dot(normalize(a), normalize(b)), -1.0, 1.0));
}

struct EdgeCue {
    depth: f32,
    angle: f32,
};

fn neighbor_cue(cue: EdgeCue, at: vec2<i32>, depth: f32, normal: vec3<f32>) -> EdgeCue {
    var out = cue;
    let d = textureLoad(depth_tex, at, 0).r;
    let n = textureLoad(normal_tex, at, 0).xyz;
    out.depth = max(out.depth, abs(d - depth));
    out.angle = max(out.angle, normal_angle(normal, n));
    return out;
}

@fragment
fn fs_pixelate(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let bs = i32(p.grid.z);
    let block = vec2<i32>(floor(in.position.xy));
    let center = block * bs + vec2<i32>(bs / 2);
    let max_px = vec2<i32>(i32(p.grid.x), i32(p.grid.y)) * bs - vec2<i32>(1);

    let depth = textureLoad(depth_tex, center, 0).r;
    let normal = textureLoad(normal_tex, center, 0).xyz;

    var cue = EdgeCue(0.0, 0.0);
    cue = neighbor_cue(cue, clamp(center - vec2<i32>(0, bs), vec2<i32>(0), max_px), depth, normal);
    cue = neighbor_cue(cue, clamp(center + vec2<i32>(0, bs), vec2<i32>(0), max_px), depth, normal);
    cue = neighbor_cue(cue, clamp(center - vec2<i32>(bs, 0), vec2<i32>(0), max_px), depth, normal);
    cue = neighbor_cue(cue, clamp(center + vec2<i32>(bs, 0), vec2<i32>(0), max_px), depth, normal);

    let depth_factor = cue.depth * p.strengths.y;
    let normal_factor = cue.angle / PI * p.strengths.x;
    let darken = 1.0 - clamp(max(depth_factor, normal_factor), 0.0, 1.0);

    let color = textureLoad(color_tex, center, 0).rgb;
    return vec4<f32>(color * darken, 1.0);
}
"#;

/// Output pass: nearest-neighbor upscale of the block texture. Pixels outside
/// the whole-block region show the background.
const OUTPUT_BODY: &str = r#"
struct OutputUniforms {
    grid: vec4<u32>,
    background: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> o: OutputUniforms;
@group(0) @binding(1)
var blocks_tex: texture_2d<f32>;

fn upscaled(position: vec4<f32>) -> vec3<f32> {
    let pixel = vec2<u32>(floor(position.xy));
    let bs = o.grid.z;
    if (pixel.x >= o.grid.x * bs || pixel.y >= o.grid.y * bs) {
        return o.background.rgb;
    }
    return textureLoad(blocks_tex, vec2<i32>(pixel / bs), 0).rgb;
}

fn encode_srgb(c: vec3<f32>) -> vec3<f32> {
    let x = clamp(c, vec3<f32>(0.0), vec3<f32>(1.0));
    let lo = x * 12.92;
    let hi = 1.055 * pow(x, vec3<f32>(1.0 / 2.4)) - 0.055;
    return select(hi, lo, x <= vec3<f32>(0.0031308));
}

// For sRGB surfaces; the hardware encodes on write.
@fragment
fn fs_output(in: FullscreenOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(upscaled(in.position), 1.0);
}

@fragment
fn fs_output_encode(in: FullscreenOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(encode_srgb(upscaled(in.position)), 1.0);
}
"#;

pub fn pixelate_shader() -> String {
    format!("{FULLSCREEN_VERTEX}{PIXELATE_BODY}")
}

pub fn output_shader() -> String {
    format!("{FULLSCREEN_VERTEX}{OUTPUT_BODY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_are_present() {
        assert!(SCENE_SHADER.contains("fn vs_main"));
        assert!(SCENE_SHADER.contains("fn fs_main"));
        assert!(SHADOW_SHADER.contains("fn vs_shadow"));
        let pixelate = pixelate_shader();
        assert!(pixelate.contains("fn vs_fullscreen"));
        assert!(pixelate.contains("fn fs_pixelate"));
        let output = output_shader();
        assert!(output.contains("fn fs_output("));
        assert!(output.contains("fn fs_output_encode("));
    }

    #[test]
    fn scene_shader_reads_every_instance_attribute() {
        for location in 2..=12 {
            assert!(SCENE_SHADER.contains(&format!("@location({location})")));
        }
        assert!(SCENE_SHADER.contains("texture_depth_2d"));
        assert!(SCENE_SHADER.contains("sampler_comparison"));
    }
}
