use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// WGSL program for the GPU-accelerated backend (`vs_main`/`fs_main`).
const NOISE_WGSL: &str = include_str!("shaders/noise.wgsl");
/// WGSL program presenting the software backend's pixel buffer.
const BLIT_WGSL: &str = include_str!("shaders/blit.wgsl");

/// `#version` line plus the packed uniform block shared by both GLSL stages.
///
/// The block layout must match `SceneUniforms` in `gpu/uniforms.rs`.
const SCENE_PRELUDE: &str = include_str!("shaders/scene_prelude.glsl");
const SCENE_VERTEX_BODY: &str = include_str!("shaders/scene.vert");
const SCENE_FRAGMENT_BODY: &str = include_str!("shaders/scene.frag");

pub(crate) fn compile_noise_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("noise shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(NOISE_WGSL)),
    })
}

pub(crate) fn compile_blit_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("software blit shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(BLIT_WGSL)),
    })
}

pub(crate) fn compile_scene_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(scene_source(ShaderStage::Vertex)),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn compile_scene_fragment_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(scene_source(ShaderStage::Fragment)),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Glues the shared prelude in front of one stage body.
///
/// `#line 1` keeps compiler diagnostics pointing at lines of the stage file.
fn scene_source(stage: ShaderStage) -> String {
    let body = match stage {
        ShaderStage::Vertex => SCENE_VERTEX_BODY,
        _ => SCENE_FRAGMENT_BODY,
    };
    format!("{SCENE_PRELUDE}\n#line 1\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use naga::front::{glsl, wgsl};
    use naga::valid::{Capabilities, ValidationFlags, Validator};

    fn validate(module: &naga::Module) {
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(module)
            .unwrap_or_else(|err| panic!("shader failed validation: {err:?}"));
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module
            .entry_points
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    #[test]
    fn noise_wgsl_validates_with_both_stages() {
        let module = wgsl::parse_str(NOISE_WGSL).expect("noise.wgsl parses");
        validate(&module);
        let names = entry_points(&module);
        assert!(names.contains(&"vs_main"));
        assert!(names.contains(&"fs_main"));
    }

    #[test]
    fn noise_wgsl_binds_five_uniform_groups() {
        let module = wgsl::parse_str(NOISE_WGSL).expect("noise.wgsl parses");
        let mut bindings: Vec<u32> = module
            .global_variables
            .iter()
            .filter_map(|(_, global)| global.binding.as_ref())
            .map(|binding| {
                assert_eq!(binding.group, 0);
                binding.binding
            })
            .collect();
        bindings.sort_unstable();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn blit_wgsl_validates() {
        let module = wgsl::parse_str(BLIT_WGSL).expect("blit.wgsl parses");
        validate(&module);
    }

    #[test]
    fn scene_glsl_stages_validate() {
        for (stage, naga_stage) in [
            (ShaderStage::Vertex, naga::ShaderStage::Vertex),
            (ShaderStage::Fragment, naga::ShaderStage::Fragment),
        ] {
            let source = scene_source(stage);
            assert!(source.starts_with("#version 450"));
            let module = glsl::Frontend::default()
                .parse(&glsl::Options::from(naga_stage), &source)
                .unwrap_or_else(|err| panic!("{stage:?} stage failed to parse: {err:?}"));
            validate(&module);
        }
    }
}
