//! Capability probe against a real adapter.

use vesper_render::wgpu_caps::{WGPU_RENDER_SYSTEM_NAME, probe_adapter};
use vesper_render::{Capability, GpuProgramType};

#[test]
#[ignore] // Requires GPU - run with: cargo test --test wgpu_probe -- --ignored
fn test_probe_real_adapter() {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }));

    match adapter {
        Ok(adapter) => {
            let caps = probe_adapter(&adapter);
            assert_eq!(caps.render_system_name(), WGPU_RENDER_SYSTEM_NAME);
            assert!(caps.has_capability(Capability::VertexProgram));
            assert!(caps.is_shader_profile_supported("wgsl"));
            assert!(caps.num_texture_units() > 0);
            assert!(caps.constant_float_count(GpuProgramType::Vertex) > 0);
            caps.log();
        }
        Err(e) => {
            println!("GPU not available: {:?}", e);
        }
    }
}
