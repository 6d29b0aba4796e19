//! Draw statistics, pass iteration, program gating, clip planes and texture units.

use vesper_core::math::Vec3;
use vesper_render::{
    Capability, ColourValue, GpuParamVariability, GpuProgram, GpuProgramParameters, GpuProgramType,
    OperationType, Plane, RenderOperation, RenderSystem, RenderSystemConfig, RenderSystemError,
    TextureAddressingMode, TextureBindingType, TextureHandle, TextureUnitSettings,
    UvwAddressingMode,
};
use vesper_test_utils::{BackendCall, MockBackend, default_mock_capabilities};

fn render_system(backend: MockBackend) -> RenderSystem<MockBackend> {
    vesper_core::logging::init_with_filter("vesper_render=debug");
    let mut rs = RenderSystem::new(backend, RenderSystemConfig::default());
    rs.initialise(None).unwrap();
    rs.backend().clear_calls();
    rs
}

/// Capabilities with separate vertex texture units and no mipmap bias.
fn vertex_texture_system() -> RenderSystem<MockBackend> {
    let mut caps = default_mock_capabilities("Mock");
    caps.set_capability(Capability::VertexTextureFetch);
    caps.set_vertex_texture_units_shared(false);
    caps.set_num_vertex_texture_units(4);
    caps.unset_capability(Capability::MipmapLodBias);

    let mut rs = RenderSystem::new(
        MockBackend::new().with_separate_vertex_textures(),
        RenderSystemConfig::default(),
    );
    rs.use_custom_capabilities(caps).unwrap();
    rs.initialise(None).unwrap();
    rs.backend().clear_calls();
    rs
}

// ===== Statistics =====

#[test]
fn test_face_counts_through_render() {
    let mut rs = render_system(MockBackend::new());
    rs.begin_geometry_count();

    rs.render(&RenderOperation::new(OperationType::TriangleList, 300))
        .unwrap();
    rs.render(&RenderOperation::indexed(OperationType::TriangleStrip, 50, 100))
        .unwrap();
    rs.render(&RenderOperation::new(OperationType::TriangleList, 30).with_instances(2))
        .unwrap();
    rs.render(&RenderOperation::new(OperationType::LineList, 10))
        .unwrap();

    assert_eq!(rs.face_count(), 100 + 98 + 20);
    assert_eq!(rs.vertex_count(), 300 + 50 + 60 + 10);
    assert_eq!(rs.batch_count(), 4);
    assert_eq!(
        rs.backend()
            .count(|c| matches!(c, BackendCall::Render { .. })),
        4
    );

    rs.begin_geometry_count();
    assert_eq!(rs.face_count(), 0);
    assert_eq!(rs.batch_count(), 0);
}

#[test]
fn test_pass_iterations_multiply_statistics() {
    let mut rs = render_system(MockBackend::new());
    rs.begin_geometry_count();
    rs.set_current_pass_iteration_count(3);

    rs.render(&RenderOperation::new(OperationType::TriangleList, 30))
        .unwrap();

    assert_eq!(rs.face_count(), 30);
    assert_eq!(rs.batch_count(), 3);
    assert_eq!(rs.vertex_count(), 30);
}

// ===== Pass iteration =====

#[test]
fn test_derived_depth_bias_per_iteration() {
    let mut rs = render_system(MockBackend::new());
    rs.set_derive_depth_bias(true, 0.0, 0.5, 0.0);
    rs.set_current_pass_iteration_count(3);

    let results: Vec<bool> = (0..3)
        .map(|_| rs.update_pass_iteration_render_state())
        .collect();

    assert_eq!(results, vec![true, true, false]);
    assert_eq!(rs.backend().depth_biases(), vec![0.0, 0.5, 1.0]);
    assert_eq!(rs.current_pass_iteration_index(), 2);
    assert_eq!(rs.current_pass_iteration_count(), 1);
}

#[test]
fn test_single_iteration_without_bias() {
    let mut rs = render_system(MockBackend::new());
    assert_eq!(rs.current_pass_iteration_count(), 1);
    assert!(!rs.update_pass_iteration_render_state());
    assert!(rs.backend().depth_biases().is_empty());
}

#[test]
fn test_pass_iteration_rebinds_parameters() {
    let mut rs = render_system(MockBackend::new());
    let mut params = GpuProgramParameters::new();
    params.set_named_constant("world", &[1.0; 16], GpuParamVariability::PER_OBJECT);
    params.enable_pass_iteration_number();

    rs.bind_gpu_program_parameters(GpuProgramType::Vertex, params, GpuParamVariability::ALL);
    rs.set_current_pass_iteration_count(3);
    while rs.update_pass_iteration_render_state() {}

    let rebinds: Vec<Option<f32>> = rs
        .backend()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::BindGpuProgramParameters {
                stage: GpuProgramType::Vertex,
                mask,
                pass_iteration_number,
            } if mask == GpuParamVariability::PASS_ITERATION_NUMBER => Some(pass_iteration_number),
            _ => None,
        })
        .collect();
    assert_eq!(rebinds, vec![Some(1.0), Some(2.0)]);

    let active = rs
        .active_gpu_program_parameters(GpuProgramType::Vertex)
        .unwrap();
    assert_eq!(active.pass_iteration_number(), Some(2.0));

    // A new pass starts counting from zero again
    rs.set_current_pass_iteration_count(2);
    assert_eq!(rs.current_pass_iteration_index(), 0);
}

// ===== GPU programs =====

#[test]
fn test_program_gating() {
    let mut rs = render_system(MockBackend::new());

    let vertex = GpuProgram::new("basic_vs", GpuProgramType::Vertex, "wgsl");
    assert!(rs.bind_gpu_program(&vertex).unwrap());
    assert!(rs.is_gpu_program_bound(GpuProgramType::Vertex));

    let geometry = GpuProgram::new("extrude_gs", GpuProgramType::Geometry, "wgsl");
    assert!(!rs.bind_gpu_program(&geometry).unwrap());
    assert!(!rs.is_gpu_program_bound(GpuProgramType::Geometry));

    let hlsl = GpuProgram::new("basic_ps", GpuProgramType::Fragment, "hlsl");
    assert!(!rs.bind_gpu_program(&hlsl).unwrap());

    let mut broken = GpuProgram::new("broken_ps", GpuProgramType::Fragment, "wgsl");
    broken.set_compile_error(true);
    assert!(!rs.bind_gpu_program(&broken).unwrap());

    assert_eq!(
        rs.backend()
            .count(|c| matches!(c, BackendCall::BindGpuProgram { .. })),
        1
    );
}

#[test]
fn test_skinned_program_needs_ubyte4() {
    let mut caps = default_mock_capabilities("Mock");
    caps.unset_capability(Capability::VertexFormatUbyte4);
    let mut rs = RenderSystem::new(MockBackend::new(), RenderSystemConfig::default());
    rs.use_custom_capabilities(caps).unwrap();
    rs.initialise(None).unwrap();

    let skinned =
        GpuProgram::new("skinned_vs", GpuProgramType::Vertex, "wgsl").with_skeletal_animation(true);
    assert!(!rs.bind_gpu_program(&skinned).unwrap());
}

#[test]
fn test_unbind_clears_parameters() {
    let mut rs = render_system(MockBackend::new());
    let vertex = GpuProgram::new("basic_vs", GpuProgramType::Vertex, "wgsl");
    rs.bind_gpu_program(&vertex).unwrap();
    rs.bind_gpu_program_parameters(
        GpuProgramType::Vertex,
        GpuProgramParameters::new(),
        GpuParamVariability::ALL,
    );

    rs.unbind_gpu_program(GpuProgramType::Vertex);
    assert!(!rs.is_gpu_program_bound(GpuProgramType::Vertex));
    assert!(
        rs.active_gpu_program_parameters(GpuProgramType::Vertex)
            .is_none()
    );
}

// ===== Clip planes =====

#[test]
fn test_clip_planes_reapplied_on_vertex_program_change() {
    let mut rs = render_system(MockBackend::new());
    let op = RenderOperation::new(OperationType::TriangleList, 3);

    rs.add_clip_plane(Plane::new(Vec3::Y, 0.0));
    assert!(rs.are_clip_planes_dirty());
    rs.render(&op).unwrap();
    assert!(!rs.are_clip_planes_dirty());

    // Unchanged planes are not uploaded again
    rs.render(&op).unwrap();
    assert_eq!(
        rs.backend()
            .count(|c| matches!(c, BackendCall::SetClipPlanes { count: 1 })),
        1
    );

    let vertex = GpuProgram::new("basic_vs", GpuProgramType::Vertex, "wgsl");
    rs.bind_gpu_program(&vertex).unwrap();
    assert!(rs.are_clip_planes_dirty());
    rs.render(&op).unwrap();

    // Rebinding the same stage is not a transition
    rs.bind_gpu_program(&vertex).unwrap();
    assert!(!rs.are_clip_planes_dirty());

    let fragment = GpuProgram::new("basic_ps", GpuProgramType::Fragment, "wgsl");
    rs.bind_gpu_program(&fragment).unwrap();
    assert!(!rs.are_clip_planes_dirty());

    rs.unbind_gpu_program(GpuProgramType::Vertex);
    assert!(rs.are_clip_planes_dirty());
    rs.render(&op).unwrap();

    assert_eq!(
        rs.backend()
            .count(|c| matches!(c, BackendCall::SetClipPlanes { .. })),
        3
    );
}

#[test]
fn test_reset_clip_planes() {
    let mut rs = render_system(MockBackend::new());
    rs.set_clip_planes(&[Plane::new(Vec3::X, 1.0), Plane::new(Vec3::Z, -1.0)]);
    rs.render(&RenderOperation::new(OperationType::PointList, 1))
        .unwrap();

    rs.reset_clip_planes();
    assert!(rs.clip_planes().is_empty());
    rs.render(&RenderOperation::new(OperationType::PointList, 1))
        .unwrap();

    let uploads: Vec<usize> = rs
        .backend()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::SetClipPlanes { count } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec![2, 0]);
}

// ===== Texture units =====

#[test]
fn test_texture_unit_settings() {
    let mut rs = render_system(MockBackend::new());
    let settings = TextureUnitSettings::new(TextureHandle(7))
        .with_anisotropy(16)
        .with_mipmap_bias(-0.5)
        .with_addressing(UvwAddressingMode::uniform(TextureAddressingMode::Border))
        .with_border_colour(ColourValue::new(1.0, 0.0, 0.0, 1.0));

    rs.set_texture_unit_settings(1, &settings).unwrap();

    let calls = rs.backend().calls();
    assert_eq!(
        calls[0],
        BackendCall::SetTexture {
            unit: 1,
            enabled: true,
            texture: Some(TextureHandle(7)),
        }
    );
    assert!(calls.contains(&BackendCall::SetTextureLayerAnisotropy {
        unit: 1,
        anisotropy: 8
    }));
    assert!(calls.contains(&BackendCall::SetTextureMipmapBias { unit: 1, bias: -0.5 }));
    assert!(calls.contains(&BackendCall::SetTextureBorderColour { unit: 1 }));
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c, BackendCall::SetVertexTexture { .. }))
    );
}

#[test]
fn test_border_colour_only_with_border_addressing() {
    let mut rs = render_system(MockBackend::new());
    let settings = TextureUnitSettings::new(TextureHandle(1))
        .with_addressing(UvwAddressingMode::uniform(TextureAddressingMode::Clamp))
        .with_anisotropy(0);

    rs.set_texture_unit_settings(0, &settings).unwrap();

    let backend = rs.backend();
    assert_eq!(
        backend.count(|c| matches!(c, BackendCall::SetTextureBorderColour { .. })),
        0
    );
    assert!(backend.calls().contains(&BackendCall::SetTextureLayerAnisotropy {
        unit: 0,
        anisotropy: 1
    }));
}

#[test]
fn test_vertex_texture_routing() {
    let mut rs = vertex_texture_system();
    let vertex = TextureUnitSettings::new(TextureHandle(3))
        .with_binding(TextureBindingType::Vertex)
        .with_mipmap_bias(1.0);
    rs.set_texture_unit_settings(0, &vertex).unwrap();

    let calls = rs.backend().calls();
    assert_eq!(
        calls[0],
        BackendCall::SetVertexTexture {
            unit: 0,
            texture: Some(TextureHandle(3)),
        }
    );
    assert_eq!(
        calls[1],
        BackendCall::SetTexture {
            unit: 0,
            enabled: true,
            texture: None,
        }
    );
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c, BackendCall::SetTextureMipmapBias { .. }))
    );

    rs.backend().clear_calls();
    let fragment = TextureUnitSettings::new(TextureHandle(4));
    rs.set_texture_unit_settings(0, &fragment).unwrap();
    let calls = rs.backend().calls();
    assert_eq!(
        calls[0],
        BackendCall::SetVertexTexture {
            unit: 0,
            texture: None,
        }
    );
    assert_eq!(
        calls[1],
        BackendCall::SetTexture {
            unit: 0,
            enabled: true,
            texture: Some(TextureHandle(4)),
        }
    );
}

#[test]
fn test_vertex_texture_unsupported_by_backend() {
    let mut caps = default_mock_capabilities("Mock");
    caps.set_capability(Capability::VertexTextureFetch);
    caps.set_vertex_texture_units_shared(false);
    let mut rs = RenderSystem::new(MockBackend::new(), RenderSystemConfig::default());
    rs.use_custom_capabilities(caps).unwrap();
    rs.initialise(None).unwrap();

    let settings = TextureUnitSettings::new(TextureHandle(1)).with_binding(TextureBindingType::Vertex);
    assert!(matches!(
        rs.set_texture_unit_settings(0, &settings).unwrap_err(),
        RenderSystemError::Backend(_)
    ));
}

#[test]
fn test_disable_texture_units_from() {
    let mut rs = render_system(MockBackend::new());
    let disabled = |rs: &RenderSystem<MockBackend>| -> Vec<usize> {
        rs.backend()
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::SetTexture {
                    unit,
                    enabled: false,
                    ..
                } => Some(unit),
                _ => None,
            })
            .collect()
    };

    // Nothing was enabled beyond unit 0 yet
    rs.disable_texture_units_from(4).unwrap();
    assert!(disabled(&rs).is_empty());

    rs.disable_texture_units_from(1).unwrap();
    assert_eq!(disabled(&rs), vec![1, 2, 3]);

    rs.backend().clear_calls();
    rs.disable_texture_units_from(1).unwrap();
    assert!(disabled(&rs).is_empty());
}
