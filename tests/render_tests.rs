//! Render Layer Tests
//!
//! GPU-free coverage for:
//! - Mip chain arithmetic and texture description validation
//! - IblPlan: dispatch shape, roughness schedule, determinism
//! - EnvironmentSlot staleness transitions
//! - GpuModel construction rules and initial draw state
//! - Camera reverse-Z projection properties

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use cinder::gfx::{TextureDesc, TextureUsage, full_mip_chain_count, is_storage_compatible};
use cinder::render::{
    BRDF_LUT_FORMAT, Camera, DrawState, EnvironmentSettings, EnvironmentSlot, GpuModel, IblPlan,
    VERTEX_STRIDE, WORKGROUP_SIZE, workgroups_for,
};
use cinder::resources::{Image, Material, Mesh, Resource};

fn triangle_mesh() -> Mesh {
    Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![Vec3::Z; 3],
        vec![Vec2::ZERO; 3],
        vec![0, 1, 2],
    )
    .unwrap()
}

// ============================================================================
// Mip Chain Arithmetic
// ============================================================================

#[test]
fn full_mip_chain_for_1024_is_11() {
    assert_eq!(full_mip_chain_count(1024, 1024), 11);
}

#[test]
fn full_mip_chain_uses_largest_axis() {
    assert_eq!(full_mip_chain_count(512, 64), 10);
    assert_eq!(full_mip_chain_count(1, 1), 1);
    assert_eq!(full_mip_chain_count(3, 3), 2);
}

#[test]
fn workgroups_cover_every_texel() {
    assert_eq!(workgroups_for(1024), 1024 / WORKGROUP_SIZE);
    assert_eq!(workgroups_for(8), 1);
    assert_eq!(workgroups_for(9), 2);
    // Coarse mips below one workgroup still get a dispatch.
    assert_eq!(workgroups_for(1), 1);
}

// ============================================================================
// TextureDesc Validation
// ============================================================================

#[test]
fn texture_desc_resolves_auto_mips() {
    let desc = TextureDesc::new_cube("t", 1024, wgpu::TextureFormat::Rgba16Float).with_auto_mips();
    assert_eq!(desc.resolved_mip_count(), 11);
}

#[test]
fn texture_desc_rejects_zero_extent() {
    let desc = TextureDesc::new_2d("t", 0, 4, wgpu::TextureFormat::Rgba8Unorm);
    assert!(desc.validate().is_err());
}

#[test]
fn texture_desc_rejects_non_square_cube() {
    let mut desc = TextureDesc::new_cube("t", 64, wgpu::TextureFormat::Rgba16Float);
    desc.height = 32;
    assert!(desc.validate().is_err());
}

#[test]
fn texture_desc_rejects_odd_layer_counts() {
    let mut desc = TextureDesc::new_2d("t", 4, 4, wgpu::TextureFormat::Rgba8Unorm);
    desc.array_layers = 3;
    assert!(desc.validate().is_err());
}

#[test]
fn storage_usage_requires_storage_format() {
    let desc = TextureDesc::new_2d("t", 4, 4, wgpu::TextureFormat::Rg16Float)
        .with_usage(TextureUsage::UNORDERED_ACCESS);
    assert!(desc.validate().is_err());

    // The two-channel 32-bit group is behind optional format features.
    let desc = TextureDesc::new_2d("t", 4, 4, wgpu::TextureFormat::Rg32Float)
        .with_usage(TextureUsage::UNORDERED_ACCESS);
    assert!(desc.validate().is_err());

    let desc = TextureDesc::new_2d("t", 4, 4, wgpu::TextureFormat::Rgba16Float)
        .with_usage(TextureUsage::UNORDERED_ACCESS);
    assert!(desc.validate().is_ok());
}

#[test]
fn texture_desc_rejects_excess_mip_levels() {
    let desc = TextureDesc::new_2d("t", 16, 16, wgpu::TextureFormat::Rgba8Unorm).with_mip_count(6);
    assert!(desc.validate().is_err());
}

#[test]
fn brdf_lut_format_is_storage_compatible() {
    assert!(is_storage_compatible(BRDF_LUT_FORMAT));
}

// ============================================================================
// IblPlan Tests
// ============================================================================

#[test]
fn default_settings_match_the_classic_sizes() {
    let settings = EnvironmentSettings::default();
    assert_eq!(settings.cubemap_size, 1024);
    assert_eq!(settings.irradiance_size, 32);
    assert_eq!(settings.brdf_lut_size, 256);
}

#[test]
fn plan_has_full_specular_chain() {
    let plan = IblPlan::new(&EnvironmentSettings::default());
    assert_eq!(plan.specular_mip_count, 11);
    // Mip 0 is copied, not dispatched.
    assert_eq!(plan.prefilter.len(), 10);
    assert_eq!(plan.prefilter[0].mip, 1);
    assert_eq!(plan.prefilter.last().unwrap().mip, 10);
}

#[test]
fn plan_roughness_is_linear_in_mip() {
    let plan = IblPlan::new(&EnvironmentSettings::default());
    let levels = plan.specular_mip_count;
    for dispatch in &plan.prefilter {
        let expected = dispatch.mip as f32 / (levels - 1) as f32;
        assert!((dispatch.roughness - expected).abs() < 1e-6);
    }
    assert!((plan.prefilter.last().unwrap().roughness - 1.0).abs() < 1e-6);
}

#[test]
fn plan_mip_sizes_halve_down_to_one() {
    let plan = IblPlan::new(&EnvironmentSettings::default());
    for dispatch in &plan.prefilter {
        assert_eq!(dispatch.size, (1024u32 >> dispatch.mip).max(1));
    }
    assert_eq!(plan.prefilter.last().unwrap().size, 1);
}

#[test]
fn plan_dispatches_cover_all_six_faces() {
    let plan = IblPlan::new(&EnvironmentSettings::default());
    assert_eq!(plan.equirect_workgroups, [128, 128, 6]);
    assert_eq!(plan.irradiance_workgroups, [4, 4, 6]);
    assert_eq!(plan.brdf_workgroups, [32, 32, 1]);
    for dispatch in &plan.prefilter {
        assert_eq!(dispatch.workgroups[2], 6);
        assert_eq!(dispatch.workgroups[0], workgroups_for(dispatch.size));
    }
}

#[test]
fn plan_is_deterministic() {
    let settings = EnvironmentSettings::default();
    assert_eq!(IblPlan::new(&settings), IblPlan::new(&settings));
}

#[test]
fn plan_scales_with_settings() {
    let settings = EnvironmentSettings {
        cubemap_size: 256,
        irradiance_size: 16,
        brdf_lut_size: 64,
        ..EnvironmentSettings::default()
    };
    let plan = IblPlan::new(&settings);
    assert_eq!(plan.specular_mip_count, 9);
    assert_eq!(plan.prefilter.len(), 8);
    assert_eq!(plan.equirect_workgroups, [32, 32, 6]);
}

// ============================================================================
// EnvironmentSlot Tests
// ============================================================================

#[test]
fn empty_slot_is_not_stale() {
    let slot = EnvironmentSlot::default();
    assert!(!slot.is_stale());
    assert!(slot.committed().is_none());
}

#[test]
fn setting_a_source_marks_the_slot_stale() {
    let mut slot = EnvironmentSlot::default();
    slot.set_source(Arc::new(Resource::image(
        "env.hdr",
        Image::solid_color([0, 0, 0, 255]),
    )));
    assert!(slot.is_stale());
}

// ============================================================================
// GpuModel Tests
// ============================================================================

#[test]
fn new_model_starts_uninitialized() {
    let mesh = Arc::new(Resource::mesh("tri", triangle_mesh()));
    let material = Arc::new(Resource::material("mat", Material::new("mat")));
    let model = GpuModel::new(mesh, material).unwrap();
    assert_eq!(model.state(), DrawState::Uninitialized);
    assert_eq!(model.index_count(), 0);
}

#[test]
fn model_rejects_swapped_resource_kinds() {
    let mesh = Arc::new(Resource::mesh("tri", triangle_mesh()));
    let material = Arc::new(Resource::material("mat", Material::new("mat")));
    assert!(GpuModel::new(material.clone(), mesh.clone()).is_err());
    assert!(GpuModel::new(mesh.clone(), mesh).is_err());
}

#[test]
fn vertex_stride_matches_interleaved_layout() {
    // position (12) + normal (12) + uv (8)
    assert_eq!(VERTEX_STRIDE, 32);
}

// ============================================================================
// Camera Tests
// ============================================================================

#[test]
fn camera_projection_is_reverse_z() {
    let camera = Camera::perspective(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        std::f32::consts::FRAC_PI_3,
        16.0 / 9.0,
        0.1,
    );
    // A point on the near plane projects to depth 1, distant points to ~0.
    let near = camera.proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
    assert!((near.z / near.w - 1.0).abs() < 1e-4);
    let far = camera.proj * Vec4::new(0.0, 0.0, -10_000.0, 1.0);
    assert!(far.z / far.w < 1e-3);
}

#[test]
fn camera_composes_view_then_projection() {
    let camera = Camera::perspective(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        std::f32::consts::FRAC_PI_3,
        1.0,
        0.1,
    );
    assert_eq!(camera.view_proj(), camera.proj * camera.view);
    assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 5.0));
}
