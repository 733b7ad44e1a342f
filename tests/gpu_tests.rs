//! Headless GPU Tests
//!
//! Device-backed coverage, skipped when no adapter is available:
//! - Buffer creation alignment for small index buffers
//! - Per-mip storage view creation and dimensions
//! - Embedded shader compilation
//! - IBL pipeline construction and a full small-resolution build
//! - Draw-state rejection inside a live render pass
//! - Opaque pass cache lifetime maintenance

use std::sync::Arc;

use glam::{Vec2, Vec3};

use cinder::CinderError;
use cinder::gfx::{ContextSettings, GpuContext, ShaderLibrary, ShaderStage, TextureDesc, TextureUsage};
use cinder::render::{
    BRDF_LUT_FORMAT, DrawState, EnvironmentSettings, GpuModel, IblPipeline, OpaquePass,
};
use cinder::resources::{Image, Material, Mesh, Resource, TextureSlot};

fn headless() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    match GpuContext::new_headless(&ContextSettings::default(), 64, 64) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("no GPU adapter available, skipping: {e}");
            None
        }
    }
}

fn triangle_mesh() -> Mesh {
    Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![Vec3::Z; 3],
        vec![Vec2::ZERO; 3],
        vec![0, 1, 2],
    )
    .unwrap()
}

fn triangle_model() -> GpuModel {
    let mesh = Arc::new(Resource::mesh("tri", triangle_mesh()));
    let material = Arc::new(Resource::material("mat", Material::new("mat")));
    GpuModel::new(mesh, material).unwrap()
}

// ============================================================================
// Buffer Creation
// ============================================================================

// Three u16 indices are 6 bytes; the allocation must still satisfy wgpu's
// 4-byte copy alignment.
#[test]
fn odd_index_count_builds_device_buffers() {
    let Some(ctx) = headless() else { return };
    let mut model = triangle_model();
    model.build_buffers(&ctx).unwrap();
    assert_eq!(model.state(), DrawState::BuffersBuilt);
    assert_eq!(model.index_count(), 3);
}

// ============================================================================
// Texture Views
// ============================================================================

#[test]
fn storage_views_follow_usage_and_mip_count() {
    let Some(ctx) = headless() else { return };

    let cube = ctx
        .create_texture(
            &TextureDesc::new_cube("cube", 64, wgpu::TextureFormat::Rgba16Float)
                .with_auto_mips()
                .with_usage(TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS),
            None,
        )
        .unwrap();
    assert_eq!(cube.mip_level_count(), 7);
    assert_eq!(cube.uav_count(), 7);
    assert!(cube.uav(6).is_some());
    assert!(cube.uav(7).is_none());

    let sampled_only = ctx
        .create_texture(
            &TextureDesc::new_2d("srv", 64, 64, wgpu::TextureFormat::Rgba8Unorm),
            None,
        )
        .unwrap();
    assert_eq!(sampled_only.uav_count(), 0);
    assert!(sampled_only.uav(0).is_none());

    let flat = ctx
        .create_texture(
            &TextureDesc::new_2d("lut", 64, 64, BRDF_LUT_FORMAT)
                .with_usage(TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS),
            None,
        )
        .unwrap();
    assert_eq!(flat.uav_count(), 1);
}

// ============================================================================
// Shader Compilation
// ============================================================================

#[test]
fn all_embedded_shaders_compile() {
    let Some(ctx) = headless() else { return };
    let shaders = ShaderLibrary::new();
    for name in ["blit", "skybox", "pbr"] {
        shaders
            .compile(&ctx.device, ShaderStage::Vertex, name)
            .unwrap();
    }
    for name in ["equirect_to_cube", "prefilter", "irradiance", "brdf_lut"] {
        shaders
            .compile(&ctx.device, ShaderStage::Compute, name)
            .unwrap();
    }
}

// ============================================================================
// IBL Pipeline
// ============================================================================

#[test]
fn ibl_pipeline_initializes_on_default_features() {
    let Some(ctx) = headless() else { return };
    let shaders = ShaderLibrary::new();
    assert!(IblPipeline::new(&ctx, &shaders, EnvironmentSettings::default()).is_ok());
}

#[test]
fn environment_build_produces_complete_chain() {
    let Some(ctx) = headless() else { return };
    let shaders = ShaderLibrary::new();
    let settings = EnvironmentSettings {
        cubemap_size: 64,
        irradiance_size: 16,
        brdf_lut_size: 64,
        ..EnvironmentSettings::default()
    };
    let ibl = IblPipeline::new(&ctx, &shaders, settings).unwrap();

    // 16×8 equirect source, zeroed half-float texels.
    let image = Image::new(16, 8, 1, wgpu::TextureFormat::Rgba16Float, vec![0; 16 * 8 * 8]).unwrap();
    let env = ibl.run(&ctx, &image).unwrap();

    assert_eq!(env.unfiltered_cube.mip_level_count(), 7);
    assert_eq!(env.specular.mip_level_count(), 7);
    assert_eq!(env.specular.uav_count(), 7);
    assert_eq!(env.irradiance.mip_level_count(), 1);
    assert_eq!(env.brdf_lut.desc.format, BRDF_LUT_FORMAT);
    assert!((env.max_specular_mip - 6.0).abs() < f32::EPSILON);
}

// ============================================================================
// Draw State
// ============================================================================

#[test]
fn unbuilt_model_is_rejected_inside_a_pass() {
    let Some(ctx) = headless() else { return };
    let target = ctx
        .create_texture(
            &TextureDesc::new_2d("rt", 16, 16, wgpu::TextureFormat::Rgba8Unorm)
                .with_usage(TextureUsage::RENDER_TARGET),
            None,
        )
        .unwrap();
    let view = target.rtv(0, 0);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: None,
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    let mut model = triangle_model();
    let result = model.render(&mut rpass);
    assert!(matches!(result, Err(CinderError::DrawStateViolation(_))));
    assert_eq!(model.state(), DrawState::Uninitialized);
}

// ============================================================================
// Opaque Pass Caches
// ============================================================================

#[test]
fn pass_caches_shrink_when_content_goes_away() {
    let Some(ctx) = headless() else { return };
    let shaders = ShaderLibrary::new();
    let mut pass = OpaquePass::new(&ctx, &shaders).unwrap();

    let image_res = Arc::new(Resource::image("albedo", Image::solid_color([200, 40, 40, 255])));
    let mut material = Material::new("painted");
    material
        .set_texture(TextureSlot::Albedo, image_res.clone())
        .unwrap();
    let material_res = Arc::new(Resource::material("painted", material));

    pass.sync_material(&ctx, &material_res).unwrap();
    assert_eq!(pass.cached_material_count(), 1);
    assert_eq!(pass.cached_image_count(), 1);

    // No models referenced the material this frame: its group goes, but the
    // image is still held by a live resource.
    pass.end_frame(&[]);
    assert_eq!(pass.cached_material_count(), 0);
    assert_eq!(pass.cached_image_count(), 1);

    drop(image_res);
    drop(material_res);
    pass.end_frame(&[]);
    assert_eq!(pass.cached_image_count(), 0);
}
