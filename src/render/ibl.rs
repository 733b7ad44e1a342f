//! Environment/IBL Precompute Pipeline
//!
//! Converts one equirectangular HDR image into the full set of
//! image-based-lighting textures consumed at shade time. This is a strict
//! pipeline, not a data structure: it runs on demand (startup or skybox
//! change) and is idempotent for a fixed source image.
//!
//! Stage order on one command stream (each stage fully written before the
//! next reads it):
//!
//! 1. equirect→cube compute over the unfiltered cubemap
//! 2. full mip-chain generation of the unfiltered cube (blit downsample)
//! 3. specular prefilter — mip 0 copied unmodified, mips 1.. dispatched
//!    with roughness `L / (levels - 1)`
//! 4. diffuse irradiance convolution, sampling the finished specular cube
//! 5. split-sum BRDF LUT — independent of 1–4, appended to the same stream
//!
//! Any shader or resource failure aborts the whole run with `Err`; prior
//! committed environments are never touched (see
//! [`EnvironmentSlot`](crate::render::environment::EnvironmentSlot)).

use bytemuck::{Pod, Zeroable};

use crate::errors::{CinderError, Result};
use crate::gfx::{
    BufferDesc, BufferKind, BufferMode, GpuContext, SamplerDesc, ShaderLibrary, ShaderStage,
    TextureDesc, TextureUsage,
};
use crate::render::environment::{
    BRDF_LUT_FORMAT, Environment, EnvironmentSettings, IblPlan,
};
use crate::render::mipmap::MipmapGenerator;
use crate::resources::Image;

/// Per-mip prefilter parameters, std140-sized.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct PrefilterParams {
    roughness: f32,
    mip_size: f32,
    _pad0: f32,
    _pad1: f32,
}

/// The precompute pipeline: compiled compute pipelines plus layouts,
/// created once and reused for every rebuild.
pub struct IblPipeline {
    settings: EnvironmentSettings,

    equirect_pipeline: wgpu::ComputePipeline,
    equirect_layout: wgpu::BindGroupLayout,

    prefilter_pipeline: wgpu::ComputePipeline,
    prefilter_src_layout: wgpu::BindGroupLayout,
    prefilter_dst_layout: wgpu::BindGroupLayout,

    irradiance_pipeline: wgpu::ComputePipeline,
    irradiance_layout: wgpu::BindGroupLayout,

    brdf_pipeline: wgpu::ComputePipeline,
    brdf_layout: wgpu::BindGroupLayout,

    mipmaps: MipmapGenerator,
    sampler: std::sync::Arc<wgpu::Sampler>,
}

impl IblPipeline {
    /// Compiles every stage's shader and pipeline. Any compile failure is
    /// fatal to this init step and leaves no partially built pipeline.
    pub fn new(
        ctx: &GpuContext,
        shaders: &ShaderLibrary,
        settings: EnvironmentSettings,
    ) -> Result<Self> {
        // The convolution shaders declare their storage targets as
        // rgba16float; other cube formats would fail pipeline validation.
        if settings.color_format != wgpu::TextureFormat::Rgba16Float {
            return Err(CinderError::InvalidDescriptor(format!(
                "environment color format must be Rgba16Float, got {:?}",
                settings.color_format
            )));
        }

        let device = &ctx.device;
        let cube_format = settings.color_format;

        // --- Equirect → cube ---
        let equirect_module = shaders.compile(device, ShaderStage::Compute, "equirect_to_cube")?;
        let equirect_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Equirect Layout"),
            entries: &[
                sampled_texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1),
                storage_texture_entry(2, cube_format),
            ],
        });
        let equirect_pipeline =
            compute_pipeline(device, "Equirect to Cube", &equirect_module, &[&equirect_layout]);

        // --- Specular prefilter ---
        let prefilter_module = shaders.compile(device, ShaderStage::Compute, "prefilter")?;
        let prefilter_src_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Prefilter Source Layout"),
                entries: &[
                    sampled_texture_entry(0, wgpu::TextureViewDimension::Cube),
                    sampler_entry(1),
                    uniform_entry(2),
                ],
            });
        let prefilter_dst_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Prefilter Dest Layout"),
                entries: &[storage_texture_entry(0, cube_format)],
            });
        let prefilter_pipeline = compute_pipeline(
            device,
            "Specular Prefilter",
            &prefilter_module,
            &[&prefilter_src_layout, &prefilter_dst_layout],
        );

        // --- Irradiance convolution ---
        let irradiance_module = shaders.compile(device, ShaderStage::Compute, "irradiance")?;
        let irradiance_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Irradiance Layout"),
                entries: &[
                    sampled_texture_entry(0, wgpu::TextureViewDimension::Cube),
                    sampler_entry(1),
                    storage_texture_entry(2, cube_format),
                ],
            });
        let irradiance_pipeline = compute_pipeline(
            device,
            "Irradiance Convolution",
            &irradiance_module,
            &[&irradiance_layout],
        );

        // --- BRDF LUT ---
        let brdf_module = shaders.compile(device, ShaderStage::Compute, "brdf_lut")?;
        let brdf_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("BRDF LUT Layout"),
            entries: &[storage_texture_entry_2d(0, BRDF_LUT_FORMAT)],
        });
        let brdf_pipeline = compute_pipeline(device, "BRDF LUT", &brdf_module, &[&brdf_layout]);

        let mut mipmaps = MipmapGenerator::new(ctx, shaders)?;
        mipmaps.ensure_pipeline(device, cube_format);

        let sampler = ctx.states.sampler(device, &SamplerDesc::linear_clamp());

        Ok(Self {
            settings,
            equirect_pipeline,
            equirect_layout,
            prefilter_pipeline,
            prefilter_src_layout,
            prefilter_dst_layout,
            irradiance_pipeline,
            irradiance_layout,
            brdf_pipeline,
            brdf_layout,
            mipmaps,
            sampler,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    /// The dispatch plan this pipeline will execute.
    #[must_use]
    pub fn plan(&self) -> IblPlan {
        IblPlan::new(&self.settings)
    }

    /// Runs the full precompute sequence for `source` and returns a complete
    /// environment. One submission; stage order within the command stream
    /// guarantees each stage reads fully written data.
    pub fn run(&self, ctx: &GpuContext, source: &Image) -> Result<Environment> {
        let plan = self.plan();
        let cube_format = self.settings.color_format;

        log::info!(
            "[ibl] building environment: {0}x{0} cube, {1} specular mips, {2}x{2} irradiance, {3}x{3} LUT",
            plan.cubemap_size,
            plan.specular_mip_count,
            plan.irradiance_size,
            plan.brdf_lut_size,
        );

        // --- Create all targets first; any failure aborts before encoding ---
        let source_tex = ctx.create_texture(
            &TextureDesc::new_2d("IBL Source", source.width, source.height, source.format),
            Some(&source.data),
        )?;

        let unfiltered_cube = ctx.create_texture(
            &TextureDesc::new_cube("Env Unfiltered Cube", plan.cubemap_size, cube_format)
                .with_auto_mips()
                .with_usage(
                    TextureUsage::SHADER_RESOURCE
                        | TextureUsage::UNORDERED_ACCESS
                        | TextureUsage::RENDER_TARGET
                        | TextureUsage::COPY,
                ),
            None,
        )?;

        let specular = ctx.create_texture(
            &TextureDesc::new_cube("Env Specular Cube", plan.cubemap_size, cube_format)
                .with_auto_mips()
                .with_usage(
                    TextureUsage::SHADER_RESOURCE
                        | TextureUsage::UNORDERED_ACCESS
                        | TextureUsage::COPY,
                ),
            None,
        )?;

        let irradiance = ctx.create_texture(
            &TextureDesc::new_cube("Env Irradiance Cube", plan.irradiance_size, cube_format)
                .with_usage(TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS),
            None,
        )?;

        let brdf_lut = ctx.create_texture(
            &TextureDesc::new_2d("BRDF LUT", plan.brdf_lut_size, plan.brdf_lut_size, BRDF_LUT_FORMAT)
                .with_usage(TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS),
            None,
        )?;

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("IBL Precompute Encoder"),
            });

        // --- Stage 1: equirect → cube (mip 0 of the unfiltered cube) ---
        {
            let dst = unfiltered_cube
                .uav(0)
                .expect("unfiltered cube is created with UNORDERED_ACCESS");
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Equirect BindGroup"),
                layout: &self.equirect_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source_tex.srv),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                ],
            });

            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Equirect to Cube"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.equirect_pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = plan.equirect_workgroups;
            cpass.dispatch_workgroups(x, y, z);
        }

        // --- Stage 2: unfiltered mip chain ---
        self.mipmaps.generate(&ctx.device, &mut encoder, &unfiltered_cube);

        // --- Stage 3: specular prefilter ---
        // Mip 0 is the unfiltered reflection; copy it over unmodified.
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &unfiltered_cube.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &specular.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: plan.cubemap_size,
                height: plan.cubemap_size,
                depth_or_array_layers: 6,
            },
        );

        for dispatch in &plan.prefilter {
            let params = PrefilterParams {
                roughness: dispatch.roughness,
                mip_size: dispatch.size as f32,
                _pad0: 0.0,
                _pad1: 0.0,
            };
            let param_buffer = ctx.create_buffer(
                &BufferDesc {
                    label: "IBL Prefilter Params",
                    stride: std::mem::size_of::<PrefilterParams>() as u64,
                    count: 1,
                    kind: BufferKind::Uniform,
                    mode: BufferMode::Immutable,
                },
                Some(bytemuck::bytes_of(&params)),
            )?;

            let bg_src = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Prefilter Source BindGroup"),
                layout: &self.prefilter_src_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&unfiltered_cube.srv),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: param_buffer.buffer.as_entire_binding(),
                    },
                ],
            });

            let dst = specular
                .uav(dispatch.mip)
                .expect("specular cube is created with UNORDERED_ACCESS");
            let bg_dst = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Prefilter Dest BindGroup"),
                layout: &self.prefilter_dst_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(dst),
                }],
            });

            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Specular Prefilter"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.prefilter_pipeline);
            cpass.set_bind_group(0, &bg_src, &[]);
            cpass.set_bind_group(1, &bg_dst, &[]);
            let [x, y, z] = dispatch.workgroups;
            cpass.dispatch_workgroups(x, y, z);
        }

        // --- Stage 4: irradiance convolution (reads the finished specular) ---
        {
            let dst = irradiance
                .uav(0)
                .expect("irradiance cube is created with UNORDERED_ACCESS");
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Irradiance BindGroup"),
                layout: &self.irradiance_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&specular.srv),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                ],
            });

            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Irradiance Convolution"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.irradiance_pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = plan.irradiance_workgroups;
            cpass.dispatch_workgroups(x, y, z);
        }

        // --- Stage 5: BRDF LUT (no shared resources with stages 1–4) ---
        {
            let dst = brdf_lut
                .uav(0)
                .expect("BRDF LUT is created with UNORDERED_ACCESS");
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("BRDF LUT BindGroup"),
                layout: &self.brdf_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(dst),
                }],
            });

            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("BRDF LUT"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.brdf_pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = plan.brdf_workgroups;
            cpass.dispatch_workgroups(x, y, z);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));

        Ok(Environment {
            source_uuid: source.uuid,
            max_specular_mip: (plan.specular_mip_count - 1) as f32,
            unfiltered_cube,
            specular,
            irradiance,
            brdf_lut,
        })
    }
}

// ============================================================================
// Layout entry helpers
// ============================================================================

fn sampled_texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2Array,
        },
        count: None,
    }
}

fn storage_texture_entry_2d(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::ComputePipeline {
    let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
        bind_group_layouts.iter().map(|l| Some(*l)).collect();
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &bind_group_layouts,
        immediate_size: 0,
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}
