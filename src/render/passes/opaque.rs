//! Opaque Geometry Pass
//!
//! PBR forward pass over opaque models. Bind group 0 carries per-frame
//! state (camera plus the committed IBL textures), group 1 the material
//! (slot textures, scalar multipliers), group 2 the per-model transform.
//!
//! Material bind groups are rebuilt lazily from the dirty mask a material
//! accumulates; unchanged materials reuse their group across frames. Slot
//! images are uploaded once per image UUID and shared between materials.
//! A model whose buffers were never built is logged and skipped, not drawn.
//!
//! Cached bindings follow resource lifetimes: [`OpaquePass::end_frame`]
//! drops groups for models and materials absent from the frame's draw list
//! and GPU textures whose source image has been released.

use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::errors::{CinderError, Result};
use crate::gfx::{
    BufferDesc, BufferKind, BufferMode, GpuBuffer, GpuContext, GpuTexture, SamplerDesc,
    ShaderLibrary, ShaderStage, TextureDesc,
};
use crate::render::environment::Environment;
use crate::render::frame::Camera;
use crate::render::model::{DrawState, GpuModel, vertex_layout};
use crate::resources::{Image, Material, MaterialDirty, Resource, TextureSlot};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 3],
    /// Roughness LOD ceiling of the specular chain
    max_specular_mip: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ModelUniforms {
    model: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MaterialUniforms {
    /// One multiplier per texture slot, padded to 16-byte alignment
    scalars: [f32; 8],
}

struct MaterialBinding {
    group: wgpu::BindGroup,
    uniforms: GpuBuffer,
}

struct ModelBinding {
    group: wgpu::BindGroup,
    uniforms: GpuBuffer,
}

struct CachedImage {
    /// Back-reference to the CPU resource; a dead `Weak` means the last
    /// holder released the image and the GPU copy can go too.
    source: Weak<Resource>,
    texture: Arc<GpuTexture>,
}

pub struct OpaquePass {
    shader: wgpu::ShaderModule,
    frame_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    pipelines: FxHashMap<(wgpu::TextureFormat, wgpu::TextureFormat), wgpu::RenderPipeline>,

    frame_uniforms: GpuBuffer,
    frame_group: Option<(Uuid, wgpu::BindGroup)>,

    material_groups: FxHashMap<Uuid, MaterialBinding>,
    model_groups: FxHashMap<Uuid, ModelBinding>,

    /// Slot images uploaded once and shared between materials.
    gpu_images: FxHashMap<Uuid, CachedImage>,
    /// Per-slot 1×1 stand-ins for unbound slots.
    fallbacks: [Arc<GpuTexture>; TextureSlot::COUNT],

    material_sampler: Arc<wgpu::Sampler>,
    env_sampler: Arc<wgpu::Sampler>,
}

impl OpaquePass {
    pub fn new(ctx: &GpuContext, shaders: &ShaderLibrary) -> Result<Self> {
        let shader = shaders.compile(&ctx.device, ShaderStage::Vertex, "pbr")?;
        let device = &ctx.device;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PBR Frame Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, wgpu::TextureViewDimension::Cube),
                texture_entry(2, wgpu::TextureViewDimension::Cube),
                texture_entry(3, wgpu::TextureViewDimension::D2),
                sampler_entry(4),
                sampler_entry(5),
            ],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PBR Material Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                texture_entry(3, wgpu::TextureViewDimension::D2),
                texture_entry(4, wgpu::TextureViewDimension::D2),
                texture_entry(5, wgpu::TextureViewDimension::D2),
                texture_entry(6, wgpu::TextureViewDimension::D2),
                sampler_entry(7),
            ],
        });

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PBR Model Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });

        let frame_uniforms = ctx.create_buffer(
            &BufferDesc {
                label: "PBR Frame Uniforms",
                stride: std::mem::size_of::<FrameUniforms>() as u64,
                count: 1,
                kind: BufferKind::Uniform,
                mode: BufferMode::Dynamic,
            },
            None,
        )?;

        let fallbacks = build_fallbacks(ctx)?;

        let material_sampler = ctx.states.sampler(device, &SamplerDesc::default());
        let env_sampler = ctx.states.sampler(device, &SamplerDesc::linear_clamp());

        Ok(Self {
            shader,
            frame_layout,
            material_layout,
            model_layout,
            pipelines: FxHashMap::default(),
            frame_uniforms,
            frame_group: None,
            material_groups: FxHashMap::default(),
            model_groups: FxHashMap::default(),
            gpu_images: FxHashMap::default(),
            fallbacks,
            material_sampler,
            env_sampler,
        })
    }

    fn ensure_pipeline(
        &mut self,
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) {
        if self.pipelines.contains_key(&(color_format, depth_format)) {
            return;
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Pipeline Layout"),
            bind_group_layouts: &[
                Some(&self.frame_layout),
                Some(&self.material_layout),
                Some(&self.model_layout),
            ],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("PBR Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: Some(true),
                // Reverse-Z
                depth_compare: Some(wgpu::CompareFunction::Greater),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert((color_format, depth_format), pipeline);
    }

    /// Uploads a slot image once; later materials sharing the same image
    /// resource reuse the GPU texture.
    fn upload_image(
        &mut self,
        ctx: &GpuContext,
        source: &Arc<Resource>,
        image: &Image,
    ) -> Result<Arc<GpuTexture>> {
        if let Some(existing) = self.gpu_images.get(&image.uuid) {
            return Ok(existing.texture.clone());
        }
        let texture = Arc::new(ctx.create_texture(
            &TextureDesc {
                label: "Material Texture",
                width: image.width,
                height: image.height,
                mip_level_count: 1,
                array_layers: image.layers,
                format: image.format,
                usage: crate::gfx::TextureUsage::SHADER_RESOURCE,
            },
            Some(&image.data),
        )?);
        self.gpu_images.insert(
            image.uuid,
            CachedImage {
                source: Arc::downgrade(source),
                texture: texture.clone(),
            },
        );
        Ok(texture)
    }

    /// Uploads the material's slot textures and rebuilds its bind group if
    /// the dirty mask says so. Called per draw by
    /// [`record`](OpaquePass::record); hosts may call it directly to
    /// pre-warm a material.
    pub fn sync_material(&mut self, ctx: &GpuContext, resource: &Arc<Resource>) -> Result<()> {
        let material_lock = resource.as_material().ok_or_else(|| {
            CinderError::InvalidData(format!("resource '{}' is not a material", resource.name))
        })?;
        let mut material = material_lock.lock();
        let dirty = material.take_dirty();
        let uuid = material.uuid;

        if dirty.is_empty() && self.material_groups.contains_key(&uuid) {
            return Ok(());
        }

        // Scalar-only edits just rewrite the uniform.
        if dirty == MaterialDirty::SCALARS {
            if let Some(binding) = self.material_groups.get(&uuid) {
                binding
                    .uniforms
                    .update(&ctx.queue, bytemuck::bytes_of(&scalar_uniforms(&material)));
                return Ok(());
            }
        }

        // Resolve each slot to a GPU texture, falling back per slot.
        let mut slot_textures: Vec<Arc<GpuTexture>> = Vec::with_capacity(TextureSlot::COUNT);
        for slot in TextureSlot::ALL {
            let texture = match material.texture(slot) {
                Some(res) => match res.as_image() {
                    Some(image) => self.upload_image(ctx, res, image)?,
                    None => self.fallbacks[slot as usize].clone(),
                },
                None => self.fallbacks[slot as usize].clone(),
            };
            slot_textures.push(texture);
        }

        let uniforms = ctx.create_buffer(
            &BufferDesc {
                label: "Material Uniforms",
                stride: std::mem::size_of::<MaterialUniforms>() as u64,
                count: 1,
                kind: BufferKind::Uniform,
                mode: BufferMode::Dynamic,
            },
            Some(bytemuck::bytes_of(&scalar_uniforms(&material))),
        )?;

        let group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PBR Material BindGroup"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[0].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[1].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[2].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[3].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[4].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&slot_textures[5].srv),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
        });

        self.material_groups
            .insert(uuid, MaterialBinding { group, uniforms });
        Ok(())
    }

    /// Creates or updates the per-model transform binding.
    fn sync_model(&mut self, ctx: &GpuContext, model: &GpuModel) -> Result<()> {
        let uniforms_data = ModelUniforms {
            model: model.transform().to_cols_array_2d(),
        };
        if let Some(binding) = self.model_groups.get(&model.uuid) {
            binding
                .uniforms
                .update(&ctx.queue, bytemuck::bytes_of(&uniforms_data));
            return Ok(());
        }
        let uniforms = ctx.create_buffer(
            &BufferDesc {
                label: "Model Uniforms",
                stride: std::mem::size_of::<ModelUniforms>() as u64,
                count: 1,
                kind: BufferKind::Uniform,
                mode: BufferMode::Dynamic,
            },
            Some(bytemuck::bytes_of(&uniforms_data)),
        )?;
        let group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PBR Model BindGroup"),
            layout: &self.model_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer.as_entire_binding(),
            }],
        });
        self.model_groups
            .insert(model.uuid, ModelBinding { group, uniforms });
        Ok(())
    }

    fn sync_frame_group(&mut self, ctx: &GpuContext, environment: &Environment) {
        let stale = self
            .frame_group
            .as_ref()
            .is_none_or(|(uuid, _)| *uuid != environment.source_uuid);
        if !stale {
            return;
        }
        let group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PBR Frame BindGroup"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_uniforms.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&environment.irradiance.srv),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&environment.specular.srv),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&environment.brdf_lut.srv),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.env_sampler),
                },
            ],
        });
        self.frame_group = Some((environment.source_uuid, group));
    }

    /// Records all opaque model draws into an open render pass.
    ///
    /// Models that were never initialized are skipped with an error log;
    /// one bad model does not abort the frame.
    pub fn record(
        &mut self,
        ctx: &GpuContext,
        rpass: &mut wgpu::RenderPass<'_>,
        environment: &Environment,
        camera: &Camera,
        models: &mut [GpuModel],
    ) -> Result<()> {
        let key = (ctx.color_format(), ctx.depth_format);
        self.ensure_pipeline(&ctx.device, key.0, key.1);

        let frame = FrameUniforms {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_pos: camera.position().to_array(),
            max_specular_mip: environment.max_specular_mip,
        };
        self.frame_uniforms.update(&ctx.queue, bytemuck::bytes_of(&frame));
        self.sync_frame_group(ctx, environment);

        let (_, frame_group) = self.frame_group.as_ref().expect("frame group built above");
        rpass.set_pipeline(&self.pipelines[&key]);
        rpass.set_bind_group(0, frame_group, &[]);

        for model in models {
            if model.state() == DrawState::Uninitialized {
                log::error!(
                    "[render] skipping model '{}': buffers were never built",
                    model.mesh().name
                );
                continue;
            }
            let material_res = model.material().clone();
            self.sync_material(ctx, &material_res)?;
            self.sync_model(ctx, model)?;

            let material_uuid = material_res
                .as_material()
                .map(|m| m.lock().uuid)
                .ok_or_else(|| {
                    CinderError::InvalidData("model lost its material payload".to_string())
                })?;
            let material_binding = &self.material_groups[&material_uuid];
            let model_binding = &self.model_groups[&model.uuid];

            rpass.set_bind_group(1, &material_binding.group, &[]);
            rpass.set_bind_group(2, &model_binding.group, &[]);
            model.render(rpass)?;
        }
        Ok(())
    }

    /// Frame-end cache maintenance.
    ///
    /// Drops bind groups for models and materials absent from this frame's
    /// draw list, and GPU textures whose source image resource has been
    /// released. Without this the caches grow without bound as scene
    /// content churns.
    pub fn end_frame(&mut self, models: &[GpuModel]) {
        self.model_groups
            .retain(|uuid, _| models.iter().any(|m| m.uuid == *uuid));

        let live_materials: Vec<Uuid> = models
            .iter()
            .filter_map(|m| m.material().as_material().map(|mat| mat.lock().uuid))
            .collect();
        self.material_groups
            .retain(|uuid, _| live_materials.contains(uuid));

        self.gpu_images
            .retain(|_, cached| cached.source.strong_count() > 0);
    }

    /// Number of cached material bind groups.
    #[must_use]
    pub fn cached_material_count(&self) -> usize {
        self.material_groups.len()
    }

    /// Number of distinct slot images resident on the GPU.
    #[must_use]
    pub fn cached_image_count(&self) -> usize {
        self.gpu_images.len()
    }

    /// Number of cached per-model bindings.
    #[must_use]
    pub fn cached_model_count(&self) -> usize {
        self.model_groups.len()
    }
}

fn scalar_uniforms(material: &Material) -> MaterialUniforms {
    let mut scalars = [1.0f32; 8];
    for slot in TextureSlot::ALL {
        scalars[slot as usize] = material.scalar(slot);
    }
    MaterialUniforms { scalars }
}

/// 1×1 defaults: flat normal for the normal slot, white elsewhere so the
/// scalar multiplier alone drives the channel.
fn build_fallbacks(ctx: &GpuContext) -> Result<[Arc<GpuTexture>; TextureSlot::COUNT]> {
    let mut out: Vec<Arc<GpuTexture>> = Vec::with_capacity(TextureSlot::COUNT);
    for slot in TextureSlot::ALL {
        let color = match slot {
            TextureSlot::Normal => [128, 128, 255, 255],
            TextureSlot::Emissive => [0, 0, 0, 255],
            _ => [255, 255, 255, 255],
        };
        let image = Image::solid_color(color);
        let texture = ctx.create_texture(
            &TextureDesc::new_2d("Fallback Texture", 1, 1, image.format),
            Some(&image.data),
        )?;
        out.push(Arc::new(texture));
    }
    Ok(out
        .try_into()
        .unwrap_or_else(|_| unreachable!("exactly {} fallbacks built", TextureSlot::COUNT)))
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
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
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
