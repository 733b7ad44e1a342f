//! Skybox Pass
//!
//! Draws the environment cubemap as the background: a single fullscreen
//! triangle whose fragment shader reconstructs the view ray from the
//! inverse view-projection and samples the unfiltered cube. Depth output
//! is pinned to the far plane (0 under reverse-Z) with writes disabled,
//! so the sky only survives where no geometry landed.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::errors::Result;
use crate::gfx::{
    BufferDesc, BufferKind, BufferMode, GpuBuffer, GpuContext, SamplerDesc, ShaderLibrary,
    ShaderStage,
};
use crate::render::environment::Environment;
use crate::render::frame::Camera;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SkyboxUniforms {
    inv_view_proj: [[f32; 4]; 4],
    /// Yaw applied to the sample direction, radians
    rotation: f32,
    intensity: f32,
    _pad: [f32; 2],
}

pub struct SkyboxPass {
    shader: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    sampler: std::sync::Arc<wgpu::Sampler>,
    uniforms: GpuBuffer,
    pipelines: FxHashMap<(wgpu::TextureFormat, wgpu::TextureFormat), wgpu::RenderPipeline>,
    /// Bind group cached per environment source; rebuilt on change.
    bind_group: Option<(Uuid, wgpu::BindGroup)>,

    /// Yaw offset of the environment, radians.
    pub rotation: f32,
    /// Radiance multiplier applied to the sampled sky.
    pub intensity: f32,
}

impl SkyboxPass {
    pub fn new(ctx: &GpuContext, shaders: &ShaderLibrary) -> Result<Self> {
        let shader = shaders.compile(&ctx.device, ShaderStage::Vertex, "skybox")?;

        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Skybox Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::Cube,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let uniforms = ctx.create_buffer(
            &BufferDesc {
                label: "Skybox Uniforms",
                stride: std::mem::size_of::<SkyboxUniforms>() as u64,
                count: 1,
                kind: BufferKind::Uniform,
                mode: BufferMode::Dynamic,
            },
            None,
        )?;

        let sampler = ctx.states.sampler(&ctx.device, &SamplerDesc::linear_clamp());

        Ok(Self {
            shader,
            layout,
            sampler,
            uniforms,
            pipelines: FxHashMap::default(),
            bind_group: None,
            rotation: 0.0,
            intensity: 1.0,
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
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[Some(&self.layout)],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[],
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
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: Some(false),
                // Reverse-Z: the sky sits at depth 0, behind everything.
                depth_compare: Some(wgpu::CompareFunction::GreaterEqual),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert((color_format, depth_format), pipeline);
    }

    /// Records the sky draw into an open render pass.
    pub fn record(
        &mut self,
        ctx: &GpuContext,
        rpass: &mut wgpu::RenderPass<'_>,
        environment: &Environment,
        camera: &Camera,
    ) -> Result<()> {
        let key = (ctx.color_format(), ctx.depth_format);
        self.ensure_pipeline(&ctx.device, key.0, key.1);

        let uniforms = SkyboxUniforms {
            inv_view_proj: camera.view_proj().inverse().to_cols_array_2d(),
            rotation: self.rotation,
            intensity: self.intensity,
            _pad: [0.0; 2],
        };
        self.uniforms.update(&ctx.queue, bytemuck::bytes_of(&uniforms));

        let stale = self
            .bind_group
            .as_ref()
            .is_none_or(|(uuid, _)| *uuid != environment.source_uuid);
        if stale {
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Skybox BindGroup"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniforms.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            &environment.unfiltered_cube.srv,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.bind_group = Some((environment.source_uuid, bind_group));
        }

        let (_, bind_group) = self
            .bind_group
            .as_ref()
            .expect("bind group built above");
        let pipeline = &self.pipelines[&key];

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }
}
