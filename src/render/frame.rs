//! Frame Orchestration
//!
//! [`Renderer`] owns the pass objects and the environment slot, and walks
//! one frame end to end: marshal finished background loads, rebuild the
//! environment if its source changed, acquire the swapchain image, record
//! skybox then opaque draws into a single pass, submit, present.
//!
//! Everything a frame touches arrives through [`FrameContext`] — the
//! renderer holds no global state and can be driven from any loop that
//! owns the context.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::errors::{CinderError, Result};
use crate::gfx::{GpuContext, ShaderLibrary};
use crate::render::environment::{EnvironmentSettings, EnvironmentSlot};
use crate::render::ibl::IblPipeline;
use crate::render::model::GpuModel;
use crate::render::passes::{OpaquePass, SkyboxPass};
use crate::resources::{Resource, ResourceCache};

/// View and projection state for one frame.
///
/// Projections are reverse-Z: the depth buffer clears to 0 and nearer
/// fragments are greater. [`Camera::perspective`] builds a matching
/// infinite projection.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub view: Mat4,
    pub proj: Mat4,
    pub position: Vec3,
}

impl Camera {
    /// Looking from `eye` toward `target`, with a reverse-Z infinite
    /// perspective projection.
    #[must_use]
    pub fn perspective(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            proj: Mat4::perspective_infinite_reverse_rh(fov_y, aspect, near),
            position: eye,
        }
    }

    #[must_use]
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }
}

/// Everything one frame reads and writes, passed explicitly.
pub struct FrameContext<'a> {
    pub ctx: &'a GpuContext,
    pub camera: &'a Camera,
    pub models: &'a mut [GpuModel],
    pub cache: &'a ResourceCache,
}

/// Owns the passes, the IBL pipeline, and the active environment.
pub struct Renderer {
    ibl: IblPipeline,
    skybox: SkyboxPass,
    opaque: OpaquePass,
    environment: EnvironmentSlot,
}

impl Renderer {
    /// Compiles every pass up front; a shader failure here is fatal.
    pub fn new(ctx: &GpuContext, settings: EnvironmentSettings) -> Result<Self> {
        let shaders = ShaderLibrary::new();
        Ok(Self {
            ibl: IblPipeline::new(ctx, &shaders, settings)?,
            skybox: SkyboxPass::new(ctx, &shaders)?,
            opaque: OpaquePass::new(ctx, &shaders)?,
            environment: EnvironmentSlot::default(),
        })
    }

    /// Sets (or replaces) the environment source image. The rebuild happens
    /// at the start of the next frame.
    pub fn set_environment_source(&mut self, source: Arc<Resource>) {
        self.environment.set_source(source);
    }

    #[must_use]
    pub fn environment(&self) -> &EnvironmentSlot {
        &self.environment
    }

    /// Skybox appearance controls (rotation in radians, radiance multiplier).
    pub fn skybox_mut(&mut self) -> &mut SkyboxPass {
        &mut self.skybox
    }

    #[must_use]
    pub fn ibl(&self) -> &IblPipeline {
        &self.ibl
    }

    /// Rebuilds the environment when the source changed. A failed rebuild
    /// keeps the previous committed environment and logs the error.
    fn refresh_environment(&mut self, ctx: &GpuContext) {
        if !self.environment.is_stale() {
            return;
        }
        let Some(image) = self.environment.source().and_then(|s| s.as_image()) else {
            log::error!("[render] environment source is not an image resource");
            return;
        };
        match self.ibl.run(ctx, image) {
            Ok(environment) => self.environment.commit(environment),
            Err(e) => log::error!("[render] environment rebuild failed, keeping previous: {e}"),
        }
    }

    /// Renders one frame. Headless contexts run the environment refresh and
    /// background-load marshaling but record no draws.
    pub fn render_frame(&mut self, frame: FrameContext<'_>) -> Result<()> {
        let ctx = frame.ctx;

        frame.cache.drain_loaded();
        self.refresh_environment(ctx);

        let Some(surface) = &ctx.surface else {
            return Ok(());
        };
        let surface_texture = match surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(t)
            | wgpu::CurrentSurfaceTexture::Suboptimal(t) => t,
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                // The host resizes via GpuContext::resize; skip this frame.
                log::warn!("[render] surface outdated, skipping frame");
                return Ok(());
            }
            e => return Err(CinderError::SurfaceConfigFailed(format!("{e:?}"))),
        };
        let color_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for model in frame.models.iter_mut() {
            model.begin_frame();
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(ctx.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        // Reverse-Z far plane
                        load: wgpu::LoadOp::Clear(0.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(environment) = self.environment.committed() {
                self.skybox.record(ctx, &mut rpass, environment, frame.camera)?;
                self.opaque
                    .record(ctx, &mut rpass, environment, frame.camera, &mut *frame.models)?;
            } else {
                log::debug!("[render] no committed environment, clearing only");
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();

        // Keeps the pass caches bounded as scene content churns.
        self.opaque.end_frame(frame.models);
        Ok(())
    }
}
