//! GPU Context
//!
//! The [`GpuContext`] is the sole owner of the physical device, queue,
//! surface, and surface configuration. Every resource-creation and
//! command-submission path in the engine goes through it.
//!
//! Device and draw calls are single-threaded by convention: creation and
//! submission happen on the thread that owns the context. Background work
//! decodes off-thread and marshals results back here (see
//! `resources::cache`).

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{CinderError, Result};
use crate::gfx::buffer::{BufferDesc, GpuBuffer};
use crate::gfx::states::StateCache;
use crate::gfx::texture::{GpuTexture, TextureDesc};

/// Settings applied at context creation.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub power_preference: wgpu::PowerPreference,
    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,
    pub depth_format: wgpu::TextureFormat,
    pub vsync: bool,
    pub clear_color: wgpu::Color,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            depth_format: wgpu::TextureFormat::Depth32Float,
            vsync: true,
            clear_color: wgpu::Color::BLACK,
        }
    }
}

/// Core GPU context holding device, queue, surface, and config.
///
/// Created once at startup; creation failure (no adapter, driver rejects the
/// requested features) is fatal and aborts startup.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// `None` for headless (compute/test) contexts
    pub surface: Option<wgpu::Surface<'static>>,
    pub config: wgpu::SurfaceConfiguration,

    pub depth_format: wgpu::TextureFormat,
    /// Recreated on resize
    pub depth_view: wgpu::TextureView,
    pub clear_color: wgpu::Color,

    /// Immutable sampler state objects, created once and shared.
    pub states: StateCache,
}

impl GpuContext {
    /// Creates a windowed context from a native window handle.
    pub fn new<W>(window: W, settings: &ContextSettings, width: u32, height: u32) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| CinderError::AdapterRequestFailed(e.to_string()))?;

        let (adapter, device, queue) = request_device(&instance, Some(&surface), settings)?;

        let mut config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| {
                CinderError::SurfaceConfigFailed("Surface not supported by adapter".to_string())
            })?;
        config.present_mode = if settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, width, height, settings.depth_format);
        let states = StateCache::new(&device);

        log::info!(
            "GPU context created: {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        Ok(Self {
            device,
            queue,
            surface: Some(surface),
            config,
            depth_format: settings.depth_format,
            depth_view,
            clear_color: settings.clear_color,
            states,
        })
    }

    /// Creates a surfaceless context for precompute and offscreen use.
    pub fn new_headless(settings: &ContextSettings, width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let (adapter, device, queue) = request_device(&instance, None, settings)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Rgba16Float,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };

        let depth_view = create_depth_view(&device, width, height, settings.depth_format);
        let states = StateCache::new(&device);

        log::info!("Headless GPU context created: {}", adapter.get_info().name);

        Ok(Self {
            device,
            queue,
            surface: None,
            config,
            depth_format: settings.depth_format,
            depth_view,
            clear_color: settings.clear_color,
            states,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
        self.depth_view = create_depth_view(&self.device, width, height, self.depth_format);
    }

    // ========================================================================
    // Typed resource creation
    // ========================================================================

    /// Creates a texture with its view set. Validation failures are logged
    /// and surfaced as `Err`; the context itself is unaffected.
    pub fn create_texture(
        &self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<GpuTexture> {
        GpuTexture::create(&self.device, &self.queue, desc, initial_data).inspect_err(|e| {
            log::error!("[gfx] texture creation failed: {e}");
        })
    }

    /// Creates a buffer. Immutable buffers require initial data.
    pub fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<GpuBuffer> {
        GpuBuffer::create(&self.device, &self.queue, desc, initial_data).inspect_err(|e| {
            log::error!("[gfx] buffer creation failed: {e}");
        })
    }

    /// Returns the surface color format.
    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current surface dimensions.
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    settings: &ContextSettings,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: settings.power_preference,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .map_err(|e| CinderError::AdapterRequestFailed(e.to_string()))?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: settings.required_features,
        required_limits: settings.required_limits.clone(),
        memory_hints: wgpu::MemoryHints::Performance,
        ..Default::default()
    }))?;

    Ok((adapter, device, queue))
}

fn create_depth_view(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
