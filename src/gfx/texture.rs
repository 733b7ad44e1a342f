//! GPU Texture Resources
//!
//! [`GpuTexture`] is the leaf resource type: one `wgpu::Texture` plus the
//! set of views derived from it. Views are created up front from the
//! description so that every consumer (compute passes, material binding,
//! render attachments) shares the same objects:
//!
//! - one SRV over the full mip chain (`Cube` dimension for 6-layer textures),
//! - one UAV per mip level when created with [`TextureUsage::UNORDERED_ACCESS`]
//!   (compute passes write one mip at a time),
//! - RTVs per (mip, layer) on demand.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::errors::{CinderError, Result};

bitflags! {
    /// Bind-usage flags for texture creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled in shaders (SRV)
        const SHADER_RESOURCE = 1 << 0;
        /// Written by compute shaders (UAV)
        const UNORDERED_ACCESS = 1 << 1;
        /// Used as a color attachment (RTV)
        const RENDER_TARGET = 1 << 2;
        /// Source/destination of texture copies
        const COPY = 1 << 3;
    }
}

impl TextureUsage {
    fn to_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.contains(Self::SHADER_RESOURCE) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(Self::UNORDERED_ACCESS) {
            usages |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.contains(Self::RENDER_TARGET) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(Self::COPY) {
            usages |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        }
        // Initial data upload always goes through the queue
        usages | wgpu::TextureUsages::COPY_DST
    }
}

/// Number of mip levels for a full chain over `width × height`.
///
/// `floor(log2(max(width, height))) + 1`
#[must_use]
pub fn full_mip_chain_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Whether `format` may back a write-only storage texture binding.
///
/// This is the set wgpu accepts on the default feature level. The one- and
/// two-channel non-32-bit formats and the rg32 group are gated behind
/// optional format features and are excluded; combining them with
/// `UNORDERED_ACCESS` fails [`TextureDesc::validate`].
#[must_use]
pub fn is_storage_compatible(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba8Unorm
            | wgpu::TextureFormat::Rgba8Snorm
            | wgpu::TextureFormat::Rgba8Uint
            | wgpu::TextureFormat::Rgba8Sint
            | wgpu::TextureFormat::Rgba16Float
            | wgpu::TextureFormat::Rgba16Uint
            | wgpu::TextureFormat::Rgba16Sint
            | wgpu::TextureFormat::Rgba32Float
            | wgpu::TextureFormat::Rgba32Uint
            | wgpu::TextureFormat::Rgba32Sint
            | wgpu::TextureFormat::R32Float
            | wgpu::TextureFormat::R32Uint
            | wgpu::TextureFormat::R32Sint
    )
}

/// Description of a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// 0 requests a full auto mip chain
    pub mip_level_count: u32,
    /// 1 for 2D, 6 for cubemaps
    pub array_layers: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    #[must_use]
    pub fn new_2d(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width,
            height,
            mip_level_count: 1,
            array_layers: 1,
            format,
            usage: TextureUsage::SHADER_RESOURCE,
        }
    }

    #[must_use]
    pub fn new_cube(label: &'static str, size: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width: size,
            height: size,
            mip_level_count: 1,
            array_layers: 6,
            format,
            usage: TextureUsage::SHADER_RESOURCE,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Requests a full auto mip chain (`floor(log2(max(w,h))) + 1` levels).
    #[must_use]
    pub fn with_auto_mips(mut self) -> Self {
        self.mip_level_count = 0;
        self
    }

    #[must_use]
    pub fn with_mip_count(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// The mip level count this description resolves to.
    #[must_use]
    pub fn resolved_mip_count(&self) -> u32 {
        if self.mip_level_count == 0 {
            full_mip_chain_count(self.width, self.height)
        } else {
            self.mip_level_count
        }
    }

    /// Validates format/usage compatibility and dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': zero extent {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.array_layers != 1 && self.array_layers != 6 {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': array_layers must be 1 or 6, got {}",
                self.label, self.array_layers
            )));
        }
        if self.array_layers == 6 && self.width != self.height {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': cubemap faces must be square, got {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.usage.contains(TextureUsage::UNORDERED_ACCESS)
            && !is_storage_compatible(self.format)
        {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': format {:?} is not storage-compatible but UNORDERED_ACCESS was requested",
                self.label, self.format
            )));
        }
        let max_mips = full_mip_chain_count(self.width, self.height);
        if self.mip_level_count > max_mips {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': {} mip levels exceed the maximum {} for {}x{}",
                self.label, self.mip_level_count, max_mips, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A GPU texture plus its owned views.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub desc: TextureDesc,
    /// Full-chain sampled view; `Cube` dimension when `array_layers == 6`.
    pub srv: wgpu::TextureView,
    /// One storage view per mip level; empty unless created with
    /// [`TextureUsage::UNORDERED_ACCESS`].
    mip_uavs: SmallVec<[wgpu::TextureView; 4]>,
}

impl GpuTexture {
    /// Creates the texture, uploads optional mip-0 data, and derives views.
    ///
    /// Validation failures are recoverable: the caller receives `Err` and the
    /// device context is untouched.
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self> {
        desc.validate()?;
        let mip_level_count = desc.resolved_mip_count();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_layers,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage.to_wgpu(),
            view_formats: &[],
        });

        if let Some(data) = initial_data {
            upload_mip0(queue, &texture, desc, data)?;
        }

        let srv_dimension = if desc.array_layers == 6 {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        let srv = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            dimension: Some(srv_dimension),
            ..Default::default()
        });

        // One UAV per mip: compute passes bind and write a single level at
        // a time. Layered textures view as D2Array so one dispatch covers
        // every face; single-layer textures must view as D2 to match a
        // `texture_storage_2d` binding.
        let uav_dimension = if desc.array_layers > 1 {
            wgpu::TextureViewDimension::D2Array
        } else {
            wgpu::TextureViewDimension::D2
        };
        let mut mip_uavs = SmallVec::new();
        if desc.usage.contains(TextureUsage::UNORDERED_ACCESS) {
            for mip in 0..mip_level_count {
                mip_uavs.push(texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    format: Some(desc.format),
                    dimension: Some(uav_dimension),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    base_array_layer: 0,
                    array_layer_count: Some(desc.array_layers),
                    usage: Some(wgpu::TextureUsages::STORAGE_BINDING),
                }));
            }
        }

        Ok(Self {
            texture,
            desc: TextureDesc {
                mip_level_count,
                ..desc.clone()
            },
            srv,
            mip_uavs,
        })
    }

    #[must_use]
    pub fn mip_level_count(&self) -> u32 {
        self.desc.mip_level_count
    }

    /// Storage view over one mip level: `D2` for single-layer textures,
    /// `D2Array` over every layer otherwise.
    ///
    /// Returns `None` for textures created without `UNORDERED_ACCESS` or for
    /// out-of-range levels.
    #[must_use]
    pub fn uav(&self, mip: u32) -> Option<&wgpu::TextureView> {
        self.mip_uavs.get(mip as usize)
    }

    #[must_use]
    pub fn uav_count(&self) -> usize {
        self.mip_uavs.len()
    }

    /// Render-target view for one (mip, layer) slice.
    #[must_use]
    pub fn rtv(&self, mip: u32, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(self.desc.label),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
        })
    }

    /// Sampled view of a single (mip, layer) slice, used by the mipmap
    /// generator as the downsample source.
    #[must_use]
    pub fn slice_srv(&self, mip: u32, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(self.desc.label),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            usage: Some(wgpu::TextureUsages::TEXTURE_BINDING),
        })
    }

    /// Dimension of mip level `mip` along one axis.
    #[must_use]
    pub fn mip_size(&self, mip: u32) -> u32 {
        (self.desc.width >> mip).max(1)
    }
}

fn upload_mip0(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    desc: &TextureDesc,
    data: &[u8],
) -> Result<()> {
    let Some(bytes_per_pixel) = desc.format.block_copy_size(Some(wgpu::TextureAspect::All)) else {
        return Err(CinderError::InvalidData(format!(
            "'{}': format {:?} has no defined copy size",
            desc.label, desc.format
        )));
    };
    let expected = (desc.width * desc.height * desc.array_layers * bytes_per_pixel) as usize;
    if data.len() != expected {
        return Err(CinderError::InvalidData(format!(
            "'{}': initial data is {} bytes, expected {}",
            desc.label,
            data.len(),
            expected
        )));
    }

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(desc.width * bytes_per_pixel),
            rows_per_image: Some(desc.height),
        },
        wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.array_layers,
        },
    );
    Ok(())
}
