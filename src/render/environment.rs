//! Environment Resources
//!
//! Derived GPU state for image-based lighting: the unfiltered cube
//! conversion target, the roughness-indexed specular mip chain, the diffuse
//! irradiance cubemap, and the split-sum BRDF LUT.
//!
//! An environment is never partially valid. [`IblPipeline`] either runs the
//! full stage sequence and commits a complete [`Environment`], or fails and
//! leaves the previously committed environment (if any) in place.
//!
//! [`IblPipeline`]: crate::render::IblPipeline

use std::sync::Arc;

use uuid::Uuid;

use crate::gfx::{GpuTexture, full_mip_chain_count};
use crate::resources::Resource;

/// Per-axis texel granularity of one compute workgroup.
pub const WORKGROUP_SIZE: u32 = 8;

/// Workgroups needed to cover `size` texels along one axis.
#[must_use]
pub fn workgroups_for(size: u32) -> u32 {
    size.div_ceil(WORKGROUP_SIZE).max(1)
}

/// Tunable IBL target resolutions.
///
/// The classic fixed sizes (1024 cube, 32 irradiance, 256 LUT) are the
/// defaults, not hardcoded behavior.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentSettings {
    /// Face size of the unfiltered and specular cubemaps
    pub cubemap_size: u32,
    /// Face size of the irradiance cubemap
    pub irradiance_size: u32,
    /// Edge size of the square BRDF LUT
    pub brdf_lut_size: u32,
    /// Pixel format of the cubemaps
    pub color_format: wgpu::TextureFormat,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            cubemap_size: 1024,
            irradiance_size: 32,
            brdf_lut_size: 256,
            color_format: wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// Storage format of the BRDF LUT; the (scale, bias) pair lives in the
/// rg channels.
///
/// Write-only storage access to the two-channel float formats is an
/// optional wgpu format feature, so the LUT uses `Rgba16Float`, which every
/// backend accepts as a storage target.
pub const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

// ============================================================================
// Pipeline plan
// ============================================================================

/// One specular prefilter dispatch: writes mip `mip` of the specular cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterDispatch {
    pub mip: u32,
    /// Face size of this mip level
    pub size: u32,
    /// `mip / (mip_count - 1)`, linear in mip index
    pub roughness: f32,
    /// Workgroups per axis; the third axis covers the 6 faces
    pub workgroups: [u32; 3],
}

/// The full dispatch plan for one pipeline run, derived purely from
/// [`EnvironmentSettings`].
///
/// Building the plan is deterministic and GPU-free; execution consumes it
/// stage by stage in order. Mip 0 of the specular cube is copied from the
/// unfiltered cube rather than dispatched (roughness 0 is the unfiltered
/// reflection), so `prefilter` starts at mip 1.
#[derive(Debug, Clone, PartialEq)]
pub struct IblPlan {
    pub cubemap_size: u32,
    /// Full chain: `floor(log2(cubemap_size)) + 1`
    pub specular_mip_count: u32,
    pub irradiance_size: u32,
    pub brdf_lut_size: u32,

    pub equirect_workgroups: [u32; 3],
    pub prefilter: Vec<PrefilterDispatch>,
    pub irradiance_workgroups: [u32; 3],
    pub brdf_workgroups: [u32; 3],
}

impl IblPlan {
    #[must_use]
    pub fn new(settings: &EnvironmentSettings) -> Self {
        let cubemap_size = settings.cubemap_size;
        let specular_mip_count = full_mip_chain_count(cubemap_size, cubemap_size);

        let mut prefilter = Vec::with_capacity(specular_mip_count as usize - 1);
        for mip in 1..specular_mip_count {
            let size = (cubemap_size >> mip).max(1);
            let wg = workgroups_for(size);
            prefilter.push(PrefilterDispatch {
                mip,
                size,
                roughness: mip as f32 / (specular_mip_count - 1) as f32,
                workgroups: [wg, wg, 6],
            });
        }

        let cube_wg = workgroups_for(cubemap_size);
        let irr_wg = workgroups_for(settings.irradiance_size);
        let lut_wg = workgroups_for(settings.brdf_lut_size);

        Self {
            cubemap_size,
            specular_mip_count,
            irradiance_size: settings.irradiance_size,
            brdf_lut_size: settings.brdf_lut_size,
            equirect_workgroups: [cube_wg, cube_wg, 6],
            prefilter,
            irradiance_workgroups: [irr_wg, irr_wg, 6],
            brdf_workgroups: [lut_wg, lut_wg, 1],
        }
    }
}

// ============================================================================
// Committed environment
// ============================================================================

/// A complete set of IBL textures for one source image.
#[derive(Debug)]
pub struct Environment {
    /// UUID of the source equirectangular image this was built from
    pub source_uuid: Uuid,
    /// Equirect→cube conversion target with its full mip chain
    pub unfiltered_cube: GpuTexture,
    /// Roughness-indexed prefiltered mip chain
    pub specular: GpuTexture,
    /// Cosine-weighted irradiance cubemap, single mip
    pub irradiance: GpuTexture,
    /// Split-sum (scale, bias) integration table
    pub brdf_lut: GpuTexture,
    /// `specular_mip_count - 1`, the roughness LOD ceiling at shade time
    pub max_specular_mip: f32,
}

/// Tracks the active environment source and its committed build.
///
/// The holder marks the slot stale when the source changes; the renderer
/// rebuilds at the next frame. A failed rebuild keeps the previous
/// committed environment rather than presenting corrupt textures.
#[derive(Default)]
pub struct EnvironmentSlot {
    source: Option<Arc<Resource>>,
    committed: Option<Environment>,
}

impl EnvironmentSlot {
    /// Sets (or replaces) the source HDR image resource.
    pub fn set_source(&mut self, source: Arc<Resource>) {
        self.source = Some(source);
    }

    #[must_use]
    pub fn source(&self) -> Option<&Arc<Resource>> {
        self.source.as_ref()
    }

    /// Stale when a source is set whose build has not been committed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        match (&self.source, &self.committed) {
            (Some(source), Some(env)) => {
                source.as_image().is_none_or(|img| img.uuid != env.source_uuid)
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Commits a completed build.
    pub fn commit(&mut self, environment: Environment) {
        self.committed = Some(environment);
    }

    #[must_use]
    pub fn committed(&self) -> Option<&Environment> {
        self.committed.as_ref()
    }
}
