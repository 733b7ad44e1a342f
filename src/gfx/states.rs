//! Immutable Pipeline State Objects
//!
//! Samplers are keyed by a small fixed configuration, created once, and
//! shared read-only across every draw and compute pass. They are never
//! mutated after creation, so no locking is needed on the read path.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Sampler configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,
    pub address_mode: wgpu::AddressMode,
    pub compare: Option<wgpu::CompareFunction>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode: wgpu::AddressMode::Repeat,
            compare: None,
        }
    }
}

impl SamplerDesc {
    /// Linear filtering with clamped addressing, the cubemap default.
    #[must_use]
    pub fn linear_clamp() -> Self {
        Self {
            address_mode: wgpu::AddressMode::ClampToEdge,
            ..Self::default()
        }
    }
}

/// Cache of immutable sampler state objects.
pub struct StateCache {
    samplers: Mutex<FxHashMap<SamplerDesc, Arc<wgpu::Sampler>>>,
}

impl StateCache {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let cache = Self {
            samplers: Mutex::new(FxHashMap::default()),
        };
        // Pre-warm the two samplers every frame uses.
        cache.sampler(device, &SamplerDesc::default());
        cache.sampler(device, &SamplerDesc::linear_clamp());
        cache
    }

    /// Returns the sampler for `desc`, creating it on first use.
    pub fn sampler(&self, device: &wgpu::Device, desc: &SamplerDesc) -> Arc<wgpu::Sampler> {
        let mut samplers = self.samplers.lock();
        if let Some(sampler) = samplers.get(desc) {
            return sampler.clone();
        }
        let sampler = Arc::new(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cached Sampler"),
            address_mode_u: desc.address_mode,
            address_mode_v: desc.address_mode,
            address_mode_w: desc.address_mode,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            mipmap_filter: desc.mipmap_filter,
            compare: desc.compare,
            ..Default::default()
        }));
        samplers.insert(*desc, sampler.clone());
        sampler
    }
}
