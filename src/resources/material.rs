//! Materials
//!
//! A material maps texture slots to shared image resources (deduplicated by
//! the [`ResourceCache`](crate::resources::ResourceCache), so identical
//! textures loaded by multiple materials share one GPU allocation) plus a
//! scalar multiplier per slot. Changes accumulate in a dirty bitmask that
//! the renderer consumes when rebuilding bind groups.

use std::sync::Arc;

use bitflags::bitflags;
use uuid::Uuid;

use crate::errors::{CinderError, Result};
use crate::resources::Resource;

/// Texture binding slots, in shader binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum TextureSlot {
    Albedo = 0,
    Normal = 1,
    Metallic = 2,
    Roughness = 3,
    Occlusion = 4,
    Emissive = 5,
}

impl TextureSlot {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Albedo,
        Self::Normal,
        Self::Metallic,
        Self::Roughness,
        Self::Occlusion,
        Self::Emissive,
    ];

    fn dirty_bit(self) -> MaterialDirty {
        MaterialDirty::from_bits_truncate(1 << (self as usize))
    }
}

bitflags! {
    /// Accumulated change mask, one bit per slot plus one for scalars.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaterialDirty: u32 {
        const ALBEDO = 1 << 0;
        const NORMAL = 1 << 1;
        const METALLIC = 1 << 2;
        const ROUGHNESS = 1 << 3;
        const OCCLUSION = 1 << 4;
        const EMISSIVE = 1 << 5;
        const SCALARS = 1 << 6;
    }
}

#[derive(Debug, Clone, Default)]
struct SlotBinding {
    /// Shared image resource resolved through the cache
    texture: Option<Arc<Resource>>,
    /// Source path string, read and written by the external serializer
    path: Option<String>,
    scalar: f32,
}

/// A surface material: per-slot shared textures and scalar multipliers.
#[derive(Debug)]
pub struct Material {
    pub uuid: Uuid,
    pub name: String,
    slots: [SlotBinding; TextureSlot::COUNT],
    dirty: MaterialDirty,
}

impl Material {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut slots: [SlotBinding; TextureSlot::COUNT] = Default::default();
        for slot in &mut slots {
            slot.scalar = 1.0;
        }
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            slots,
            // New materials need a full bind group build.
            dirty: MaterialDirty::all(),
        }
    }

    /// Assigns a shared texture resource to a slot.
    ///
    /// The resource must be an image; other kinds are rejected.
    pub fn set_texture(&mut self, slot: TextureSlot, resource: Arc<Resource>) -> Result<()> {
        if resource.as_image().is_none() {
            return Err(CinderError::InvalidData(format!(
                "material '{}': resource '{}' bound to {slot:?} is not an image",
                self.name, resource.name
            )));
        }
        self.slots[slot as usize].texture = Some(resource);
        self.dirty |= slot.dirty_bit();
        Ok(())
    }

    pub fn clear_texture(&mut self, slot: TextureSlot) {
        if self.slots[slot as usize].texture.take().is_some() {
            self.dirty |= slot.dirty_bit();
        }
    }

    #[must_use]
    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<Resource>> {
        self.slots[slot as usize].texture.as_ref()
    }

    pub fn set_scalar(&mut self, slot: TextureSlot, value: f32) {
        self.slots[slot as usize].scalar = value;
        self.dirty |= MaterialDirty::SCALARS;
    }

    #[must_use]
    pub fn scalar(&self, slot: TextureSlot) -> f32 {
        self.slots[slot as usize].scalar
    }

    // Serializer accessors: the external serializer reads and writes path
    // strings and scalars; it never touches GPU state.

    pub fn set_texture_path(&mut self, slot: TextureSlot, path: Option<String>) {
        self.slots[slot as usize].path = path;
    }

    #[must_use]
    pub fn texture_path(&self, slot: TextureSlot) -> Option<&str> {
        self.slots[slot as usize].path.as_deref()
    }

    // Dirty tracking.

    #[must_use]
    pub fn dirty(&self) -> MaterialDirty {
        self.dirty
    }

    /// Returns and clears the accumulated dirty mask.
    pub fn take_dirty(&mut self) -> MaterialDirty {
        std::mem::replace(&mut self.dirty, MaterialDirty::empty())
    }
}
