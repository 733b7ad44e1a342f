//! Resource Types and Cache
//!
//! CPU-side payloads (images, meshes, materials) plus the name-keyed
//! [`ResourceCache`] that deduplicates shared resources.
//!
//! Resources are a closed set of tagged kinds dispatched by pattern
//! matching — the cache handles every kind uniformly while consumers
//! match on the payload they need.

pub mod cache;
pub mod image;
pub mod material;
pub mod mesh;

pub use cache::ResourceCache;
pub use image::Image;
pub use material::{Material, MaterialDirty, TextureSlot};
pub use mesh::{IndexKind, MAX_U16_VERTEX_COUNT, Mesh};

use parking_lot::Mutex;
use uuid::Uuid;

/// The closed set of resource payload kinds.
///
/// Materials are mutable through the shared handle (slot edits accumulate
/// dirty bits the renderer consumes), so they sit behind a lock; images and
/// meshes are immutable once validated.
#[derive(Debug)]
pub enum ResourceKind {
    Image(Image),
    Mesh(Mesh),
    Material(Mutex<Material>),
    /// Opaque decoded payload consumed by the external audio engine
    AudioClip(Vec<u8>),
    /// Opaque serialized payload consumed by the external serializer
    Prefab(Vec<u8>),
}

/// A named, shareable resource.
///
/// Identity for cache deduplication is the logical `name` (file path or
/// logical label); `uuid` distinguishes in-memory instances.
#[derive(Debug)]
pub struct Resource {
    pub name: String,
    pub uuid: Uuid,
    pub kind: ResourceKind,
}

impl Resource {
    #[must_use]
    pub fn new(name: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
            kind,
        }
    }

    #[must_use]
    pub fn image(name: &str, image: Image) -> Self {
        Self::new(name, ResourceKind::Image(image))
    }

    #[must_use]
    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self::new(name, ResourceKind::Mesh(mesh))
    }

    #[must_use]
    pub fn material(name: &str, material: Material) -> Self {
        Self::new(name, ResourceKind::Material(Mutex::new(material)))
    }

    /// Tag of the payload kind, used in cache diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ResourceKind::Image(_) => "image",
            ResourceKind::Mesh(_) => "mesh",
            ResourceKind::Material(_) => "material",
            ResourceKind::AudioClip(_) => "audio-clip",
            ResourceKind::Prefab(_) => "prefab",
        }
    }

    #[must_use]
    pub fn as_image(&self) -> Option<&Image> {
        match &self.kind {
            ResourceKind::Image(image) => Some(image),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ResourceKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_material(&self) -> Option<&Mutex<Material>> {
        match &self.kind {
            ResourceKind::Material(material) => Some(material),
            _ => None,
        }
    }
}
