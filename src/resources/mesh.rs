//! CPU Mesh Payloads
//!
//! Ordered vertex attribute arrays plus an index sequence, consumed by the
//! GPU buffer builder in `render::model`. Attribute arrays are index-aligned:
//! normals and UVs are either empty or exactly as long as positions.

use glam::{Vec2, Vec3};
use uuid::Uuid;

use crate::errors::{CinderError, Result};

/// Largest vertex count addressable with 16-bit indices.
pub const MAX_U16_VERTEX_COUNT: usize = 65535;

/// Index buffer element width, selected by vertex count to minimize GPU
/// memory footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    U16,
    U32,
}

impl IndexKind {
    /// 32-bit iff the mesh has more than 65535 vertices.
    #[must_use]
    pub fn for_vertex_count(count: usize) -> Self {
        if count > MAX_U16_VERTEX_COUNT {
            Self::U32
        } else {
            Self::U16
        }
    }

    #[must_use]
    pub fn byte_size(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    #[must_use]
    pub fn to_wgpu(self) -> wgpu::IndexFormat {
        match self {
            Self::U16 => wgpu::IndexFormat::Uint16,
            Self::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Validated CPU mesh data.
#[derive(Debug)]
pub struct Mesh {
    pub uuid: Uuid,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Builds a mesh, enforcing the attribute-alignment invariants:
    /// non-empty normals/UVs must match the position count, and every index
    /// must reference a valid vertex.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        indices: Vec<u32>,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(CinderError::InvalidData("mesh has no vertices".to_string()));
        }
        if indices.is_empty() {
            return Err(CinderError::InvalidData("mesh has no indices".to_string()));
        }
        if !normals.is_empty() && normals.len() != positions.len() {
            return Err(CinderError::InvalidData(format!(
                "mesh has {} normals for {} positions",
                normals.len(),
                positions.len()
            )));
        }
        if !uvs.is_empty() && uvs.len() != positions.len() {
            return Err(CinderError::InvalidData(format!(
                "mesh has {} uvs for {} positions",
                uvs.len(),
                positions.len()
            )));
        }
        let vertex_count = positions.len() as u32;
        if let Some(&bad) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(CinderError::InvalidData(format!(
                "mesh index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(Self {
            uuid: Uuid::new_v4(),
            positions,
            normals,
            uvs,
            indices,
        })
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn index_kind(&self) -> IndexKind {
        IndexKind::for_vertex_count(self.positions.len())
    }

    // Plain accessors for the external serializer and the buffer builder.

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    #[must_use]
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Normal for vertex `i`, zero-filled when the mesh carries none.
    #[must_use]
    pub fn normal_or_zero(&self, i: usize) -> Vec3 {
        self.normals.get(i).copied().unwrap_or(Vec3::ZERO)
    }

    /// UV for vertex `i`, zero-filled when the mesh carries none.
    #[must_use]
    pub fn uv_or_zero(&self, i: usize) -> Vec2 {
        self.uvs.get(i).copied().unwrap_or(Vec2::ZERO)
    }
}
