//! Drawable Models
//!
//! Bridges CPU mesh/material resources to GPU draw submission. A model owns
//! its interleaved vertex buffer and width-selected index buffer, and walks
//! an explicit draw lifecycle so a half-initialized model can never reach
//! the GPU: buffers must be built before binding, and bound before drawing.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use uuid::Uuid;

use crate::errors::{CinderError, Result};
use crate::gfx::{BufferDesc, BufferKind, BufferMode, GpuBuffer, GpuContext};
use crate::resources::{IndexKind, Resource};

/// Interleaved vertex layout: position, normal, UV.
///
/// Missing mesh attributes are zero-filled so one pipeline layout serves
/// every mesh.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

pub const VERTEX_STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

#[must_use]
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
    ];
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Draw lifecycle. Transitions are strictly forward within a frame:
/// `Uninitialized → BuffersBuilt → Bound → Drawn`. A new frame resets
/// `Drawn` back to `BuffersBuilt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Uninitialized,
    BuffersBuilt,
    Bound,
    Drawn,
}

/// A mesh/material pair with GPU buffers and a world transform.
pub struct GpuModel {
    pub uuid: Uuid,
    mesh: Arc<Resource>,
    material: Arc<Resource>,
    transform: Mat4,

    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
    index_kind: IndexKind,
    index_count: u32,
    state: DrawState,
}

impl GpuModel {
    /// Pairs a mesh resource with a material resource. Both must carry the
    /// matching payload kind.
    pub fn new(mesh: Arc<Resource>, material: Arc<Resource>) -> Result<Self> {
        if mesh.as_mesh().is_none() {
            return Err(CinderError::InvalidData(format!(
                "model mesh resource '{}' is a {}, not a mesh",
                mesh.name,
                mesh.kind_name()
            )));
        }
        if material.as_material().is_none() {
            return Err(CinderError::InvalidData(format!(
                "model material resource '{}' is a {}, not a material",
                material.name,
                material.kind_name()
            )));
        }
        Ok(Self {
            uuid: Uuid::new_v4(),
            mesh,
            material,
            transform: Mat4::IDENTITY,
            vertex_buffer: None,
            index_buffer: None,
            index_kind: IndexKind::U16,
            index_count: 0,
            state: DrawState::Uninitialized,
        })
    }

    #[must_use]
    pub fn mesh(&self) -> &Arc<Resource> {
        &self.mesh
    }

    #[must_use]
    pub fn material(&self) -> &Arc<Resource> {
        &self.material
    }

    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    #[must_use]
    pub fn state(&self) -> DrawState {
        self.state
    }

    #[must_use]
    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Builds the interleaved vertex buffer and the index buffer.
    ///
    /// Index width follows the vertex count: 32-bit only past 65535
    /// vertices, 16-bit otherwise. Both buffers are immutable; mesh edits
    /// require a rebuild.
    pub fn build_buffers(&mut self, ctx: &GpuContext) -> Result<()> {
        let mesh = self
            .mesh
            .as_mesh()
            .ok_or_else(|| CinderError::InvalidData("model lost its mesh payload".to_string()))?;

        let vertices: Vec<Vertex> = mesh
            .positions()
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex {
                position: position.to_array(),
                normal: mesh.normal_or_zero(i).to_array(),
                uv: mesh.uv_or_zero(i).to_array(),
            })
            .collect();

        let vertex_buffer = ctx.create_buffer(
            &BufferDesc {
                label: "Model Vertices",
                stride: VERTEX_STRIDE,
                count: vertices.len() as u64,
                kind: BufferKind::Vertex,
                mode: BufferMode::Immutable,
            },
            Some(bytemuck::cast_slice(&vertices)),
        )?;

        let index_kind = mesh.index_kind();
        let index_buffer = match index_kind {
            IndexKind::U16 => {
                let narrowed: Vec<u16> = mesh.indices().iter().map(|&i| i as u16).collect();
                ctx.create_buffer(
                    &BufferDesc {
                        label: "Model Indices",
                        stride: index_kind.byte_size(),
                        count: narrowed.len() as u64,
                        kind: BufferKind::Index,
                        mode: BufferMode::Immutable,
                    },
                    Some(bytemuck::cast_slice(&narrowed)),
                )?
            }
            IndexKind::U32 => ctx.create_buffer(
                &BufferDesc {
                    label: "Model Indices",
                    stride: index_kind.byte_size(),
                    count: mesh.indices().len() as u64,
                    kind: BufferKind::Index,
                    mode: BufferMode::Immutable,
                },
                Some(bytemuck::cast_slice(mesh.indices())),
            )?,
        };

        self.index_kind = index_kind;
        self.index_count = mesh.index_count() as u32;
        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
        self.state = DrawState::BuffersBuilt;
        Ok(())
    }

    /// Binds vertex and index buffers into `rpass`. Rejects models whose
    /// buffers were never built.
    pub fn bind(&mut self, rpass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        let (Some(vb), Some(ib)) = (&self.vertex_buffer, &self.index_buffer) else {
            return Err(CinderError::DrawStateViolation(format!(
                "model '{}' bound before its buffers were built",
                self.mesh.name
            )));
        };
        rpass.set_vertex_buffer(0, vb.buffer.slice(..));
        rpass.set_index_buffer(ib.buffer.slice(..), self.index_kind.to_wgpu());
        self.state = DrawState::Bound;
        Ok(())
    }

    /// Issues the indexed draw. Requires [`bind`](GpuModel::bind) this frame.
    pub fn draw(&mut self, rpass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        if self.state != DrawState::Bound {
            return Err(CinderError::DrawStateViolation(format!(
                "model '{}' drawn in state {:?}",
                self.mesh.name, self.state
            )));
        }
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
        self.state = DrawState::Drawn;
        Ok(())
    }

    /// Binds and draws in one step.
    pub fn render(&mut self, rpass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        self.bind(rpass)?;
        self.draw(rpass)
    }

    /// Frame boundary: a drawn model becomes drawable again.
    pub fn begin_frame(&mut self) {
        if self.state == DrawState::Drawn || self.state == DrawState::Bound {
            self.state = DrawState::BuffersBuilt;
        }
    }
}
