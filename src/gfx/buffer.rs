//! GPU Buffers
//!
//! Vertex, index, and uniform buffers created through the device context.
//! Immutable buffers upload their contents at creation and are never touched
//! again; dynamic buffers may be created empty and updated via the queue.

use wgpu::util::DeviceExt;

use crate::errors::{CinderError, Result};

/// What the buffer binds as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
    Storage,
}

impl BufferKind {
    fn to_wgpu(self) -> wgpu::BufferUsages {
        match self {
            Self::Vertex => wgpu::BufferUsages::VERTEX,
            Self::Index => wgpu::BufferUsages::INDEX,
            Self::Uniform => wgpu::BufferUsages::UNIFORM,
            Self::Storage => wgpu::BufferUsages::STORAGE,
        }
    }
}

/// Mutability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Contents fixed at creation; requires initial data.
    Immutable,
    /// May be updated through the queue after creation.
    Dynamic,
}

/// Description of a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub label: &'static str,
    /// Size of one element in bytes
    pub stride: u64,
    /// Number of elements
    pub count: u64,
    pub kind: BufferKind,
    pub mode: BufferMode,
}

impl BufferDesc {
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.stride * self.count
    }
}

/// An owned GPU buffer plus its creation description.
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub desc: BufferDesc,
}

impl GpuBuffer {
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self> {
        let size = desc.byte_size();
        if size == 0 {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': zero-sized buffer",
                desc.label
            )));
        }
        if desc.mode == BufferMode::Immutable && initial_data.is_none() {
            return Err(CinderError::InvalidDescriptor(format!(
                "'{}': immutable buffers require initial data",
                desc.label
            )));
        }
        if let Some(data) = initial_data {
            if data.len() as u64 != size {
                return Err(CinderError::InvalidData(format!(
                    "'{}': initial data is {} bytes, descriptor says {}",
                    desc.label,
                    data.len(),
                    size
                )));
            }
        }

        let usage = match desc.mode {
            BufferMode::Immutable => desc.kind.to_wgpu(),
            BufferMode::Dynamic => desc.kind.to_wgpu() | wgpu::BufferUsages::COPY_DST,
        };

        let buffer = match (desc.mode, initial_data) {
            // create_buffer_init pads the allocation up to
            // COPY_BUFFER_ALIGNMENT; a raw mapped_at_creation buffer of
            // e.g. 6 bytes (three u16 indices) is rejected by wgpu.
            (BufferMode::Immutable, Some(data)) => {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents: data,
                    usage,
                })
            }
            (BufferMode::Immutable, None) => unreachable!("validated above"),
            (BufferMode::Dynamic, data) => {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(desc.label),
                    size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                    usage,
                    mapped_at_creation: false,
                });
                if let Some(data) = data {
                    write_padded(queue, &buffer, data);
                }
                buffer
            }
        };

        Ok(Self {
            buffer,
            desc: desc.clone(),
        })
    }

    /// Updates a dynamic buffer's contents. No-op with a log on immutable
    /// buffers; CPU-side mutation of immutable data requires full recreation.
    pub fn update(&self, queue: &wgpu::Queue, data: &[u8]) {
        if self.desc.mode == BufferMode::Immutable {
            log::warn!("[gfx] ignoring update of immutable buffer '{}'", self.desc.label);
            return;
        }
        write_padded(queue, &self.buffer, data);
    }

    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.desc.byte_size()
    }
}

/// Queue writes require a length multiple of `COPY_BUFFER_ALIGNMENT`;
/// unaligned tails are zero-padded into a scratch copy.
fn write_padded(queue: &wgpu::Queue, buffer: &wgpu::Buffer, data: &[u8]) {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if data.len() % align == 0 {
        queue.write_buffer(buffer, 0, data);
    } else {
        let mut padded = data.to_vec();
        padded.resize(data.len().next_multiple_of(align), 0);
        queue.write_buffer(buffer, 0, &padded);
    }
}
