//! Graphics Device Abstraction
//!
//! Owns the physical device, swapchain, and the typed resource-creation API
//! (textures, buffers, samplers, shaders) used by every other subsystem.

pub mod buffer;
pub mod context;
pub mod shader;
pub mod states;
pub mod texture;

pub use buffer::{BufferDesc, BufferKind, BufferMode, GpuBuffer};
pub use context::{ContextSettings, GpuContext};
pub use shader::{ShaderLibrary, ShaderStage};
pub use states::{SamplerDesc, StateCache};
pub use texture::{GpuTexture, TextureDesc, TextureUsage, full_mip_chain_count, is_storage_compatible};
