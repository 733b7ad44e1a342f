//! Rendering Layer
//!
//! Frame orchestration, draw submission, and the environment precompute
//! pipeline, layered on the `gfx` device abstraction.

pub mod environment;
pub mod frame;
pub mod ibl;
pub mod mipmap;
pub mod model;
pub mod passes;

pub use environment::{
    BRDF_LUT_FORMAT, Environment, EnvironmentSettings, EnvironmentSlot, IblPlan,
    PrefilterDispatch, WORKGROUP_SIZE, workgroups_for,
};
pub use frame::{Camera, FrameContext, Renderer};
pub use ibl::IblPipeline;
pub use mipmap::MipmapGenerator;
pub use model::{DrawState, GpuModel, VERTEX_STRIDE, Vertex, vertex_layout};
pub use passes::{OpaquePass, SkyboxPass};
