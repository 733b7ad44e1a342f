//! Render Passes
//!
//! Each pass owns its pipelines (cached per target format), bind group
//! layouts, and uniform buffers, and records into a render pass the frame
//! orchestrator opens. Pass order within a frame: skybox first, then
//! opaque geometry.

pub mod opaque;
pub mod skybox;

pub use opaque::OpaquePass;
pub use skybox::SkyboxPass;
