#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod gfx;
pub mod render;
pub mod resources;

pub use errors::{CinderError, Result};
pub use gfx::{ContextSettings, GpuContext, ShaderLibrary};
pub use render::{
    Camera, Environment, EnvironmentSettings, FrameContext, GpuModel, IblPipeline, IblPlan,
    Renderer,
};
pub use resources::{Image, Material, Mesh, Resource, ResourceCache, TextureSlot};
