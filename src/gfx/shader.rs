//! Shader Library
//!
//! WGSL sources are embedded at build time and addressed by symbolic
//! (stage, name). Render shaders carry both `vs_main` and `fs_main` entry
//! points in one source; compute shaders expose `main`.
//!
//! A missing name is fatal to the init step that requested it: pipelines
//! are built from compiled modules up front, so draw submission can never
//! observe an unbound shader.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::errors::{CinderError, Result};

/// Pipeline stage a shader is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Embedded WGSL sources by symbolic name.
pub struct ShaderLibrary {
    sources: FxHashMap<&'static str, &'static str>,
    render_names: &'static [&'static str],
    compute_names: &'static [&'static str],
}

const RENDER_SHADERS: &[&str] = &["blit", "skybox", "pbr"];
const COMPUTE_SHADERS: &[&str] = &["equirect_to_cube", "prefilter", "irradiance", "brdf_lut"];

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        let mut sources = FxHashMap::default();
        sources.insert("blit", include_str!("../render/shaders/blit.wgsl"));
        sources.insert("skybox", include_str!("../render/shaders/skybox.wgsl"));
        sources.insert("pbr", include_str!("../render/shaders/pbr.wgsl"));
        sources.insert(
            "equirect_to_cube",
            include_str!("../render/shaders/equirect_to_cube.wgsl"),
        );
        sources.insert("prefilter", include_str!("../render/shaders/prefilter.wgsl"));
        sources.insert("irradiance", include_str!("../render/shaders/irradiance.wgsl"));
        sources.insert("brdf_lut", include_str!("../render/shaders/brdf_lut.wgsl"));
        Self {
            sources,
            render_names: RENDER_SHADERS,
            compute_names: COMPUTE_SHADERS,
        }
    }

    /// Returns the WGSL source for (stage, name).
    pub fn source(&self, stage: ShaderStage, name: &str) -> Result<&'static str> {
        let known = match stage {
            ShaderStage::Vertex | ShaderStage::Fragment => self.render_names,
            ShaderStage::Compute => self.compute_names,
        };
        if !known.contains(&name) {
            return Err(CinderError::ShaderNotFound {
                stage,
                name: name.to_string(),
            });
        }
        self.sources
            .get(name)
            .copied()
            .ok_or_else(|| CinderError::ShaderNotFound {
                stage,
                name: name.to_string(),
            })
    }

    /// Compiles the named shader into a module.
    ///
    /// wgpu validates WGSL at module creation; the validation error is
    /// captured through a device error scope and surfaced as `Err` carrying
    /// the compiler diagnostic, rather than tripping the device-wide
    /// uncaptured-error handler.
    pub fn compile(
        &self,
        device: &wgpu::Device,
        stage: ShaderStage,
        name: &str,
    ) -> Result<wgpu::ShaderModule> {
        let source = self.source(stage, name)?;
        log::debug!("[gfx] compiling shader {stage:?} '{name}'");
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });
        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(CinderError::ShaderCompileFailed {
                name: name.to_string(),
                diagnostic: error.to_string(),
            });
        }
        Ok(module)
    }
}
