//! CPU Image Payloads
//!
//! An [`Image`] is an already-decoded pixel buffer handed in by an external
//! importer. The core never parses image file formats; it validates the
//! payload against its metadata and uploads it through the device context.

use uuid::Uuid;

use crate::errors::{CinderError, Result};

/// Decoded pixel data plus metadata.
#[derive(Debug)]
pub struct Image {
    pub uuid: Uuid,
    pub width: u32,
    pub height: u32,
    /// 1 for 2D images, 6 for pre-assembled cubemap faces
    pub layers: u32,
    pub format: wgpu::TextureFormat,
    pub data: Vec<u8>,
}

impl Image {
    /// Builds an image, validating that the payload size matches the
    /// dimensions and format.
    pub fn new(
        width: u32,
        height: u32,
        layers: u32,
        format: wgpu::TextureFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        let Some(bytes_per_pixel) = format.block_copy_size(Some(wgpu::TextureAspect::All)) else {
            return Err(CinderError::InvalidData(format!(
                "image format {format:?} has no defined copy size"
            )));
        };
        let expected = (width * height * layers * bytes_per_pixel) as usize;
        if data.len() != expected {
            return Err(CinderError::InvalidData(format!(
                "image payload is {} bytes, expected {} for {}x{}x{} {:?}",
                data.len(),
                expected,
                width,
                height,
                layers,
                format
            )));
        }
        Ok(Self {
            uuid: Uuid::new_v4(),
            width,
            height,
            layers,
            format,
            data,
        })
    }

    /// 1×1 solid-color fallback, used when a material slot has no texture
    /// or a background load failed.
    #[must_use]
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            width: 1,
            height: 1,
            layers: 1,
            format: wgpu::TextureFormat::Rgba8Unorm,
            data: color.to_vec(),
        }
    }
}
