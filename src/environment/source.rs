use crate::renderer::{RenderContext, HDR_FORMAT};
use anyhow::{Context, Result};
use half::f16;
use image::ImageReader;
use std::path::Path;

/// The equirectangular panorama every bake starts from, resident as `Rgba16Float`.
pub struct EnvironmentSource {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    fallback: bool,
}

impl EnvironmentSource {
    /// Decodes `path`; on failure logs and returns a 1x1 black panorama so later stages still run.
    pub fn load(ctx: &RenderContext, path: &Path) -> Self {
        match decode_rgb32f(path) {
            Ok((width, height, rgb)) => {
                log::info!(target: "environment", "Loaded HDR source {} ({width}x{height})", path.display());
                Self::from_rgb32f(ctx, width, height, &rgb)
            }
            Err(err) => {
                log::warn!(target: "environment", "Failed to load HDR image: {err:#}; baking from black");
                Self::black(ctx)
            }
        }
    }

    pub fn black(ctx: &RenderContext) -> Self {
        let mut source = Self::from_rgb32f(ctx, 1, 1, &[0.0; 3]);
        source.fallback = true;
        source
    }

    /// Uploads tightly packed RGB floats, rows top-down.
    pub fn from_rgb32f(ctx: &RenderContext, width: u32, height: u32, rgb: &[f32]) -> Self {
        let texels: Vec<f16> = rgb
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 1.0])
            .map(f16::from_f32)
            .collect();
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Environment Source"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(width * 8), rows_per_image: Some(height) },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { _texture: texture, view, fallback: false }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// True when decoding failed and the black placeholder is in use.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

fn decode_rgb32f(path: &Path) -> Result<(u32, u32, Vec<f32>)> {
    let image = ImageReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("probing {}", path.display()))?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgb32f();
    let (width, height) = image.dimensions();
    Ok((width, height, image.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reports_missing_file() {
        let err = decode_rgb32f(Path::new("does/not/exist.hdr")).unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.hdr"));
    }

    #[test]
    fn decode_reads_png_as_linear_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 255])).save(&path).unwrap();
        let (width, height, rgb) = decode_rgb32f(&path).unwrap();
        assert_eq!((width, height), (4, 2));
        assert_eq!(rgb.len(), 24);
        assert_eq!(&rgb[..3], &[1.0, 0.0, 1.0]);
    }
}
