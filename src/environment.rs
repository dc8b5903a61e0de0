//! One-shot image-based-lighting bake: panorama to cubemap, then irradiance, specular prefilter and the
//! BRDF integration table. Every stage renders through the shared capture target and submits per face.

mod brdf_lut;
mod capture;
mod equirect;
mod irradiance;
mod prefilter;
pub mod reference;
mod source;

pub use brdf_lut::BRDF_LUT_FORMAT;
pub use capture::{capture_projection, capture_view, roughness_for_mip, CaptureMatrices, CAPTURE_VIEWS};
pub use source::EnvironmentSource;

use crate::config::EnvironmentConfig;
use crate::renderer::{cube_view, RenderContext};
use anyhow::{Context, Result};
use capture::CaptureRig;
use std::time::Instant;

/// A baked texture and the view the shading passes sample it through.
pub struct BakedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl BakedTexture {
    fn cube(texture: wgpu::Texture, label: &str) -> Self {
        let view = cube_view(&texture, label);
        Self { texture, view }
    }

    fn flat(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Immutable results of [`bake`], alive for the rest of the run.
pub struct EnvironmentMaps {
    pub environment: BakedTexture,
    pub irradiance: BakedTexture,
    pub prefilter: BakedTexture,
    pub brdf_lut: BakedTexture,
    source_was_fallback: bool,
}

impl EnvironmentMaps {
    pub fn prefilter_mip_levels(&self) -> u32 {
        self.prefilter.texture.mip_level_count()
    }

    /// True when the HDR failed to decode and the maps were baked from black.
    pub fn is_degraded(&self) -> bool {
        self.source_was_fallback
    }
}

/// Loads the configured HDR (falling back to black) and runs all four stages.
pub fn bake(ctx: &RenderContext, config: &EnvironmentConfig) -> Result<EnvironmentMaps> {
    config.validate()?;
    let source = EnvironmentSource::load(ctx, &config.hdr_path);
    bake_from_source(ctx, &source, config)
}

pub fn bake_from_source(
    ctx: &RenderContext,
    source: &EnvironmentSource,
    config: &EnvironmentConfig,
) -> Result<EnvironmentMaps> {
    config.validate()?;
    let started = Instant::now();
    let mut rig = CaptureRig::new(ctx);

    let stage = Instant::now();
    let environment = equirect::bake_environment_cubemap(ctx, &mut rig, source, config.cubemap_size)
        .context("equirect to cubemap stage failed")?;
    let environment = BakedTexture::cube(environment, "Environment Cube View");
    log::info!(target: "environment", "Environment cubemap {0}x{0} in {1:?}", config.cubemap_size, stage.elapsed());

    let stage = Instant::now();
    let irradiance = irradiance::bake_irradiance(ctx, &mut rig, &environment.view, config.irradiance_size)
        .context("irradiance stage failed")?;
    let irradiance = BakedTexture::cube(irradiance, "Irradiance Cube View");
    log::info!(target: "environment", "Irradiance {0}x{0} in {1:?}", config.irradiance_size, stage.elapsed());

    let stage = Instant::now();
    let prefilter = prefilter::bake_prefilter(
        ctx,
        &mut rig,
        &environment.view,
        config.prefilter_size,
        config.prefilter_mip_levels,
    )
    .context("prefilter stage failed")?;
    let prefilter = BakedTexture::cube(prefilter, "Prefilter Cube View");
    log::info!(
        target: "environment",
        "Prefilter {0}x{0} with {1} mips in {2:?}",
        config.prefilter_size,
        config.prefilter_mip_levels,
        stage.elapsed()
    );

    let stage = Instant::now();
    let brdf_lut = brdf_lut::bake_brdf_lut(ctx, rig.target_mut(), config.brdf_lut_size)
        .context("BRDF LUT stage failed")?;
    let brdf_lut = BakedTexture::flat(brdf_lut);
    log::info!(target: "environment", "BRDF LUT {0}x{0} in {1:?}", config.brdf_lut_size, stage.elapsed());

    log::info!(target: "environment", "Environment bake finished in {:?}", started.elapsed());
    Ok(EnvironmentMaps { environment, irradiance, prefilter, brdf_lut, source_was_fallback: source.is_fallback() })
}

/// Six-layer cubemap usable as a capture target, a sampled cube and a copy source.
fn create_cube_texture(
    ctx: &RenderContext,
    label: &str,
    size: u32,
    mip_levels: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 6 },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
