use super::capture::CaptureRig;
use super::create_cube_texture;
use crate::renderer::{linear_sampler, sampler_entry, texture_entry, RenderContext, HDR_FORMAT};
use anyhow::Result;

const IRRADIANCE_WGSL: &str = include_str!("../../assets/shaders/irradiance.wgsl");

/// Diffuse convolution of the environment cubemap into a small single-mip cubemap.
pub(super) fn bake_irradiance(
    ctx: &RenderContext,
    rig: &mut CaptureRig,
    environment: &wgpu::TextureView,
    size: u32,
) -> Result<wgpu::Texture> {
    let texture = create_cube_texture(ctx, "Irradiance Cubemap", size, 1, HDR_FORMAT);
    let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Irradiance Source BGL"),
        entries: &[texture_entry(0, wgpu::TextureViewDimension::Cube), sampler_entry(1)],
    });
    let sampler = linear_sampler(&ctx.device, "Irradiance Sampler", wgpu::AddressMode::ClampToEdge);
    let sources = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Irradiance Source BG"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(environment) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
        ],
    });
    let pipeline = rig.cube_pipeline(ctx, "Irradiance Convolution", IRRADIANCE_WGSL, &layout, HDR_FORMAT);
    rig.render_cube_faces(ctx, &texture, 0, &pipeline, &sources)?;
    Ok(texture)
}
