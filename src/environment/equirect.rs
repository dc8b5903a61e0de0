use super::capture::CaptureRig;
use super::{create_cube_texture, EnvironmentSource};
use crate::renderer::{full_mip_count, linear_sampler, sampler_entry, texture_entry, RenderContext, HDR_FORMAT};
use anyhow::Result;

const EQUIRECT_WGSL: &str = include_str!("../../assets/shaders/equirect_to_cubemap.wgsl");

/// Projects the panorama onto a `size` cubemap and fills its mip chain for the prefilter stage.
pub(super) fn bake_environment_cubemap(
    ctx: &RenderContext,
    rig: &mut CaptureRig,
    source: &EnvironmentSource,
    size: u32,
) -> Result<wgpu::Texture> {
    let texture = create_cube_texture(ctx, "Environment Cubemap", size, full_mip_count(size, size), HDR_FORMAT);
    let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Equirect Source BGL"),
        entries: &[texture_entry(0, wgpu::TextureViewDimension::D2), sampler_entry(1)],
    });
    let sampler = linear_sampler(&ctx.device, "Equirect Sampler", wgpu::AddressMode::ClampToEdge);
    let sources = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Equirect Source BG"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(source.view()) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
        ],
    });
    let pipeline = rig.cube_pipeline(ctx, "Equirect To Cubemap", EQUIRECT_WGSL, &layout, HDR_FORMAT);
    rig.render_cube_faces(ctx, &texture, 0, &pipeline, &sources)?;
    ctx.generate_mipmaps(&texture);
    Ok(texture)
}
