use super::capture::{roughness_for_mip, CaptureRig};
use super::create_cube_texture;
use crate::renderer::{linear_sampler, sampler_entry, texture_entry, uniform_entry, RenderContext, HDR_FORMAT};
use anyhow::Result;
use bytemuck::{Pod, Zeroable};

const PREFILTER_WGSL: &str = include_str!("../../assets/shaders/prefilter.wgsl");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PrefilterParams {
    roughness: f32,
    _pad: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<PrefilterParams>() == 16);

/// GGX prefilter: mip `m` of `mip_levels` holds the environment convolved at roughness `m / (mip_levels - 1)`.
pub(super) fn bake_prefilter(
    ctx: &RenderContext,
    rig: &mut CaptureRig,
    environment: &wgpu::TextureView,
    size: u32,
    mip_levels: u32,
) -> Result<wgpu::Texture> {
    let texture = create_cube_texture(ctx, "Prefilter Cubemap", size, mip_levels, HDR_FORMAT);
    let params = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Prefilter Params"),
        size: std::mem::size_of::<PrefilterParams>() as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Prefilter Source BGL"),
        entries: &[
            texture_entry(0, wgpu::TextureViewDimension::Cube),
            sampler_entry(1),
            uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
        ],
    });
    let sampler = linear_sampler(&ctx.device, "Prefilter Sampler", wgpu::AddressMode::ClampToEdge);
    let sources = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Prefilter Source BG"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(environment) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
            wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
        ],
    });
    let pipeline = rig.cube_pipeline(ctx, "Specular Prefilter", PREFILTER_WGSL, &layout, HDR_FORMAT);
    for mip in 0..mip_levels {
        let roughness = roughness_for_mip(mip, mip_levels);
        log::debug!(target: "environment", "Prefilter mip {mip} ({}px) at roughness {roughness}", size >> mip);
        ctx.queue.write_buffer(&params, 0, bytemuck::bytes_of(&PrefilterParams { roughness, _pad: [0.0; 3] }));
        rig.render_cube_faces(ctx, &texture, mip, &pipeline, &sources)?;
    }
    Ok(texture)
}
