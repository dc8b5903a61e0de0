use crate::mesh::QuadVertex;
use crate::renderer::{create_pipeline, create_shader, CaptureColor, CaptureTarget, PipelineSpec, RenderContext};
use anyhow::Result;

const BRDF_WGSL: &str = include_str!("../../assets/shaders/brdf.wgsl");

pub const BRDF_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

/// Split-sum integration table: x is NdotV, y is roughness, red is scale and green is bias.
pub(super) fn bake_brdf_lut(ctx: &RenderContext, target: &mut CaptureTarget, size: u32) -> Result<wgpu::Texture> {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("BRDF LUT"),
        size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: BRDF_LUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let shader = create_shader(&ctx.device, "BRDF Integration", &[BRDF_WGSL]);
    let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("BRDF Integration Layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });
    let pipeline = create_pipeline(
        &ctx.device,
        PipelineSpec {
            label: "BRDF Integration",
            layout: &layout,
            shader: &shader,
            vertex_layout: QuadVertex::layout(),
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            color_format: BRDF_LUT_FORMAT,
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            depth_write: true,
            sample_count: 1,
        },
    );

    target.resize(&ctx.device, size, size);
    target.attach_color_target(CaptureColor::Texture2D { texture: &texture })?;
    let quad = ctx.unit_quad();
    target.capture(ctx, size, size, |pass| {
        pass.set_pipeline(&pipeline);
        quad.draw(pass);
    })?;
    target.detach();
    Ok(texture)
}
