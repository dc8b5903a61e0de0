mod common;

use pbr_ibl::renderer::{CaptureColor, CaptureTarget, RenderContext, HDR_FORMAT};

fn color_texture(ctx: &RenderContext, size: u32, layers: u32, mips: u32) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Capture Test Color"),
        size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: layers },
        mip_level_count: mips,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

#[test]
fn capture_rejects_mismatched_sizes() {
    let Some(ctx) = common::gpu_context("capture_rejects_mismatched_sizes") else {
        return;
    };
    let texture = color_texture(&ctx, 32, 1, 1);
    let mut target = CaptureTarget::new();
    target.resize(&ctx.device, 16, 16);
    assert_eq!(target.size(), (16, 16));

    assert!(target.capture(&ctx, 16, 16, |_| {}).is_err(), "no color attached yet");
    target.attach_color_target(CaptureColor::Texture2D { texture: &texture }).expect("attach");
    let err = target.capture(&ctx, 16, 16, |_| {}).expect_err("color is 32x32");
    assert!(err.to_string().contains("color attachment"));
    let err = target.capture(&ctx, 32, 32, |_| {}).expect_err("depth is 16x16");
    assert!(err.to_string().contains("depth buffer"));

    target.resize(&ctx.device, 32, 32);
    let mut recorded = false;
    target.capture(&ctx, 32, 32, |_| recorded = true).expect("matching sizes");
    assert!(recorded);
}

#[test]
fn cube_faces_follow_the_attached_mip() {
    let Some(ctx) = common::gpu_context("cube_faces_follow_the_attached_mip") else {
        return;
    };
    let cube = color_texture(&ctx, 16, 6, 3);
    let mut target = CaptureTarget::new();
    target.resize(&ctx.device, 4, 4);

    assert!(target.attach_color_target(CaptureColor::CubeFace { texture: &cube, face: 6, mip: 0 }).is_err());
    assert!(target.attach_color_target(CaptureColor::CubeFace { texture: &cube, face: 0, mip: 3 }).is_err());

    for face in 0..6 {
        target.attach_color_target(CaptureColor::CubeFace { texture: &cube, face, mip: 2 }).expect("attach face");
        target.capture(&ctx, 4, 4, |_| {}).expect("mip 2 is 4x4");
    }
    target.detach();
    assert!(target.capture(&ctx, 4, 4, |_| {}).is_err());
}
