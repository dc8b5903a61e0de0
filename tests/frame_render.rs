mod common;

use pbr_ibl::camera::FlyCamera;
use pbr_ibl::config::{CameraConfig, EnvironmentConfig, SceneConfig};
use pbr_ibl::environment::{bake_from_source, EnvironmentSource};
use pbr_ibl::frame::{FrameInputs, FrameRenderer, FrameTargets};
use pbr_ibl::lights::{LightBlock, LightEntry, LIGHT_CAPACITY};
use pbr_ibl::material_table::MaterialHandles;
use pbr_ibl::renderer::readback::{read_buffer, read_texture_level};
use pbr_ibl::renderer::{RenderContext, DEFAULT_SPHERE_SEGMENTS, DEPTH_FORMAT};
use pbr_ibl::scene::Scene;
use pbr_ibl::textures::ResidentTextureSet;
use std::path::PathBuf;

const SIZE: u32 = 64;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn attachment(ctx: &RenderContext, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Frame Test Attachment"),
        size: wgpu::Extent3d { width: SIZE, height: SIZE, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn texel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * SIZE + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

#[test]
fn ring_sphere_and_background_both_reach_the_target() {
    let Some(ctx) = common::bindless_context("ring_sphere_and_background_both_reach_the_target") else {
        return;
    };
    let environment = EnvironmentConfig {
        cubemap_size: 16,
        irradiance_size: 4,
        prefilter_size: 16,
        prefilter_mip_levels: 5,
        brdf_lut_size: 16,
        ..EnvironmentConfig::default()
    };
    let rgb: Vec<f32> = vec![1.0; 8 * 4 * 3];
    let source = EnvironmentSource::from_rgb32f(&ctx, 8, 4, &rgb);
    let maps = bake_from_source(&ctx, &source, &environment).expect("bake");

    let missing = PathBuf::from("does/not/exist");
    let scene_config = SceneConfig {
        sphere_texture_root: missing.clone(),
        sphere_sets: vec!["a".into(), "b".into()],
        models: Vec::new(),
        brdf_avg_lut: missing.join("avg.png"),
        brdf_mu_lut: missing.join("mu.png"),
        ..SceneConfig::default()
    };
    let mut textures = ResidentTextureSet::new(&ctx).expect("texture set");
    let scene = Scene::load(&ctx, &mut textures, &scene_config);
    assert_eq!(scene.objects().len(), 2);
    let segments = DEFAULT_SPHERE_SEGMENTS;
    assert_eq!(ctx.unit_sphere().element_count(), 2 * segments * (segments + 1));
    assert_eq!(ctx.unit_cube().element_count(), 36);

    let color = attachment(
        &ctx,
        COLOR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );
    let depth = attachment(&ctx, DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    let targets = FrameTargets { color: &color_view, resolve: None, depth: &depth_view };

    let camera = FlyCamera::from_config(&CameraConfig { position: [4.0, 0.0, 6.0], ..CameraConfig::default() });
    let mut renderer = FrameRenderer::new(&ctx, &maps, &textures, &scene_config, COLOR_FORMAT, 1);
    let inputs = FrameInputs { camera: &camera, aspect_ratio: 1.0, elapsed: 0.0 };

    let stats = renderer.render(&ctx, &targets, &scene, &textures, &inputs);
    assert_eq!(stats.draws, 3);
    assert_eq!(stats.submissions, 3);
    assert_eq!(stats.skipped, 0);

    let light_bytes = read_buffer(&ctx, renderer.light_buffer().buffer(), std::mem::size_of::<LightBlock>() as u64)
        .expect("light readback");
    assert_eq!(light_bytes.len(), LIGHT_CAPACITY * 32);
    let lights: LightBlock = bytemuck::pod_read_unaligned(&light_bytes);
    for (entry, light) in lights.iter().zip(&scene_config.lights) {
        let [x, y, z] = light.position;
        let [r, g, b] = light.color;
        assert_eq!(*entry, LightEntry { position: [x, y, z, 0.0], color: [r, g, b, 0.0] });
    }

    // Every texture path is missing, so the last object's slots all hold the null handle.
    let table_bytes = read_buffer(&ctx, renderer.material_table().buffer(), 64).expect("material readback");
    let handles: MaterialHandles = bytemuck::pod_read_unaligned(&table_bytes);
    assert!(handles.handles.iter().all(|&raw| raw == 0));
    let stats = renderer.render(&ctx, &targets, &scene, &textures, &inputs);
    assert_eq!(stats.submissions, 3);

    let pixels = read_texture_level(&ctx, &color, 0, 0).expect("readback");
    let corner = texel(&pixels, 0, 0);
    let centre = texel(&pixels, SIZE / 2, SIZE / 2);
    assert!(corner[0].abs_diff(128) <= 3, "background should tonemap radiance 1 to half grey, got {corner:?}");
    assert_eq!(corner[0], corner[2]);
    assert_ne!(centre, corner, "sphere should cover the centre of the view");
}
