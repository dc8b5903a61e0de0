//! Blocking GPU to CPU copies, used to inspect bake results.

use super::RenderContext;
use anyhow::{anyhow, Context, Result};
use half::f16;

/// Reads one layer of one mip level as tightly packed texels.
pub fn read_texture_level(ctx: &RenderContext, texture: &wgpu::Texture, layer: u32, mip: u32) -> Result<Vec<u8>> {
    let format = texture.format();
    let texel_size =
        format.block_copy_size(None).ok_or_else(|| anyhow!("Format {format:?} cannot be copied to a buffer"))?;
    let width = (texture.width() >> mip).max(1);
    let height = (texture.height() >> mip).max(1);
    let unpadded_row = width * texel_size;
    let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size: (padded_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: mip,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    ctx.submit(encoder);

    let padded = map_and_read(ctx, &staging)?;
    let mut texels = Vec::with_capacity((unpadded_row * height) as usize);
    for row in padded.chunks_exact(padded_row as usize) {
        texels.extend_from_slice(&row[..unpadded_row as usize]);
    }
    Ok(texels)
}

/// Copies `size` bytes from the start of `buffer`, which needs `COPY_SRC` usage.
pub fn read_buffer(ctx: &RenderContext, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder =
        ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    ctx.submit(encoder);
    map_and_read(ctx, &staging)
}

/// Decodes little-endian half floats.
pub fn decode_f16(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(2).map(|pair| f16::from_le_bytes([pair[0], pair[1]]).to_f32()).collect()
}

fn map_and_read(ctx: &RenderContext, staging: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::PollType::wait_indefinitely()).context("Device poll failed during readback")?;
    rx.recv().context("Readback callback dropped")?.context("Failed to map readback buffer")?;
    let data = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}
