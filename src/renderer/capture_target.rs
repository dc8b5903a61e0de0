use super::{RenderContext, DEPTH_FORMAT};
use anyhow::{anyhow, bail, Result};

/// Destination of a capture pass.
#[derive(Clone, Copy)]
pub enum CaptureColor<'a> {
    /// One face (array layer) of one mip level of a six-layer texture.
    CubeFace { texture: &'a wgpu::Texture, face: u32, mip: u32 },
    /// Mip 0 of a plain 2D texture.
    Texture2D { texture: &'a wgpu::Texture },
}

struct AttachedColor {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Offscreen target reused by every bake stage: a depth buffer that follows `resize` and a color
/// attachment swapped per pass.
pub struct CaptureTarget {
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    width: u32,
    height: u32,
    color: Option<AttachedColor>,
    clear_color: wgpu::Color,
}

impl CaptureTarget {
    pub fn new() -> Self {
        Self { depth: None, width: 0, height: 0, color: None, clear_color: wgpu::Color::BLACK }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocates depth storage only; the color attachment is left to the caller.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.depth.is_some() && (self.width, self.height) == (width, height) {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Depth"),
            size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some((texture, view));
        self.width = width;
        self.height = height;
    }

    pub fn attach_color_target(&mut self, target: CaptureColor<'_>) -> Result<()> {
        let (texture, layer, mip) = match target {
            CaptureColor::CubeFace { texture, face, mip } => {
                if face >= texture.depth_or_array_layers() {
                    bail!("Face {face} out of range for a {}-layer texture", texture.depth_or_array_layers());
                }
                (texture, face, mip)
            }
            CaptureColor::Texture2D { texture } => (texture, 0, 0),
        };
        if mip >= texture.mip_level_count() {
            bail!("Mip {mip} out of range for a texture with {} levels", texture.mip_level_count());
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Capture Color"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        });
        self.color = Some(AttachedColor {
            view,
            width: (texture.width() >> mip).max(1),
            height: (texture.height() >> mip).max(1),
        });
        Ok(())
    }

    pub fn detach(&mut self) {
        self.color = None;
    }

    /// Clears the attached color and depth, sets a `width` x `height` viewport, records `render_fn`
    /// and submits. Fails when the sizes disagree with the attachment or the depth buffer.
    pub fn capture<F>(&mut self, ctx: &RenderContext, width: u32, height: u32, render_fn: F) -> Result<()>
    where
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        let color = self.color.as_ref().ok_or_else(|| anyhow!("Capture target has no color attachment"))?;
        let (_, depth_view) = self.depth.as_ref().ok_or_else(|| anyhow!("Capture target depth not allocated"))?;
        if (color.width, color.height) != (width, height) {
            bail!(
                "Capture size {width}x{height} does not match color attachment {}x{}",
                color.width,
                color.height
            );
        }
        if (self.width, self.height) != (width, height) {
            bail!("Capture size {width}x{height} does not match depth buffer {}x{}", self.width, self.height);
        }

        let mut encoder =
            ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Capture Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Capture Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear_color), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_fn(&mut pass);
        }
        ctx.submit(encoder);
        Ok(())
    }
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self::new()
    }
}
