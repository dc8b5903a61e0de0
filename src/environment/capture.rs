use crate::mesh::CubeVertex;
use crate::renderer::{
    create_pipeline, create_shader, uniform_entry, CaptureColor, CaptureTarget, PipelineSpec, RenderContext,
};
use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

pub(super) const CAPTURE_COMMON_WGSL: &str = include_str!("../../assets/shaders/capture_common.wgsl");

/// (forward, up) for each cube layer, +X, -X, +Y, -Y, +Z, -Z, looking out from the origin.
pub const CAPTURE_VIEWS: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

pub fn capture_view(face: usize) -> Mat4 {
    let (forward, up) = CAPTURE_VIEWS[face];
    Mat4::look_at_rh(Vec3::ZERO, forward, up)
}

/// 90 degree square frustum that just encloses the unit cube.
pub fn capture_projection() -> Mat4 {
    Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.1, 10.0)
}

/// Roughness a prefilter level is convolved at: evenly spaced over [0, 1].
pub fn roughness_for_mip(mip: u32, mip_levels: u32) -> f32 {
    if mip_levels < 2 {
        return 0.0;
    }
    mip as f32 / (mip_levels - 1) as f32
}

/// `Matrices` block: projection at bytes 0..64, view at 64..128.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CaptureMatrices {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

const _: () = assert!(std::mem::size_of::<CaptureMatrices>() == 128);

pub const VIEW_OFFSET: wgpu::BufferAddress = std::mem::offset_of!(CaptureMatrices, view) as wgpu::BufferAddress;

/// Matrices buffer plus the capture target, shared by the three cube-writing stages.
pub(super) struct CaptureRig {
    matrices: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    target: CaptureTarget,
}

impl CaptureRig {
    /// Uploads the projection once; only the view range changes afterwards.
    pub fn new(ctx: &RenderContext) -> Self {
        let initial = CaptureMatrices {
            projection: capture_projection().to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
        };
        let matrices = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Capture Matrices"),
            contents: bytemuck::bytes_of(&initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Capture Matrices BGL"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Capture Matrices BG"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: matrices.as_entire_binding() }],
        });
        Self { matrices, layout, bind_group, target: CaptureTarget::new() }
    }

    pub fn target_mut(&mut self) -> &mut CaptureTarget {
        &mut self.target
    }

    /// Pipeline for a stage fragment shader that consumes `CaptureOut` and reads its inputs from group 1.
    pub fn cube_pipeline(
        &self,
        ctx: &RenderContext,
        label: &str,
        fragment_source: &str,
        sources_layout: &wgpu::BindGroupLayout,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shader = create_shader(&ctx.device, label, &[CAPTURE_COMMON_WGSL, fragment_source]);
        let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&self.layout, sources_layout],
            push_constant_ranges: &[],
        });
        create_pipeline(
            &ctx.device,
            PipelineSpec {
                label,
                layout: &layout,
                shader: &shader,
                vertex_layout: CubeVertex::layout(),
                topology: wgpu::PrimitiveTopology::TriangleList,
                color_format: format,
                depth_compare: Some(wgpu::CompareFunction::LessEqual),
                depth_write: true,
                sample_count: 1,
            },
        )
    }

    /// Renders the unit cube into all six faces of `texture` at `mip`, one submission per face so each
    /// view write is visible to its own draw.
    pub fn render_cube_faces(
        &mut self,
        ctx: &RenderContext,
        texture: &wgpu::Texture,
        mip: u32,
        pipeline: &wgpu::RenderPipeline,
        sources: &wgpu::BindGroup,
    ) -> Result<()> {
        let size = (texture.width() >> mip).max(1);
        self.target.resize(&ctx.device, size, size);
        let matrices_group = &self.bind_group;
        let cube = ctx.unit_cube();
        for face in 0..6u32 {
            let view = capture_view(face as usize).to_cols_array_2d();
            ctx.queue.write_buffer(&self.matrices, VIEW_OFFSET, bytemuck::cast_slice(&view));
            self.target.attach_color_target(CaptureColor::CubeFace { texture, face, mip })?;
            self.target.capture(ctx, size, size, |pass| {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, matrices_group, &[]);
                pass.set_bind_group(1, sources, &[]);
                cube.draw(pass);
            })?;
        }
        self.target.detach();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::reference::cube_face_direction;

    #[test]
    fn face_views_are_right_handed_orthonormal() {
        for (face, (forward, up)) in CAPTURE_VIEWS.iter().enumerate() {
            assert!((forward.length() - 1.0).abs() < 1e-6);
            assert!((up.length() - 1.0).abs() < 1e-6);
            assert!(forward.dot(*up).abs() < 1e-6, "face {face} up is not perpendicular");
            let right = forward.cross(*up);
            assert!((right.length() - 1.0).abs() < 1e-6);
            assert!((right.cross(*up) + *forward).length() < 1e-6, "face {face} basis is left-handed");
        }
        for a in 0..6 {
            for b in (a + 1)..6 {
                assert!(CAPTURE_VIEWS[a].0.dot(CAPTURE_VIEWS[b].0) < 0.5, "faces {a} and {b} overlap");
            }
        }
    }

    #[test]
    fn views_face_their_layer_directions() {
        for face in 0..6 {
            assert!((CAPTURE_VIEWS[face].0 - cube_face_direction(face, 0, 0, 1)).length() < 1e-6);
        }
    }

    #[test]
    fn first_texel_projects_to_top_left() {
        // The capture vertex stage negates clip y, so texel (0, 0) must land at negative x, positive y.
        let projection = capture_projection();
        for face in 0..6 {
            let dir = cube_face_direction(face, 0, 0, 2);
            let clip = projection * capture_view(face) * dir.extend(1.0);
            let ndc_x = clip.x / clip.w;
            let ndc_y = -clip.y / clip.w;
            assert!((ndc_x + 0.5).abs() < 1e-4, "face {face}: x {ndc_x}");
            assert!((ndc_y - 0.5).abs() < 1e-4, "face {face}: y {ndc_y}");
        }
    }

    #[test]
    fn projection_encloses_the_unit_cube() {
        let projection = capture_projection();
        let corner = capture_view(0) * Vec3::new(1.0, 1.0, 1.0).extend(1.0);
        let clip = projection * corner;
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn prefilter_roughness_spans_zero_to_one() {
        let values: Vec<f32> = (0..5).map(|mip| roughness_for_mip(mip, 5)).collect();
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(roughness_for_mip(0, 1), 0.0);
    }

    #[test]
    fn matrices_block_layout() {
        assert_eq!(VIEW_OFFSET, 64);
    }
}
