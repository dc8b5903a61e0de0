//! Per-frame draw orchestration over the baked environment, the scene and the light buffer.
//!
//! Order within a frame: camera upload, then for each object its transform and material slots followed
//! by its own submission, then the full light rewrite, then the background cube with the MSAA resolve.

use crate::camera::FlyCamera;
use crate::config::SceneConfig;
use crate::environment::EnvironmentMaps;
use crate::lights::{LightAnimator, LightBuffer, LIGHT_BINDING};
use crate::material_table::MaterialHandleTable;
use crate::mesh::{CubeVertex, SurfaceVertex};
use crate::renderer::{
    create_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry, uniform_entry, PipelineSpec,
    RenderContext,
};
use crate::scene::Scene;
use crate::textures::ResidentTextureSet;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

const PBR_WGSL: &str = include_str!("../assets/shaders/pbr.wgsl");
const BACKGROUND_WGSL: &str = include_str!("../assets/shaders/background.wgsl");

pub const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 };

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub position: [f32; 4],
    /// x: highest prefilter mip, sampled at roughness 1.
    pub params: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<CameraUniform>() == 160);

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3, max_reflection_lod: f32) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
            params: [max_reflection_lod, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

const _: () = assert!(std::mem::size_of::<ObjectUniform>() == 128);

impl ObjectUniform {
    pub fn from_model(model: Mat4) -> Self {
        Self { model: model.to_cols_array_2d(), normal_matrix: model.inverse().transpose().to_cols_array_2d() }
    }
}

/// Attachments for one frame. `color` is the multisampled target when `resolve` is set.
pub struct FrameTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub resolve: Option<&'a wgpu::TextureView>,
    pub depth: &'a wgpu::TextureView,
}

/// Inputs that change every frame.
pub struct FrameInputs<'a> {
    pub camera: &'a FlyCamera,
    pub aspect_ratio: f32,
    pub elapsed: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draws: u32,
    pub skipped: u32,
    pub submissions: u32,
}

/// First pass of the frame clears, later passes accumulate.
fn color_load(first: bool) -> wgpu::LoadOp<wgpu::Color> {
    if first {
        wgpu::LoadOp::Clear(CLEAR_COLOR)
    } else {
        wgpu::LoadOp::Load
    }
}

fn depth_load(first: bool) -> wgpu::LoadOp<f32> {
    if first {
        wgpu::LoadOp::Clear(1.0)
    } else {
        wgpu::LoadOp::Load
    }
}

pub struct FrameRenderer {
    camera_buffer: wgpu::Buffer,
    object_buffer: wgpu::Buffer,
    lights: LightBuffer,
    animator: LightAnimator,
    frame_bind_group: wgpu::BindGroup,
    environment_bind_group: wgpu::BindGroup,
    background_bind_group: wgpu::BindGroup,
    material_table: MaterialHandleTable,
    material_bind_group: wgpu::BindGroup,
    material_revision: u64,
    strip_pipeline: wgpu::RenderPipeline,
    list_pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    max_reflection_lod: f32,
}

impl FrameRenderer {
    pub fn new(
        ctx: &RenderContext,
        maps: &EnvironmentMaps,
        textures: &ResidentTextureSet,
        scene_config: &SceneConfig,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let device = &ctx.device;
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniform"),
            size: std::mem::size_of::<ObjectUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lights = LightBuffer::new(device);
        let animator = LightAnimator::new(&scene_config.lights, scene_config.light_frequency, scene_config.light_amplitude);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame BGL"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::VERTEX),
                wgpu::BindGroupLayoutEntry {
                    binding: LIGHT_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame BG"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: object_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: LIGHT_BINDING, resource: lights.buffer().as_entire_binding() },
            ],
        });

        let environment_sampler = linear_sampler(device, "Environment Sampler", wgpu::AddressMode::ClampToEdge);
        let environment_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment BGL"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                texture_entry(1, wgpu::TextureViewDimension::Cube),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
            ],
        });
        let environment_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment BG"),
            layout: &environment_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&maps.irradiance.view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&maps.prefilter.view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&maps.brdf_lut.view) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&environment_sampler) },
            ],
        });
        let background_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Background BGL"),
            entries: &[texture_entry(0, wgpu::TextureViewDimension::Cube), sampler_entry(1)],
        });
        let background_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Background BG"),
            layout: &background_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&maps.environment.view),
                },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&environment_sampler) },
            ],
        });

        let material_table = MaterialHandleTable::new(ctx);
        let material_bind_group = material_table.bind_group(ctx, textures);

        let pbr_shader = create_shader(device, "PBR Shader", &[PBR_WGSL]);
        let pbr_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Layout"),
            bind_group_layouts: &[&frame_layout, &environment_layout, material_table.layout()],
            push_constant_ranges: &[],
        });
        let pbr_pipeline = |label: &'static str, topology: wgpu::PrimitiveTopology| {
            create_pipeline(
                device,
                PipelineSpec {
                    label,
                    layout: &pbr_layout,
                    shader: &pbr_shader,
                    vertex_layout: SurfaceVertex::layout(),
                    topology,
                    color_format,
                    depth_compare: Some(wgpu::CompareFunction::LessEqual),
                    depth_write: true,
                    sample_count,
                },
            )
        };
        let strip_pipeline = pbr_pipeline("PBR Strip Pipeline", wgpu::PrimitiveTopology::TriangleStrip);
        let list_pipeline = pbr_pipeline("PBR List Pipeline", wgpu::PrimitiveTopology::TriangleList);

        let background_shader = create_shader(device, "Background Shader", &[BACKGROUND_WGSL]);
        let background_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Background Layout"),
            bind_group_layouts: &[&frame_layout, &background_layout],
            push_constant_ranges: &[],
        });
        let background_pipeline = create_pipeline(
            device,
            PipelineSpec {
                label: "Background Pipeline",
                layout: &background_pipeline_layout,
                shader: &background_shader,
                vertex_layout: CubeVertex::layout(),
                topology: wgpu::PrimitiveTopology::TriangleList,
                color_format,
                depth_compare: Some(wgpu::CompareFunction::LessEqual),
                depth_write: false,
                sample_count,
            },
        );

        Self {
            camera_buffer,
            object_buffer,
            lights,
            animator,
            frame_bind_group,
            environment_bind_group,
            background_bind_group,
            material_table,
            material_bind_group,
            material_revision: textures.revision(),
            strip_pipeline,
            list_pipeline,
            background_pipeline,
            max_reflection_lod: maps.prefilter_mip_levels().saturating_sub(1) as f32,
        }
    }

    pub fn material_table(&self) -> &MaterialHandleTable {
        &self.material_table
    }

    pub fn light_buffer(&self) -> &LightBuffer {
        &self.lights
    }

    /// Records and submits one frame; the caller presents afterwards.
    pub fn render(
        &mut self,
        ctx: &RenderContext,
        targets: &FrameTargets<'_>,
        scene: &Scene,
        textures: &ResidentTextureSet,
        inputs: &FrameInputs<'_>,
    ) -> FrameStats {
        if textures.revision() != self.material_revision {
            self.material_bind_group = self.material_table.bind_group(ctx, textures);
            self.material_revision = textures.revision();
        }
        let camera = inputs.camera;
        let uniform = CameraUniform::new(
            camera.view_matrix(),
            camera.projection_matrix(inputs.aspect_ratio),
            camera.position,
            self.max_reflection_lod,
        );
        ctx.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut stats = FrameStats::default();
        let luts = scene.luts();
        for object in scene.objects() {
            let Some(mesh) = scene.mesh(ctx, object) else {
                stats.skipped += 1;
                continue;
            };
            let model = scene.model_matrix(object, inputs.elapsed);
            ctx.queue.write_buffer(&self.object_buffer, 0, bytemuck::bytes_of(&ObjectUniform::from_model(model)));
            self.material_table.set_material(&ctx.queue, &object.material, &luts);

            let first = stats.submissions == 0;
            let pipeline = match mesh.topology() {
                wgpu::PrimitiveTopology::TriangleStrip => &self.strip_pipeline,
                _ => &self.list_pipeline,
            };
            let mut encoder =
                ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Object Encoder") });
            {
                let mut pass = begin_main_pass(&mut encoder, "Object Pass", targets, first, false);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                pass.set_bind_group(1, &self.environment_bind_group, &[]);
                pass.set_bind_group(2, &self.material_bind_group, &[]);
                mesh.draw(&mut pass);
            }
            ctx.submit(encoder);
            stats.draws += 1;
            stats.submissions += 1;
        }

        self.lights.write(&ctx.queue, &self.animator.block_at(inputs.elapsed));

        let first = stats.submissions == 0;
        let mut encoder =
            ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Background Encoder") });
        {
            let mut pass = begin_main_pass(&mut encoder, "Background Pass", targets, first, true);
            pass.set_pipeline(&self.background_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(1, &self.background_bind_group, &[]);
            ctx.unit_cube().draw(&mut pass);
        }
        ctx.submit(encoder);
        stats.draws += 1;
        stats.submissions += 1;
        stats
    }
}

fn begin_main_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    targets: &FrameTargets<'_>,
    first: bool,
    resolve: bool,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: targets.color,
            depth_slice: None,
            resolve_target: if resolve { targets.resolve } else { None },
            ops: wgpu::Operations { load: color_load(first), store: wgpu::StoreOp::Store },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: targets.depth,
            depth_ops: Some(wgpu::Operations { load: depth_load(first), store: wgpu::StoreOp::Store }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_pass_clears() {
        assert!(matches!(color_load(true), wgpu::LoadOp::Clear(c) if c == CLEAR_COLOR));
        assert!(matches!(color_load(false), wgpu::LoadOp::Load));
        assert!(matches!(depth_load(true), wgpu::LoadOp::Clear(d) if d == 1.0));
        assert!(matches!(depth_load(false), wgpu::LoadOp::Load));
    }

    #[test]
    fn object_uniform_keeps_normals_perpendicular_under_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniform = ObjectUniform::from_model(model);
        let normal_matrix = Mat4::from_cols_array_2d(&uniform.normal_matrix);
        let tangent = model.transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        let normal = normal_matrix.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(tangent.dot(normal).abs() < 1e-6);
    }

    #[test]
    fn camera_uniform_packs_position_and_lod() {
        let uniform = CameraUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(5.0, 0.0, 15.0), 4.0);
        assert_eq!(uniform.position, [5.0, 0.0, 15.0, 1.0]);
        assert_eq!(uniform.params[0], 4.0);
    }
}
