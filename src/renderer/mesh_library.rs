use crate::mesh::{uv_sphere, unit_cube_vertices, unit_quad_vertices, ModelMesh};
use std::cell::OnceCell;
use wgpu::util::DeviceExt;

/// Vertex buffer plus optional 32-bit index buffer, ready to draw.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    element_count: u32,
    topology: wgpu::PrimitiveTopology,
}

impl GpuMesh {
    pub fn from_vertices<V: bytemuck::Pod>(
        device: &wgpu::Device,
        label: &str,
        vertices: &[V],
        topology: wgpu::PrimitiveTopology,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { vertex_buffer, index_buffer: None, element_count: vertices.len() as u32, topology }
    }

    pub fn from_indexed<V: bytemuck::Pod>(
        device: &wgpu::Device,
        label: &str,
        vertices: &[V],
        indices: &[u32],
        topology: wgpu::PrimitiveTopology,
    ) -> Self {
        let mut mesh = Self::from_vertices(device, label, vertices, topology);
        mesh.index_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Indices")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
        mesh.element_count = indices.len() as u32;
        mesh
    }

    pub fn from_model(device: &wgpu::Device, label: &str, model: &ModelMesh) -> Self {
        Self::from_indexed(device, label, &model.vertices, &model.indices, wgpu::PrimitiveTopology::TriangleList)
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.element_count, 0, 0..1);
            }
            None => pass.draw(0..self.element_count, 0..1),
        }
    }
}

/// Procedural meshes, each built on first request and kept for the context's lifetime.
pub struct MeshLibrary {
    sphere_segments: u32,
    cube: OnceCell<GpuMesh>,
    sphere: OnceCell<GpuMesh>,
    quad: OnceCell<GpuMesh>,
}

impl MeshLibrary {
    pub fn new(sphere_segments: u32) -> Self {
        Self { sphere_segments: sphere_segments.max(3), cube: OnceCell::new(), sphere: OnceCell::new(), quad: OnceCell::new() }
    }

    pub fn cube(&self, device: &wgpu::Device) -> &GpuMesh {
        self.cube.get_or_init(|| {
            log::debug!(target: "renderer", "Building unit cube");
            GpuMesh::from_vertices(device, "Unit Cube", &unit_cube_vertices(), wgpu::PrimitiveTopology::TriangleList)
        })
    }

    pub fn sphere(&self, device: &wgpu::Device) -> &GpuMesh {
        self.sphere.get_or_init(|| {
            let segments = self.sphere_segments;
            log::debug!(target: "renderer", "Building unit sphere ({segments}x{segments})");
            let sphere = uv_sphere(segments, segments);
            GpuMesh::from_indexed(
                device,
                "Unit Sphere",
                &sphere.vertices,
                &sphere.indices,
                wgpu::PrimitiveTopology::TriangleStrip,
            )
        })
    }

    pub fn quad(&self, device: &wgpu::Device) -> &GpuMesh {
        self.quad.get_or_init(|| {
            GpuMesh::from_vertices(device, "Unit Quad", &unit_quad_vertices(), wgpu::PrimitiveTopology::TriangleStrip)
        })
    }
}
