use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use gltf::mesh::Mode;
use std::f32::consts::PI;
use std::mem::size_of;
use std::path::Path;

/// Interleaved position, normal, uv. Used by the unit cube.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Interleaved position, uv, normal. Used by the sphere and imported models.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

const _: () = assert!(size_of::<CubeVertex>() == 32);
const _: () = assert!(size_of::<SurfaceVertex>() == 32);
const _: () = assert!(size_of::<QuadVertex>() == 20);

impl CubeVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<CubeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 24, shader_location: 2, format: wgpu::VertexFormat::Float32x2 },
            ],
        }
    }
}

impl SurfaceVertex {
    pub fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self { position: position.to_array(), uv: uv.to_array(), normal: normal.to_array() }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<SurfaceVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x2 },
                wgpu::VertexAttribute { offset: 20, shader_location: 2, format: wgpu::VertexFormat::Float32x3 },
            ],
        }
    }
}

impl QuadVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x2 },
            ],
        }
    }
}

#[rustfmt::skip]
const CUBE_TABLE: [[f32; 8]; 36] = [
    // back
    [-1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 0.0],
    [ 1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 1.0],
    [ 1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 0.0],
    [ 1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 0.0],
    [-1.0,  1.0, -1.0,  0.0,  0.0, -1.0, 0.0, 1.0],
    // front
    [-1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 0.0],
    [ 1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 0.0],
    [ 1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 1.0],
    [ 1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 1.0, 1.0],
    [-1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 1.0],
    [-1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 0.0, 0.0],
    // left
    [-1.0,  1.0,  1.0, -1.0,  0.0,  0.0, 1.0, 0.0],
    [-1.0,  1.0, -1.0, -1.0,  0.0,  0.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0, -1.0,  0.0,  0.0, 0.0, 1.0],
    [-1.0, -1.0, -1.0, -1.0,  0.0,  0.0, 0.0, 1.0],
    [-1.0, -1.0,  1.0, -1.0,  0.0,  0.0, 0.0, 0.0],
    [-1.0,  1.0,  1.0, -1.0,  0.0,  0.0, 1.0, 0.0],
    // right
    [ 1.0,  1.0,  1.0,  1.0,  0.0,  0.0, 1.0, 0.0],
    [ 1.0, -1.0, -1.0,  1.0,  0.0,  0.0, 0.0, 1.0],
    [ 1.0,  1.0, -1.0,  1.0,  0.0,  0.0, 1.0, 1.0],
    [ 1.0, -1.0, -1.0,  1.0,  0.0,  0.0, 0.0, 1.0],
    [ 1.0,  1.0,  1.0,  1.0,  0.0,  0.0, 1.0, 0.0],
    [ 1.0, -1.0,  1.0,  1.0,  0.0,  0.0, 0.0, 0.0],
    // bottom
    [-1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 0.0, 1.0],
    [ 1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 1.0, 1.0],
    [ 1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 1.0, 0.0],
    [ 1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 1.0, 0.0],
    [-1.0, -1.0,  1.0,  0.0, -1.0,  0.0, 0.0, 0.0],
    [-1.0, -1.0, -1.0,  0.0, -1.0,  0.0, 0.0, 1.0],
    // top
    [-1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 0.0, 1.0],
    [ 1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 1.0, 0.0],
    [ 1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 1.0, 1.0],
    [ 1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 1.0, 0.0],
    [-1.0,  1.0, -1.0,  0.0,  1.0,  0.0, 0.0, 1.0],
    [-1.0,  1.0,  1.0,  0.0,  1.0,  0.0, 0.0, 0.0],
];

/// 36 non-indexed vertices spanning [-1, 1] on every axis.
pub fn unit_cube_vertices() -> Vec<CubeVertex> {
    CUBE_TABLE
        .iter()
        .map(|row| CubeVertex {
            position: [row[0], row[1], row[2]],
            normal: [row[3], row[4], row[5]],
            uv: [row[6], row[7]],
        })
        .collect()
}

/// Full-screen triangle strip. uv (0, 0) is the top-left corner, matching texture row order.
pub fn unit_quad_vertices() -> [QuadVertex; 4] {
    [
        QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 0.0] },
        QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
        QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 0.0] },
        QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 1.0] },
    ]
}

/// Latitude/longitude sphere drawn as one triangle strip.
#[derive(Clone, Debug)]
pub struct SphereMesh {
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
}

/// Builds a unit sphere with `(x_segments + 1) * (y_segments + 1)` vertices.
///
/// Rows alternate direction so the strip snakes over the surface without restarts: even rows walk
/// x upwards emitting `(row, row + 1)` pairs, odd rows walk x downwards emitting `(row + 1, row)`.
pub fn uv_sphere(x_segments: u32, y_segments: u32) -> SphereMesh {
    let mut vertices = Vec::with_capacity(((x_segments + 1) * (y_segments + 1)) as usize);
    for y in 0..=y_segments {
        for x in 0..=x_segments {
            let x_segment = x as f32 / x_segments as f32;
            let y_segment = y as f32 / y_segments as f32;
            let position = Vec3::new(
                (x_segment * 2.0 * PI).cos() * (y_segment * PI).sin(),
                (y_segment * PI).cos(),
                (x_segment * 2.0 * PI).sin() * (y_segment * PI).sin(),
            );
            vertices.push(SurfaceVertex::new(position, Vec2::new(x_segment, y_segment), position));
        }
    }

    let row = x_segments + 1;
    let mut indices = Vec::with_capacity((2 * y_segments * row) as usize);
    for y in 0..y_segments {
        if y % 2 == 0 {
            for x in 0..=x_segments {
                indices.push(y * row + x);
                indices.push((y + 1) * row + x);
            }
        } else {
            for x in (0..=x_segments).rev() {
                indices.push((y + 1) * row + x);
                indices.push(y * row + x);
            }
        }
    }
    SphereMesh { vertices, indices }
}

/// Indexed triangle-list geometry imported from a glTF file.
#[derive(Clone, Debug)]
pub struct ModelMesh {
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
}

impl ModelMesh {
    /// Merges every triangle primitive of every mesh in the document.
    pub fn load_gltf(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let (document, buffers, _images) = gltf::import(path_ref)
            .with_context(|| format!("Failed to import glTF from {}", path_ref.display()))?;

        let mut vertices: Vec<SurfaceVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    continue;
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));
                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .ok_or_else(|| anyhow!("POSITION attribute missing in {}", path_ref.display()))?
                    .map(Vec3::from_array)
                    .collect();
                if positions.is_empty() {
                    continue;
                }
                let local_indices: Vec<u32> = reader
                    .read_indices()
                    .map(|read| read.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let mut normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|it| it.map(Vec3::from_array).collect())
                    .unwrap_or_default();
                if normals.len() != positions.len() || normals.iter().all(|n| n.length_squared() == 0.0) {
                    normals = compute_normals(&positions, &local_indices);
                }
                let mut tex_coords: Vec<Vec2> = reader
                    .read_tex_coords(0)
                    .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
                    .unwrap_or_default();
                tex_coords.resize(positions.len(), Vec2::ZERO);

                let base_vertex = vertices.len() as u32;
                vertices.extend(positions.iter().zip(&tex_coords).zip(&normals).map(|((pos, uv), normal)| {
                    SurfaceVertex::new(*pos, *uv, normal.normalize_or_zero())
                }));
                indices.extend(local_indices.iter().map(|idx| idx + base_vertex));
            }
        }

        if indices.is_empty() {
            return Err(anyhow!("{} contains no triangle primitives", path_ref.display()));
        }
        Ok(Self { vertices, indices })
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        if normal.length_squared() > 0.0 {
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }
    for normal in &mut normals {
        *normal = if normal.length_squared() > 0.0 { normal.normalize() } else { Vec3::Y };
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cube_has_outward_unit_normals() {
        let cube = unit_cube_vertices();
        assert_eq!(cube.len(), 36);
        for tri in cube.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from_array(v.position));
            let normal = Vec3::from_array(tri[0].normal);
            assert!((normal.length() - 1.0).abs() < 1e-6);
            assert!((b - a).cross(c - a).length() > 0.0);
            let centroid = (a + b + c) / 3.0;
            assert!(centroid.dot(normal) > 0.0);
        }
    }

    #[test]
    fn sphere_counts_match_segments() {
        for n in [3u32, 8, 64] {
            let sphere = uv_sphere(n, n);
            assert_eq!(sphere.vertices.len(), ((n + 1) * (n + 1)) as usize);
            assert_eq!(sphere.indices.len(), (2 * n * (n + 1)) as usize);
            assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
        }
    }

    #[test]
    fn sphere_strip_only_repeats_at_row_turnarounds() {
        let n = 16u32;
        let sphere = uv_sphere(n, n);
        assert!(sphere.indices.windows(2).all(|w| w[0] != w[1]));
        let repeated = sphere
            .indices
            .windows(3)
            .filter(|w| w[0] == w[1] || w[1] == w[2] || w[0] == w[2])
            .count();
        assert_eq!(repeated, (n - 1) as usize);
    }

    #[test]
    fn sphere_strip_has_no_zero_area_triangles_away_from_poles() {
        let n = 32u32;
        let sphere = uv_sphere(n, n);
        let row = n + 1;
        let on_pole = |i: u32| i < row || i >= n * row;
        for w in sphere.indices.windows(3) {
            if w[0] == w[1] || w[1] == w[2] || w[0] == w[2] || w.iter().any(|&i| on_pole(i)) {
                continue;
            }
            let [a, b, c] = [w[0], w[1], w[2]].map(|i| Vec3::from_array(sphere.vertices[i as usize].position));
            assert!((b - a).cross(c - a).length() > 1e-6, "zero-area triangle {w:?}");
        }
    }

    #[test]
    fn sphere_vertices_lie_on_unit_sphere() {
        let sphere = uv_sphere(12, 12);
        for vertex in &sphere.vertices {
            let pos = Vec3::from_array(vertex.position);
            assert!((pos.length() - 1.0).abs() < 1e-5);
            assert_eq!(vertex.position, vertex.normal);
        }
        assert_eq!(sphere.vertices[0].position[1], 1.0);
    }

    #[test]
    fn quad_covers_clip_space() {
        let quad = unit_quad_vertices();
        assert_eq!(quad[0].uv, [0.0, 0.0]);
        assert_eq!(quad[3].position, [1.0, -1.0, 0.0]);
        assert_eq!(quad[3].uv, [1.0, 1.0]);
    }

    #[test]
    fn load_embedded_gltf_triangle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bin = dir.path().join("triangle.bin");
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        std::fs::write(&bin, bytemuck::cast_slice(&positions)).expect("write buffer");
        let gltf_path = dir.path().join("triangle.gltf");
        let mut file = std::fs::File::create(&gltf_path).expect("create gltf");
        write!(
            file,
            r#"{{
  "asset": {{"version": "2.0"}},
  "buffers": [{{"uri": "triangle.bin", "byteLength": 36}}],
  "bufferViews": [{{"buffer": 0, "byteOffset": 0, "byteLength": 36}}],
  "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}}],
  "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}}}]}}]
}}"#
        )
        .expect("write gltf");
        drop(file);

        let mesh = ModelMesh::load_gltf(&gltf_path).expect("triangle should load");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        for vertex in &mesh.vertices {
            assert!((Vec3::from_array(vertex.normal) - Vec3::Z).length() < 1e-5);
            assert_eq!(vertex.uv, [0.0, 0.0]);
        }
    }

    #[test]
    fn missing_model_reports_path() {
        let err = ModelMesh::load_gltf("does/not/exist.gltf").unwrap_err();
        assert!(format!("{err:?}").contains("does/not/exist.gltf"));
    }
}
