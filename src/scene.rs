//! What gets drawn each frame: the helmet models, the scanned object and the ring of spheres.

use crate::config::{ModelConfig, SceneConfig};
use crate::material_table::{MaterialSet, SharedLuts};
use crate::mesh::ModelMesh;
use crate::renderer::{GpuMesh, RenderContext};
use crate::textures::ResidentTextureSet;
use glam::{Mat4, Vec3};
use std::f32::consts::TAU;

/// Position of ring member `index` of `count` with the ring turned by `radian`.
pub fn ring_position(index: usize, count: usize, radius: f32, radian: f32) -> Vec3 {
    let theta = index as f32 * TAU / count.max(1) as f32;
    Vec3::new(radius * (theta + radian).cos(), radius * (theta + radian).sin(), 0.0)
}

/// Static part of an imported model's transform: translate, then uniform scale.
pub fn model_base_matrix(config: &ModelConfig) -> Mat4 {
    Mat4::from_translation(Vec3::from_array(config.translation)) * Mat4::from_scale(Vec3::splat(config.scale))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Placement {
    Ring { index: usize, count: usize },
    Fixed(Mat4),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectMesh {
    Sphere,
    Model(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct SceneObject {
    pub mesh: ObjectMesh,
    pub material: MaterialSet,
    placement: Placement,
}

/// Animation parameters shared by every object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMotion {
    pub ring_radius: f32,
    pub orbit_speed: f32,
    pub spin_speed: f32,
}

impl SceneMotion {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self { ring_radius: config.ring_radius, orbit_speed: config.orbit_speed, spin_speed: config.spin_speed }
    }
}

pub struct Scene {
    objects: Vec<SceneObject>,
    models: Vec<GpuMesh>,
    luts: SharedLuts,
    motion: SceneMotion,
}

impl Scene {
    /// Imports models and makes every texture resident. Missing models are skipped and missing textures
    /// resolve to the null handle; both are logged.
    pub fn load(ctx: &RenderContext, textures: &mut ResidentTextureSet, config: &SceneConfig) -> Self {
        let luts = SharedLuts {
            brdf_avg: textures.load(ctx, &config.brdf_avg_lut),
            brdf_mu: textures.load(ctx, &config.brdf_mu_lut),
        };
        let mut objects = Vec::new();
        let mut models = Vec::new();
        for model in &config.models {
            let mesh = match ModelMesh::load_gltf(&model.path) {
                Ok(mesh) => mesh,
                Err(err) => {
                    log::warn!(target: "scene", "Skipping model: {err:#}");
                    continue;
                }
            };
            let label = model.path.display().to_string();
            models.push(GpuMesh::from_model(&ctx.device, &label, &mesh));
            objects.push(SceneObject {
                mesh: ObjectMesh::Model(models.len() - 1),
                material: MaterialSet::load(ctx, textures, &model.textures),
                placement: Placement::Fixed(model_base_matrix(model)),
            });
        }
        let sphere_materials = config.sphere_materials();
        let count = sphere_materials.len();
        for (index, paths) in sphere_materials.iter().enumerate() {
            objects.push(SceneObject {
                mesh: ObjectMesh::Sphere,
                material: MaterialSet::load(ctx, textures, paths),
                placement: Placement::Ring { index, count },
            });
        }
        log::info!(
            target: "scene",
            "Scene ready: {} models, {count} spheres, {} resident textures",
            models.len(),
            textures.len()
        );
        Self { objects, models, luts, motion: SceneMotion::from_config(config) }
    }

    /// Draw order: models in configuration order, then the ring.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn luts(&self) -> SharedLuts {
        self.luts
    }

    pub fn mesh<'a>(&'a self, ctx: &'a RenderContext, object: &SceneObject) -> Option<&'a GpuMesh> {
        match object.mesh {
            ObjectMesh::Sphere => Some(ctx.unit_sphere()),
            ObjectMesh::Model(index) => self.models.get(index),
        }
    }

    pub fn model_matrix(&self, object: &SceneObject, elapsed: f32) -> Mat4 {
        object_matrix(object, &self.motion, elapsed)
    }
}

/// Ring objects orbit at `-elapsed * orbit_speed`; every object spins about +Y at `spin_speed`.
fn object_matrix(object: &SceneObject, motion: &SceneMotion, elapsed: f32) -> Mat4 {
    let spin = Mat4::from_rotation_y(elapsed * motion.spin_speed);
    match object.placement {
        Placement::Ring { index, count } => {
            let radian = -elapsed * motion.orbit_speed;
            Mat4::from_translation(ring_position(index, count, motion.ring_radius, radian)) * spin
        }
        Placement::Fixed(base) => base * spin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOTION: SceneMotion = SceneMotion { ring_radius: 4.0, orbit_speed: 0.4, spin_speed: 1.0 };

    fn ring_object(index: usize, count: usize) -> SceneObject {
        SceneObject { mesh: ObjectMesh::Sphere, material: MaterialSet::default(), placement: Placement::Ring { index, count } }
    }

    #[test]
    fn ring_at_rest_is_evenly_spaced() {
        let radius = 4.0;
        for i in 0..8 {
            let expected = TAU * i as f32 / 8.0;
            let p = ring_position(i, 8, radius, 0.0);
            assert!((p - Vec3::new(radius * expected.cos(), radius * expected.sin(), 0.0)).length() < 1e-5);
        }
    }

    #[test]
    fn sphere_matrix_at_time_zero_is_a_translation() {
        let matrix = object_matrix(&ring_object(2, 8), &MOTION, 0.0);
        let expected = Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0));
        assert!(matrix.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn ring_turns_clockwise_over_time() {
        let t = 1.0;
        let matrix = object_matrix(&ring_object(0, 8), &MOTION, t);
        let centre = matrix.transform_point3(Vec3::ZERO);
        let angle = -t * MOTION.orbit_speed;
        assert!((centre - Vec3::new(4.0 * angle.cos(), 4.0 * angle.sin(), 0.0)).length() < 1e-5);
    }

    #[test]
    fn model_matrix_scales_then_spins_in_place() {
        let config = ModelConfig {
            path: "scan.gltf".into(),
            textures: crate::config::MaterialPaths::in_directory("scan", "jpg"),
            translation: [10.0, 0.0, 0.0],
            scale: 9.0,
        };
        let object = SceneObject {
            mesh: ObjectMesh::Model(0),
            material: MaterialSet::default(),
            placement: Placement::Fixed(model_base_matrix(&config)),
        };
        let matrix = object_matrix(&object, &MOTION, std::f32::consts::FRAC_PI_2);
        assert!(matrix.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
        // +X spun a quarter turn about +Y lands on -Z before scaling.
        assert!(matrix.transform_point3(Vec3::X).abs_diff_eq(Vec3::new(10.0, 0.0, -9.0), 1e-4));
    }
}
