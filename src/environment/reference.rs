//! CPU versions of the bake kernels. Slow, but exact enough to check GPU output against.

use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Equirectangular radiance, row 0 at the zenith.
#[derive(Clone)]
pub struct EquirectImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl EquirectImage {
    pub fn constant(width: u32, height: u32, color: Vec3) -> Self {
        Self { width, height, pixels: vec![color; (width * height) as usize] }
    }

    /// Builds from tightly packed RGB floats; `None` when the length disagrees with the size.
    pub fn from_rgb32f(width: u32, height: u32, data: &[f32]) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != (width * height * 3) as usize {
            return None;
        }
        let pixels = data.chunks_exact(3).map(|rgb| Vec3::new(rgb[0], rgb[1], rgb[2])).collect();
        Some(Self { width, height, pixels })
    }

    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.pixels[(y * self.width + x) as usize]
    }

    /// Bilinear lookup with clamp-to-edge addressing and texel-centre alignment.
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        let uv = equirect_uv(dir);
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), tx);
        let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }
}

/// Direction to panorama coordinates: +X lands mid-image, +Y on the top row.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let d = dir.normalize();
    let u = d.z.atan2(d.x) / TAU + 0.5;
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / PI;
    Vec2::new(u, v)
}

/// World direction through the centre of texel (x, y) of a cube face, rows top-down.
/// Faces follow layer order +X, -X, +Y, -Y, +Z, -Z.
pub fn cube_face_direction(face: usize, x: u32, y: u32, size: u32) -> Vec3 {
    let a = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
    let b = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
    match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    }
    .normalize()
}

pub fn tangent_to_world(normal: Vec3, v: Vec3) -> Vec3 {
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    tangent * v.x + bitangent * v.y + normal * v.z
}

/// Midpoint-rule hemisphere convolution around `normal`, scaled so constant radiance C integrates to C.
pub fn integrate_irradiance(
    radiance: impl Fn(Vec3) -> Vec3,
    normal: Vec3,
    phi_steps: u32,
    theta_steps: u32,
) -> Vec3 {
    let phi_delta = TAU / phi_steps as f32;
    let theta_delta = FRAC_PI_2 / theta_steps as f32;
    let mut sum = Vec3::ZERO;
    for p in 0..phi_steps {
        let phi = (p as f32 + 0.5) * phi_delta;
        for t in 0..theta_steps {
            let theta = (t as f32 + 0.5) * theta_delta;
            let local = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            sum += radiance(tangent_to_world(normal, local)) * theta.cos() * theta.sin();
        }
    }
    PI * sum / (phi_steps * theta_steps) as f32
}

pub fn radical_inverse_vdc(bits: u32) -> f32 {
    bits.reverse_bits() as f32 * 2.328_306_4e-10
}

pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// GGX half-vector sample around `normal` with alpha = roughness squared.
pub fn importance_sample_ggx(xi: Vec2, normal: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    tangent_to_world(normal, Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta))
}

/// Schlick-GGX with the image-based-lighting remap k = alpha / 2.
fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

/// Split-sum scale (x) and bias (y) for a view angle and roughness.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> Vec2 {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let mut scale = 0.0;
    let mut bias = 0.0;
    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), Vec3::Z, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();
        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);
        if n_dot_l > 0.0 {
            let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }
    Vec2::new(scale, bias) / samples as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_radiance_convolves_to_itself() {
        let color = Vec3::new(0.5, 1.25, 3.0);
        for normal in [Vec3::X, Vec3::NEG_Y, Vec3::Z, Vec3::new(1.0, 2.0, -0.5).normalize()] {
            let irradiance = integrate_irradiance(|_| color, normal, 32, 64);
            assert!((irradiance - color).abs().max_element() < 1e-3, "{irradiance:?} for {normal:?}");
        }
    }

    #[test]
    fn equirect_uv_orientation() {
        let uv = equirect_uv(Vec3::X);
        assert!((uv - Vec2::new(0.5, 0.5)).length() < 1e-6);
        assert!(equirect_uv(Vec3::Y).y.abs() < 1e-6);
        assert!((equirect_uv(Vec3::NEG_Y).y - 1.0).abs() < 1e-6);
        assert!((equirect_uv(Vec3::Z).x - 0.75).abs() < 1e-6);
    }

    #[test]
    fn face_centres_point_along_axes() {
        let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        for (face, axis) in axes.iter().enumerate() {
            assert!((cube_face_direction(face, 0, 0, 1) - *axis).length() < 1e-6);
        }
    }

    #[test]
    fn sampling_a_constant_panorama_returns_the_constant() {
        let color = Vec3::new(0.2, 0.4, 0.8);
        let image = EquirectImage::constant(8, 4, color);
        for dir in [Vec3::X, Vec3::Y, Vec3::new(-0.3, -0.9, 0.2)] {
            assert!((image.sample(dir) - color).length() < 1e-6);
        }
    }

    #[test]
    fn from_rgb32f_checks_length() {
        assert!(EquirectImage::from_rgb32f(2, 1, &[0.0; 6]).is_some());
        assert!(EquirectImage::from_rgb32f(2, 1, &[0.0; 5]).is_none());
    }

    #[test]
    fn ggx_samples_stay_in_the_upper_hemisphere() {
        for roughness in [0.1, 0.5, 1.0] {
            for i in 0..64 {
                let h = importance_sample_ggx(hammersley(i, 64), Vec3::Y, roughness);
                assert!(h.dot(Vec3::Y) >= -1e-6);
                assert!((h.length() - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn smooth_head_on_brdf_is_pure_scale() {
        let lut = integrate_brdf(1.0, 0.05, 256);
        assert!(lut.x > 0.95, "{lut:?}");
        assert!(lut.y < 0.05, "{lut:?}");
    }

    #[test]
    fn brdf_terms_are_bounded() {
        for n_dot_v in [0.1, 0.5, 0.9] {
            for roughness in [0.2, 0.6, 1.0] {
                let lut = integrate_brdf(n_dot_v, roughness, 128);
                assert!(lut.x >= 0.0 && lut.y >= 0.0);
                assert!(lut.x + lut.y <= 1.05, "{lut:?} at {n_dot_v}, {roughness}");
            }
        }
    }

    #[test]
    fn radical_inverse_matches_known_values() {
        assert_eq!(radical_inverse_vdc(0), 0.0);
        assert!((radical_inverse_vdc(1) - 0.5).abs() < 1e-7);
        assert!((radical_inverse_vdc(2) - 0.25).abs() < 1e-7);
        assert!((radical_inverse_vdc(3) - 0.75).abs() < 1e-7);
    }
}
