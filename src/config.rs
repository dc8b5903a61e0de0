use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.json";

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
    #[serde(default = "WindowConfig::default_vsync")]
    pub vsync: bool,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default = "WindowConfig::default_msaa_samples")]
    pub msaa_samples: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default = "CameraConfig::default_yaw")]
    pub yaw_degrees: f32,
    #[serde(default)]
    pub pitch_degrees: f32,
    #[serde(default = "CameraConfig::default_speed")]
    pub speed: f32,
    #[serde(default = "CameraConfig::default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "CameraConfig::default_zoom")]
    pub zoom_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
}

/// Source image and target resolutions of the environment bake.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "EnvironmentConfig::default_hdr_path")]
    pub hdr_path: PathBuf,
    #[serde(default = "EnvironmentConfig::default_cubemap_size")]
    pub cubemap_size: u32,
    #[serde(default = "EnvironmentConfig::default_irradiance_size")]
    pub irradiance_size: u32,
    #[serde(default = "EnvironmentConfig::default_prefilter_size")]
    pub prefilter_size: u32,
    #[serde(default = "EnvironmentConfig::default_prefilter_mip_levels")]
    pub prefilter_mip_levels: u32,
    #[serde(default = "EnvironmentConfig::default_brdf_lut_size")]
    pub brdf_lut_size: u32,
}

/// The five per-object maps, in material table slot order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MaterialPaths {
    pub albedo: PathBuf,
    pub normal: PathBuf,
    pub metallic: PathBuf,
    pub roughness: PathBuf,
    pub ao: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub textures: MaterialPaths,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "ModelConfig::default_scale")]
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "SceneConfig::default_ring_radius")]
    pub ring_radius: f32,
    #[serde(default = "SceneConfig::default_orbit_speed")]
    pub orbit_speed: f32,
    #[serde(default = "SceneConfig::default_spin_speed")]
    pub spin_speed: f32,
    #[serde(default = "SceneConfig::default_sphere_segments")]
    pub sphere_segments: u32,
    #[serde(default = "SceneConfig::default_sphere_texture_root")]
    pub sphere_texture_root: PathBuf,
    #[serde(default = "SceneConfig::default_sphere_sets")]
    pub sphere_sets: Vec<String>,
    #[serde(default = "SceneConfig::default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default = "SceneConfig::default_brdf_avg_lut")]
    pub brdf_avg_lut: PathBuf,
    #[serde(default = "SceneConfig::default_brdf_mu_lut")]
    pub brdf_mu_lut: PathBuf,
    #[serde(default = "SceneConfig::default_lights")]
    pub lights: Vec<LightConfig>,
    #[serde(default = "SceneConfig::default_light_frequency")]
    pub light_frequency: f32,
    #[serde(default = "SceneConfig::default_light_amplitude")]
    pub light_amplitude: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            vsync: Self::default_vsync(),
            fullscreen: false,
            msaa_samples: Self::default_msaa_samples(),
        }
    }
}

impl WindowConfig {
    fn default_title() -> String {
        "PBR Render with IBL".to_string()
    }

    const fn default_width() -> u32 {
        1920
    }

    const fn default_height() -> u32 {
        1080
    }

    const fn default_vsync() -> bool {
        true
    }

    const fn default_msaa_samples() -> u32 {
        4
    }
}

impl CameraConfig {
    const fn default_position() -> [f32; 3] {
        [5.0, 0.0, 15.0]
    }

    const fn default_yaw() -> f32 {
        -90.0
    }

    const fn default_speed() -> f32 {
        2.5
    }

    const fn default_sensitivity() -> f32 {
        0.1
    }

    const fn default_zoom() -> f32 {
        45.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        100.0
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Self::default_position(),
            yaw_degrees: Self::default_yaw(),
            pitch_degrees: 0.0,
            speed: Self::default_speed(),
            sensitivity: Self::default_sensitivity(),
            zoom_degrees: Self::default_zoom(),
            near: Self::default_near(),
            far: Self::default_far(),
        }
    }
}

impl EnvironmentConfig {
    fn default_hdr_path() -> PathBuf {
        PathBuf::from("resources/textures/hdr/fireplace_2k.hdr")
    }

    const fn default_cubemap_size() -> u32 {
        512
    }

    const fn default_irradiance_size() -> u32 {
        32
    }

    const fn default_prefilter_size() -> u32 {
        128
    }

    const fn default_prefilter_mip_levels() -> u32 {
        5
    }

    const fn default_brdf_lut_size() -> u32 {
        512
    }

    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("cubemap_size", self.cubemap_size),
            ("irradiance_size", self.irradiance_size),
            ("prefilter_size", self.prefilter_size),
            ("brdf_lut_size", self.brdf_lut_size),
        ] {
            if size == 0 {
                bail!("environment.{name} must be non-zero");
            }
        }
        if self.prefilter_mip_levels < 2 {
            bail!("environment.prefilter_mip_levels must be at least 2 to span roughness 0..1");
        }
        if self.prefilter_size >> (self.prefilter_mip_levels - 1) == 0 {
            bail!(
                "environment.prefilter_size {} cannot hold {} mip levels",
                self.prefilter_size,
                self.prefilter_mip_levels
            );
        }
        Ok(())
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            hdr_path: Self::default_hdr_path(),
            cubemap_size: Self::default_cubemap_size(),
            irradiance_size: Self::default_irradiance_size(),
            prefilter_size: Self::default_prefilter_size(),
            prefilter_mip_levels: Self::default_prefilter_mip_levels(),
            brdf_lut_size: Self::default_brdf_lut_size(),
        }
    }
}

impl MaterialPaths {
    /// Maps named `albedo`, `normal`, ... with a shared extension inside `dir`.
    pub fn in_directory(dir: impl AsRef<Path>, extension: &str) -> Self {
        let dir = dir.as_ref();
        let file = |name: &str| dir.join(format!("{name}.{extension}"));
        Self {
            albedo: file("albedo"),
            normal: file("normal"),
            metallic: file("metallic"),
            roughness: file("roughness"),
            ao: file("ao"),
        }
    }

    /// Maps named `<prefix>_albedo.jpg` etc; normal maps ship as png.
    fn prefixed(dir: &str, prefix: &str) -> Self {
        let dir = Path::new(dir);
        Self {
            albedo: dir.join(format!("{prefix}_albedo.jpg")),
            normal: dir.join(format!("{prefix}_normal.png")),
            metallic: dir.join(format!("{prefix}_metallic.jpg")),
            roughness: dir.join(format!("{prefix}_roughness.jpg")),
            ao: dir.join(format!("{prefix}_ao.jpg")),
        }
    }
}

impl ModelConfig {
    const fn default_scale() -> f32 {
        1.0
    }
}

impl SceneConfig {
    const fn default_ring_radius() -> f32 {
        4.0
    }

    const fn default_orbit_speed() -> f32 {
        0.4
    }

    const fn default_spin_speed() -> f32 {
        1.0
    }

    const fn default_sphere_segments() -> u32 {
        64
    }

    fn default_sphere_texture_root() -> PathBuf {
        PathBuf::from("resources/textures/pbr")
    }

    fn default_sphere_sets() -> Vec<String> {
        [
            "gold",
            "slipperystonework",
            "ornate-celtic-gold",
            "bamboo-wood-semigloss",
            "wornpaintedcement",
            "paint-peeling",
            "Titanium-Scuffed",
            "wrinkled-paper",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_models() -> Vec<ModelConfig> {
        const HELMET: &str = "resources/objects/free-sci-fi-helmet";
        let scan_dir = Path::new("resources/objects/bakemyscan");
        vec![
            ModelConfig {
                path: Path::new(HELMET).join("head.gltf"),
                textures: MaterialPaths::prefixed(HELMET, "head"),
                translation: [0.0; 3],
                scale: 2.6,
            },
            ModelConfig {
                path: Path::new(HELMET).join("visor01.gltf"),
                textures: MaterialPaths::prefixed(HELMET, "visor01"),
                translation: [0.0; 3],
                scale: 2.6,
            },
            ModelConfig {
                path: scan_dir.join("bakemyscan.gltf"),
                textures: MaterialPaths::in_directory(scan_dir, "jpg"),
                translation: [10.0, 0.0, 0.0],
                scale: 9.0,
            },
        ]
    }

    fn default_brdf_avg_lut() -> PathBuf {
        PathBuf::from("resources/textures/kulla-conty/GGX_Eavg_LUT.png")
    }

    fn default_brdf_mu_lut() -> PathBuf {
        PathBuf::from("resources/textures/kulla-conty/GGX_E_LUT.png")
    }

    fn default_lights() -> Vec<LightConfig> {
        let light = |position: [f32; 3], color: [f32; 3]| LightConfig { position, color };
        vec![
            light([-10.0, 10.0, 10.0], [0.0, 300.0, 0.0]),
            light([10.0, 10.0, 10.0], [300.0, 0.0, 0.0]),
            light([-10.0, -10.0, 10.0], [0.0, 0.0, 300.0]),
            light([10.0, -10.0, 10.0], [300.0, 300.0, 300.0]),
            light([10.0, 0.0, 15.0], [300.0, 300.0, 300.0]),
            light([-10.0, 0.0, 15.0], [300.0, 300.0, 300.0]),
        ]
    }

    const fn default_light_frequency() -> f32 {
        5.0
    }

    const fn default_light_amplitude() -> f32 {
        5.0
    }

    pub fn sphere_materials(&self) -> Vec<MaterialPaths> {
        self.sphere_sets
            .iter()
            .map(|set| MaterialPaths::in_directory(self.sphere_texture_root.join(set), "png"))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.lights.len() > crate::lights::LIGHT_CAPACITY {
            bail!(
                "scene.lights has {} entries; the light buffer holds {}",
                self.lights.len(),
                crate::lights::LIGHT_CAPACITY
            );
        }
        if self.sphere_segments < 3 {
            bail!("scene.sphere_segments must be at least 3");
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            ring_radius: Self::default_ring_radius(),
            orbit_speed: Self::default_orbit_speed(),
            spin_speed: Self::default_spin_speed(),
            sphere_segments: Self::default_sphere_segments(),
            sphere_texture_root: Self::default_sphere_texture_root(),
            sphere_sets: Self::default_sphere_sets(),
            models: Self::default_models(),
            brdf_avg_lut: Self::default_brdf_avg_lut(),
            brdf_mu_lut: Self::default_brdf_mu_lut(),
            lights: Self::default_lights(),
            light_frequency: Self::default_light_frequency(),
            light_amplitude: Self::default_light_amplitude(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.window.msaa_samples, 1 | 4) {
            bail!("window.msaa_samples must be 1 or 4, got {}", self.window.msaa_samples);
        }
        self.environment.validate()?;
        self.scene.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_reference_scene() {
        let cfg = AppConfig::default();
        assert_eq!((cfg.window.width, cfg.window.height), (1920, 1080));
        assert_eq!(cfg.environment.cubemap_size, 512);
        assert_eq!(cfg.environment.irradiance_size, 32);
        assert_eq!(cfg.environment.prefilter_size, 128);
        assert_eq!(cfg.environment.prefilter_mip_levels, 5);
        assert_eq!(cfg.environment.brdf_lut_size, 512);
        assert_eq!(cfg.scene.sphere_sets.len(), 8);
        assert_eq!(cfg.scene.lights.len(), 6);
        assert_eq!(cfg.camera.position, [5.0, 0.0, 15.0]);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = NamedTempFile::new().expect("temp config");
        write!(file, r#"{{"environment":{{"irradiance_size":16}},"scene":{{"ring_radius":6.5}}}}"#)
            .expect("write config");
        let cfg = AppConfig::load(file.path()).expect("load partial config");
        assert_eq!(cfg.environment.irradiance_size, 16);
        assert_eq!(cfg.environment.cubemap_size, 512);
        assert!((cfg.scene.ring_radius - 6.5).abs() < f32::EPSILON);
        assert_eq!(cfg.window.title, "PBR Render with IBL");
    }

    #[test]
    fn partial_window_section_keeps_other_window_defaults() {
        let mut file = NamedTempFile::new().expect("temp config");
        write!(file, r#"{{"window":{{"msaa_samples":1}}}}"#).expect("write config");
        let cfg = AppConfig::load(file.path()).expect("load partial window config");
        assert_eq!(cfg.window.msaa_samples, 1);
        assert_eq!(cfg.window.title, "PBR Render with IBL");
        assert_eq!((cfg.window.width, cfg.window.height), (1920, 1080));
        assert!(cfg.window.vsync);
        assert!(!cfg.window.fullscreen);
    }

    #[test]
    fn rejects_prefilter_chain_longer_than_base_size() {
        let mut file = NamedTempFile::new().expect("temp config");
        write!(file, r#"{{"environment":{{"prefilter_size":8,"prefilter_mip_levels":5}}}}"#)
            .expect("write config");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:?}").contains("mip levels"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = AppConfig::load_or_default(dir.path().join("absent.json"));
        assert_eq!(cfg.scene.models.len(), 3);
    }

    #[test]
    fn sphere_materials_follow_set_directories() {
        let scene = SceneConfig::default();
        let materials = scene.sphere_materials();
        assert_eq!(materials[0].albedo, Path::new("resources/textures/pbr/gold/albedo.png"));
        assert_eq!(materials[7].ao, Path::new("resources/textures/pbr/wrinkled-paper/ao.png"));
        assert_eq!(materials[3].normal, Path::new("resources/textures/pbr/bamboo-wood-semigloss/normal.png"));
    }
}
