//! Material textures made resident in a fixed binding array and addressed by 64-bit handles.
//!
//! A handle's low 32 bits index the array and the high 32 bits carry the residency tag. The null
//! handle (0) indexes slot 0, which always holds a 1x1 placeholder, so a failed load still samples
//! something defined.

use crate::renderer::{full_mip_count, RenderContext};
use anyhow::{bail, Context, Result};
use image::ImageReader;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MAX_RESIDENT_TEXTURES: usize = 64;
pub const MATERIAL_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const RESIDENCY_TAG: u64 = 1 << 32;
const FALLBACK_TEXEL: [u8; 4] = [128, 128, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindlessHandle(u64);

impl BindlessHandle {
    pub const NULL: Self = Self(0);

    fn resident(slot: u32) -> Self {
        Self(RESIDENCY_TAG | slot as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Binding array element the shader samples for this handle.
    pub const fn slot(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

struct ResidentTexture {
    source: Option<PathBuf>,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Every texture the material pass can reach. Entries stay resident until the set is dropped.
pub struct ResidentTextureSet {
    textures: Vec<ResidentTexture>,
    by_path: HashMap<PathBuf, BindlessHandle>,
    sampler: wgpu::Sampler,
    revision: u64,
}

impl ResidentTextureSet {
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        if !ctx.bindless_supported() {
            bail!("Device lacks texture binding arrays; material textures cannot be made resident");
        }
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let mut set = Self { textures: Vec::new(), by_path: HashMap::new(), sampler, revision: 0 };
        set.upload(ctx, None, 1, 1, &FALLBACK_TEXEL);
        Ok(set)
    }

    /// Loads `path` once and returns its handle; decode failures and a full array yield the null handle.
    pub fn load(&mut self, ctx: &RenderContext, path: &Path) -> BindlessHandle {
        if let Some(handle) = self.by_path.get(path) {
            return *handle;
        }
        match self.try_load(ctx, path) {
            Ok(handle) => {
                self.by_path.insert(path.to_path_buf(), handle);
                handle
            }
            Err(err) => {
                log::warn!(target: "textures", "Texture failed to load at path {}: {err:#}", path.display());
                BindlessHandle::NULL
            }
        }
    }

    fn try_load(&mut self, ctx: &RenderContext, path: &Path) -> Result<BindlessHandle> {
        self.ensure_capacity()?;
        let image = ImageReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("probing {}", path.display()))?
            .decode()
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(self.upload(ctx, Some(path.to_path_buf()), width, height, image.as_raw()))
    }

    /// Makes tightly packed RGBA8 texels resident with a full mip chain.
    pub fn insert_rgba8(&mut self, ctx: &RenderContext, width: u32, height: u32, texels: &[u8]) -> Result<BindlessHandle> {
        self.ensure_capacity()?;
        if width == 0 || height == 0 || texels.len() != (width * height * 4) as usize {
            bail!("RGBA8 data of {} bytes does not describe a {width}x{height} image", texels.len());
        }
        Ok(self.upload(ctx, None, width, height, texels))
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.textures.len() >= MAX_RESIDENT_TEXTURES {
            bail!("All {MAX_RESIDENT_TEXTURES} resident texture slots are in use");
        }
        Ok(())
    }

    fn upload(
        &mut self,
        ctx: &RenderContext,
        source: Option<PathBuf>,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> BindlessHandle {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let label = source.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "Material Texture".into());
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size,
            mip_level_count: full_mip_count(width, height),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: MATERIAL_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(width * 4), rows_per_image: Some(height) },
            size,
        );
        ctx.generate_mipmaps(&texture);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let slot = self.textures.len() as u32;
        self.textures.push(ResidentTexture { source, _texture: texture, view });
        self.revision = self.revision.wrapping_add(1);
        log::debug!(target: "textures", "Resident slot {slot}: {label} ({width}x{height})");
        if slot == 0 {
            BindlessHandle::NULL
        } else {
            BindlessHandle::resident(slot)
        }
    }

    /// Resident entries, placeholder included.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Bumped whenever a texture becomes resident; binding-array bind groups built earlier are stale.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn source(&self, handle: BindlessHandle) -> Option<&Path> {
        self.textures.get(handle.slot() as usize).and_then(|t| t.source.as_deref())
    }

    /// Views for every array element; unused elements repeat the placeholder.
    pub fn array_views(&self) -> Vec<&wgpu::TextureView> {
        let fallback = &self.textures[0].view;
        (0..MAX_RESIDENT_TEXTURES).map(|slot| self.textures.get(slot).map_or(fallback, |t| &t.view)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_packs_slot_and_tag() {
        let handle = BindlessHandle::resident(5);
        assert_eq!(handle.slot(), 5);
        assert_eq!(handle.raw() >> 32, 1);
        assert!(!handle.is_null());
        assert_eq!(BindlessHandle::NULL.slot(), 0);
        assert_eq!(BindlessHandle::from_raw(handle.raw()), handle);
    }
}
