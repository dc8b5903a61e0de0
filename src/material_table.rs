//! `pbrMaterial`: eight 64-bit texture handles in one uniform block, rewritten before every draw.

use crate::renderer::{sampler_entry, RenderContext};
use crate::textures::{BindlessHandle, ResidentTextureSet, MAX_RESIDENT_TEXTURES};
use bytemuck::{Pod, Zeroable};
use std::num::NonZeroU32;

pub const MATERIAL_TABLE_BINDING: u32 = 11;
pub const MATERIAL_TEXTURES_BINDING: u32 = 12;
pub const MATERIAL_SAMPLER_BINDING: u32 = 13;
pub const MATERIAL_SLOT_COUNT: usize = 8;
const HANDLE_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// Fixed slot order shared with the shading pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MaterialSlot {
    Albedo = 0,
    Normal = 1,
    Metallic = 2,
    Roughness = 3,
    Ao = 4,
    BrdfAvg = 5,
    BrdfMu = 6,
    Reserved = 7,
}

impl MaterialSlot {
    pub const fn byte_offset(self) -> u64 {
        self as u64 * HANDLE_SIZE
    }
}

/// CPU image of the block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MaterialHandles {
    pub handles: [u64; MATERIAL_SLOT_COUNT],
}

const _: () = assert!(std::mem::size_of::<MaterialHandles>() == 64);

impl MaterialHandles {
    pub fn get(&self, slot: MaterialSlot) -> BindlessHandle {
        BindlessHandle::from_raw(self.handles[slot as usize])
    }
}

/// An object's five maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialSet {
    pub albedo: BindlessHandle,
    pub normal: BindlessHandle,
    pub metallic: BindlessHandle,
    pub roughness: BindlessHandle,
    pub ao: BindlessHandle,
}

impl MaterialSet {
    pub fn load(ctx: &RenderContext, textures: &mut ResidentTextureSet, paths: &crate::config::MaterialPaths) -> Self {
        Self {
            albedo: textures.load(ctx, &paths.albedo),
            normal: textures.load(ctx, &paths.normal),
            metallic: textures.load(ctx, &paths.metallic),
            roughness: textures.load(ctx, &paths.roughness),
            ao: textures.load(ctx, &paths.ao),
        }
    }
}

/// The two Kulla-Conty tables every object shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedLuts {
    pub brdf_avg: BindlessHandle,
    pub brdf_mu: BindlessHandle,
}

/// Destination of byte-range writes into the block.
pub trait HandleRangeWriter {
    fn write_range(&mut self, offset: u64, bytes: &[u8]);
}

impl HandleRangeWriter for [u8] {
    fn write_range(&mut self, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        self[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl HandleRangeWriter for Vec<u8> {
    fn write_range(&mut self, offset: u64, bytes: &[u8]) {
        self.as_mut_slice().write_range(offset, bytes);
    }
}

/// Queued writes into a GPU buffer; visible from the next submission on.
pub struct QueueWriter<'a> {
    pub queue: &'a wgpu::Queue,
    pub buffer: &'a wgpu::Buffer,
}

impl HandleRangeWriter for QueueWriter<'_> {
    fn write_range(&mut self, offset: u64, bytes: &[u8]) {
        self.queue.write_buffer(self.buffer, offset, bytes);
    }
}

/// Writes slots 0..=6, one 8-byte range each. The reserved slot is never touched.
pub fn set_material<W: HandleRangeWriter + ?Sized>(writer: &mut W, material: &MaterialSet, luts: &SharedLuts) {
    let slots = [
        (MaterialSlot::Albedo, material.albedo),
        (MaterialSlot::Normal, material.normal),
        (MaterialSlot::Metallic, material.metallic),
        (MaterialSlot::Roughness, material.roughness),
        (MaterialSlot::Ao, material.ao),
        (MaterialSlot::BrdfAvg, luts.brdf_avg),
        (MaterialSlot::BrdfMu, luts.brdf_mu),
    ];
    for (slot, handle) in slots {
        writer.write_range(slot.byte_offset(), &handle.raw().to_le_bytes());
    }
}

/// GPU side of the block plus the group layout it is bound through (table, texture array, sampler).
pub struct MaterialHandleTable {
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
}

impl MaterialHandleTable {
    pub fn new(ctx: &RenderContext) -> Self {
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pbrMaterial"),
            size: std::mem::size_of::<MaterialHandles>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: MATERIAL_TABLE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<MaterialHandles>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: MATERIAL_TEXTURES_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: NonZeroU32::new(MAX_RESIDENT_TEXTURES as u32),
                },
                sampler_entry(MATERIAL_SAMPLER_BINDING),
            ],
        });
        Self { buffer, layout }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Queues the slot writes; call before the submission holding the consuming draw.
    pub fn set_material(&self, queue: &wgpu::Queue, material: &MaterialSet, luts: &SharedLuts) {
        set_material(&mut QueueWriter { queue, buffer: &self.buffer }, material, luts);
    }

    pub fn bind_group(&self, ctx: &RenderContext, textures: &ResidentTextureSet) -> wgpu::BindGroup {
        let views = textures.array_views();
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material BG"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: MATERIAL_TABLE_BINDING, resource: self.buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: MATERIAL_TEXTURES_BINDING,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
                wgpu::BindGroupEntry {
                    binding: MATERIAL_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(textures.sampler()),
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(raw: [u64; 5]) -> MaterialSet {
        let h = BindlessHandle::from_raw;
        MaterialSet { albedo: h(raw[0]), normal: h(raw[1]), metallic: h(raw[2]), roughness: h(raw[3]), ao: h(raw[4]) }
    }

    #[test]
    fn slot_offsets_are_eight_bytes_apart() {
        assert_eq!(MaterialSlot::Albedo.byte_offset(), 0);
        assert_eq!(MaterialSlot::BrdfMu.byte_offset(), 48);
        assert_eq!(MaterialSlot::Reserved.byte_offset(), 56);
    }

    #[test]
    fn set_material_round_trips_and_keeps_reserved_slot() {
        let mut block = vec![0xAB_u8; 64];
        let material = handles([0x1_0000_0001, 0x1_0000_0002, 0x1_0000_0003, 0x1_0000_0004, 0x1_0000_0005]);
        let luts = SharedLuts {
            brdf_avg: BindlessHandle::from_raw(0x1_0000_0006),
            brdf_mu: BindlessHandle::from_raw(0x1_0000_0007),
        };
        set_material(&mut block, &material, &luts);

        let decoded: MaterialHandles = bytemuck::pod_read_unaligned(&block);
        let expected = [0x1_0000_0001, 0x1_0000_0002, 0x1_0000_0003, 0x1_0000_0004, 0x1_0000_0005, 0x1_0000_0006, 0x1_0000_0007];
        assert_eq!(&decoded.handles[..7], &expected);
        assert_eq!(&block[56..], &[0xAB; 8]);
        assert_eq!(decoded.get(MaterialSlot::Roughness).slot(), 4);
    }

    #[test]
    fn rewriting_replaces_previous_material() {
        let mut block = [0u8; 64];
        let luts = SharedLuts::default();
        set_material(block.as_mut_slice(), &handles([1, 2, 3, 4, 5]), &luts);
        set_material(block.as_mut_slice(), &handles([9, 8, 7, 6, 5]), &luts);
        let decoded: MaterialHandles = bytemuck::pod_read_unaligned(&block);
        assert_eq!(decoded.handles, [9, 8, 7, 6, 5, 0, 0, 0]);
    }
}
