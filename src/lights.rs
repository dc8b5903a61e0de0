use crate::config::LightConfig;
use bytemuck::{Pod, Zeroable};

pub const LIGHT_CAPACITY: usize = 6;
pub const LIGHT_BINDING: u32 = 2;

/// One `Light_Data` element: two vec4-aligned fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightEntry {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<LightEntry>() == 32);

pub type LightBlock = [LightEntry; LIGHT_CAPACITY];

/// Static light set plus the sinusoidal sway applied along +X.
#[derive(Debug, Clone)]
pub struct LightAnimator {
    lights: Vec<LightConfig>,
    frequency: f32,
    amplitude: f32,
}

impl LightAnimator {
    pub fn new(lights: &[LightConfig], frequency: f32, amplitude: f32) -> Self {
        if lights.len() > LIGHT_CAPACITY {
            log::warn!(target: "lights", "Only the first {LIGHT_CAPACITY} of {} lights are uploaded", lights.len());
        }
        Self { lights: lights.iter().take(LIGHT_CAPACITY).copied().collect(), frequency, amplitude }
    }

    /// The whole block at `elapsed` seconds; unused entries stay zero.
    pub fn block_at(&self, elapsed: f32) -> LightBlock {
        let offset = (elapsed * self.frequency).sin() * self.amplitude;
        let mut block = LightBlock::default();
        for (entry, light) in block.iter_mut().zip(&self.lights) {
            let [x, y, z] = light.position;
            let [r, g, b] = light.color;
            *entry = LightEntry { position: [x + offset, y, z, 0.0], color: [r, g, b, 0.0] };
        }
        block
    }
}

/// Read-only storage buffer the shading pass iterates.
pub struct LightBuffer {
    buffer: wgpu::Buffer,
}

impl LightBuffer {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light_Data"),
            size: std::mem::size_of::<LightBlock>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    /// Replaces all entries.
    pub fn write(&self, queue: &wgpu::Queue, block: &LightBlock) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(block));
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}
