mod capture_target;
mod mesh_library;
mod mipmap;
pub mod readback;
mod window_surface;

pub use capture_target::{CaptureColor, CaptureTarget};
pub use mesh_library::{GpuMesh, MeshLibrary};
pub use mipmap::{full_mip_count, MipGenerator};
pub use window_surface::{SurfaceFrame, WindowSurface};

use anyhow::{Context, Result};
use std::cell::OnceCell;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of every baked environment cubemap.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEFAULT_SPHERE_SEGMENTS: u32 = 64;

/// Device, queue and the lazily built shared meshes. Passed by reference through setup and every frame.
pub struct RenderContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    meshes: MeshLibrary,
    mips: OnceCell<MipGenerator>,
    bindless_supported: bool,
}

impl RenderContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, bindless_supported: bool, sphere_segments: u32) -> Self {
        Self { device, queue, meshes: MeshLibrary::new(sphere_segments), mips: OnceCell::new(), bindless_supported }
    }

    /// Windowless context for offline bakes and tests.
    pub fn headless() -> Result<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .context("Failed to request headless adapter")?;
            let (device, queue, bindless) = request_device(&adapter, "Headless Device").await?;
            Ok(Self::new(device, queue, bindless, DEFAULT_SPHERE_SEGMENTS))
        })
    }

    /// True when the device exposes sampled texture binding arrays.
    pub fn bindless_supported(&self) -> bool {
        self.bindless_supported
    }

    pub fn unit_cube(&self) -> &GpuMesh {
        self.meshes.cube(&self.device)
    }

    pub fn unit_sphere(&self) -> &GpuMesh {
        self.meshes.sphere(&self.device)
    }

    pub fn unit_quad(&self) -> &GpuMesh {
        self.meshes.quad(&self.device)
    }

    /// Regenerates mips 1.. of every layer from mip 0.
    pub fn generate_mipmaps(&self, texture: &wgpu::Texture) {
        self.mips.get_or_init(|| MipGenerator::new(&self.device)).generate(self, texture);
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) -> wgpu::SubmissionIndex {
        self.queue.submit(std::iter::once(encoder.finish()))
    }
}

/// Requests a device with binding-array support when the adapter offers it.
pub(crate) async fn request_device(
    adapter: &wgpu::Adapter,
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue, bool)> {
    let adapter_features = adapter.features();
    let bindless = adapter_features.contains(wgpu::Features::TEXTURE_BINDING_ARRAY);
    let mut required_features = wgpu::Features::empty();
    if bindless {
        required_features |= wgpu::Features::TEXTURE_BINDING_ARRAY;
    }
    let non_uniform = wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING;
    if bindless && adapter_features.contains(non_uniform) {
        required_features |= non_uniform;
    }
    let mut required_limits = adapter.limits();
    required_limits.max_storage_buffers_per_shader_stage =
        required_limits.max_storage_buffers_per_shader_stage.max(1);
    let device_desc = wgpu::DeviceDescriptor {
        label: Some(label),
        required_features,
        required_limits,
        experimental_features: wgpu::ExperimentalFeatures::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: wgpu::Trace::default(),
    };
    let (device, queue) = adapter.request_device(&device_desc).await.context("Failed to request WGPU device")?;
    log::info!(
        target: "renderer",
        "Using adapter '{}' ({:?}); texture binding arrays: {bindless}",
        adapter.get_info().name,
        adapter.get_info().backend
    );
    Ok((device, queue, bindless))
}

/// Builds one WGSL module from source fragments joined in order.
pub(crate) fn create_shader(device: &wgpu::Device, label: &str, sources: &[&str]) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(sources.join("\n").into()),
    })
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

pub(crate) fn linear_sampler(device: &wgpu::Device, label: &str, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Cube-view of a six-layer texture covering all of its mips.
pub(crate) fn cube_view(texture: &wgpu::Texture, label: &str) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        array_layer_count: Some(6),
        ..Default::default()
    })
}

/// Render pipeline shared shape: one color target, optional depth, no culling.
pub(crate) struct PipelineSpec<'a> {
    pub label: &'a str,
    pub layout: &'a wgpu::PipelineLayout,
    pub shader: &'a wgpu::ShaderModule,
    pub vertex_layout: wgpu::VertexBufferLayout<'a>,
    pub topology: wgpu::PrimitiveTopology,
    pub color_format: wgpu::TextureFormat,
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub depth_write: bool,
    pub sample_count: u32,
}

pub(crate) fn create_pipeline(device: &wgpu::Device, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    let strip_index_format = match spec.topology {
        wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip => {
            Some(wgpu::IndexFormat::Uint32)
        }
        _ => None,
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some("vs_main"),
            buffers: &[spec.vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: spec.depth_compare.map(|depth_compare| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState { count: spec.sample_count, ..Default::default() },
        multiview: None,
        cache: None,
    })
}
