//! wgpu back-end for the splat pipeline.
//!
//! A frame is one command submission. Per view it runs the preprocessing
//! compute pass, then either an indexed + instanced draw with hardware
//! blending, or one accumulation compute pass per slot batch followed by a
//! resolve pass. Each view selects its uniforms by dynamic offset into a ring
//! of `frames_in_flight` uniform regions.

use crate::core::{SplatScene, ViewUniforms};
use crate::gpu::types::{AccumPixelGPU, BatchGPU, PreprocessedSplatGPU, UniformsGPU, UNIFORM_SLOT_SIZE};
use crate::gpu::{buffers, context::GpuContext, shaders, GpuError};
use crate::io::pack_scene;
use crate::render::{
    frame_uniforms, BlendMode, ColorDepth, Frame, FrameRing, FrameUniforms, InstancingLayout, PreprocessedSplat,
    RenderConfig, RenderError, MAX_VIEW_COUNT,
};
use half::f16;
use nalgebra::Vector4;
use std::num::NonZeroU64;
use std::time::Instant;
use tracing::{debug, info};
use wgpu::{BindGroup, BindGroupLayout, Buffer, BufferUsages, ComputePipeline, RenderPipeline, Texture};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const COLOR_BYTES_PER_PIXEL: u32 = 8;
const DEPTH_BYTES_PER_PIXEL: u32 = 4;

const PREPROCESS_WORKGROUP_SIZE: u32 = 256;
const PIXEL_WORKGROUP_SIZE: u32 = 8;
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535;

/// A scene uploaded to the device, ready to draw with the renderer that
/// created it.
pub struct GpuScene {
    layout: InstancingLayout,
    chunk_count: u32,
    quad_indices: Buffer,
    scene_group: BindGroup,
}

impl GpuScene {
    pub fn layout(&self) -> &InstancingLayout {
        &self.layout
    }

    pub fn splat_count(&self) -> u32 {
        self.layout.splat_count
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }
}

/// Per-view render targets and readback buffers.
enum ViewTarget {
    Hardware {
        color: Texture,
        depth: Texture,
        color_staging: Buffer,
        depth_staging: Buffer,
        draw_group: BindGroup,
    },
    Accumulation {
        accum: Buffer,
        staging: Buffer,
        accumulate_group: BindGroup,
        resolve_group: BindGroup,
    },
}

pub struct GpuRenderer {
    ctx: GpuContext,
    config: RenderConfig,

    scene_layout: BindGroupLayout,
    preprocess_layout: BindGroupLayout,
    draw_layout: BindGroupLayout,
    accumulate_layout: BindGroupLayout,
    resolve_layout: BindGroupLayout,

    preprocess_pipeline: ComputePipeline,
    draw_pipeline: RenderPipeline,
    accumulate_pipeline: ComputePipeline,
    resolve_pipeline: ComputePipeline,

    uniform_buffer: Buffer,

    /// Byte offset of each frame's uniform region
    ring: FrameRing<u64>,
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Uniform binding addressed by dynamic offset, one 256-byte slot wide.
fn dynamic_uniform_entry(binding: u32, visibility: wgpu::ShaderStages, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

fn uniform_slot(buffer: &Buffer) -> wgpu::BindingResource<'_> {
    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
        buffer,
        offset: 0,
        size: NonZeroU64::new(UNIFORM_SLOT_SIZE),
    })
}

/// 1D slot count → 2D workgroup grid; the shader flattens it back.
fn preprocess_grid(slots: u32) -> (u32, u32) {
    let groups = slots.div_ceil(PREPROCESS_WORKGROUP_SIZE).max(1);
    let x = groups.min(MAX_WORKGROUPS_PER_DIMENSION);
    (x, groups.div_ceil(x))
}

/// Slot ranges of the accumulation passes, in submission order.
fn accumulation_batches(splat_count: u32, batch_size: u32) -> Vec<BatchGPU> {
    let batch_size = batch_size.max(1);
    (0..splat_count.div_ceil(batch_size).max(1))
        .map(|i| {
            let start = i * batch_size;
            BatchGPU::new(start, (start + batch_size).min(splat_count), 0)
        })
        .collect()
}

fn decode_hardware(color: &[u8], depth: &[u8], width: u32, height: u32) -> Vec<ColorDepth> {
    let color_row = buffers::padded_bytes_per_row(width, COLOR_BYTES_PER_PIXEL) as usize;
    let depth_row = buffers::padded_bytes_per_row(width, DEPTH_BYTES_PER_PIXEL) as usize;
    let (width, height) = (width as usize, height as usize);

    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let c = &color[y * color_row + x * 8..][..8];
            let channel = |i: usize| f16::from_le_bytes([c[2 * i], c[2 * i + 1]]).to_f32();
            let d = &depth[y * depth_row + x * 4..][..4];
            pixels.push(ColorDepth::new(
                Vector4::new(channel(0), channel(1), channel(2), channel(3)),
                f32::from_le_bytes([d[0], d[1], d[2], d[3]]),
            ));
        }
    }
    pixels
}

impl GpuRenderer {
    /// Create the device, layouts, pipelines and uniform ring.
    pub fn new(config: RenderConfig) -> Result<Self, GpuError> {
        config
            .validate()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        let ctx = GpuContext::new_blocking()?;
        let device = &ctx.device;

        let preprocess_shader = shaders::create_preprocess_shader(device);
        let splat_shader = shaders::create_splat_shader(device);
        let accumulate_shader = shaders::create_accumulate_shader(device);
        let resolve_shader = shaders::create_resolve_shader(device);

        let all_stages = wgpu::ShaderStages::VERTEX_FRAGMENT | wgpu::ShaderStages::COMPUTE;
        let scene_stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::COMPUTE;
        let compute = wgpu::ShaderStages::COMPUTE;

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                // Per-view uniforms
                dynamic_uniform_entry(0, all_stages, UNIFORM_SLOT_SIZE),
                // Splats, chunk table, splat index, SH coefficients
                storage_entry(1, scene_stages, true),
                storage_entry(2, scene_stages, true),
                storage_entry(3, scene_stages, true),
                storage_entry(4, scene_stages, true),
            ],
        });

        let preprocess_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Preprocess Bind Group Layout"),
            entries: &[storage_entry(0, compute, false)],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[storage_entry(0, wgpu::ShaderStages::VERTEX, true)],
        });

        let batch_size = 4 * std::mem::size_of::<u32>() as u64;
        let accumulate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accumulate Bind Group Layout"),
            entries: &[
                storage_entry(0, compute, true),
                storage_entry(1, compute, false),
                dynamic_uniform_entry(2, compute, batch_size),
            ],
        });

        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Resolve Bind Group Layout"),
            entries: &[storage_entry(0, compute, false), dynamic_uniform_entry(1, compute, batch_size)],
        });

        let compute_pipeline = |label: &str, group1: &BindGroupLayout, module: &wgpu::ShaderModule, entry_point: &str| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&scene_layout, group1],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module,
                entry_point,
            })
        };

        let preprocess_pipeline =
            compute_pipeline("Preprocess Pipeline", &preprocess_layout, &preprocess_shader, "preprocess");
        let accumulate_pipeline =
            compute_pipeline("Accumulate Pipeline", &accumulate_layout, &accumulate_shader, "accumulate");
        let resolve_pipeline = compute_pipeline("Resolve Pipeline", &resolve_layout, &resolve_shader, "resolve");

        let draw_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Splat Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Splat Pipeline"),
            layout: Some(&draw_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &splat_shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &splat_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            // Last fragment wins, matching the unconditional depth write of
            // back-to-front blending.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let frame_stride = MAX_VIEW_COUNT as u64 * UNIFORM_SLOT_SIZE;
        let uniform_buffer = buffers::create_buffer(
            device,
            "Uniform Ring Buffer",
            config.frames_in_flight as u64 * frame_stride,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        );
        let ring = FrameRing::new(config.frames_in_flight, |i| i as u64 * frame_stride);

        info!(
            blend_mode = ?config.blend_mode,
            frames_in_flight = config.frames_in_flight,
            "gpu renderer ready"
        );

        Ok(Self {
            ctx,
            config,
            scene_layout,
            preprocess_layout,
            draw_layout,
            accumulate_layout,
            resolve_layout,
            preprocess_pipeline,
            draw_pipeline,
            accumulate_pipeline,
            resolve_pipeline,
            uniform_buffer,
            ring,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn frames_rendered(&self) -> u64 {
        self.ring.frame()
    }

    fn check_size(&self, label: &'static str, size: u64) -> Result<(), GpuError> {
        let limit = self.ctx.device.limits().max_storage_buffer_binding_size as u64;
        if size > limit {
            return Err(GpuError::BufferTooLarge { label, size, limit });
        }
        Ok(())
    }

    /// Pack and upload a scene.
    pub fn upload(&self, scene: &SplatScene) -> Result<GpuScene, GpuError> {
        let packed = pack_scene(scene);
        self.check_size("splat buffer", packed.splats.len() as u64)?;
        self.check_size("splat index", packed.splat_index.len() as u64)?;
        self.check_size("SH buffer", packed.sh_coefficients.len() as u64)?;

        let device = &self.ctx.device;
        let layout = InstancingLayout::new(packed.splat_count, self.config.max_indexed_splat_count);

        let splats = buffers::create_word_buffer(device, "Splat Buffer", &packed.splats, BufferUsages::STORAGE);
        let chunk_table =
            buffers::create_word_buffer(device, "Chunk Table Buffer", &packed.chunk_table, BufferUsages::STORAGE);
        let splat_index =
            buffers::create_word_buffer(device, "Splat Index Buffer", &packed.splat_index, BufferUsages::STORAGE);
        let sh = buffers::create_word_buffer(device, "SH Buffer", &packed.sh_coefficients, BufferUsages::STORAGE);
        let quad_indices =
            buffers::create_buffer_init(device, "Quad Index Buffer", &layout.index_buffer(), BufferUsages::INDEX);

        let scene_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &self.scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_slot(&self.uniform_buffer),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: splats.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: chunk_table.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: splat_index.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: sh.as_entire_binding(),
                },
            ],
        });

        info!(
            splats = layout.splat_count,
            chunks = packed.chunk_count(),
            indexed = layout.indexed_splat_count,
            instances = layout.instance_count,
            "uploaded scene"
        );

        Ok(GpuScene {
            layout,
            chunk_count: packed.chunk_count(),
            quad_indices,
            scene_group,
        })
    }

    /// Validate views and write their uniforms into the next ring region.
    /// Returns the uniforms and each view's dynamic offset.
    fn begin_frame(&mut self, scene: &GpuScene, views: &[ViewUniforms]) -> Result<(Vec<FrameUniforms>, Vec<u32>), GpuError> {
        let uniforms = frame_uniforms(views, &scene.layout, scene.chunk_count, self.config.bounds_radius)?;
        let (ring_slot, base) = self.ring.next_slot();
        let base = *base;

        let records: Vec<UniformsGPU> = uniforms
            .iter()
            .map(|u| UniformsGPU::from_frame(u, self.config.background))
            .collect();
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, base, bytemuck::cast_slice(&records));
        debug!(ring_slot, views = uniforms.len(), "gpu frame");

        let offsets = (0..uniforms.len())
            .map(|i| (base + i as u64 * UNIFORM_SLOT_SIZE) as u32)
            .collect();
        Ok((uniforms, offsets))
    }

    /// Per-view preprocessed buffer plus its write binding.
    fn create_preprocessed(&self, scene: &GpuScene, view_count: usize) -> Result<(Buffer, BindGroup), GpuError> {
        let size = view_count as u64 * scene.layout.splat_count as u64
            * std::mem::size_of::<PreprocessedSplatGPU>() as u64;
        self.check_size("preprocessed buffer", size)?;

        let buffer = buffers::create_buffer(
            &self.ctx.device,
            "Preprocessed Buffer",
            size,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        );
        let group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Preprocess Bind Group"),
            layout: &self.preprocess_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Ok((buffer, group))
    }

    fn encode_preprocess(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &GpuScene,
        preprocess_group: &BindGroup,
        offset: u32,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Preprocess Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.preprocess_pipeline);
        pass.set_bind_group(0, &scene.scene_group, &[offset]);
        pass.set_bind_group(1, preprocess_group, &[]);
        let (x, y) = preprocess_grid(scene.layout.splat_count);
        pass.dispatch_workgroups(x, y, 1);
    }

    fn create_target(&self, uniforms: &FrameUniforms, preprocessed: &Buffer, batches: &Buffer) -> Result<ViewTarget, GpuError> {
        let device = &self.ctx.device;
        let (width, height) = (uniforms.view.width(), uniforms.view.height());

        match self.config.blend_mode {
            BlendMode::HardwareBlend => {
                let texture = |label: &str, format: wgpu::TextureFormat| {
                    device.create_texture(&wgpu::TextureDescriptor {
                        label: Some(label),
                        size: wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                        view_formats: &[],
                    })
                };
                let color_size =
                    buffers::padded_bytes_per_row(width, COLOR_BYTES_PER_PIXEL) as u64 * height as u64;
                let depth_size =
                    buffers::padded_bytes_per_row(width, DEPTH_BYTES_PER_PIXEL) as u64 * height as u64;

                Ok(ViewTarget::Hardware {
                    color: texture("Color Target", COLOR_FORMAT),
                    depth: texture("Depth Target", DEPTH_FORMAT),
                    color_staging: buffers::create_staging_buffer(device, "Color Staging", color_size),
                    depth_staging: buffers::create_staging_buffer(device, "Depth Staging", depth_size),
                    draw_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Draw Bind Group"),
                        layout: &self.draw_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: preprocessed.as_entire_binding(),
                        }],
                    }),
                })
            }
            BlendMode::MultiPassAccumulation => {
                let size = width as u64 * height as u64 * std::mem::size_of::<AccumPixelGPU>() as u64;
                self.check_size("accumulation buffer", size)?;
                let accum = buffers::create_buffer(
                    device,
                    "Accumulation Buffer",
                    size,
                    BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
                );

                let accumulate_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Accumulate Bind Group"),
                    layout: &self.accumulate_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: preprocessed.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: accum.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: uniform_slot(batches),
                        },
                    ],
                });
                let resolve_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Resolve Bind Group"),
                    layout: &self.resolve_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: accum.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: uniform_slot(batches),
                        },
                    ],
                });

                Ok(ViewTarget::Accumulation {
                    staging: buffers::create_staging_buffer(device, "Accumulation Staging", size),
                    accum,
                    accumulate_group,
                    resolve_group,
                })
            }
        }
    }

    fn encode_view(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &GpuScene,
        uniforms: &FrameUniforms,
        offset: u32,
        target: &ViewTarget,
        batch_count: usize,
    ) {
        let (width, height) = (uniforms.view.width(), uniforms.view.height());
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        match target {
            ViewTarget::Hardware {
                color,
                depth,
                color_staging,
                depth_staging,
                draw_group,
            } => {
                let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
                let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
                let [r, g, b, a] = self.config.background.map(f64::from);
                {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Splat Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &color_view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &depth_view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(0.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_pipeline(&self.draw_pipeline);
                    pass.set_bind_group(0, &scene.scene_group, &[offset]);
                    pass.set_bind_group(1, draw_group, &[]);
                    pass.set_index_buffer(scene.quad_indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..scene.layout.index_count(), 0, 0..scene.layout.instance_count);
                }

                for (texture, staging, aspect, bytes_per_pixel) in [
                    (color, color_staging, wgpu::TextureAspect::All, COLOR_BYTES_PER_PIXEL),
                    (depth, depth_staging, wgpu::TextureAspect::DepthOnly, DEPTH_BYTES_PER_PIXEL),
                ] {
                    encoder.copy_texture_to_buffer(
                        wgpu::ImageCopyTexture {
                            texture,
                            mip_level: 0,
                            origin: wgpu::Origin3d::ZERO,
                            aspect,
                        },
                        wgpu::ImageCopyBuffer {
                            buffer: staging,
                            layout: wgpu::ImageDataLayout {
                                offset: 0,
                                bytes_per_row: Some(buffers::padded_bytes_per_row(width, bytes_per_pixel)),
                                rows_per_image: Some(height),
                            },
                        },
                        extent,
                    );
                }
            }
            ViewTarget::Accumulation {
                accum,
                staging,
                accumulate_group,
                resolve_group,
            } => {
                encoder.clear_buffer(accum, 0, None);
                let groups = (width.div_ceil(PIXEL_WORKGROUP_SIZE), height.div_ceil(PIXEL_WORKGROUP_SIZE));

                // One pass per batch: pass boundaries order the batches.
                for batch in 0..batch_count {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Accumulate Pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.accumulate_pipeline);
                    pass.set_bind_group(0, &scene.scene_group, &[offset]);
                    pass.set_bind_group(1, accumulate_group, &[(batch as u64 * UNIFORM_SLOT_SIZE) as u32]);
                    pass.dispatch_workgroups(groups.0, groups.1, 1);
                }
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Resolve Pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.resolve_pipeline);
                    pass.set_bind_group(0, &scene.scene_group, &[offset]);
                    pass.set_bind_group(1, resolve_group, &[0]);
                    pass.dispatch_workgroups(groups.0, groups.1, 1);
                }
                encoder.copy_buffer_to_buffer(accum, 0, staging, 0, accum.size());
            }
        }
    }

    fn read_target(&self, target: &ViewTarget, width: u32, height: u32) -> Result<Vec<ColorDepth>, GpuError> {
        let device = &self.ctx.device;
        match target {
            ViewTarget::Hardware {
                color_staging,
                depth_staging,
                ..
            } => {
                let color = pollster::block_on(buffers::map_staging(device, color_staging))?;
                let depth = pollster::block_on(buffers::map_staging(device, depth_staging))?;
                Ok(decode_hardware(&color, &depth, width, height))
            }
            ViewTarget::Accumulation { staging, .. } => {
                let bytes = pollster::block_on(buffers::map_staging(device, staging))?;
                let pixels: Vec<AccumPixelGPU> = buffers::records_from_bytes(&bytes, (width * height) as usize);
                Ok(pixels.into_iter().map(ColorDepth::from).collect())
            }
        }
    }

    /// Render every view (one, or two for stereo) of `scene` in a single
    /// submission.
    ///
    /// Set SPLAT_GPU_TIMING=1 to log encode and readback times.
    pub fn render(&mut self, scene: &GpuScene, views: &[ViewUniforms]) -> Result<Vec<Frame>, GpuError> {
        let timing = std::env::var("SPLAT_GPU_TIMING").is_ok();
        let t_start = Instant::now();

        let (uniforms, offsets) = self.begin_frame(scene, views)?;
        let (preprocessed, preprocess_group) = self.create_preprocessed(scene, uniforms.len())?;

        let batches = accumulation_batches(scene.layout.splat_count, self.config.accumulation_batch_size);
        let batch_buffer = buffers::create_buffer_init(
            &self.ctx.device,
            "Batch Buffer",
            &batches,
            BufferUsages::UNIFORM,
        );

        let targets = uniforms
            .iter()
            .map(|u| self.create_target(u, &preprocessed, &batch_buffer))
            .collect::<Result<Vec<_>, _>>()?;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        for ((u, &offset), target) in uniforms.iter().zip(&offsets).zip(&targets) {
            self.encode_preprocess(&mut encoder, scene, &preprocess_group, offset);
            self.encode_view(&mut encoder, scene, u, offset, target, batches.len());
        }
        self.ctx.queue.submit(Some(encoder.finish()));

        if timing {
            info!(elapsed = ?t_start.elapsed(), "[GPU] frame encoded and submitted");
        }
        let t_read = Instant::now();

        let frames = uniforms
            .iter()
            .zip(&targets)
            .map(|(u, target)| {
                let (width, height) = (u.view.width(), u.view.height());
                Ok(Frame {
                    width,
                    height,
                    pixels: self.read_target(target, width, height)?,
                })
            })
            .collect::<Result<Vec<_>, GpuError>>()?;

        if timing {
            info!(
                readback = ?t_read.elapsed(),
                total = ?t_start.elapsed(),
                "[GPU] frame complete"
            );
        }
        Ok(frames)
    }

    /// Run only the preprocessing pass and read back each view's
    /// per-slot axes.
    pub fn preprocess(&mut self, scene: &GpuScene, views: &[ViewUniforms]) -> Result<Vec<Vec<PreprocessedSplat>>, GpuError> {
        let (uniforms, offsets) = self.begin_frame(scene, views)?;
        let (preprocessed, preprocess_group) = self.create_preprocessed(scene, uniforms.len())?;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Preprocess Encoder"),
            });
        for &offset in &offsets {
            self.encode_preprocess(&mut encoder, scene, &preprocess_group, offset);
        }
        self.ctx.queue.submit(Some(encoder.finish()));

        let slots = scene.layout.splat_count as usize;
        let records: Vec<PreprocessedSplatGPU> = buffers::read_buffer_blocking(
            &self.ctx.device,
            &self.ctx.queue,
            &preprocessed,
            uniforms.len() * slots,
        )?;
        Ok(records
            .chunks(slots.max(1))
            .map(|view| view.iter().copied().map(PreprocessedSplat::from).collect())
            .collect())
    }
}
