use crate::shaders;
use crate::uniforms::{
    InstanceData, OutputUniforms, PixelateUniforms, SceneUniforms, ShadowUniforms, Vertex,
};
use glam::Mat4;
use pixelgrid_common::{BlockGrid, ObjectId, Viewport};
use pixelgrid_kernel::Shape;
use pixelgrid_render::{
    FrameContext, LightViews, MeshData, RenderError, SPOT_SHADOW_SIZE, SUN_SHADOW_SIZE,
};
use std::collections::BTreeMap;
use wgpu::util::DeviceExt;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const BLOCK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuMesh {
    shape: Shape,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, shape: Shape) -> Self {
        let mesh = MeshData::for_shape(&shape);
        let vertices: Vec<Vertex> = mesh.vertices.iter().map(Vertex::from).collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertex_buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            shape,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Depth map rendered from one light, with the uniforms of its pass.
struct ShadowTarget {
    label: &'static str,
    view: wgpu::TextureView,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ShadowTarget {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        size: u32,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let view = create_target(
            device,
            label,
            size,
            size,
            SHADOW_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<ShadowUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        Self {
            label,
            view,
            uniforms,
            bind_group,
        }
    }
}

/// Full-resolution scene targets plus the block texture, with the bind
/// groups that read them. Rebuilt together whenever the viewport or the block
/// size changes.
struct Targets {
    viewport: Viewport,
    grid: BlockGrid,
    color: wgpu::TextureView,
    normal: wgpu::TextureView,
    linear_depth: wgpu::TextureView,
    depth: wgpu::TextureView,
    blocks: wgpu::TextureView,
    pixelate_bind_group: wgpu::BindGroup,
    output_bind_group: wgpu::BindGroup,
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn shadow_map_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
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

fn clear_color(rgb: [f64; 3], a: f64) -> wgpu::Color {
    wgpu::Color {
        r: rgb[0],
        g: rgb[1],
        b: rgb[2],
        a,
    }
}

/// wgpu implementation of the pixel pipeline: shadow passes for the sun and
/// spot, scene pass into color, normal and linear depth targets, block pass
/// with edge darkening, then the upscale and output encode into the surface.
pub struct PixelRenderer {
    shadow_pipeline: wgpu::RenderPipeline,
    sun_shadow: ShadowTarget,
    spot_shadow: ShadowTarget,
    shadow_maps_bind_group: wgpu::BindGroup,
    scene_pipeline: wgpu::RenderPipeline,
    pixelate_pipeline: wgpu::RenderPipeline,
    output_pipeline: wgpu::RenderPipeline,
    scene_uniforms: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    pixelate_uniforms: wgpu::Buffer,
    pixelate_layout: wgpu::BindGroupLayout,
    output_uniforms: wgpu::Buffer,
    output_layout: wgpu::BindGroupLayout,
    meshes: BTreeMap<ObjectId, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    max_instances: u32,
    targets: Targets,
    allocations: u64,
    max_dimension: u32,
    surface_format: wgpu::TextureFormat,
}

impl PixelRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        viewport: Viewport,
        block_size: u32,
    ) -> Result<Self, RenderError> {
        let max_dimension = device.limits().max_texture_dimension_2d;
        check_size(viewport, max_dimension)?;

        // Shadow passes
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let sun_shadow = ShadowTarget::new(
            device,
            "sun_shadow",
            SUN_SHADOW_SIZE.min(max_dimension),
            &shadow_layout,
        );
        let spot_shadow = ShadowTarget::new(
            device,
            "spot_shadow",
            SPOT_SHADOW_SIZE.min(max_dimension),
            &shadow_layout,
        );
        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SHADOW_SHADER.into()),
        });
        let shadow_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shadow_pipeline_layout"),
                bind_group_layouts: &[&shadow_layout],
                push_constant_ranges: &[],
            });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs_shadow"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: None,
            // Back faces only, so lit surfaces never shadow themselves.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let shadow_maps_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_maps_bind_group_layout"),
            entries: &[
                shadow_map_entry(0),
                shadow_map_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let shadow_maps_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_maps_bind_group"),
            layout: &shadow_maps_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&sun_shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&spot_shadow.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        // Scene pass
        let scene_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_uniforms.as_entire_binding(),
            }],
        });
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });
        let scene_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&scene_layout, &shadow_maps_layout],
            push_constant_ranges: &[],
        });
        // R32Float is not blendable, so none of the scene targets blend.
        let target = |format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };
        let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&scene_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &scene_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x4,
                            7 => Float32x4,
                            8 => Float32x4,
                            9 => Float32x4,
                            10 => Float32x4,
                            11 => Float32x4,
                            12 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &scene_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[
                    target(COLOR_FORMAT),
                    target(NORMAL_FORMAT),
                    target(LINEAR_DEPTH_FORMAT),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        // Pixelate pass
        let pixelate_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixelate_uniforms"),
            size: std::mem::size_of::<PixelateUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let pixelate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pixelate_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
            ],
        });
        let pixelate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pixelate_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::pixelate_shader().into()),
        });
        let pixelate_pipeline = fullscreen_pipeline(
            device,
            "pixelate_pipeline",
            &pixelate_layout,
            &pixelate_shader,
            "fs_pixelate",
            BLOCK_FORMAT,
        );

        // Output pass
        let output_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output_uniforms"),
            size: std::mem::size_of::<OutputUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("output_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT), texture_entry(1)],
        });
        let output_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("output_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::output_shader().into()),
        });
        let output_entry = if surface_format.is_srgb() {
            "fs_output"
        } else {
            "fs_output_encode"
        };
        let output_pipeline = fullscreen_pipeline(
            device,
            "output_pipeline",
            &output_layout,
            &output_shader,
            output_entry,
            surface_format,
        );

        // Instance buffer (pre-allocated)
        let max_instances = 1_024u32;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (max_instances as u64) * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let grid = BlockGrid::for_viewport(viewport, block_size);
        let targets = Self::create_targets(
            device,
            viewport,
            grid,
            &pixelate_layout,
            &pixelate_uniforms,
            &output_layout,
            &output_uniforms,
        );

        Ok(Self {
            shadow_pipeline,
            sun_shadow,
            spot_shadow,
            shadow_maps_bind_group,
            scene_pipeline,
            pixelate_pipeline,
            output_pipeline,
            scene_uniforms,
            scene_bind_group,
            pixelate_uniforms,
            pixelate_layout,
            output_uniforms,
            output_layout,
            meshes: BTreeMap::new(),
            instance_buffer,
            max_instances,
            targets,
            allocations: 1,
            max_dimension,
            surface_format,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// How many times the intermediate targets have been built.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Resize the intermediate targets for a new viewport, keeping the
    /// current block size.
    pub fn resize(&mut self, device: &wgpu::Device, viewport: Viewport) -> Result<(), RenderError> {
        self.ensure_targets(device, viewport, self.targets.grid.block_size)
            .map(|_| ())
    }

    /// Rebuild the targets if the viewport or block size changed. Returns true
    /// when they were rebuilt.
    pub fn ensure_targets(
        &mut self,
        device: &wgpu::Device,
        viewport: Viewport,
        block_size: u32,
    ) -> Result<bool, RenderError> {
        check_size(viewport, self.max_dimension)?;
        let grid = BlockGrid::for_viewport(viewport, block_size);
        if viewport == self.targets.viewport && grid == self.targets.grid {
            return Ok(false);
        }
        self.targets = Self::create_targets(
            device,
            viewport,
            grid,
            &self.pixelate_layout,
            &self.pixelate_uniforms,
            &self.output_layout,
            &self.output_uniforms,
        );
        self.allocations += 1;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            columns = grid.columns,
            rows = grid.rows,
            "gpu pixel targets rebuilt"
        );
        Ok(true)
    }

    /// Record the passes of one frame into `encoder`, finishing in `output`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        ctx: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        self.ensure_targets(device, ctx.viewport, ctx.grid.block_size)?;

        let views = LightViews::for_scene(ctx.scene);
        queue.write_buffer(
            &self.scene_uniforms,
            0,
            bytemuck::bytes_of(&SceneUniforms::new(ctx.camera, &ctx.scene.lighting, &views)),
        );
        for (target, view) in [(&self.sun_shadow, views.sun), (&self.spot_shadow, views.spot)] {
            if let Some(view) = view {
                queue.write_buffer(
                    &target.uniforms,
                    0,
                    bytemuck::bytes_of(&ShadowUniforms::new(view)),
                );
            }
        }
        queue.write_buffer(
            &self.pixelate_uniforms,
            0,
            bytemuck::bytes_of(&PixelateUniforms::new(ctx.grid, ctx.config)),
        );
        queue.write_buffer(
            &self.output_uniforms,
            0,
            bytemuck::bytes_of(&OutputUniforms::new(ctx.grid, ctx.scene.background)),
        );

        // Build instance data and refresh the mesh cache
        let objects = ctx.scene.objects();
        self.meshes.retain(|id, _| objects.contains_key(id));
        let mut draws: Vec<(ObjectId, bool)> = Vec::new();
        let mut instances: Vec<InstanceData> = Vec::new();
        for (id, object) in objects {
            if instances.len() >= self.max_instances as usize {
                tracing::warn!(max = self.max_instances, "instance buffer full, objects dropped");
                break;
            }
            let stale = self
                .meshes
                .get(id)
                .is_none_or(|mesh| mesh.shape != object.shape);
            if stale {
                self.meshes.insert(*id, GpuMesh::upload(device, object.shape));
            }
            draws.push((*id, object.shadows.cast));
            instances.push(InstanceData::from(object));
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        self.encode_shadow(encoder, &self.sun_shadow, views.sun, &draws);
        self.encode_shadow(encoder, &self.spot_shadow, views.spot, &draws);

        let bg = ctx.scene.background.as_dvec3().to_array();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.color,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_color(bg, 1.0)),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.normal,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_color([0.0, 0.0, 1.0], 1.0)),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.linear_depth,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_color(
                                [f64::from(ctx.camera.far), 0.0, 0.0],
                                1.0,
                            )),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.scene_pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            pass.set_bind_group(1, &self.shadow_maps_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (slot, (id, _)) in draws.iter().enumerate() {
                let Some(mesh) = self.meshes.get(id) else {
                    continue;
                };
                let slot = slot as u32;
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..mesh.index_count, 0, slot..slot + 1);
            }
        }

        // A degenerate grid has no blocks; the output pass fills with background.
        if !ctx.grid.is_degenerate() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pixelate_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.blocks,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.pixelate_pipeline);
            pass.set_bind_group(0, &self.targets.pixelate_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("output_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(bg, 1.0)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.output_pipeline);
            pass.set_bind_group(0, &self.targets.output_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        Ok(())
    }

    /// Depth pass from one light over every shadow caster. Skipped when the
    /// light casts no shadow this frame.
    fn encode_shadow(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &ShadowTarget,
        view: Option<Mat4>,
        draws: &[(ObjectId, bool)],
    ) {
        if view.is_none() {
            return;
        }
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(target.label),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_pipeline(&self.shadow_pipeline);
        pass.set_bind_group(0, &target.bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (slot, (id, cast)) in draws.iter().enumerate() {
            if !cast {
                continue;
            }
            let Some(mesh) = self.meshes.get(id) else {
                continue;
            };
            let slot = slot as u32;
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, slot..slot + 1);
        }
    }

    fn create_targets(
        device: &wgpu::Device,
        viewport: Viewport,
        grid: BlockGrid,
        pixelate_layout: &wgpu::BindGroupLayout,
        pixelate_uniforms: &wgpu::Buffer,
        output_layout: &wgpu::BindGroupLayout,
        output_uniforms: &wgpu::Buffer,
    ) -> Targets {
        let sampled =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let (w, h) = (viewport.width, viewport.height);
        let color = create_target(device, "scene_color", w, h, COLOR_FORMAT, sampled);
        let normal = create_target(device, "scene_normal", w, h, NORMAL_FORMAT, sampled);
        let linear_depth =
            create_target(device, "scene_linear_depth", w, h, LINEAR_DEPTH_FORMAT, sampled);
        let depth = create_target(
            device,
            "scene_depth",
            w,
            h,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        // Degenerate grids still get a 1x1 texture so the output bind group is valid.
        let blocks = create_target(
            device,
            "pixel_blocks",
            grid.columns,
            grid.rows,
            BLOCK_FORMAT,
            sampled,
        );

        let pixelate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixelate_bind_group"),
            layout: pixelate_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pixelate_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&color),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&linear_depth),
                },
            ],
        });
        let output_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("output_bind_group"),
            layout: output_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: output_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&blocks),
                },
            ],
        });

        Targets {
            viewport,
            grid,
            color,
            normal,
            linear_depth,
            depth,
            blocks,
            pixelate_bind_group,
            output_bind_group,
        }
    }
}

fn check_size(viewport: Viewport, max: u32) -> Result<(), RenderError> {
    if viewport.width > max || viewport.height > max {
        return Err(RenderError::TargetTooLarge {
            width: viewport.width,
            height: viewport.height,
            max,
        });
    }
    Ok(())
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}
