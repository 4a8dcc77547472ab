use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, Buffer, Device, RenderPipeline, TextureView};

use super::gpu_context::{GpuContext, SurfaceTarget};
use crate::error::Result;
use crate::scene::{ground_grid, Lighting, Material, MeshData};
use crate::traits::{DrawList, RenderBackend};
use crate::types::{CameraUniform, ModelUniform, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const GRID_SIZE: f32 = 20.0;
const GRID_DIVISIONS: u32 = 20;
const GRID_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LightsUniform {
    key: [f32; 4],
    fill: [f32; 4],
    ambient: [f32; 4],
}

impl From<&Lighting> for LightsUniform {
    fn from(lighting: &Lighting) -> Self {
        let light = |l: &crate::scene::DirectionalLight| {
            [l.position.x, l.position.y, l.position.z, l.intensity]
        };
        Self {
            key: light(&lighting.key),
            fill: light(&lighting.fill),
            ambient: [lighting.ambient, 0.0, 0.0, 0.0],
        }
    }
}

/// GPU buffers of one uploaded mesh
pub struct GpuMesh {
    vertex_buffer: Buffer,
    triangle_buffer: Buffer,
    edge_buffer: Buffer,
    triangle_index_count: u32,
    edge_index_count: u32,
    model_buffer: Buffer,
    model_bind_group: BindGroup,
    color: [f32; 4],
}

impl GpuMesh {
    pub fn triangle_count(&self) -> u32 {
        self.triangle_index_count / 3
    }

    fn destroy(self) {
        self.vertex_buffer.destroy();
        self.triangle_buffer.destroy();
        self.edge_buffer.destroy();
        self.model_buffer.destroy();
    }
}

struct GridLines {
    vertex_buffer: Buffer,
    vertex_count: u32,
    model_bind_group: BindGroup,
}

/// Rasterising backend drawing meshes and the ground grid to a window surface
pub struct WgpuBackend {
    gpu: GpuContext,
    surface: Option<SurfaceTarget>,
    depth_view: TextureView,
    fill_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,
    model_layout: BindGroupLayout,
    camera_buffer: Buffer,
    frame_bind_group: BindGroup,
    grid: GridLines,
    clear_color: wgpu::Color,
    size: (u32, u32),
    live_meshes: usize,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, surface: SurfaceTarget, lighting: &Lighting, clear_color: [f32; 3]) -> Self {
        let device = gpu.device();
        let size = surface.size();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../mesh.wgsl").into()),
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[uniform_entry(0)],
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::bytes_of(&LightsUniform::from(lighting)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let format = surface.format();
        let fill_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::TriangleList,
        );
        let line_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::LineList,
        );

        let depth_view = create_depth_view(device, size.0, size.1);

        let grid_vertices = ground_grid(GRID_SIZE, GRID_DIVISIONS);
        let grid_uniform = ModelUniform {
            transform: glam::Mat4::IDENTITY.to_cols_array_2d(),
            color: GRID_COLOR,
            params: [1.0, 0.0, 0.0, 0.0],
        };
        let grid_model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Model Buffer"),
            contents: bytemuck::bytes_of(&grid_uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let grid = GridLines {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Grid Vertex Buffer"),
                contents: bytemuck::cast_slice(&grid_vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            vertex_count: grid_vertices.len() as u32,
            model_bind_group: create_model_bind_group(device, &model_layout, &grid_model_buffer),
        };

        Self {
            clear_color: wgpu::Color {
                r: clear_color[0] as f64,
                g: clear_color[1] as f64,
                b: clear_color[2] as f64,
                a: 1.0,
            },
            gpu,
            surface: Some(surface),
            depth_view,
            fill_pipeline,
            line_pipeline,
            model_layout,
            camera_buffer,
            frame_bind_group,
            grid,
            size,
            live_meshes: 0,
        }
    }

    /// Meshes uploaded and not yet released
    pub fn live_meshes(&self) -> usize {
        self.live_meshes
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }
}

impl RenderBackend for WgpuBackend {
    type Mesh = GpuMesh;

    fn upload_mesh(&mut self, mesh: &MeshData, material: &Material) -> Result<GpuMesh> {
        let device = self.gpu.device();
        let label = mesh.name.as_str();
        let vertices = mesh.vertices();
        let edges = mesh.edge_indices();

        let model_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Buffer"),
            size: std::mem::size_of::<ModelUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let gpu_mesh = GpuMesh {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            triangle_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            edge_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&edges),
                usage: wgpu::BufferUsages::INDEX,
            }),
            triangle_index_count: mesh.indices.len() as u32,
            edge_index_count: edges.len() as u32,
            model_bind_group: create_model_bind_group(device, &self.model_layout, &model_buffer),
            model_buffer,
            color: material.base_color,
        };

        self.live_meshes += 1;
        log::debug!(
            "uploaded mesh '{}' ({} vertices, {} triangles), {} live",
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            self.live_meshes
        );
        Ok(gpu_mesh)
    }

    fn release_mesh(&mut self, mesh: GpuMesh) {
        mesh.destroy();
        self.live_meshes = self.live_meshes.saturating_sub(1);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(self.gpu.device(), width, height);
        }
        self.depth_view = create_depth_view(self.gpu.device(), width, height);
        self.size = (width, height);
    }

    fn aspect(&self) -> f32 {
        self.size.0.max(1) as f32 / self.size.1.max(1) as f32
    }

    fn draw(&mut self, list: &DrawList<'_, GpuMesh>) -> Result<()> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        let Some(frame) = surface.acquire(self.gpu.device())? else {
            return Ok(());
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let queue = self.gpu.queue();
        let camera = CameraUniform {
            view_proj: list.view_proj.to_cols_array_2d(),
            eye: list.eye.extend(1.0).to_array(),
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera));

        if let Some(model) = &list.model {
            for mesh in model.meshes {
                let uniform = ModelUniform {
                    transform: model.transform.to_cols_array_2d(),
                    color: mesh.color,
                    params: [if model.wireframe { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
                };
                queue.write_buffer(&mesh.model_buffer, 0, bytemuck::bytes_of(&uniform));
            }
        }

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewer Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewer Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

            render_pass.set_pipeline(&self.line_pipeline);
            render_pass.set_bind_group(1, &self.grid.model_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.grid.vertex_buffer.slice(..));
            render_pass.draw(0..self.grid.vertex_count, 0..1);

            if let Some(model) = &list.model {
                let pipeline = if model.wireframe {
                    &self.line_pipeline
                } else {
                    &self.fill_pipeline
                };
                render_pass.set_pipeline(pipeline);

                for mesh in model.meshes {
                    let (buffer, count) = if model.wireframe {
                        (&mesh.edge_buffer, mesh.edge_index_count)
                    } else {
                        (&mesh.triangle_buffer, mesh.triangle_index_count)
                    };
                    if count == 0 {
                        continue;
                    }
                    render_pass.set_bind_group(1, &mesh.model_bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..count, 0, 0..1);
                }
            }
        }

        queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn detach(&mut self) {
        if self.surface.take().is_some() {
            log::debug!("render backend detached from surface");
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_model_bind_group(device: &Device, layout: &BindGroupLayout, buffer: &Buffer) -> BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn create_depth_view(device: &Device, width: u32, height: u32) -> TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_pipeline(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
) -> RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match topology {
            wgpu::PrimitiveTopology::LineList => "Line Pipeline",
            _ => "Fill Pipeline",
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &VERTEX_ATTRIBUTES,
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
