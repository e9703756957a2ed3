//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan object, keeps registries of uploaded
//! meshes and textures, and draws a [`FrameScene`] each frame with two
//! pipelines: filled triangles for bodies and line strips for orbit rings.

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use orrery_core::Config;
use orrery_platform::{Surface, Window};
use orrery_resources::{MeshData, TextureData, Topology};
use orrery_rhi::buffer::{Buffer, BufferUsage};
use orrery_rhi::command::CommandPool;
use orrery_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, write_combined_image,
};
use orrery_rhi::device::Device;
use orrery_rhi::instance::Instance;
use orrery_rhi::physical_device::select_physical_device;
use orrery_rhi::pipeline::{
    CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
    PrimitiveTopology,
};
use orrery_rhi::shader::{Shader, ShaderStage};
use orrery_rhi::swapchain::Swapchain;
use orrery_rhi::sync::Fence;
use orrery_rhi::texture::Texture;
use orrery_rhi::vertex::{Vertex, interleave};
use orrery_rhi::{RhiError, RhiResult};
use orrery_scene::{MaterialId, MeshId};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
use crate::draw::{DrawItem, FrameScene};
use crate::frame::{FrameCursor, FrameData, FrameFailure, ImageSync, submit_in_order};
use crate::ubo::{DrawPush, FrameUbo};

/// Upper bound on uploaded textures; one descriptor set each.
pub const MAX_MATERIALS: u32 = 64;

const SHADER_DIR: &str = "shaders/spirv";
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.02, 1.0];

struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    topology: PrimitiveTopology,
}

struct GpuMaterial {
    texture: Texture,
    /// Set 1: the texture's combined image sampler.
    descriptor_set: vk::DescriptorSet,
}

fn pipeline_topology(topology: Topology) -> PrimitiveTopology {
    match topology {
        Topology::Triangles => PrimitiveTopology::TriangleList,
        Topology::LineStrip => PrimitiveTopology::LineStrip,
    }
}

/// Reject meshes that cannot be drawn before touching the GPU.
fn check_mesh(mesh: &MeshData) -> RhiResult<()> {
    if mesh.positions.is_empty() || mesh.indices.is_empty() {
        return Err(RhiError::InvalidHandle(
            "Mesh has no vertices or indices".to_string(),
        ));
    }
    if let Some(&bad) = mesh
        .indices
        .iter()
        .find(|&&i| i as usize >= mesh.positions.len())
    {
        return Err(RhiError::InvalidHandle(format!(
            "Index {} out of range for {} vertices",
            bad,
            mesh.positions.len()
        )));
    }
    Ok(())
}

/// Main renderer that manages all Vulkan resources.
///
/// # Resource Destruction Order
///
/// Fields drop in declaration order after [`Drop`] waits for the GPU:
/// per-frame objects, meshes and textures, pipelines, descriptor objects,
/// the depth buffer and swapchain, then the last `Arc<Device>`, the surface
/// and finally the instance.
pub struct Renderer {
    frames: Vec<FrameData>,
    image_sync: Vec<ImageSync>,
    cursor: FrameCursor,

    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,

    mesh_pipeline: Pipeline,
    line_pipeline: Pipeline,
    pipeline_layout: PipelineLayout,

    _frame_pool: DescriptorPool,
    material_pool: DescriptorPool,
    _frame_set_layout: DescriptorSetLayout,
    material_set_layout: DescriptorSetLayout,

    upload_pool: CommandPool,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    _instance: Instance,

    framebuffer_resized: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: &Window, config: &Config) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let app_name = CString::new(config.window.title.as_str())
            .unwrap_or_else(|_| c"orrery".to_owned());
        let display = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(&app_name, cfg!(debug_assertions), display.as_raw())?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), &surface, width, height)?;
        let depth_buffer = DepthBuffer::with_default_format(device.clone(), swapchain.extent())?;

        let both_stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let frame_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::uniform_buffer(0, both_stages)],
        )?;
        let material_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::combined_image_sampler(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;

        let frame_pool = DescriptorPool::new(
            device.clone(),
            MAX_FRAMES_IN_FLIGHT as u32,
            &[vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32)],
        )?;
        let material_pool = DescriptorPool::new(
            device.clone(),
            MAX_MATERIALS,
            &[vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(MAX_MATERIALS)],
        )?;

        let push_range = vk::PushConstantRange::default()
            .stage_flags(both_stages)
            .offset(0)
            .size(DrawPush::SIZE as u32);
        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[frame_set_layout.handle(), material_set_layout.handle()],
            &[push_range],
        )?;
        let (mesh_pipeline, line_pipeline) =
            Self::create_pipelines(&device, &pipeline_layout, swapchain.format())?;

        let frames = FrameData::create_all(&device, &frame_pool, &frame_set_layout)?;
        let image_sync = ImageSync::create_all(&device, swapchain.image_count())?;
        let cursor = FrameCursor::new(image_sync.len());

        let graphics_family = device.queue_families().graphics()?;
        let upload_pool = CommandPool::new_transient(device.clone(), graphics_family)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            frames,
            image_sync,
            cursor,
            meshes: Vec::new(),
            materials: Vec::new(),
            mesh_pipeline,
            line_pipeline,
            pipeline_layout,
            _frame_pool: frame_pool,
            material_pool,
            _frame_set_layout: frame_set_layout,
            material_set_layout,
            upload_pool,
            depth_buffer,
            swapchain,
            device,
            surface,
            _instance: instance,
            framebuffer_resized: false,
            width,
            height,
        })
    }

    fn create_pipelines(
        device: &Arc<Device>,
        layout: &PipelineLayout,
        color_format: vk::Format,
    ) -> RhiResult<(Pipeline, Pipeline)> {
        let dir = Path::new(SHADER_DIR);
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &dir.join("mesh.vert.spv"),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &dir.join("mesh.frag.spv"),
            ShaderStage::Fragment,
        )?;

        let base = || {
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vertex_shader)
                .fragment_shader(&fragment_shader)
                .vertex_binding(Vertex::binding_description())
                .vertex_attributes(&Vertex::attribute_descriptions())
                .color_attachment_format(color_format)
                .depth_attachment_format(DEFAULT_DEPTH_FORMAT)
        };

        let mesh_pipeline = base()
            .topology(PrimitiveTopology::TriangleList)
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::CounterClockwise)
            .depth_test(true, true, CompareOp::Less)
            .build(device.clone(), layout)?;

        // Rings are depth-tested so planets occlude them, but never occlude
        // anything themselves.
        let line_pipeline = base()
            .topology(PrimitiveTopology::LineStrip)
            .cull_mode(CullMode::None)
            .depth_test(true, false, CompareOp::LessOrEqual)
            .build(device.clone(), layout)?;

        Ok((mesh_pipeline, line_pipeline))
    }

    /// Upload mesh geometry. The returned id is stable for the renderer's
    /// lifetime.
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> RhiResult<MeshId> {
        check_mesh(mesh)?;
        let vertices = interleave(&mesh.positions, &mesh.normals, &mesh.tex_coords);

        let vertex_buffer = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Index,
            bytemuck::cast_slice(&mesh.indices),
        )?;

        let id = MeshId(self.meshes.len() as u32);
        debug!(
            "Mesh {}: {} vertices, {} indices ({:?})",
            id.0,
            vertices.len(),
            mesh.indices.len(),
            mesh.topology
        );
        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            topology: pipeline_topology(mesh.topology),
        });
        Ok(id)
    }

    /// Upload an RGBA8 texture and give it a material descriptor set.
    pub fn upload_texture(&mut self, data: &TextureData) -> RhiResult<MaterialId> {
        if self.materials.len() as u32 >= MAX_MATERIALS {
            return Err(RhiError::TextureError(format!(
                "Material limit of {} reached",
                MAX_MATERIALS
            )));
        }

        let texture = Texture::upload(
            self.device.clone(),
            &self.upload_pool,
            data.width,
            data.height,
            &data.pixels,
        )?;
        let descriptor_set = self.material_pool.allocate_one(&self.material_set_layout)?;
        write_combined_image(
            &self.device,
            descriptor_set,
            0,
            texture.sampler(),
            texture.view(),
        );

        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(GpuMaterial {
            texture,
            descriptor_set,
        });
        Ok(id)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Texture size of `material`, if it exists.
    pub fn material_extent(&self, material: MaterialId) -> Option<(u32, u32)> {
        self.materials.get(material.0 as usize).map(|m| {
            let extent = m.texture.extent();
            (extent.width, extent.height)
        })
    }

    /// Record a new framebuffer size; the swapchain is rebuilt before the
    /// next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }

        if width != self.width || height != self.height {
            debug!(
                "Resize triggered: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.framebuffer_resized = true;
        }
    }

    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;

        self.swapchain
            .recreate(&self.surface, self.width, self.height)?;
        self.depth_buffer =
            DepthBuffer::with_default_format(self.device.clone(), self.swapchain.extent())?;

        if self.image_sync.len() != self.swapchain.image_count() {
            self.image_sync = ImageSync::create_all(&self.device, self.swapchain.image_count())?;
            debug!("Recreated {} image sync entries", self.image_sync.len());
        }
        self.cursor.reset_semaphores(self.image_sync.len());

        self.framebuffer_resized = false;
        Ok(())
    }

    pub fn render_frame(&mut self, scene: &FrameScene) -> RhiResult<()> {
        if self.framebuffer_resized {
            debug!("Resize requested, recreating swapchain before acquire");
            self.recreate_swapchain()?;
        }

        let frame_index = self.cursor.frame();
        self.frames[frame_index].in_flight_fence.wait(u64::MAX)?;

        let acquire_semaphore = self.image_sync[self.cursor.semaphore()]
            .image_available
            .handle();
        let image_index = match self.swapchain.acquire_next_image(acquire_semaphore) {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date, recreating");
                self.recreate_swapchain()?;
                return Ok(());
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };
        let render_finished = self
            .image_sync
            .get(image_index as usize)
            .ok_or_else(|| {
                RhiError::SwapchainError(format!("Acquired unknown image {}", image_index))
            })?
            .render_finished
            .handle();

        let frame = &self.frames[frame_index];
        let wait_semaphores = [acquire_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [frame.command_buffer.handle()];

        let outcome = submit_in_order(
            || {
                frame.ubo.write_pod(&FrameUbo::new(
                    scene.view,
                    scene.projection,
                    scene.camera_position,
                    &scene.lighting,
                ))?;
                self.record_commands(frame, image_index, &scene.draws)
            },
            || frame.in_flight_fence.reset(),
            || {
                let submit_info = vk::SubmitInfo::default()
                    .wait_semaphores(&wait_semaphores)
                    .wait_dst_stage_mask(&wait_stages)
                    .command_buffers(&command_buffers)
                    .signal_semaphores(&signal_semaphores);
                // SAFETY: the command buffer is fully recorded and its fence
                // was reset.
                unsafe {
                    self.device.handle().queue_submit(
                        self.device.graphics_queue(),
                        &[submit_info],
                        frame.in_flight_fence.handle(),
                    )?;
                }
                Ok(())
            },
        );

        if let Err(failure) = outcome {
            if let FrameFailure::Submission(_) = failure {
                warn!("Frame {} not submitted, re-arming its fence", frame_index);
                self.frames[frame_index].in_flight_fence =
                    Fence::new(self.device.clone(), true)?;
            }
            // The acquired image is never presented, so its acquire semaphore
            // stays signaled.
            self.reset_image_sync()?;
            return Err(failure.into_error());
        }

        let present_result =
            self.swapchain
                .present(self.device.present_queue(), image_index, render_finished);
        self.cursor.advance();

        let should_recreate = match present_result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => true,
            Err(e) => return Err(RhiError::VulkanError(e)),
        };
        if should_recreate {
            debug!("Swapchain needs recreation after present");
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Fresh acquire/present semaphores after a frame was abandoned between
    /// acquire and present.
    fn reset_image_sync(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;
        self.image_sync = ImageSync::create_all(&self.device, self.swapchain.image_count())?;
        self.cursor.reset_semaphores(self.image_sync.len());
        Ok(())
    }

    fn pipeline_for(&self, topology: PrimitiveTopology) -> &Pipeline {
        match topology {
            PrimitiveTopology::TriangleList => &self.mesh_pipeline,
            PrimitiveTopology::LineStrip => &self.line_pipeline,
        }
    }

    fn record_commands(
        &self,
        frame: &FrameData,
        image_index: u32,
        draws: &[DrawItem],
    ) -> RhiResult<()> {
        let cmd = &frame.command_buffer;
        let extent = self.swapchain.extent();
        let (image, view) = self.swapchain.image(image_index)?;

        cmd.reset()?;
        cmd.begin()?;

        cmd.transition_image(
            image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        cmd.transition_image(
            self.depth_buffer.image(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            })];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);
        cmd.set_viewport_and_scissor(extent);

        let layout = self.pipeline_layout.handle();
        cmd.bind_descriptor_set(layout, 0, frame.descriptor_set);

        let mut bound: Option<PrimitiveTopology> = None;
        for draw in draws {
            let mesh = self.meshes.get(draw.mesh.0 as usize).ok_or_else(|| {
                RhiError::InvalidHandle(format!("Unknown mesh {}", draw.mesh.0))
            })?;
            let material = self.materials.get(draw.material.0 as usize).ok_or_else(|| {
                RhiError::InvalidHandle(format!("Unknown material {}", draw.material.0))
            })?;

            if bound != Some(mesh.topology) {
                cmd.bind_pipeline(self.pipeline_for(mesh.topology).handle());
                bound = Some(mesh.topology);
            }
            cmd.bind_descriptor_set(layout, 1, material.descriptor_set);
            cmd.push_constants(
                layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                &DrawPush::new(draw.model, draw.tint, draw.emissive),
            );
            cmd.bind_vertex_buffer(mesh.vertex_buffer.handle());
            cmd.bind_index_buffer(mesh.index_buffer.handle());
            cmd.draw_indexed(mesh.index_count);
        }

        cmd.end_rendering();
        cmd.transition_image(
            image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        cmd.end()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("Failed to wait for device idle during cleanup: {}", e);
        }
        info!(
            "Destroying renderer ({} meshes, {} materials)",
            self.meshes.len(),
            self.materials.len()
        );
    }
}
