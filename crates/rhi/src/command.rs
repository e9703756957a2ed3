//! Command pools and command buffer recording.
//!
//! [`CommandBuffer`] is a thin recorder over a raw handle; the handle itself
//! belongs to the [`CommandPool`] that allocated it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use orrery_rhi::command::CommandPool;
//! # fn example(device: Arc<orrery_rhi::device::Device>) -> orrery_rhi::RhiResult<()> {
//! let family = device.queue_families().graphics()?;
//! let pool = CommandPool::new_transient(device.clone(), family)?;
//! pool.submit_once(device.graphics_queue(), |cmd| {
//!     // record upload commands
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;
use crate::sync::Fence;

/// Owns a `vk::CommandPool` tied to one queue family.
///
/// Not thread-safe; record from one thread per pool.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Pool whose buffers can be reset individually, for per-frame recording.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Pool for short-lived buffers such as texture uploads.
    pub fn new_transient(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
        )
    }

    fn with_flags(
        device: Arc<Device>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);
        // SAFETY: valid create info on a live device.
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        debug!(
            "Command pool created for queue family {} ({:?})",
            queue_family_index, flags
        );
        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocate one primary command buffer.
    pub fn allocate(&self) -> RhiResult<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        // SAFETY: the pool is alive and externally synchronized by &self use.
        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        let buffer = buffers
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;
        Ok(CommandBuffer::from_handle(self.device.clone(), buffer))
    }

    /// Record with `record`, submit to `queue` and block until it finishes.
    ///
    /// Used for uploads at load time, where stalling is acceptable.
    pub fn submit_once(
        &self,
        queue: vk::Queue,
        record: impl FnOnce(&CommandBuffer) -> RhiResult<()>,
    ) -> RhiResult<()> {
        let cmd = self.allocate()?;
        let result = (|| {
            cmd.begin()?;
            record(&cmd)?;
            cmd.end()?;

            let fence = Fence::new(self.device.clone(), false)?;
            let command_buffers = [cmd.handle()];
            let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
            // SAFETY: the command buffer is fully recorded and only used here.
            unsafe {
                self.device
                    .handle()
                    .queue_submit(queue, &[submit], fence.handle())?;
            }
            fence.wait(u64::MAX)
        })();

        // SAFETY: the fence wait above (or a failed submit) means the buffer
        // is no longer pending.
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &[cmd.handle()]);
        }
        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // SAFETY: no buffer from this pool is pending once its owner drops it.
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Recorder over a command buffer handle owned by a [`CommandPool`].
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Begin a one-time-submit recording.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: the buffer is not pending; callers wait on its fence first.
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        // SAFETY: recording was begun by `begin`.
        unsafe { self.device.handle().end_command_buffer(self.buffer)? };
        Ok(())
    }

    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: the pool was created with RESET_COMMAND_BUFFER.
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo<'_>) {
        // SAFETY: recording; attachments are in the layouts rendering_info names.
        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(self.buffer, rendering_info);
        }
    }

    pub fn end_rendering(&self) {
        // SAFETY: paired with begin_rendering.
        unsafe { self.device.handle().cmd_end_rendering(self.buffer) };
    }

    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: recording; pipeline is alive until the frame's fence signals.
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    pub fn bind_descriptor_set(
        &self,
        layout: vk::PipelineLayout,
        set: u32,
        descriptor: vk::DescriptorSet,
    ) {
        // SAFETY: recording; the set matches `layout` at index `set`.
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                set,
                &[descriptor],
                &[],
            );
        }
    }

    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        // SAFETY: recording; binding 0 matches the pipeline's vertex input.
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]);
        }
    }

    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        // SAFETY: recording; indices are u32.
        unsafe {
            self.device
                .handle()
                .cmd_bind_index_buffer(self.buffer, buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Cover the whole `extent` with the viewport and scissor.
    pub fn set_viewport_and_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        // SAFETY: recording with a pipeline that declares both as dynamic.
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device.handle().cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    pub fn draw_indexed(&self, index_count: u32) {
        // SAFETY: recording with vertex and index buffers bound.
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.buffer, index_count, 1, 0, 0, 0);
        }
    }

    /// Push a plain-data block at offset zero.
    pub fn push_constants<T: bytemuck::Pod>(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &T,
    ) {
        // SAFETY: recording; `layout` declares a range covering size_of::<T>().
        unsafe {
            self.device.handle().cmd_push_constants(
                self.buffer,
                layout,
                stages,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    /// Copy a tightly packed staging buffer into mip 0 of a color image in
    /// `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::default()
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        // SAFETY: recording; the image is in TRANSFER_DST_OPTIMAL.
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    /// Record a layout transition for every mip and layer of `image`.
    pub fn transition_image(
        &self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        let access = LayoutAccess::for_transition(old_layout, new_layout);
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(access.src_stage)
            .src_access_mask(access.src_access)
            .dst_stage_mask(access.dst_stage)
            .dst_access_mask(access.dst_access)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            );
        let barriers = [barrier];
        let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        // SAFETY: recording; synchronization2 is enabled on the device.
        unsafe {
            self.device
                .handle()
                .cmd_pipeline_barrier2(self.buffer, &dependency);
        }
    }
}

/// Stages and accesses on either side of a layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutAccess {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl LayoutAccess {
    /// Barrier scopes for the transitions the renderer performs. Anything
    /// else gets a full, slow barrier.
    pub fn for_transition(old: vk::ImageLayout, new: vk::ImageLayout) -> Self {
        use vk::{AccessFlags2 as A, ImageLayout as L, PipelineStageFlags2 as S};
        let (src_stage, src_access, dst_stage, dst_access) = match (old, new) {
            (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => (
                S::COLOR_ATTACHMENT_OUTPUT,
                A::NONE,
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_WRITE,
            ),
            (L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL) => (
                S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_WRITE,
                S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => (
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_WRITE,
                S::NONE,
                A::NONE,
            ),
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
                (S::NONE, A::NONE, S::COPY, A::TRANSFER_WRITE)
            }
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
                S::COPY,
                A::TRANSFER_WRITE,
                S::FRAGMENT_SHADER,
                A::SHADER_SAMPLED_READ,
            ),
            _ => {
                tracing::warn!("Unhandled layout transition: {:?} -> {:?}", old, new);
                (
                    S::ALL_COMMANDS,
                    A::MEMORY_READ | A::MEMORY_WRITE,
                    S::ALL_COMMANDS,
                    A::MEMORY_READ | A::MEMORY_WRITE,
                )
            }
        };
        Self {
            src_stage,
            src_access,
            dst_stage,
            dst_access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transitions_chain() {
        let to_dst = LayoutAccess::for_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let to_read = LayoutAccess::for_transition(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        // The copy writes between the two barriers.
        assert_eq!(to_dst.dst_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(to_read.src_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert!(to_read.dst_stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
    }

    #[test]
    fn test_present_transition_waits_for_color_writes() {
        let access = LayoutAccess::for_transition(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        assert_eq!(access.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(access.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_depth_transition_covers_fragment_tests() {
        let access = LayoutAccess::for_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );
        assert!(
            access
                .dst_stage
                .contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS)
        );
        assert!(
            access
                .dst_access
                .contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
    }

    #[test]
    fn test_unknown_transition_is_full_barrier() {
        let access = LayoutAccess::for_transition(
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        assert_eq!(access.src_stage, vk::PipelineStageFlags2::ALL_COMMANDS);
        assert_eq!(access.dst_stage, vk::PipelineStageFlags2::ALL_COMMANDS);
    }
}
