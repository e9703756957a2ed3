//! Frames in flight.
//!
//! Each of the [`MAX_FRAMES_IN_FLIGHT`] slots owns a fence, a command buffer
//! and a uniform buffer, so the CPU can record frame N+1 while the GPU still
//! works on frame N. Acquire/present semaphores are kept per swapchain image
//! instead, since an image may be presented long after its frame slot is
//! reused.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use orrery_rhi::{RhiError, RhiResult};
use orrery_rhi::buffer::{Buffer, BufferUsage};
use orrery_rhi::command::{CommandBuffer, CommandPool};
use orrery_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, write_uniform_buffer};
use orrery_rhi::device::Device;
use orrery_rhi::sync::{Fence, Semaphore};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::ubo::FrameUbo;

/// Resources for one frame slot.
pub struct FrameData {
    pub in_flight_fence: Fence,
    pub command_buffer: CommandBuffer,
    pub ubo: Buffer,
    /// Set 0: the frame uniform block.
    pub descriptor_set: vk::DescriptorSet,
    // Frees `command_buffer` when dropped, so it is declared last.
    _command_pool: CommandPool,
}

impl FrameData {
    pub fn new(
        device: &Arc<Device>,
        descriptor_pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics()?)?;
        let command_buffer = command_pool.allocate()?;
        // Signaled so the first wait returns immediately.
        let in_flight_fence = Fence::new(device.clone(), true)?;
        let ubo = Buffer::new(device.clone(), BufferUsage::Uniform, FrameUbo::SIZE as u64)?;

        let descriptor_set = descriptor_pool.allocate_one(layout)?;
        write_uniform_buffer(
            device,
            descriptor_set,
            0,
            ubo.handle(),
            FrameUbo::SIZE as u64,
        );

        Ok(Self {
            in_flight_fence,
            command_buffer,
            ubo,
            descriptor_set,
            _command_pool: command_pool,
        })
    }

    pub fn create_all(
        device: &Arc<Device>,
        descriptor_pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
    ) -> RhiResult<Vec<Self>> {
        (0..MAX_FRAMES_IN_FLIGHT)
            .map(|i| {
                let frame = Self::new(device, descriptor_pool, layout)?;
                debug!("Created frame data for frame {}", i);
                Ok(frame)
            })
            .collect()
    }
}

/// Acquire/present semaphores for one swapchain image.
pub struct ImageSync {
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
}

impl ImageSync {
    pub fn create_all(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Self>> {
        (0..count)
            .map(|_| {
                Ok(Self {
                    image_available: Semaphore::new(device.clone())?,
                    render_finished: Semaphore::new(device.clone())?,
                })
            })
            .collect()
    }
}

/// Where a frame failed after its image was acquired.
#[derive(Debug)]
pub enum FrameFailure {
    /// Before the fence was touched; it is still signaled.
    Recording(RhiError),
    /// After the fence was reset; nothing will signal it.
    Submission(RhiError),
}

impl FrameFailure {
    pub fn into_error(self) -> RhiError {
        match self {
            FrameFailure::Recording(e) | FrameFailure::Submission(e) => e,
        }
    }
}

/// Record, reset the slot's fence, then submit. The fence is reset only after
/// recording succeeded, so a frame that fails to record leaves it signaled
/// and the next wait on the slot returns.
pub fn submit_in_order(
    record: impl FnOnce() -> RhiResult<()>,
    reset_fence: impl FnOnce() -> RhiResult<()>,
    submit: impl FnOnce() -> RhiResult<()>,
) -> Result<(), FrameFailure> {
    record().map_err(FrameFailure::Recording)?;
    reset_fence().map_err(FrameFailure::Submission)?;
    submit().map_err(FrameFailure::Submission)
}

/// Which frame slot and which acquire semaphore come next.
///
/// The acquire semaphore cycles over swapchain images independently of the
/// frame slot, because the image index is unknown until acquisition returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    frame: usize,
    semaphore: usize,
    semaphore_count: usize,
}

impl FrameCursor {
    pub fn new(semaphore_count: usize) -> Self {
        Self {
            frame: 0,
            semaphore: 0,
            semaphore_count: semaphore_count.max(1),
        }
    }

    #[inline]
    pub fn frame(&self) -> usize {
        self.frame
    }

    #[inline]
    pub fn semaphore(&self) -> usize {
        self.semaphore
    }

    /// Move past a presented frame.
    pub fn advance(&mut self) {
        self.frame = (self.frame + 1) % MAX_FRAMES_IN_FLIGHT;
        self.advance_semaphore();
    }

    /// Move to the next acquire semaphore only. Used when acquisition
    /// consumed a semaphore but the frame was abandoned.
    pub fn advance_semaphore(&mut self) {
        self.semaphore = (self.semaphore + 1) % self.semaphore_count;
    }

    /// Start over after the swapchain image count changed.
    pub fn reset_semaphores(&mut self, semaphore_count: usize) {
        self.semaphore = 0;
        self.semaphore_count = semaphore_count.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_frame_index_wraps() {
        let mut cursor = FrameCursor::new(3);
        let frames: Vec<usize> = (0..5)
            .map(|_| {
                let f = cursor.frame();
                cursor.advance();
                f
            })
            .collect();
        assert_eq!(frames, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_semaphore_cycles_over_images() {
        let mut cursor = FrameCursor::new(3);
        let sems: Vec<usize> = (0..4)
            .map(|_| {
                let s = cursor.semaphore();
                cursor.advance();
                s
            })
            .collect();
        assert_eq!(sems, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_reset_semaphores() {
        let mut cursor = FrameCursor::new(3);
        cursor.advance();
        cursor.advance();
        cursor.reset_semaphores(2);
        assert_eq!(cursor.semaphore(), 0);
        cursor.advance_semaphore();
        cursor.advance_semaphore();
        assert_eq!(cursor.semaphore(), 0);
        // Frame slot is untouched.
        assert_eq!(cursor.frame(), 0);
    }

    fn steps(
        record_ok: bool,
        submit_ok: bool,
    ) -> (Result<(), FrameFailure>, Vec<&'static str>) {
        let log = RefCell::new(Vec::new());
        let fail = |what: &str| RhiError::InvalidHandle(what.to_string());
        let result = submit_in_order(
            || {
                log.borrow_mut().push("record");
                if record_ok { Ok(()) } else { Err(fail("mesh")) }
            },
            || {
                log.borrow_mut().push("reset");
                Ok(())
            },
            || {
                log.borrow_mut().push("submit");
                if submit_ok { Ok(()) } else { Err(fail("queue")) }
            },
        );
        (result, log.into_inner())
    }

    #[test]
    fn test_fence_reset_waits_for_recording() {
        let (result, log) = steps(true, true);
        assert!(result.is_ok());
        assert_eq!(log, vec!["record", "reset", "submit"]);
    }

    #[test]
    fn test_failed_recording_leaves_fence_alone() {
        let (result, log) = steps(false, true);
        assert!(matches!(result, Err(FrameFailure::Recording(_))));
        assert_eq!(log, vec!["record"]);
    }

    #[test]
    fn test_failed_submit_reports_reset_fence() {
        let (result, log) = steps(true, false);
        let failure = result.unwrap_err();
        assert!(matches!(failure, FrameFailure::Submission(_)));
        assert!(failure.into_error().to_string().contains("queue"));
        assert_eq!(log, vec!["record", "reset", "submit"]);
    }

    #[test]
    fn test_zero_images_does_not_divide_by_zero() {
        let mut cursor = FrameCursor::new(0);
        cursor.advance();
        assert_eq!(cursor.semaphore(), 0);
    }
}
