//! Semaphores and fences.
//!
//! Semaphores order work between the swapchain and the graphics queue;
//! fences let the CPU wait for a frame's commands before reusing its
//! command buffer and uniform buffer.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        // SAFETY: valid create info on a live device.
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence. A signaled fence lets the first frame's wait return
    /// immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: valid create info on a live device.
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until signaled or `timeout` nanoseconds pass.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        // SAFETY: the fence belongs to this device.
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    pub fn reset(&self) -> RhiResult<()> {
        // SAFETY: callers reset only after a completed wait, so the fence is
        // not referenced by a pending submission.
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
