//! Logical device, queues and the GPU memory allocator.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiResult;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] =
    &[ash::khr::swapchain::NAME, ash::khr::dynamic_rendering::NAME];

/// Vulkan logical device, shared through `Arc` by every resource that
/// needs to destroy itself.
///
/// The allocator sits behind a `Mutex` so buffers and images can allocate
/// from any thread.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
    max_anisotropy: f32,
}

impl Device {
    /// Create the device with dynamic rendering, synchronization2 and
    /// sampler anisotropy enabled.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_families = info.queue_families;
        let graphics_family = queue_families.graphics()?;
        let present_family = queue_families.present()?;

        let priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);

        // SAFETY: the physical device belongs to `instance` and create_info
        // only borrows locals that outlive the call.
        let device = unsafe {
            instance
                .handle()
                .create_device(info.device, &create_info, None)?
        };
        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        // SAFETY: both families were requested with one queue each above.
        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(graphics_family, 0),
                device.get_device_queue(present_family, 0),
            )
        };
        debug!(
            "Queues: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        Ok(Arc::new(Self {
            device,
            physical_device: info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            max_anisotropy: info.max_anisotropy(),
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Largest anisotropy the samplers may request.
    #[inline]
    pub fn max_anisotropy(&self) -> f32 {
        self.max_anisotropy
    }

    /// Lock the allocator. Fails only if another thread panicked while
    /// holding it.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        Ok(self.allocator.lock()?)
    }

    /// Block until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        // SAFETY: no external synchronization required for a device-wide wait.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: every Arc<Device> holder has been dropped, so no resource
        // created from this device is still alive. The allocator must release
        // its memory blocks before the device is destroyed.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device is a table of function pointers, queues and handles are
// plain values, and the allocator is guarded by a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::dynamic_rendering::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
