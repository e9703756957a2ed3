//! Host-visible GPU buffers backed by gpu-allocator.
//!
//! Every buffer the visualizer needs is small and written from the CPU:
//! mesh vertices and indices once at load time, the frame uniforms once per
//! frame, and texture pixels once through a staging buffer. All of them live
//! in `CpuToGpu` memory and stay persistently mapped.
//!
//! ```no_run
//! use std::sync::Arc;
//! use orrery_rhi::buffer::{Buffer, BufferUsage};
//! # fn example(device: Arc<orrery_rhi::device::Device>) -> orrery_rhi::RhiResult<()> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let buffer = Buffer::new_with_data(device, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    /// Source of a copy into an image
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        MemoryLocation::CpuToGpu
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// A `vk::Buffer` and its mapped allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Create an uninitialized buffer of `size` bytes.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        // SAFETY: valid create info on a live device.
        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        // SAFETY: `buffer` was just created from this device.
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator()?.allocate(&AllocationCreateDesc {
            name: usage.name(),
            requirements,
            location: usage.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: the buffer has no memory bound and is not in use.
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        // SAFETY: the allocation satisfies `requirements` and is unbound.
        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Create a buffer sized to `data` and fill it.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copy `data` into the mapped memory at `offset`.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len(), self.size)?;

        let mapped = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        // SAFETY: the range was checked against the buffer size and the mapping
        // covers the whole allocation.
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    /// Overwrite the start of the buffer with one plain-data value.
    pub fn write_pod<T: bytemuck::Pod>(&self, value: &T) -> RhiResult<()> {
        self.write_data(0, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

fn check_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        ))),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer: {:?}", self.usage.name(), e);
                    }
                }
                Err(e) => error!("Leaking {} buffer memory: {}", self.usage.name(), e),
            }
        }
        // SAFETY: owners drop buffers only after the GPU has finished with them.
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_flags() {
        assert_eq!(
            BufferUsage::Vertex.to_vk_usage(),
            vk::BufferUsageFlags::VERTEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Index.to_vk_usage(),
            vk::BufferUsageFlags::INDEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_all_buffers_host_visible() {
        for usage in [
            BufferUsage::Vertex,
            BufferUsage::Index,
            BufferUsage::Uniform,
            BufferUsage::Staging,
        ] {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(8, 8, 16).is_ok());
        assert!(check_range(8, 9, 16).is_err());
        assert!(check_range(u64::MAX, 1, 16).is_err());
    }
}
