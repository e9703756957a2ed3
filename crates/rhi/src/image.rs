//! Device-local 2D images with a single view.
//!
//! Used for the depth attachment and for sampled planet textures.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::error;

use crate::device::Device;
use crate::error::RhiResult;

/// Create a 2D view over mip 0, layer 0 of `image`.
pub fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> RhiResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );
    // SAFETY: `image` is alive and was created with `format`.
    Ok(unsafe { device.handle().create_image_view(&create_info, None)? })
}

/// What an [`Image`] is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Depth,
    /// Filled by a buffer copy, then sampled in fragment shaders
    Sampled,
}

impl ImageKind {
    pub fn usage(self) -> vk::ImageUsageFlags {
        match self {
            ImageKind::Depth => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ImageKind::Sampled => {
                vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED
            }
        }
    }

    pub fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            ImageKind::Depth => vk::ImageAspectFlags::DEPTH,
            ImageKind::Sampled => vk::ImageAspectFlags::COLOR,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ImageKind::Depth => "depth image",
            ImageKind::Sampled => "texture image",
        }
    }
}

/// `vk::Image` with its allocation and view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    kind: ImageKind,
}

impl Image {
    pub fn new(
        device: Arc<Device>,
        kind: ImageKind,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(kind.usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        // SAFETY: valid create info on a live device.
        let image = unsafe { device.handle().create_image(&create_info, None)? };
        // SAFETY: `image` was just created from this device.
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocated = device.allocator().and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: kind.name(),
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                // SAFETY: no memory is bound and nothing references the image.
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // Constructed before binding so that Drop cleans up on any later error.
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            format,
            extent,
            kind,
        };
        if let Some(allocation) = &this.allocation {
            // SAFETY: the allocation satisfies the image's requirements.
            unsafe {
                this.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }
        this.view = create_view(&this.device, image, format, kind.aspect())?;
        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn kind(&self) -> ImageKind {
        self.kind
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // SAFETY: owners drop images only after the GPU is done with them.
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {}: {:?}", self.kind.name(), e);
                    }
                }
                Err(e) => error!("Leaking {} memory: {}", self.kind.name(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_usage_and_aspect() {
        assert!(
            ImageKind::Depth
                .usage()
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
        assert_eq!(ImageKind::Depth.aspect(), vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_sampled_usage_allows_upload() {
        let usage = ImageKind::Sampled.usage();
        assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert_eq!(ImageKind::Sampled.aspect(), vk::ImageAspectFlags::COLOR);
    }
}
