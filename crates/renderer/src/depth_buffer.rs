//! Depth attachment sized to the swapchain.
//!
//! Recreated alongside the swapchain on resize. Cleared to 1.0 every frame
//! and compared with `LESS`, so nearer fragments win.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use orrery_rhi::device::Device;
use orrery_rhi::image::{Image, ImageKind};
use orrery_rhi::{RhiError, RhiResult};

/// 32-bit float depth, supported for optimal-tiling attachments everywhere.
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Depth buffer dimensions must be greater than 0".to_string(),
            ));
        }
        if !is_depth_format(format) {
            return Err(RhiError::InvalidHandle(format!(
                "{:?} is not a depth format",
                format
            )));
        }

        let image = Image::new(device, ImageKind::Depth, format, extent)?;
        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );
        Ok(Self { image })
    }

    pub fn with_default_format(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::new(device, extent, DEFAULT_DEPTH_FORMAT)
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
    )
}
