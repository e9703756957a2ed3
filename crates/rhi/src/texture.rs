//! Sampled RGBA8 textures uploaded through a staging buffer.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageKind};

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;
const MAX_ANISOTROPY: f32 = 8.0;

/// Reject empty images and pixel buffers that do not hold `width * height`
/// RGBA8 texels.
pub fn validate_rgba8(width: u32, height: u32, pixels: &[u8]) -> RhiResult<()> {
    if width == 0 || height == 0 {
        return Err(RhiError::TextureError(format!(
            "Texture has zero extent ({}x{})",
            width, height
        )));
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(RhiError::TextureError(format!(
            "Expected {} bytes for {}x{} RGBA8, got {}",
            expected,
            width,
            height,
            pixels.len()
        )));
    }
    Ok(())
}

fn sampler_create_info(max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let anisotropy = max_anisotropy.min(MAX_ANISOTROPY);
    // Longitude wraps around the sphere; latitude stops at the poles.
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .anisotropy_enable(anisotropy > 1.0)
        .max_anisotropy(anisotropy.max(1.0))
        .min_lod(0.0)
        .max_lod(0.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
}

pub struct Texture {
    device: Arc<Device>,
    image: Image,
    sampler: vk::Sampler,
}

impl Texture {
    /// Upload `pixels` and leave the image in `SHADER_READ_ONLY_OPTIMAL`.
    ///
    /// Blocks until the copy has finished.
    pub fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        validate_rgba8(width, height, pixels)?;
        let extent = vk::Extent2D { width, height };

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;
        let image = Image::new(device.clone(), ImageKind::Sampled, TEXTURE_FORMAT, extent)?;

        pool.submit_once(device.graphics_queue(), |cmd| {
            cmd.transition_image(
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            cmd.copy_buffer_to_image(staging.handle(), image.handle(), extent);
            cmd.transition_image(
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            Ok(())
        })?;

        let create_info = sampler_create_info(device.max_anisotropy());
        // SAFETY: valid create info; anisotropy was enabled at device creation.
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!("Uploaded {}x{} texture", width, height);
        Ok(Self {
            device,
            image,
            sampler,
        })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}
