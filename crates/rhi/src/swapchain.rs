//! Swapchain creation, image acquisition and presentation.
//!
//! The swapchain is rebuilt when the window is resized or presentation
//! reports it out of date; [`Swapchain::recreate`] hands the old handle to
//! the driver so in-flight images can be reused.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use orrery_platform::Surface;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::create_view;
use crate::instance::Instance;

/// What the surface supports, queried per (re)creation.
#[derive(Clone, Debug)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(physical_device: vk::PhysicalDevice, surface: &Surface) -> RhiResult<Self> {
        let loader = surface.loader();
        let handle = surface.handle();
        // SAFETY: surface and physical device both come from the same instance.
        unsafe {
            Ok(Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical_device, handle)?,
                formats: loader.get_physical_device_surface_formats(physical_device, handle)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical_device, handle)?,
            })
        }
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        Self::create(
            device,
            loader,
            surface,
            width,
            height,
            vk::SwapchainKHR::null(),
        )
    }

    fn create(
        device: Arc<Device>,
        loader: ash::khr::swapchain::Device,
        surface: &Surface,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let support = SwapchainSupportDetails::query(device.physical_device(), surface)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        let graphics = device.queue_families().graphics()?;
        let present = device.queue_families().present()?;
        let families = [graphics, present];
        let (sharing_mode, family_slice) = if graphics != present {
            (vk::SharingMode::CONCURRENT, &families[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // SAFETY: the surface outlives the swapchain; `old_swapchain` is
        // either null or retired by the caller after this returns.
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let mut this = Self {
            device,
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: surface_format.format,
            extent,
        };
        // SAFETY: `swapchain` was just created by this loader.
        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for &image in &this.images {
            let view = create_view(
                &this.device,
                image,
                this.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            this.image_views.push(view);
        }

        info!(
            "Swapchain: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            this.images.len()
        );
        Ok(this)
    }

    /// Rebuild for a new window size. Waits for the device to go idle.
    pub fn recreate(&mut self, surface: &Surface, width: u32, height: u32) -> RhiResult<()> {
        self.device.wait_idle()?;
        let next = Self::create(
            self.device.clone(),
            self.loader.clone(),
            surface,
            width,
            height,
            self.swapchain,
        )?;
        // The old swapchain and its views are destroyed when `old` drops.
        let old = std::mem::replace(self, next);
        drop(old);
        Ok(())
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        // SAFETY: the semaphore is unsignaled with no pending signal operation.
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation once `wait_semaphore` signals.
    ///
    /// Returns `true` when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        // SAFETY: the image was acquired and rendered this frame.
        unsafe { self.loader.queue_present(queue, &present_info) }
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
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Image and view at `index`, as returned by acquisition.
    pub fn image(&self, index: u32) -> RhiResult<(vk::Image, vk::ImageView)> {
        let i = index as usize;
        match (self.images.get(i), self.image_views.get(i)) {
            (Some(&image), Some(&view)) => Ok((image, view)),
            _ => Err(RhiError::InvalidHandle(format!(
                "Swapchain image {} out of range ({} images)",
                index,
                self.images.len()
            ))),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: the device is idle (recreate and renderer drop both wait);
        // images belong to the swapchain and go with it.
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!(
            "Swapchain destroyed ({}x{})",
            self.extent.width, self.extent.height
        );
    }
}

/// Prefer an sRGB format so the shaders can write linear color.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let srgb = |format: vk::Format| {
        move |f: &&vk::SurfaceFormatKHR| {
            f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        }
    };
    if let Some(&format) = formats
        .iter()
        .find(srgb(vk::Format::B8G8R8A8_SRGB))
        .or_else(|| formats.iter().find(srgb(vk::Format::R8G8B8A8_SRGB)))
    {
        return Ok(format);
    }
    let first = formats
        .first()
        .copied()
        .ok_or_else(|| RhiError::SwapchainError("No surface formats".to_string()))?;
    warn!("No sRGB surface format, using {:?}", first.format);
    Ok(first)
}

/// MAILBOX when available, otherwise FIFO which is always supported.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when there is one.
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}
