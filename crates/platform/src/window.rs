//! The native window and its Vulkan surface.

use std::sync::Arc;

use ash::vk;
use glam::Vec2;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use orrery_core::{Error, Result, WindowConfig};

/// Owned `vk::SurfaceKHR`, destroyed on drop.
///
/// The Vulkan instance the surface was created from must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: The handle was created by ash_window::create_surface with the
        // same instance as the loader, and is destroyed only here.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Window the solar system is drawn into.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Open a resizable window sized and titled from the configuration.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The platform may not honour the requested size exactly.
        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
        })
    }

    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Record a new framebuffer size from a resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// A zero-area window cannot back a swapchain.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, `1.0` while minimized.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_minimized() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Framebuffer size in physical pixels, as used for cursor picking.
    pub fn viewport_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn display_handle(
        &self,
    ) -> std::result::Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError>
    {
        self.window.display_handle()
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Create the Vulkan surface for this window.
    ///
    /// `instance` must outlive the returned [`Surface`].
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid; the raw handles come from a live
        // winit window. Destruction happens in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}

/// Instance extensions needed to present to a window on this platform.
///
/// The returned pointers reference static strings owned by the loader.
pub fn get_required_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const std::ffi::c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Vulkan(format!("Failed to enumerate surface extensions: {}", e)))?;

    tracing::debug!(
        "Surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash_window returns valid, null-terminated static strings.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
