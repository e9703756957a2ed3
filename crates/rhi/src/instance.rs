//! Vulkan instance with optional validation.
//!
//! Surface extensions come from the window's display handle, so the instance
//! only enables what the current windowing system needs.
//!
//! ```no_run
//! use orrery_rhi::instance::Instance;
//! # fn example(window: &orrery_platform::Window) -> Result<(), Box<dyn std::error::Error>> {
//! let display = window.display_handle()?.as_raw();
//! let instance = Instance::new(c"Orrery", cfg!(debug_assertions), display)?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the loader entry, the instance and, with validation, the debug
/// messenger that forwards layer messages to `tracing`.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Load Vulkan and create a 1.3 instance able to present to `display`.
    ///
    /// Validation is skipped with a warning when the layer is not installed.
    pub fn new(
        app_name: &CStr,
        enable_validation: bool,
        display: RawDisplayHandle,
    ) -> RhiResult<Self> {
        // SAFETY: loading the system Vulkan library has no preconditions beyond
        // the library being a conforming loader.
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Orrery")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions: Vec<*const c_char> = orrery_platform::get_required_extensions(display)
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: every pointer in create_info refers to data alive for this call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created ({} extensions, validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        let debug_utils = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = Self::create_messenger(&loader)?;
            debug!("Debug messenger installed");
            Some((loader, messenger))
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_utils.is_some()
    }

    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        // SAFETY: plain query on a loaded entry.
        let layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        }))
    }

    fn create_messenger(
        loader: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        // SAFETY: the callback is a plain function with 'static lifetime.
        Ok(unsafe { loader.create_debug_utils_messenger(&create_info, None)? })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: every object created from this instance has been destroyed by
        // its owner before the instance goes.
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    }
}

/// Routes validation layer messages into the log.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid callback data pointer or null.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: non-null pointer supplied by the loader for this call only.
    let data = unsafe { &*p_callback_data };
    let message = if data.p_message.is_null() {
        Cow::Borrowed("(no message)")
    } else {
        // SAFETY: p_message is a null-terminated string owned by the loader.
        unsafe { CStr::from_ptr(data.p_message).to_string_lossy() }
    };

    let kind = message_type_label(message_type);
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", kind, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", kind, message),
        _ => debug!("[Vulkan {}] {}", kind, message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_labels() {
        assert_eq!(
            message_type_label(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "Validation"
        );
        assert_eq!(
            message_type_label(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            "Performance"
        );
        assert_eq!(
            message_type_label(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            ),
            "Unknown"
        );
    }

    #[test]
    fn test_validation_layer_name() {
        assert_eq!(
            VALIDATION_LAYER_NAME.to_str().ok(),
            Some("VK_LAYER_KHRONOS_validation")
        );
    }

    #[test]
    fn test_callback_ignores_null_data() {
        // SAFETY: a null data pointer is handled before any dereference.
        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }
}
