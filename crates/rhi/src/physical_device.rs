//! GPU selection.
//!
//! A device qualifies when it speaks Vulkan 1.3, supports sampler anisotropy
//! for the planet textures, and has queue families that can draw and present
//! to the window surface. Among qualifying devices, discrete GPUs win.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices the renderer needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Graphics family, or an error naming what is missing.
    pub fn graphics(&self) -> RhiResult<u32> {
        self.graphics_family
            .ok_or(RhiError::MissingQueueFamily("graphics"))
    }

    pub fn present(&self) -> RhiResult<u32> {
        self.present_family
            .ok_or(RhiError::MissingQueueFamily("present"))
    }

    /// Distinct families, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        for family in [self.graphics_family, self.present_family]
            .into_iter()
            .flatten()
        {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    /// Pick families from `properties`, preferring one that does both jobs.
    pub fn pick(
        properties: &[vk::QueueFamilyProperties],
        supports_present: impl Fn(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();
        for (i, family) in properties.iter().enumerate() {
            let i = i as u32;
            if family.queue_count == 0 {
                continue;
            }
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = supports_present(i);

            if graphics && present {
                return Self {
                    graphics_family: Some(i),
                    present_family: Some(i),
                };
            }
            if graphics && indices.graphics_family.is_none() {
                indices.graphics_family = Some(i);
            }
            if present && indices.present_family.is_none() {
                indices.present_family = Some(i);
            }
        }
        indices
    }
}

/// A selected GPU with the properties used to configure the device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Upper bound for sampler anisotropy on this device.
    pub fn max_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }

    /// Total device-local heap size in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

fn supports_vulkan_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

/// Higher is better. Device type dominates; memory breaks ties.
fn rate_device(device_type: vk::PhysicalDeviceType, device_local_bytes: u64) -> u64 {
    let type_score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };
    let vram_mb = (device_local_bytes / (1024 * 1024)).min(16_000);
    type_score + vram_mb
}

/// Choose the best GPU that can render to `surface`.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    // SAFETY: enumerating devices on a live instance.
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device(info.properties.device_type, info.device_local_memory());
            debug!(
                "GPU '{}' ({}) scored {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    match best {
        Some((info, _)) => {
            info!(
                "Selected GPU: '{}' ({})",
                info.device_name(),
                info.device_type_name()
            );
            Ok(info)
        }
        None => {
            warn!("No GPU meets the requirements");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    // SAFETY: `device` came from this instance.
    let (properties, features, memory_properties, families) = unsafe {
        (
            instance.get_physical_device_properties(device),
            instance.get_physical_device_features(device),
            instance.get_physical_device_memory_properties(device),
            instance.get_physical_device_queue_family_properties(device),
        )
    };

    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !supports_vulkan_1_3(properties.api_version) {
        debug!("GPU '{}' skipped: Vulkan 1.3 not supported", name);
        return None;
    }
    if features.sampler_anisotropy == vk::FALSE {
        debug!("GPU '{}' skipped: no sampler anisotropy", name);
        return None;
    }

    let queue_families = QueueFamilyIndices::pick(&families, |i| {
        // SAFETY: `i` indexes this device's queue families.
        unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        }
    });
    if !queue_families.is_complete() {
        debug!("GPU '{}' skipped: cannot draw and present", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_pick_prefers_combined_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let picked = QueueFamilyIndices::pick(&families, |i| i != 0);
        assert_eq!(picked.graphics_family, Some(2));
        assert_eq!(picked.present_family, Some(2));
        assert_eq!(picked.unique_families(), vec![2]);
    }

    #[test]
    fn test_pick_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let picked = QueueFamilyIndices::pick(&families, |i| i == 1);
        assert!(picked.is_complete());
        assert_eq!(picked.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_pick_skips_empty_family() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let picked = QueueFamilyIndices::pick(&[empty], |_| true);
        assert!(!picked.is_complete());
        assert!(matches!(
            picked.graphics(),
            Err(RhiError::MissingQueueFamily("graphics"))
        ));
        assert!(picked.present().is_err());
    }

    #[test]
    fn test_version_check() {
        assert!(supports_vulkan_1_3(vk::API_VERSION_1_3));
        assert!(supports_vulkan_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!supports_vulkan_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn test_discrete_beats_integrated() {
        let gib = 1024 * 1024 * 1024;
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 2 * gib);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 64 * gib);
        assert!(discrete > integrated);
        assert!(
            rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 8 * gib)
                > rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 4 * gib)
        );
    }

    #[test]
    fn test_device_type_names() {
        assert_eq!(
            device_type_name(vk::PhysicalDeviceType::DISCRETE_GPU),
            "Discrete GPU"
        );
        assert_eq!(device_type_name(vk::PhysicalDeviceType::OTHER), "Other");
    }
}
