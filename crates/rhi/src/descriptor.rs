//! Descriptor set layouts, pools and writes.
//!
//! The renderer binds two sets: the per-frame uniform block and one
//! combined image sampler per material.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        // SAFETY: valid create info on a live device.
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        // SAFETY: pipelines using this layout are destroyed first.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool that hands out descriptor sets; the sets die with it.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        // SAFETY: valid create info on a live device.
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );
        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocate one set per entry in `layouts`.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);
        // SAFETY: the pool is alive; exhaustion is reported as an error.
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets)
    }

    pub fn allocate_one(&self, layout: &DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        self.allocate(&[layout.handle()])?
            .into_iter()
            .next()
            .ok_or_else(|| vk::Result::ERROR_OUT_OF_POOL_MEMORY.into())
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // SAFETY: no command buffer referencing these sets is pending.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Point `binding` of `set` at a whole uniform buffer.
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    range: vk::DeviceSize,
) {
    let buffer_infos = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(0)
        .range(range)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&buffer_infos);
    // SAFETY: the set is not in use by a pending command buffer.
    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

/// Point `binding` of `set` at a sampled image in `SHADER_READ_ONLY_OPTIMAL`.
pub fn write_combined_image(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    sampler: vk::Sampler,
    view: vk::ImageView,
) {
    let image_infos = [vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_infos);
    // SAFETY: the set is not in use by a pending command buffer.
    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

/// Shorthand constructors for single-descriptor bindings.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    pub fn uniform_buffer(
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stages)
    }

    pub fn combined_image_sampler(
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(stages)
    }
}
