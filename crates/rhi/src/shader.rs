//! SPIR-V shader modules.
//!
//! Shaders are compiled ahead of time from `shaders/*.vert|frag` into
//! `shaders/spirv/*.spv` and loaded at startup.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

const SPIRV_MAGIC: u32 = 0x0723_0203;
const ENTRY_POINT: &CStr = c"main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode SPIR-V bytes into words, checking alignment and the magic number.
pub fn parse_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::ShaderError(format!("Invalid SPIR-V: {}", e)))?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(other) => Err(RhiError::ShaderError(format!(
            "Bad SPIR-V magic number {:#010x}",
            other
        ))),
        None => Err(RhiError::ShaderError("Empty SPIR-V module".to_string())),
    }
}

/// A shader module with entry point `main`.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
    ) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader {}: {}", path.display(), e))
        })?;
        let shader = Self::from_spirv_bytes(device, &bytes, stage)?;
        debug!("Loaded {} shader {}", stage, path.display());
        Ok(shader)
    }

    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
    ) -> RhiResult<Self> {
        let code = parse_spirv(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        // SAFETY: `code` is a complete SPIR-V module with a valid header.
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        // SAFETY: modules may be destroyed once pipelines are created from them.
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_valid_header() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_parse_rejects_misaligned() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC, 0]);
        bytes.push(0);
        assert!(matches!(parse_spirv(&bytes), Err(RhiError::ShaderError(_))));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let bytes = words_to_bytes(&[0xdead_beef, 0]);
        assert!(parse_spirv(&bytes).is_err());
        assert!(parse_spirv(&[]).is_err());
    }

    #[test]
    fn test_stage_flags() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }
}
