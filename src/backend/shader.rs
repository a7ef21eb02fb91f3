// Shader module loading
//
// Shaders arrive as precompiled SPIR-V blobs. They are only needed while the
// pipeline is built, so the module is destroyed as soon as it drops.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;
use super::VulkanDevice;

/// Entry point of both disc shader stages
pub const ENTRY_POINT: &std::ffi::CStr = c"main";

pub struct ShaderModule {
    pub module: vk::ShaderModule,
    device: Arc<VulkanDevice>,
}

impl ShaderModule {
    /// Read a SPIR-V file from disk
    pub fn load(device: &Arc<VulkanDevice>, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read shader {:?}", path))?;
        Self::from_spirv(device, &bytes)
            .with_context(|| format!("Invalid shader {:?}", path))
    }

    /// Create a shader module from SPIR-V bytes
    pub fn from_spirv(device: &Arc<VulkanDevice>, bytes: &[u8]) -> Result<Self> {
        let code = decode_spirv(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module = unsafe {
            device.device.create_shader_module(&create_info, None)
                .context("Failed to create shader module")?
        };

        Ok(Self {
            module,
            device: device.clone(),
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Re-align SPIR-V bytes into words, checking size and magic number
pub fn decode_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
        .context("SPIR-V must be a whole number of 4-byte words")?;
    anyhow::ensure!(
        code.first() == Some(&0x0723_0203),
        "missing SPIR-V magic number"
    );
    Ok(code)
}
