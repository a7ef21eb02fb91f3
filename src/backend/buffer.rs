// GPU buffers backed by gpu-allocator
//
// `GpuBuffer` owns a vk::Buffer and its allocation and releases both exactly
// once on drop. `StagingBuffer` adds the persistent host mapping used by the
// streaming upload path.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::ptr::NonNull;
use std::sync::Arc;
use super::VulkanDevice;

/// Where a buffer's memory should live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryPreference {
    /// Fastest for the GPU, possibly not host visible
    DeviceLocal,
    /// Host visible, mapped for the buffer's whole life, written front to back
    HostVisibleSequentialWrite,
}

impl MemoryPreference {
    pub fn location(self) -> MemoryLocation {
        match self {
            MemoryPreference::DeviceLocal => MemoryLocation::GpuOnly,
            MemoryPreference::HostVisibleSequentialWrite => MemoryLocation::CpuToGpu,
        }
    }
}

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    allocation: Option<Allocation>,
    device: Arc<VulkanDevice>,
}

impl GpuBuffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        device: &Arc<VulkanDevice>,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        preference: MemoryPreference,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.device.create_buffer(&buffer_info, None)
                .with_context(|| format!("Failed to create buffer '{}'", name))?
        };

        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

        let allocation = match device.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: preference.location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop cleans up on failure
        let gpu_buffer = Self {
            buffer,
            allocation: Some(allocation),
            device: device.clone(),
        };

        if let Some(allocation) = gpu_buffer.allocation.as_ref() {
            unsafe {
                device.device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .with_context(|| format!("Failed to bind memory of buffer '{}'", name))?;
            }
        }

        log::debug!("Created buffer '{}' ({} bytes, {:?})", name, size, preference);
        Ok(gpu_buffer)
    }

    fn mapped_ptr(&self) -> Option<NonNull<u8>> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.cast::<u8>())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.free(allocation) {
                log::error!("Failed to free buffer memory: {:?}", e);
            }
        }
    }
}

/// Host-visible transfer source with a stable mapped pointer
pub struct StagingBuffer {
    buffer: GpuBuffer,
    ptr: NonNull<u8>,
    capacity: usize,
}

impl StagingBuffer {
    pub fn new(device: &Arc<VulkanDevice>, name: &str, capacity: vk::DeviceSize) -> Result<Self> {
        let buffer = GpuBuffer::new(
            device,
            name,
            capacity,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryPreference::HostVisibleSequentialWrite,
        )?;

        let ptr = buffer
            .mapped_ptr()
            .with_context(|| format!("Staging buffer '{}' is not host mapped", name))?;

        Ok(Self {
            buffer,
            ptr,
            capacity: capacity as usize,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    /// Host view of the whole staging buffer.
    ///
    /// The caller must make sure no submitted GPU work still reads it.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // Safety: the mapping lives as long as `self.buffer` and spans at
        // least `capacity` bytes; &mut self rules out aliasing on the host.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }
}
