// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync
// One set per frame slot, destroyed exactly once when the slot drops

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::VulkanDevice;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    /// Signaled by acquire: the image may be rendered into
    pub image_available: vk::Semaphore,
    /// Signaled by the frame's submission, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signaled when all of the frame's GPU work retired
    pub in_flight_fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        unsafe {
            let image_available = device.device.create_semaphore(&semaphore_info, None)
                .context("Failed to create image-available semaphore")?;
            let render_finished = match device.device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create render-finished semaphore");
                }
            };
            let in_flight_fence = match device.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.device.destroy_semaphore(render_finished, None);
                    device.device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create in-flight fence");
                }
            };

            Ok(Self {
                image_available,
                render_finished,
                in_flight_fence,
                device: device.clone(),
            })
        }
    }

    /// Block until the fence signals, then reset it for the next submission
    pub fn wait_and_reset(&self) -> Result<()> {
        unsafe {
            self.device.device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
                .context("Failed to wait for in-flight fence")?;
            self.device.device
                .reset_fences(&[self.in_flight_fence])
                .context("Failed to reset in-flight fence")?;
        }
        Ok(())
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.image_available, None);
            self.device.device.destroy_semaphore(self.render_finished, None);
            self.device.device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
