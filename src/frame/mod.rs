// Frame module - frames in flight and per-frame streaming
//
// FrameRing drives the acquire -> record -> submit -> present cycle over N
// slots. Everything it asks of the GPU goes through `FrameQueue`, so the
// ordering rules can be exercised without a device.

pub mod ring;
pub mod slot;
pub mod upload;

#[cfg(test)]
pub mod fake;

pub use ring::FrameRing;

use anyhow::Result;

/// Device-local destination of a staged copy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferRole {
    Vertex,
    Index,
    Instance,
}

/// GPU operations needed by the frame ring.
///
/// `slot` always names one of the `slot_count()` frame slots. Commands
/// (`cmd_*`) are appended to the command buffer of the slot given as
/// `recorder` or `slot`; nothing executes before the matching submit.
pub trait FrameQueue {
    fn slot_count(&self) -> usize;

    /// Bytes available in every slot's staging buffer
    fn staging_capacity(&self) -> u64;

    /// Block until the slot's completion fence is signaled, then reset it
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next presentable image, signalling the slot's acquire semaphore
    fn acquire_image(&mut self, slot: usize) -> Result<u32>;

    /// Reset the slot's command buffer and begin one-time recording
    fn begin_commands(&mut self, slot: usize) -> Result<()>;

    /// Host view of the slot's persistently mapped staging buffer
    fn staging_mut(&mut self, slot: usize) -> &mut [u8];

    /// Copy `size` bytes from `owner`'s staging buffer into `owner`'s `dst` buffer
    fn cmd_copy_from_staging(&mut self, recorder: usize, owner: usize, dst: BufferRole, size: u64);

    /// Make the transfer into `owner`'s `dst` buffer visible to vertex input
    fn cmd_upload_barrier(&mut self, recorder: usize, owner: usize, dst: BufferRole);

    /// Begin the render pass on the framebuffer of `image_index`, clearing it
    fn cmd_begin_pass(&mut self, slot: usize, image_index: u32);

    /// Bind pipeline and buffers, then draw `index_count` indices `instance_count` times
    fn cmd_draw_instances(&mut self, slot: usize, index_count: u32, instance_count: u32);

    fn cmd_end_pass(&mut self, slot: usize);

    fn end_commands(&mut self, slot: usize) -> Result<()>;

    /// Submit the slot's commands: wait acquire, signal render-finished and the fence
    fn submit_frame(&mut self, slot: usize) -> Result<()>;

    /// Present `image_index` once the slot's render-finished semaphore fires
    fn present(&mut self, slot: usize, image_index: u32) -> Result<()>;

    /// Submit the slot's commands without semaphores or fence and wait for the queue
    fn submit_and_wait_idle(&mut self, slot: usize) -> Result<()>;

    /// Wait until the device has no pending work
    fn wait_idle(&mut self) -> Result<()>;
}
