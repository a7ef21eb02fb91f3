// Vulkan frames in flight
//
// Owns everything one frame slot needs (command buffer, sync triple,
// device-local vertex/index/instance buffers, mapped staging buffer) plus
// the shared swapchain, render pass and pipeline, and exposes them to the
// frame ring as a `FrameQueue`.
//
// Drop order follows field order: slots, command pool, pipeline, render
// target, swapchain, device.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;
use super::buffer::{GpuBuffer, MemoryPreference, StagingBuffer};
use super::commands::CommandPool;
use super::pipeline::{GraphicsPipeline, RenderTarget};
use super::shader::ShaderModule;
use super::sync::FrameSync;
use super::{Swapchain, VulkanDevice};
use crate::config::Config;
use crate::frame::upload::staging_capacity;
use crate::frame::{BufferRole, FrameQueue};
use crate::geometry::GeometryAsset;

/// Resources owned by one frame slot
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub sync: FrameSync,
    pub vertex: GpuBuffer,
    pub index: GpuBuffer,
    pub instance: GpuBuffer,
    pub staging: StagingBuffer,
}

impl FrameSlot {
    fn new(
        device: &Arc<VulkanDevice>,
        slot: usize,
        command_buffer: vk::CommandBuffer,
        capacity: vk::DeviceSize,
    ) -> Result<Self> {
        let sync = FrameSync::new(device)?;

        let vertex = GpuBuffer::new(
            device,
            &format!("disc vertices #{}", slot),
            GeometryAsset::vertex_size(),
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryPreference::DeviceLocal,
        )?;
        let index = GpuBuffer::new(
            device,
            &format!("disc indices #{}", slot),
            GeometryAsset::index_size(),
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryPreference::DeviceLocal,
        )?;
        let instance = GpuBuffer::new(
            device,
            &format!("instances #{}", slot),
            capacity,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryPreference::DeviceLocal,
        )?;
        let staging = StagingBuffer::new(device, &format!("staging #{}", slot), capacity)?;

        Ok(Self {
            command_buffer,
            sync,
            vertex,
            index,
            instance,
            staging,
        })
    }

    fn destination(&self, role: BufferRole) -> &GpuBuffer {
        match role {
            BufferRole::Vertex => &self.vertex,
            BufferRole::Index => &self.index,
            BufferRole::Instance => &self.instance,
        }
    }
}

pub struct VulkanFrames {
    slots: Box<[FrameSlot]>,
    // Frees the slots' command buffers
    _command_pool: CommandPool,
    pipeline: GraphicsPipeline,
    target: RenderTarget,
    swapchain: Swapchain,
    device: Arc<VulkanDevice>,
    clear_color: vk::ClearValue,
    staging_capacity: u64,
    wait_stages: [vk::PipelineStageFlags; 1],
    suboptimal_reported: bool,
}

impl VulkanFrames {
    pub fn new(device: Arc<VulkanDevice>, config: &Config) -> Result<Self> {
        let swapchain = Swapchain::new(
            &device,
            config.window.width,
            config.window.height,
            config.get_present_mode(),
        )?;
        let target = RenderTarget::new(&device, &swapchain)?;

        // Modules are only needed until the pipeline exists
        let pipeline = {
            let vert = ShaderModule::load(&device, &config.graphics.vertex_shader)?;
            let frag = ShaderModule::load(&device, &config.graphics.fragment_shader)?;
            GraphicsPipeline::new(&device, &target, &vert, &frag)?
        };

        let slot_count = config.graphics.frames_in_flight;
        let capacity = staging_capacity(config.graphics.max_instances);

        let command_pool = CommandPool::new(&device)?;
        let command_buffers = command_pool.allocate(slot_count as u32)?;

        let slots = command_buffers
            .into_iter()
            .enumerate()
            .map(|(i, cmd)| {
                FrameSlot::new(&device, i, cmd, capacity)
                    .with_context(|| format!("Failed to create frame slot {}", i))
            })
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        log::info!(
            "Created {} frame slots ({} bytes staging, {} swapchain images)",
            slot_count,
            capacity,
            swapchain.images.len()
        );

        Ok(Self {
            slots,
            _command_pool: command_pool,
            pipeline,
            target,
            swapchain,
            device,
            clear_color: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: config.graphics.clear_color,
                },
            },
            staging_capacity: capacity,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            suboptimal_reported: false,
        })
    }

    fn report_suboptimal(&mut self, suboptimal: bool) {
        if suboptimal && !self.suboptimal_reported {
            log::warn!("Swapchain is suboptimal for the surface, continuing");
            self.suboptimal_reported = true;
        }
    }
}

impl FrameQueue for VulkanFrames {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn staging_capacity(&self) -> u64 {
        self.staging_capacity
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        self.slots[slot].sync.wait_and_reset()
    }

    fn acquire_image(&mut self, slot: usize) -> Result<u32> {
        let semaphore = self.slots[slot].sync.image_available;
        let (image_index, suboptimal) = self.swapchain.acquire_next_image(u64::MAX, semaphore)?;
        self.report_suboptimal(suboptimal);
        Ok(image_index)
    }

    fn begin_commands(&mut self, slot: usize) -> Result<()> {
        let cmd = self.slots[slot].command_buffer;
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;
            self.device.device
                .begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin command buffer")?;
        }
        Ok(())
    }

    fn staging_mut(&mut self, slot: usize) -> &mut [u8] {
        self.slots[slot].staging.bytes_mut()
    }

    fn cmd_copy_from_staging(&mut self, recorder: usize, owner: usize, dst: BufferRole, size: u64) {
        let cmd = self.slots[recorder].command_buffer;
        let owner = &self.slots[owner];
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };

        unsafe {
            self.device.device.cmd_copy_buffer(
                cmd,
                owner.staging.handle(),
                owner.destination(dst).buffer,
                &[region],
            );
        }
    }

    fn cmd_upload_barrier(&mut self, recorder: usize, owner: usize, dst: BufferRole) {
        let cmd = self.slots[recorder].command_buffer;
        let buffer = self.slots[owner].destination(dst).buffer;

        let read_access = match dst {
            BufferRole::Index => vk::AccessFlags::INDEX_READ,
            BufferRole::Vertex | BufferRole::Instance => vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        };

        // TRANSFER write -> VERTEX_INPUT read on the whole destination
        let barrier = vk::BufferMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(read_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();

        unsafe {
            self.device.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    fn cmd_begin_pass(&mut self, slot: usize, image_index: u32) {
        let cmd = self.slots[slot].command_buffer;
        let clear_values = [self.clear_color];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.target.render_pass)
            .framebuffer(self.target.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.target.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.device.cmd_begin_render_pass(
                cmd,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn cmd_draw_instances(&mut self, slot: usize, index_count: u32, instance_count: u32) {
        let frame = &self.slots[slot];
        let cmd = frame.command_buffer;
        let device = &self.device.device;

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            device.cmd_bind_vertex_buffers(
                cmd,
                0,
                &[frame.vertex.buffer, frame.instance.buffer],
                &[0, 0],
            );
            device.cmd_bind_index_buffer(cmd, frame.index.buffer, 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, index_count, instance_count, 0, 0, 0);
        }
    }

    fn cmd_end_pass(&mut self, slot: usize) {
        let cmd = self.slots[slot].command_buffer;
        unsafe {
            self.device.device.cmd_end_render_pass(cmd);
        }
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        let cmd = self.slots[slot].command_buffer;
        unsafe {
            self.device.device
                .end_command_buffer(cmd)
                .context("Failed to end command buffer")
        }
    }

    fn submit_frame(&mut self, slot: usize) -> Result<()> {
        let frame = &self.slots[slot];

        let wait_semaphores = [frame.sync.image_available];
        let signal_semaphores = [frame.sync.render_finished];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)      // Wait for image to be available
            .wait_dst_stage_mask(&self.wait_stages) // Which stage waits
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            self.device.device
                .queue_submit(
                    self.device.graphics_queue,
                    &[submit_info.build()],
                    frame.sync.in_flight_fence, // Signal this fence when GPU is done
                )
                .context("Failed to submit frame")
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let render_finished = self.slots[slot].sync.render_finished;
        let suboptimal = self.swapchain.present(
            self.device.graphics_queue,
            image_index,
            &[render_finished],
        )?;
        self.report_suboptimal(suboptimal);
        Ok(())
    }

    fn submit_and_wait_idle(&mut self, slot: usize) -> Result<()> {
        let command_buffers = [self.slots[slot].command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device.device
                .queue_submit(self.device.graphics_queue, &[submit_info.build()], vk::Fence::null())
                .context("Failed to submit upload")?;
            self.device.device
                .queue_wait_idle(self.device.graphics_queue)
                .context("Failed to wait for upload")?;
        }
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanFrames {
    fn drop(&mut self) {
        // Nothing below may be destroyed while the GPU still uses it
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {:?}", e);
        }
        log::debug!("Releasing {} frame slots", self.slots.len());
    }
}
