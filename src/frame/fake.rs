// In-memory FrameQueue for tests
//
// Models what the ring must respect: fences start signaled, submitted work
// only "executes" when its fence is waited on (or the queue drains), and
// buffer contents are plain byte vectors. Every ordering violation panics.

use super::{BufferRole, FrameQueue};
use crate::geometry::{GeometryAsset, InstanceRecord};
use anyhow::{bail, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Copy { owner: usize, dst: BufferRole, size: u64 },
    Barrier { owner: usize, dst: BufferRole },
    BeginPass { image_index: u32 },
    Draw { index_count: u32, instance_count: u32 },
    EndPass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
}

/// What one executed draw saw in GPU memory
#[derive(Clone, Debug)]
pub struct DrawSnapshot {
    pub slot: usize,
    pub image_index: u32,
    pub instances: Vec<InstanceRecord>,
    pub vertices: Vec<u8>,
    pub indices: Vec<u8>,
}

struct FakeSlot {
    fence: FenceState,
    in_flight: bool,
    recording: bool,
    commands: Vec<Command>,
    pending: Vec<Command>,
    submitted_at: u64,
    acquired: Option<u32>,
    staging: Vec<u8>,
    vertex: Vec<u8>,
    index: Vec<u8>,
    instance: Vec<u8>,
}

impl FakeSlot {
    fn new(staging_capacity: u64) -> Self {
        Self {
            fence: FenceState::Signaled,
            in_flight: false,
            recording: false,
            commands: Vec::new(),
            pending: Vec::new(),
            submitted_at: 0,
            acquired: None,
            staging: vec![0; staging_capacity as usize],
            vertex: vec![0; GeometryAsset::vertex_size() as usize],
            index: vec![0; GeometryAsset::index_size() as usize],
            instance: vec![0; staging_capacity as usize],
        }
    }

    fn buffer_mut(&mut self, role: BufferRole) -> &mut Vec<u8> {
        match role {
            BufferRole::Vertex => &mut self.vertex,
            BufferRole::Index => &mut self.index,
            BufferRole::Instance => &mut self.instance,
        }
    }
}

pub struct FakeQueue {
    slots: Vec<FakeSlot>,
    staging_capacity: u64,
    image_count: u32,
    next_image: u32,
    fail_acquire: bool,
    presented: Vec<(usize, u32)>,
    draws: Vec<DrawSnapshot>,
    fence_waits: usize,
    idle_waits: usize,
    max_in_flight: usize,
    submissions: u64,
}

impl FakeQueue {
    pub fn new(slot_count: usize, staging_capacity: u64) -> Self {
        Self {
            slots: (0..slot_count).map(|_| FakeSlot::new(staging_capacity)).collect(),
            staging_capacity,
            image_count: 3,
            next_image: 0,
            fail_acquire: false,
            presented: Vec::new(),
            draws: Vec::new(),
            fence_waits: 0,
            idle_waits: 0,
            max_in_flight: 0,
            submissions: 0,
        }
    }

    pub fn fail_next_acquire(&mut self) {
        self.fail_acquire = true;
    }

    pub fn fence(&self, slot: usize) -> FenceState {
        self.slots[slot].fence
    }

    pub fn in_flight(&self, slot: usize) -> bool {
        self.slots[slot].in_flight
    }

    pub fn staging(&self, slot: usize) -> &[u8] {
        &self.slots[slot].staging
    }

    pub fn instance_buffer(&self, slot: usize) -> &[u8] {
        &self.slots[slot].instance
    }

    pub fn vertex_buffer(&self, slot: usize) -> &[u8] {
        &self.slots[slot].vertex
    }

    pub fn index_buffer(&self, slot: usize) -> &[u8] {
        &self.slots[slot].index
    }

    /// Commands of the slot's latest recording
    pub fn recorded(&self, slot: usize) -> &[Command] {
        &self.slots[slot].commands
    }

    pub fn presented(&self) -> &[(usize, u32)] {
        &self.presented
    }

    pub fn draws(&self) -> &[DrawSnapshot] {
        &self.draws
    }

    pub fn fence_waits(&self) -> usize {
        self.fence_waits
    }

    pub fn idle_waits(&self) -> usize {
        self.idle_waits
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    fn push(&mut self, recorder: usize, command: Command) {
        let slot = &mut self.slots[recorder];
        assert!(slot.recording, "slot {} recorded {:?} outside recording", recorder, command);
        slot.commands.push(command);
    }

    /// Run commands as the GPU would, in recorded order
    fn execute(&mut self, slot: usize, commands: Vec<Command>) {
        let mut image_index = None;
        for command in commands {
            match command {
                Command::Copy { owner, dst, size } => {
                    let size = size as usize;
                    let target = &mut self.slots[owner];
                    let bytes = target.staging[..size].to_vec();
                    let buffer = target.buffer_mut(dst);
                    assert!(size <= buffer.len(), "copy overflows {:?} buffer", dst);
                    buffer[..size].copy_from_slice(&bytes);
                }
                Command::Barrier { .. } | Command::EndPass => {}
                Command::BeginPass { image_index: index } => image_index = Some(index),
                Command::Draw { instance_count, .. } => {
                    let image_index = image_index.expect("draw outside render pass");
                    let source = &self.slots[slot];
                    let instances = source
                        .instance
                        .chunks_exact(InstanceRecord::SIZE as usize)
                        .take(instance_count as usize)
                        .map(bytemuck::pod_read_unaligned::<InstanceRecord>)
                        .collect::<Vec<_>>();
                    assert_eq!(instances.len(), instance_count as usize, "draw past instance buffer");
                    self.draws.push(DrawSnapshot {
                        slot,
                        image_index,
                        instances,
                        vertices: source.vertex.clone(),
                        indices: source.index.clone(),
                    });
                }
            }
        }
    }

    fn retire(&mut self, slot: usize) {
        if self.slots[slot].in_flight {
            let commands = std::mem::take(&mut self.slots[slot].pending);
            self.execute(slot, commands);
            self.slots[slot].in_flight = false;
            self.slots[slot].fence = FenceState::Signaled;
        }
    }
}

impl FrameQueue for FakeQueue {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn staging_capacity(&self) -> u64 {
        self.staging_capacity
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        self.retire(slot);
        assert_eq!(
            self.slots[slot].fence,
            FenceState::Signaled,
            "waiting on slot {} fence that will never signal",
            slot
        );
        self.slots[slot].fence = FenceState::Unsignaled;
        self.fence_waits += 1;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<u32> {
        if std::mem::take(&mut self.fail_acquire) {
            bail!("Swapchain out of date");
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.slots[slot].acquired = Some(index);
        Ok(index)
    }

    fn begin_commands(&mut self, slot: usize) -> Result<()> {
        let state = &mut self.slots[slot];
        assert!(!state.in_flight, "slot {} command buffer reset while in flight", slot);
        assert!(!state.recording, "slot {} already recording", slot);
        state.commands.clear();
        state.recording = true;
        Ok(())
    }

    fn staging_mut(&mut self, slot: usize) -> &mut [u8] {
        let state = &mut self.slots[slot];
        assert!(
            !state.in_flight,
            "CPU wrote staging of slot {} while its GPU work is in flight",
            slot
        );
        &mut state.staging
    }

    fn cmd_copy_from_staging(&mut self, recorder: usize, owner: usize, dst: BufferRole, size: u64) {
        assert!(!self.slots[owner].in_flight, "copy target slot {} is in flight", owner);
        self.push(recorder, Command::Copy { owner, dst, size });
    }

    fn cmd_upload_barrier(&mut self, recorder: usize, owner: usize, dst: BufferRole) {
        self.push(recorder, Command::Barrier { owner, dst });
    }

    fn cmd_begin_pass(&mut self, slot: usize, image_index: u32) {
        self.push(slot, Command::BeginPass { image_index });
    }

    fn cmd_draw_instances(&mut self, slot: usize, index_count: u32, instance_count: u32) {
        self.push(slot, Command::Draw { index_count, instance_count });
    }

    fn cmd_end_pass(&mut self, slot: usize) {
        self.push(slot, Command::EndPass);
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        let state = &mut self.slots[slot];
        assert!(state.recording, "slot {} ended without recording", slot);
        state.recording = false;
        Ok(())
    }

    fn submit_frame(&mut self, slot: usize) -> Result<()> {
        let state = &mut self.slots[slot];
        assert!(!state.recording, "slot {} submitted while recording", slot);
        assert!(state.acquired.is_some(), "slot {} submitted without an image", slot);
        assert_eq!(state.fence, FenceState::Unsignaled, "slot {} submitted with signaled fence", slot);
        state.pending = state.commands.clone();
        state.in_flight = true;
        state.submitted_at = self.submissions;
        self.submissions += 1;

        let in_flight = self.slots.iter().filter(|s| s.in_flight).count();
        self.max_in_flight = self.max_in_flight.max(in_flight);
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let state = &mut self.slots[slot];
        assert!(state.in_flight, "slot {} presented before its rendering was submitted", slot);
        assert_eq!(state.acquired.take(), Some(image_index), "slot {} presented a foreign image", slot);
        self.presented.push((slot, image_index));
        Ok(())
    }

    fn submit_and_wait_idle(&mut self, slot: usize) -> Result<()> {
        assert!(!self.slots[slot].recording, "slot {} submitted while recording", slot);
        let commands = self.slots[slot].commands.clone();
        self.execute(slot, commands);
        self.wait_idle()
    }

    fn wait_idle(&mut self) -> Result<()> {
        // The queue finishes work in submission order
        let mut in_flight: Vec<usize> = (0..self.slots.len())
            .filter(|&slot| self.slots[slot].in_flight)
            .collect();
        in_flight.sort_by_key(|&slot| self.slots[slot].submitted_at);
        for slot in in_flight {
            self.retire(slot);
        }
        self.idle_waits += 1;
        Ok(())
    }
}
