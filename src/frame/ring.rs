// Frame ring - N frame slots cycled in order
//
// One cycle on slot `s`:
//   wait fence(s) -> reset -> acquire image -> begin commands
//   -> stage instances -> copy -> barrier -> pass { bind, draw } -> end
//   -> submit (wait acquire, signal render-finished + fence) -> present
//   -> s = (s + 1) % N
//
// While slot `s` records, the GPU may still be executing the other slots.

use super::slot::{next_slot, SlotState};
use super::upload::{check_capacity, stage_and_copy};
use super::{BufferRole, FrameQueue};
use crate::geometry::{GeometryAsset, InstanceRecord};
use anyhow::{bail, ensure, Context, Result};

/// The cycle currently being recorded
#[derive(Clone, Copy, Debug)]
struct ActiveCycle {
    slot: usize,
    image_index: u32,
    /// Instances uploaded this cycle, `None` until `upload_instances` ran
    instance_count: Option<u32>,
}

pub struct FrameRing<Q: FrameQueue> {
    queue: Q,
    states: Box<[SlotState]>,
    current: usize,
    active: Option<ActiveCycle>,
    index_count: u32,
    cycles: u64,
}

impl<Q: FrameQueue> FrameRing<Q> {
    /// Take ownership of the queue and upload the static disc into every slot.
    ///
    /// The upload waits for the queue to go idle, so the first cycle never
    /// overlaps with it.
    pub fn new(mut queue: Q, geometry: &GeometryAsset) -> Result<Self> {
        let slot_count = queue.slot_count();
        ensure!(slot_count > 0, "frame ring needs at least one slot");

        upload_static(&mut queue, BufferRole::Vertex, geometry.vertex_bytes())
            .context("Failed to upload disc vertices")?;
        upload_static(&mut queue, BufferRole::Index, geometry.index_bytes())
            .context("Failed to upload disc indices")?;

        log::info!(
            "Frame ring ready: {} slots, {} bytes staging each",
            slot_count,
            queue.staging_capacity()
        );

        Ok(Self {
            queue,
            states: vec![SlotState::Idle; slot_count].into_boxed_slice(),
            current: 0,
            active: None,
            index_count: geometry.index_count(),
            cycles: 0,
        })
    }

    /// Record and present one frame drawing `records` as instances.
    ///
    /// The capacity check runs before the slot's fence is touched, so an
    /// oversized call leaves the ring exactly as it was.
    pub fn render_one_cycle(&mut self, records: &[InstanceRecord]) -> Result<()> {
        check_capacity(&self.queue, instance_bytes(records))?;
        self.begin_cycle()?;
        self.upload_instances(records)?;
        self.end_cycle()
    }

    /// Idle -> Acquiring -> Recording on the current slot. Returns the image index.
    pub fn begin_cycle(&mut self) -> Result<u32> {
        if let Some(active) = self.active {
            bail!("slot {} is still recording", active.slot);
        }
        let slot = self.current;

        // A slot left in Acquiring by a failed acquire has an unsignaled
        // fence with no work behind it; waiting on it would never return
        match self.states[slot] {
            SlotState::Idle | SlotState::Submitted => {}
            state => bail!("slot {} is {:?}, its fence cannot be waited on", slot, state),
        }

        // Submitted work of this slot retires once its fence is waited on
        self.queue.wait_for_slot(slot)?;
        if self.states[slot] == SlotState::Submitted {
            self.transition(slot, SlotState::Idle)?;
        }
        self.transition(slot, SlotState::Acquiring)?;

        let image_index = self.queue.acquire_image(slot)?;
        self.queue.begin_commands(slot)?;
        self.transition(slot, SlotState::Recording)?;

        self.active = Some(ActiveCycle {
            slot,
            image_index,
            instance_count: None,
        });
        log::trace!("Cycle {} on slot {} -> image {}", self.cycles, slot, image_index);
        Ok(image_index)
    }

    /// Stage this cycle's instance records and record copy + barrier.
    ///
    /// Allowed once per cycle: a second call would overwrite staging bytes
    /// the first copy has not read yet.
    pub fn upload_instances(&mut self, records: &[InstanceRecord]) -> Result<()> {
        let mut active = self.recording_cycle()?;
        ensure!(
            active.instance_count.is_none(),
            "instances already uploaded for slot {} this cycle",
            active.slot
        );

        let bytes: &[u8] = bytemuck::cast_slice(records);
        stage_and_copy(&mut self.queue, active.slot, active.slot, BufferRole::Instance, bytes)?;

        active.instance_count = Some(records.len() as u32);
        self.active = Some(active);
        Ok(())
    }

    /// Draw, close the command buffer, submit and present. Recording -> Submitted.
    pub fn end_cycle(&mut self) -> Result<()> {
        let active = self.recording_cycle()?;
        let slot = active.slot;
        let instance_count = active.instance_count.unwrap_or(0);

        self.queue.cmd_begin_pass(slot, active.image_index);
        self.queue.cmd_draw_instances(slot, self.index_count, instance_count);
        self.queue.cmd_end_pass(slot);
        self.queue.end_commands(slot)?;

        self.queue.submit_frame(slot)?;
        self.transition(slot, SlotState::Submitted)?;
        self.active = None;
        self.queue.present(slot, active.image_index)?;

        self.current = next_slot(self.current, self.states.len());
        self.cycles += 1;
        Ok(())
    }

    /// Wait for all in-flight GPU work. Must run before GPU resources are released.
    pub fn drain(&mut self) -> Result<()> {
        ensure!(self.active.is_none(), "cannot drain while a slot is recording");
        self.queue.wait_idle()?;
        for state in self.states.iter_mut() {
            if *state == SlotState::Submitted {
                *state = SlotState::Idle;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn current_slot(&self) -> usize {
        self.current
    }

    #[cfg(test)]
    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[cfg(test)]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[cfg(test)]
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    fn recording_cycle(&self) -> Result<ActiveCycle> {
        let active = self.active.context("no cycle is recording")?;
        ensure!(
            self.states[active.slot] == SlotState::Recording,
            "slot {} is {:?}, not recording",
            active.slot,
            self.states[active.slot]
        );
        Ok(active)
    }

    fn transition(&mut self, slot: usize, to: SlotState) -> Result<()> {
        let from = self.states[slot];
        ensure!(
            from.advance() == to,
            "slot {} cannot move from {:?} to {:?}",
            slot,
            from,
            to
        );
        self.states[slot] = to;
        Ok(())
    }
}

fn instance_bytes(records: &[InstanceRecord]) -> u64 {
    records.len() as u64 * InstanceRecord::SIZE
}

/// Copy `bytes` into the `dst` buffer of every slot, recorded on slot 0.
///
/// Not fenced: slot 0's fence keeps its initial signaled state for the
/// first cycle.
fn upload_static<Q: FrameQueue>(queue: &mut Q, dst: BufferRole, bytes: &[u8]) -> Result<()> {
    let recorder = 0;
    queue.begin_commands(recorder)?;
    for owner in 0..queue.slot_count() {
        stage_and_copy(queue, recorder, owner, dst, bytes)?;
    }
    queue.end_commands(recorder)?;
    queue.submit_and_wait_idle(recorder)?;
    Ok(())
}
