// Streaming upload protocol
//
// Host bytes go into the slot's mapped staging buffer at offset 0, a copy
// into the device-local destination is recorded, and a barrier orders that
// copy before vertex input reads it. Nothing executes until submit.

use super::{BufferRole, FrameQueue};
use crate::geometry::{GeometryAsset, InstanceRecord};
use anyhow::{ensure, Result};

/// Staging capacity shared by every upload kind of a slot.
///
/// Geometry is staged once at startup and instances every cycle; the two
/// never overlap in time, so one buffer sized for the larger kind serves both.
pub fn staging_capacity(max_instances: usize) -> u64 {
    GeometryAsset::vertex_size()
        .max(GeometryAsset::index_size())
        .max(max_instances as u64 * InstanceRecord::SIZE)
}

/// Fail unless `size` bytes fit in the queue's staging buffers
pub fn check_capacity<Q: FrameQueue>(queue: &Q, size: u64) -> Result<()> {
    let capacity = queue.staging_capacity();
    ensure!(
        size <= capacity,
        "upload of {} bytes exceeds staging capacity of {} bytes",
        size,
        capacity
    );
    Ok(())
}

/// Stage `bytes` in `owner`'s staging buffer and record copy + barrier into
/// `recorder`'s command buffer.
///
/// The capacity check happens before anything is written or recorded. An
/// empty upload records nothing.
pub fn stage_and_copy<Q: FrameQueue>(
    queue: &mut Q,
    recorder: usize,
    owner: usize,
    dst: BufferRole,
    bytes: &[u8],
) -> Result<()> {
    let size = bytes.len() as u64;
    check_capacity(queue, size)?;
    if bytes.is_empty() {
        return Ok(());
    }

    queue.staging_mut(owner)[..bytes.len()].copy_from_slice(bytes);
    queue.cmd_copy_from_staging(recorder, owner, dst, size);
    queue.cmd_upload_barrier(recorder, owner, dst);

    log::trace!("Staged {} bytes for slot {} ({:?})", size, owner, dst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::fake::{Command, FakeQueue};

    #[test]
    fn capacity_covers_every_upload_kind() {
        assert_eq!(staging_capacity(1), 300);
        assert_eq!(staging_capacity(25), 300);
        assert_eq!(staging_capacity(26), 312);
        assert_eq!(staging_capacity(100), 1200);
    }

    #[test]
    fn stage_records_copy_then_barrier() {
        let mut queue = FakeQueue::new(2, 300);
        queue.wait_for_slot(1).unwrap();
        queue.begin_commands(1).unwrap();

        stage_and_copy(&mut queue, 1, 1, BufferRole::Instance, &[7u8; 24]).unwrap();

        assert_eq!(&queue.staging(1)[..24], &[7u8; 24]);
        assert_eq!(
            queue.recorded(1),
            &[
                Command::Copy { owner: 1, dst: BufferRole::Instance, size: 24 },
                Command::Barrier { owner: 1, dst: BufferRole::Instance },
            ]
        );
    }

    #[test]
    fn oversized_upload_touches_nothing() {
        let mut queue = FakeQueue::new(1, 300);
        queue.wait_for_slot(0).unwrap();
        queue.begin_commands(0).unwrap();

        let err = stage_and_copy(&mut queue, 0, 0, BufferRole::Instance, &[1u8; 301]).unwrap_err();

        assert!(err.to_string().contains("exceeds staging capacity"));
        assert!(queue.staging(0).iter().all(|&b| b == 0));
        assert!(queue.recorded(0).is_empty());
    }

    #[test]
    fn empty_upload_records_nothing() {
        let mut queue = FakeQueue::new(1, 300);
        queue.wait_for_slot(0).unwrap();
        queue.begin_commands(0).unwrap();

        stage_and_copy(&mut queue, 0, 0, BufferRole::Instance, &[]).unwrap();

        assert!(queue.recorded(0).is_empty());
    }
}
