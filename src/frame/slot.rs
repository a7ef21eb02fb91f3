// Slot state machine
//
// Each slot moves Idle -> Acquiring -> Recording -> Submitted -> Idle once
// per use. Submitted only becomes Idle after the slot's fence was waited on.

/// Where a frame slot is in its cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// No GPU work pending, free to record
    Idle,
    /// Fence retired, waiting for a presentable image
    Acquiring,
    /// Command buffer open
    Recording,
    /// Handed to the queue, GPU work may still be in flight
    Submitted,
}

impl SlotState {
    /// The only state this one may move to
    pub fn advance(self) -> SlotState {
        match self {
            SlotState::Idle => SlotState::Acquiring,
            SlotState::Acquiring => SlotState::Recording,
            SlotState::Recording => SlotState::Submitted,
            SlotState::Submitted => SlotState::Idle,
        }
    }
}

/// Slot that follows `index` in a ring of `count` slots
pub fn next_slot(index: usize, count: usize) -> usize {
    (index + 1) % count
}
