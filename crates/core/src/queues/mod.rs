pub mod fifo_drop_oldest_queue;
pub mod isolated_forwarder;
pub mod latest1_queue;

pub use fifo_drop_oldest_queue::*;
pub use isolated_forwarder::*;
pub use latest1_queue::*;

/// How a subscriber's inbox behaves when it falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Only the newest event is kept. Suited to progress snapshots.
    Latest1,
    FifoDropOldest { capacity: usize },
    /// Bounded forwarder task; the publisher never blocks, full inboxes drop.
    Isolated { output_buffer: usize },
}
