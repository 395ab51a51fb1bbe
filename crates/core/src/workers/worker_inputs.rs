use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestReceiver, Latest1Queue},
};

pub struct Latest1Input {
    pub event_type: &'static str,
    pub queue: Arc<Latest1Queue<Arc<EnrichedEvent>>>,
}

pub enum FifoReceiver {
    FifoDropOldest(FifoDropOldestReceiver<Arc<EnrichedEvent>>),
    Isolated(mpsc::Receiver<Arc<EnrichedEvent>>),
}

impl FifoReceiver {
    fn try_recv(&mut self) -> Option<Arc<EnrichedEvent>> {
        match self {
            FifoReceiver::FifoDropOldest(r) => r.try_recv(),
            FifoReceiver::Isolated(r) => r.try_recv().ok(),
        }
    }
}

pub struct FifoInput {
    pub event_type: &'static str,
    pub receiver: FifoReceiver,
}

/// Every inbox of one worker, sharing a single wakeup.
pub struct WorkerInputs {
    pub latest: Vec<Latest1Input>,
    pub fifos: Vec<FifoInput>,
    pub notify_any: Arc<Notify>,
    pub fifo_index: usize,
}

pub enum WorkerBatch {
    Snapshots(Vec<SnapshotUpdate>),
    FifoItem {
        event_type: &'static str,
        event: Arc<EnrichedEvent>,
    },
}

pub struct SnapshotUpdate {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    /// Waits for the next batch. Snapshots win over FIFO items; FIFO inputs
    /// are polled round-robin so one busy input cannot starve the others.
    pub async fn next(&mut self) -> WorkerBatch {
        loop {
            let snaps = self.drain_snapshots();
            if !snaps.is_empty() {
                return WorkerBatch::Snapshots(snaps);
            }

            if let Some(batch) = self.next_fifo() {
                return batch;
            }

            self.notify_any.notified().await;
        }
    }

    fn drain_snapshots(&self) -> Vec<SnapshotUpdate> {
        self.latest
            .iter()
            .filter_map(|l| {
                l.queue.try_recv().map(|event| SnapshotUpdate {
                    event_type: l.event_type,
                    event,
                })
            })
            .collect()
    }

    fn next_fifo(&mut self) -> Option<WorkerBatch> {
        let len = self.fifos.len();
        for _ in 0..len {
            let i = self.fifo_index;
            self.fifo_index = (self.fifo_index + 1) % len;

            let fifo = &mut self.fifos[i];
            if let Some(event) = fifo.receiver.try_recv() {
                return Some(WorkerBatch::FifoItem {
                    event_type: fifo.event_type,
                    event,
                });
            }
        }
        None
    }
}
