use std::{pin::Pin, sync::Arc};

use tokio::sync::{Notify, mpsc};

pub type StartupTask = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct IsolatedForwarder<T> {
    inbox_tx: mpsc::Sender<T>,
}

/// Forwarder drain loops the caller must spawn before publishing.
pub struct StartupTasks {
    pub tokio: Vec<StartupTask>,
}

impl StartupTasks {
    pub fn spawn_all(self) -> Vec<tokio::task::JoinHandle<()>> {
        self.tokio.into_iter().map(tokio::spawn).collect()
    }
}

impl<T: Send + 'static> IsolatedForwarder<T> {
    pub fn new(
        output_buffer: usize,
        notify_any: Arc<Notify>,
    ) -> (IsolatedForwarder<T>, mpsc::Receiver<T>, StartupTask) {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<T>(output_buffer);
        let (out_tx, out_rx) = mpsc::channel::<T>(output_buffer);

        let drain_task = Box::pin(async move {
            while let Some(value) = inbox_rx.recv().await {
                if out_tx.send(value).await.is_err() {
                    break;
                }
                notify_any.notify_one();
            }
        });

        (IsolatedForwarder { inbox_tx }, out_rx, drain_task)
    }

    pub fn try_send(&self, value: T) -> Result<(), T> {
        self.inbox_tx.try_send(value).map_err(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_in_order_once_drained() {
        let notify = Arc::new(Notify::new());
        let (fwd, mut rx, task) = IsolatedForwarder::new(4, notify);
        tokio::spawn(task);

        fwd.try_send(1).unwrap();
        fwd.try_send(2).unwrap();

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[test]
    fn rejects_when_inbox_full() {
        let (fwd, _rx, _task) = IsolatedForwarder::new(1, Arc::new(Notify::new()));
        fwd.try_send(1).unwrap();
        assert_eq!(fwd.try_send(2), Err(2));
    }
}
