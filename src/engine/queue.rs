use tokio::sync::mpsc;

use crate::error::AppError;
use crate::observability::metrics::Metrics;

/// A persisted ride waiting to be announced to nearby drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchJob {
    pub trip_id: i64,
}

#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchJob>,
    metrics: Metrics,
}

impl DispatchQueue {
    pub fn new(capacity: usize, metrics: Metrics) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, metrics }, rx)
    }

    /// The depth gauge is raised before the send so the worker's decrement never
    /// runs ahead of it.
    pub async fn enqueue(&self, job: DispatchJob) -> Result<(), AppError> {
        self.metrics.dispatch_queue_depth.inc();

        if let Err(err) = self.tx.send(job).await {
            self.metrics.dispatch_queue_depth.dec();
            return Err(AppError::Internal(format!("dispatch queue send failed: {err}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchJob, DispatchQueue};
    use crate::error::AppError;
    use crate::observability::metrics::Metrics;

    #[tokio::test]
    async fn enqueue_tracks_queue_depth() {
        let metrics = Metrics::new().unwrap();
        let (queue, mut rx) = DispatchQueue::new(4, metrics.clone());

        queue.enqueue(DispatchJob { trip_id: 1 }).await.unwrap();
        queue.enqueue(DispatchJob { trip_id: 2 }).await.unwrap();

        assert_eq!(metrics.dispatch_queue_depth.get(), 2);
        assert_eq!(rx.recv().await, Some(DispatchJob { trip_id: 1 }));
    }

    #[tokio::test]
    async fn enqueue_after_worker_is_gone_fails() {
        let metrics = Metrics::new().unwrap();
        let (queue, rx) = DispatchQueue::new(4, metrics.clone());
        drop(rx);

        let err = queue.enqueue(DispatchJob { trip_id: 1 }).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(metrics.dispatch_queue_depth.get(), 0);
    }

    #[tokio::test]
    async fn depth_is_raised_before_the_job_is_visible() {
        let metrics = Metrics::new().unwrap();
        let (queue, mut rx) = DispatchQueue::new(4, metrics.clone());

        queue.enqueue(DispatchJob { trip_id: 7 }).await.unwrap();
        let job = rx.recv().await.unwrap();
        metrics.dispatch_queue_depth.dec();

        assert_eq!(job, DispatchJob { trip_id: 7 });
        assert_eq!(metrics.dispatch_queue_depth.get(), 0);
    }
}
