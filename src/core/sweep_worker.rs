use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::core::sweep::{ComputeError, Curve, SweepEngine, SweepJob};

/// Result payload from the sweep worker:
/// `(request_id, curve_or_error)`.
pub type SweepResult = (u64, Result<Curve, ComputeError>);

/// Sweep worker: receives jobs and publishes the curve for the newest one.
/// Requests queued behind a newer one are superseded and never computed.
pub fn run(engine: SweepEngine, job_rx: Receiver<(u64, SweepJob)>, result_tx: Sender<SweepResult>) {
    while let Ok((mut request_id, mut job)) = job_rx.recv() {
        // Drain backlog; only the latest parameters matter.
        let mut skipped = 0usize;
        for (latest_id, latest_job) in job_rx.try_iter() {
            request_id = latest_id;
            job = latest_job;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, request_id, "superseded sweep requests dropped");
        }

        let result = engine.run(&job);
        if result_tx.send((request_id, result)).is_err() {
            break;
        }
    }
}

/// Owns a sweep worker thread and its channels.
pub struct SweepWorker {
    job_tx: Option<Sender<(u64, SweepJob)>>,
    result_rx: Receiver<SweepResult>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl SweepWorker {
    pub fn spawn(engine: SweepEngine) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("sweep-worker".into())
            .spawn(move || run(engine, job_rx, result_tx))?;
        Ok(Self {
            job_tx: Some(job_tx),
            result_rx,
            handle: Some(handle),
            next_id: 0,
        })
    }

    /// Queue a job and return its request id (ids increase monotonically).
    /// `None` when the worker thread is gone and the job cannot be delivered.
    pub fn submit(&mut self, job: SweepJob) -> Option<u64> {
        let tx = self.job_tx.as_ref()?;
        let id = self.next_id + 1;
        if tx.send((id, job)).is_err() {
            warn!(request_id = id, "sweep worker has stopped; job dropped");
            return None;
        }
        self.next_id = id;
        Some(id)
    }

    /// Whether the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Newest result published so far, if any; older ones are discarded.
    pub fn latest(&self) -> Option<SweepResult> {
        self.result_rx.try_iter().last()
    }

    /// Block until the result for `request_id` (or a newer one) arrives.
    pub fn wait_for(&self, request_id: u64) -> Option<SweepResult> {
        while let Ok(result) = self.result_rx.recv() {
            if result.0 >= request_id {
                return Some(result);
            }
        }
        None
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        // closing the job channel ends the worker loop
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{BackendError, ComputeBackend, ComputeBuffers};
    use crate::core::roughness_kernel::{KernelParams, RoughnessKernel};
    use crate::core::spectrum::{Partial, PartialSpectrum};
    use crate::core::sweep::SweepRange;
    use std::sync::Arc;

    fn job(to: i32) -> SweepJob {
        SweepJob {
            spectrum: Arc::new(PartialSpectrum::new(vec![Partial::new(0.0, 1.0)])),
            kernel: Arc::new(RoughnessKernel::new(KernelParams::default())),
            fixed_offsets: vec![0],
            range: SweepRange { from: 0, to },
            reflect: false,
        }
    }

    #[test]
    fn backlog_is_superseded_by_newest_request() {
        let engine = SweepEngine::new(Some(1)).unwrap();
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        // queue everything before the worker starts so it sees a backlog
        for (id, to) in [(1u64, 10), (2, 20), (3, 30)] {
            job_tx.send((id, job(to))).unwrap();
        }
        drop(job_tx);
        run(engine, job_rx, result_tx);

        let results: Vec<SweepResult> = result_rx.try_iter().collect();
        assert_eq!(results.len(), 1);
        let (id, curve) = &results[0];
        assert_eq!(*id, 3);
        assert_eq!(curve.as_ref().unwrap().len(), 31);
    }

    #[test]
    fn errors_are_published_not_swallowed() {
        let engine = SweepEngine::new(Some(1)).unwrap();
        let mut worker = SweepWorker::spawn(engine).unwrap();
        let id = worker.submit(job(-5)).unwrap();
        let (got, result) = worker.wait_for(id).unwrap();
        assert_eq!(got, id);
        assert!(matches!(result, Err(ComputeError::InvalidRange { .. })));
    }

    #[test]
    fn worker_handle_returns_latest_curve() {
        let engine = SweepEngine::new(Some(2)).unwrap();
        let mut worker = SweepWorker::spawn(engine).unwrap();
        let first = worker.submit(job(50)).unwrap();
        let second = worker.submit(job(100)).unwrap();
        assert!(second > first);
        let (got, result) = worker.wait_for(second).unwrap();
        assert_eq!(got, second);
        assert_eq!(result.unwrap().len(), 101);
        assert!(worker.latest().is_none());
    }

    struct Crashing;

    impl ComputeBackend for Crashing {
        fn name(&self) -> &str {
            "crashing"
        }
        fn dispatch(&self, _: &ComputeBuffers) -> Result<Vec<u8>, BackendError> {
            panic!("backend crashed");
        }
    }

    #[test]
    fn submit_reports_a_dead_worker() {
        let engine = SweepEngine::with_backend(Arc::new(Crashing));
        let mut worker = SweepWorker::spawn(engine).unwrap();
        let id = worker.submit(job(10)).unwrap();
        assert!(worker.wait_for(id).is_none());

        while worker.is_running() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(worker.submit(job(10)), None);
        assert_eq!(worker.submit(job(20)), None);
    }
}
