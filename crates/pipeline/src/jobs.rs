//! Background ingestion jobs.
//!
//! A fixed pool of worker threads fed over a channel. Submitting a file
//! spends quota, persists the `processing` upload row and returns its id
//! immediately; a worker runs the ingestion steps and resolves the row to
//! a terminal status. Every job carries a deadline and the pool carries a
//! shutdown flag; both are checked between ingestion phases, so abandoned
//! work resolves to `failed` instead of holding `processing` forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hisab_core::{FileType, Upload, UploadStatus};

use crate::{Pipeline, PipelineError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// What a queued upload will be parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Orders,
    Payments,
    Products,
}

impl JobKind {
    pub fn file_type(self) -> FileType {
        match self {
            Self::Orders => FileType::OrdersCsv,
            Self::Payments => FileType::PaymentZip,
            Self::Products => FileType::ProductsCsv,
        }
    }
}

struct Job {
    upload_id: String,
    seller_id: String,
    kind: JobKind,
    bytes: Vec<u8>,
    deadline: Instant,
}

/// Shutdown flag plus per-job deadline, checked between ingestion phases.
pub(crate) struct JobGuard {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<(Instant, u64)>,
}

impl JobGuard {
    /// No flag, no deadline. The synchronous entry points run under this.
    pub(crate) fn unbounded() -> Self {
        Self {
            cancel: None,
            deadline: None,
        }
    }

    fn new(cancel: Arc<AtomicBool>, deadline: Instant, deadline_secs: u64) -> Self {
        Self {
            cancel: Some(cancel),
            deadline: Some((deadline, deadline_secs)),
        }
    }

    pub(crate) fn check(&self) -> Result<(), PipelineError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(PipelineError::JobCancelled);
            }
        }
        if let Some((deadline, secs)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(PipelineError::JobTimedOut { deadline_secs: secs });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Worker pool over one shared channel. The deadline clock starts at
/// submission, so time spent queued counts against the job.
pub struct JobQueue {
    pipeline: Pipeline,
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl JobQueue {
    pub fn start(pipeline: Pipeline) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let cancel = Arc::new(AtomicBool::new(false));

        let workers = (0..pipeline.config().workers)
            .map(|_| {
                let pipeline = pipeline.clone();
                let rx = Arc::clone(&rx);
                let cancel = Arc::clone(&cancel);
                thread::spawn(move || worker_loop(pipeline, rx, cancel))
            })
            .collect();

        Self {
            pipeline,
            tx: Some(tx),
            workers,
            cancel,
        }
    }

    /// Quota-gate, persist the upload row, enqueue. The returned id is
    /// what [`wait_for_upload`](Self::wait_for_upload) polls.
    pub fn submit(
        &self,
        seller_id: &str,
        filename: &str,
        kind: JobKind,
        bytes: Vec<u8>,
    ) -> Result<String, PipelineError> {
        let tx = self.tx.as_ref().ok_or(PipelineError::QueueClosed)?;
        self.pipeline.consume_quota(seller_id)?;
        let upload_id = self
            .pipeline
            .begin_upload(seller_id, filename, kind.file_type())?;
        let deadline =
            Instant::now() + Duration::from_secs(self.pipeline.config().job_deadline_secs);
        let job = Job {
            upload_id: upload_id.clone(),
            seller_id: seller_id.to_string(),
            kind,
            bytes,
            deadline,
        };
        if tx.send(job).is_err() {
            // Workers are gone; resolve the row so it cannot stick in
            // processing.
            let errors = vec![PipelineError::QueueClosed.to_string()];
            if let Err(e) = self.pipeline.store().finish_upload(
                &upload_id,
                UploadStatus::Failed,
                0,
                &errors,
                &[],
            ) {
                tracing::error!(upload_id = %upload_id, error = %e, "could not resolve orphaned upload");
            }
            return Err(PipelineError::QueueClosed);
        }
        Ok(upload_id)
    }

    /// Poll an upload until it reaches a terminal status.
    pub fn wait_for_upload(
        &self,
        upload_id: &str,
        timeout: Duration,
    ) -> Result<Upload, PipelineError> {
        let deadline = Instant::now() + timeout;
        loop {
            let upload = self.pipeline.store().get_upload(upload_id)?;
            if upload.status.is_terminal() {
                return Ok(upload);
            }
            if Instant::now() >= deadline {
                return Err(PipelineError::WaitTimeout {
                    upload_id: upload_id.to_string(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stop accepting work and join the workers. Jobs still queued resolve
    /// to `failed` through the shutdown flag rather than running late.
    pub fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("ingestion worker panicked");
            }
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.halt();
    }
}

fn worker_loop(pipeline: Pipeline, rx: Arc<Mutex<mpsc::Receiver<Job>>>, cancel: Arc<AtomicBool>) {
    loop {
        let job = {
            let rx = match rx.lock() {
                Ok(rx) => rx,
                Err(_) => return,
            };
            match rx.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };
        let guard = JobGuard::new(
            Arc::clone(&cancel),
            job.deadline,
            pipeline.config().job_deadline_secs,
        );
        tracing::info!(upload_id = %job.upload_id, kind = ?job.kind, "job started");
        let report = match job.kind {
            JobKind::Orders => {
                pipeline.run_orders_job(&job.seller_id, &job.upload_id, &job.bytes, &guard)
            }
            JobKind::Payments => {
                pipeline.run_payments_job(&job.seller_id, &job.upload_id, &job.bytes, &guard)
            }
            JobKind::Products => {
                pipeline.run_products_job(&job.seller_id, &job.upload_id, &job.bytes, &guard)
            }
        };
        tracing::info!(
            upload_id = %job.upload_id,
            status = report.status.as_str(),
            records = report.records_processed,
            errors = report.errors.len(),
            "job finished"
        );
    }
}
