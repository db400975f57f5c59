//! Two-phase batch jobs: clean everything, then upload everything.
//!
//! A batch can be run to completion by the caller ([`JobOrchestrator::run`]) or
//! started in the background and polled ([`JobOrchestrator::start`] and
//! [`JobOrchestrator::status`]). Within a job, images are cleaned one at a
//! time in order and uploads only begin once the last image has been cleaned.
//! Background jobs publish a fresh [`JobSnapshot`] after every item.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::batch::run_batch_until;
use crate::engine::ImageCleaner;
use crate::error::{Error, Result};
use crate::upload::{run_uploads, FileUploader};

/// Where and how to upload cleaned files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Endpoint receiving the multipart POST.
    pub url: String,
    /// Remove each cleaned file once it has been uploaded.
    pub delete_after: bool,
}

/// A batch of source images and what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Source images, processed in this order.
    pub images: Vec<PathBuf>,
    /// Directory receiving `<stem>_clean.png` files.
    pub output_dir: PathBuf,
    /// Remove each source once it has been cleaned.
    pub delete_originals: bool,
    /// Upload phase, if enabled.
    pub upload: Option<UploadOptions>,
}

/// Aggregate outcome of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Number of source images.
    pub total: usize,
    /// Images cleaned successfully.
    pub success: usize,
    /// Images that failed to clean.
    pub failed: usize,
    /// Cleaned files submitted for upload.
    pub upload_total: usize,
    /// Successful uploads.
    pub upload_success: usize,
    /// Failed uploads.
    pub upload_failed: usize,
    /// Remote URLs of the successful uploads, in upload order.
    pub uploaded_urls: Vec<String>,
}

/// Running counters published while a batch is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counts {
    success: usize,
    failed: usize,
    upload_total: usize,
    upload_success: usize,
    upload_failed: usize,
}

/// Latest published state of a background job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    /// Job identifier.
    pub job_id: String,
    /// Number of source images.
    pub total: usize,
    /// Images cleaned successfully so far.
    pub success: usize,
    /// Images that failed to clean so far.
    pub failed: usize,
    /// Cleaned files that will be uploaded.
    pub upload_total: usize,
    /// Successful uploads so far.
    pub upload_success: usize,
    /// Failed uploads so far.
    pub upload_failed: usize,
    /// Whether the job has finished; counts are final once set.
    pub done: bool,
    /// Reason the job stopped early, if it did.
    pub error: Option<String>,
}

impl JobSnapshot {
    fn new(job_id: &str, total: usize) -> Self {
        Self {
            job_id: job_id.to_string(),
            total,
            success: 0,
            failed: 0,
            upload_total: 0,
            upload_success: 0,
            upload_failed: 0,
            done: false,
            error: None,
        }
    }

    fn apply(&mut self, counts: &Counts) {
        self.success = counts.success;
        self.failed = counts.failed;
        self.upload_total = counts.upload_total;
        self.upload_success = counts.upload_success;
        self.upload_failed = counts.upload_failed;
    }
}

struct JobRecord {
    snapshot: JobSnapshot,
    finished_at: Option<Instant>,
}

/// Job identifier to progress record. Every access holds the lock for a
/// single lookup or update only.
#[derive(Default)]
struct JobTable {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, snapshot: JobSnapshot) {
        let record = JobRecord {
            snapshot,
            finished_at: None,
        };
        self.lock().insert(record.snapshot.job_id.clone(), record);
    }

    fn publish(&self, job_id: &str, counts: &Counts) {
        if let Some(record) = self.lock().get_mut(job_id) {
            if !record.snapshot.done {
                record.snapshot.apply(counts);
                debug!(job_id, ?counts, "progress");
            }
        }
    }

    fn finish(&self, job_id: &str, error: Option<String>) {
        if let Some(record) = self.lock().get_mut(job_id) {
            if !record.snapshot.done {
                record.snapshot.done = true;
                record.snapshot.error = error;
                record.finished_at = Some(Instant::now());
            }
        }
    }

    fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.lock().get(job_id).map(|r| r.snapshot.clone())
    }

    fn evict_finished(&self, retention: Duration) {
        let now = Instant::now();
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, r| {
            r.finished_at
                .is_none_or(|at| now.duration_since(at) < retention)
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, "evicted finished jobs");
        }
    }
}

type Publish = Arc<dyn Fn(&Counts) + Send + Sync>;

/// Clean phase followed by the optional upload phase.
///
/// Returns [`Error::Cancelled`] if `cancel` made either phase skip work. The
/// clean phase has always stopped by the time this returns.
async fn run_pipeline(
    cleaner: Arc<dyn ImageCleaner>,
    uploader: Arc<dyn FileUploader>,
    request: BatchRequest,
    publish: Publish,
    cancel: Arc<AtomicBool>,
) -> Result<BatchReport> {
    let BatchRequest {
        images,
        output_dir,
        delete_originals,
        upload,
    } = request;
    let total = images.len();

    let clean_publish = Arc::clone(&publish);
    let clean_cancel = Arc::clone(&cancel);
    let (mut counts, cleaned, processed) = tokio::task::spawn_blocking(move || {
        let mut counts = Counts::default();
        let results = run_batch_until(
            cleaner.as_ref(),
            &images,
            &output_dir,
            delete_originals,
            &clean_cancel,
            |result| {
                if result.is_success() {
                    counts.success += 1;
                } else {
                    counts.failed += 1;
                }
                clean_publish(&counts);
            },
        )?;
        let processed = results.len();
        let cleaned: Vec<PathBuf> = results.into_iter().filter_map(|r| r.outcome.ok()).collect();
        Ok::<_, Error>((counts, cleaned, processed))
    })
    .await
    .map_err(|e| Error::Task(e.to_string()))??;

    if processed < total {
        return Err(Error::Cancelled);
    }

    let mut uploaded_urls = Vec::new();
    if let Some(opts) = upload.filter(|_| !cleaned.is_empty()) {
        counts.upload_total = cleaned.len();
        publish(&counts);

        let results = run_uploads(
            uploader.as_ref(),
            &opts.url,
            &cleaned,
            opts.delete_after,
            &cancel,
            |result| {
                if result.is_success() {
                    counts.upload_success += 1;
                } else {
                    counts.upload_failed += 1;
                }
                publish(&counts);
            },
        )
        .await;
        if results.len() < cleaned.len() {
            return Err(Error::Cancelled);
        }
        uploaded_urls = results.into_iter().filter_map(|r| r.outcome.ok()).collect();
    }

    Ok(BatchReport {
        total,
        success: counts.success,
        failed: counts.failed,
        upload_total: counts.upload_total,
        upload_success: counts.upload_success,
        upload_failed: counts.upload_failed,
        uploaded_urls,
    })
}

/// Runs batches and tracks background jobs.
///
/// Each orchestrator owns its own job table, so independent instances never
/// see each other's jobs.
pub struct JobOrchestrator {
    cleaner: Arc<dyn ImageCleaner>,
    uploader: Arc<dyn FileUploader>,
    jobs: Arc<JobTable>,
    tasks: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
    retention: Option<Duration>,
}

impl JobOrchestrator {
    /// Create an orchestrator with an empty job table.
    pub fn new(cleaner: Arc<dyn ImageCleaner>, uploader: Arc<dyn FileUploader>) -> Self {
        Self {
            cleaner,
            uploader,
            jobs: Arc::new(JobTable::default()),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            retention: None,
        }
    }

    /// Evict finished jobs older than `retention` whenever a new job starts.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// The uploader shared by every job.
    #[must_use]
    pub fn uploader(&self) -> &Arc<dyn FileUploader> {
        &self.uploader
    }

    /// Run a batch to completion and return its report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the batch as a whole could not proceed (the
    /// output directory cannot be created or the clean phase died). Per-image
    /// and per-upload failures are counted in the report.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchReport> {
        let publish: Publish = Arc::new(|_: &Counts| {});
        run_pipeline(
            Arc::clone(&self.cleaner),
            Arc::clone(&self.uploader),
            request,
            publish,
            Arc::new(AtomicBool::new(false)),
        )
        .await
    }

    /// Start a batch in the background and return its job identifier.
    ///
    /// An empty batch is recorded as finished immediately and no task is
    /// spawned. Must be called from within a Tokio runtime.
    pub fn start(&self, request: BatchRequest) -> String {
        if let Some(retention) = self.retention {
            self.jobs.evict_finished(retention);
        }

        let job_id = Uuid::new_v4().simple().to_string();
        let total = request.images.len();
        self.jobs.insert(JobSnapshot::new(&job_id, total));

        if total == 0 {
            self.jobs.finish(&job_id, None);
            info!(job_id = %job_id, "empty batch, nothing to do");
            return job_id;
        }

        info!(job_id = %job_id, total, upload = request.upload.is_some(), "starting job");

        let publish: Publish = {
            let jobs = Arc::clone(&self.jobs);
            let job_id = job_id.clone();
            Arc::new(move |counts: &Counts| jobs.publish(&job_id, counts))
        };

        // The supervisor is the only remover, so the insert comes first.
        let cancel = Arc::new(AtomicBool::new(false));
        lock_tasks(&self.tasks).insert(job_id.clone(), Arc::clone(&cancel));
        let pipeline = tokio::spawn(run_pipeline(
            Arc::clone(&self.cleaner),
            Arc::clone(&self.uploader),
            request,
            publish,
            cancel,
        ));

        let jobs = Arc::clone(&self.jobs);
        let task_table = Arc::clone(&self.tasks);
        let id = job_id.clone();
        tokio::spawn(async move {
            let outcome = match pipeline.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Task(e.to_string())),
            };
            match outcome {
                Ok(report) => {
                    info!(
                        job_id = %id,
                        success = report.success,
                        failed = report.failed,
                        upload_success = report.upload_success,
                        upload_failed = report.upload_failed,
                        "job finished"
                    );
                    jobs.finish(&id, None);
                }
                Err(e) => {
                    error!(job_id = %id, error = %e, "job failed");
                    jobs.finish(&id, Some(e.to_string()));
                }
            }
            lock_tasks(&task_table).remove(&id);
        });

        job_id
    }

    /// Latest snapshot of a job, or `None` if the identifier is unknown.
    #[must_use]
    pub fn status(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.get(job_id)
    }

    /// Number of jobs whose background task has not finished yet.
    #[must_use]
    pub fn running_jobs(&self) -> usize {
        lock_tasks(&self.tasks).len()
    }

    /// Ask a running job to stop before its next image or upload.
    ///
    /// The item in progress is finished and counted; the job then ends with
    /// an error. Returns `false` if the job is unknown or already finished.
    pub fn cancel(&self, job_id: &str) -> bool {
        match lock_tasks(&self.tasks).get(job_id) {
            Some(flag) => {
                info!(job_id, "cancelling job");
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight job and wait until all of them have stopped.
    pub async fn shutdown(&self) {
        for (job_id, flag) in lock_tasks(&self.tasks).iter() {
            info!(job_id = %job_id, "cancelling job");
            flag.store(true, Ordering::Relaxed);
        }

        while self.running_jobs() > 0 {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
    }
}

/// How often [`JobOrchestrator::shutdown`] checks for stopped jobs.
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

fn lock_tasks(
    tasks: &Mutex<HashMap<String, Arc<AtomicBool>>>,
) -> MutexGuard<'_, HashMap<String, Arc<AtomicBool>>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}
