//! Search service: owns the published catalog, runs indexing jobs in the background and
//! answers queries against whichever catalog is current.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fscore_config::Settings;
use fscore_index::{snapshot, Indexer, PathCatalog, SharedCatalog};
use fscore_query::{QueryEngine, SearchRequest, SubstringQueryEngine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use fscore_index::{CancelToken, IndexError, IndexReport};
pub use fscore_query::{SearchItem, UNKNOWN_TS};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("an indexing run is already in progress")]
    IndexingInProgress,

    #[error("indexing job aborted: {0}")]
    JobPanicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Progress { job_id: u64, files: usize },
    Done { job_id: u64, report: IndexReport },
    Failed { job_id: u64, message: String },
}

pub struct SearchService {
    settings: Settings,
    catalog: Arc<SharedCatalog>,
    engine: SubstringQueryEngine,
    indexing: Arc<AtomicBool>,
    job_counter: AtomicU64,
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SearchService {
    pub fn new(settings: Settings) -> Self {
        Self {
            engine: SubstringQueryEngine::from_settings(&settings),
            settings,
            catalog: Arc::new(SharedCatalog::default()),
            indexing: Arc::new(AtomicBool::new(false)),
            job_counter: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The currently published catalog.
    pub fn catalog(&self) -> Arc<PathCatalog> {
        self.catalog.current()
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    /// Publishes the snapshot at `settings.snapshot_path` if one exists.
    ///
    /// Returns `Ok(false)` when there is no snapshot. A corrupt snapshot is an error and
    /// leaves the current catalog untouched.
    pub fn restore_snapshot(&self) -> Result<bool, ServiceError> {
        match snapshot::load(&self.settings.snapshot_path)? {
            Some(catalog) => {
                tracing::info!(
                    path = %self.settings.snapshot_path.display(),
                    paths = catalog.path_count(),
                    "index loaded"
                );
                self.catalog.replace(catalog);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Starts indexing `root` on the blocking pool. Must be called inside a tokio runtime.
    pub fn start_index(&self, root: impl AsRef<Path>) -> Result<IndexJob, ServiceError> {
        self.start_index_with_token(root, CancelToken::new())
    }

    /// Like [`start_index`](Self::start_index) but cancellable through a token the caller
    /// already holds.
    pub fn start_index_with_token(
        &self,
        root: impl AsRef<Path>,
        cancel: CancelToken,
    ) -> Result<IndexJob, ServiceError> {
        let root = Indexer::validate_root(root.as_ref())?;
        let guard = InFlight::acquire(&self.indexing).ok_or(ServiceError::IndexingInProgress)?;

        let job_id = self.job_counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(job_id, root = %root.display(), "index job start");

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = JobContext {
            job_id,
            root,
            indexer: Indexer::new()
                .follow_symlinks(self.settings.follow_symlinks)
                .progress_interval(self.settings.progress_interval),
            snapshot_path: self.settings.snapshot_path.clone(),
            catalog: Arc::clone(&self.catalog),
            cancel: cancel.clone(),
            tx,
        };

        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            run_index_job(ctx)
        });

        Ok(IndexJob {
            job_id,
            cancel,
            events: rx,
            handle,
        })
    }

    /// Indexes `root` and waits for the new catalog to be published.
    pub async fn index(&self, root: impl AsRef<Path>) -> Result<IndexReport, ServiceError> {
        self.start_index(root)?.wait().await
    }

    pub fn admits(&self, fragment: &str, forced: bool) -> bool {
        self.engine.admits(&SearchRequest {
            fragment: fragment.to_string(),
            forced,
        })
    }

    pub fn search(&self, fragment: &str, forced: bool) -> Vec<SearchItem> {
        let request = SearchRequest {
            fragment: fragment.to_string(),
            forced,
        };
        let catalog = self.catalog.current();
        self.engine.search(&catalog, &request)
    }

    pub fn clear(&self) {
        self.catalog.clear();
        tracing::info!("catalog cleared");
    }
}

/// Handle to a running indexing job.
pub struct IndexJob {
    job_id: u64,
    cancel: CancelToken,
    events: mpsc::UnboundedReceiver<IndexEvent>,
    handle: JoinHandle<Result<IndexReport, ServiceError>>,
}

impl IndexJob {
    pub fn id(&self) -> u64 {
        self.job_id
    }

    /// Stops the walk at the next entry. The previous catalog stays published.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next progress or completion event; `None` once the job has finished.
    pub async fn next_event(&mut self) -> Option<IndexEvent> {
        self.events.recv().await
    }

    /// Waits for the job to finish. Events not yet read are discarded and later ones are
    /// no longer queued.
    pub async fn wait(self) -> Result<IndexReport, ServiceError> {
        let Self { events, handle, .. } = self;
        drop(events);

        match handle.await {
            Ok(result) => result,
            Err(err) => Err(ServiceError::JobPanicked(err.to_string())),
        }
    }
}

struct JobContext {
    job_id: u64,
    root: PathBuf,
    indexer: Indexer,
    snapshot_path: PathBuf,
    catalog: Arc<SharedCatalog>,
    cancel: CancelToken,
    tx: mpsc::UnboundedSender<IndexEvent>,
}

fn run_index_job(ctx: JobContext) -> Result<IndexReport, ServiceError> {
    let job_id = ctx.job_id;
    let progress_tx = ctx.tx.clone();
    let built = ctx.indexer.build_with(&ctx.root, &ctx.cancel, |files| {
        if !progress_tx.is_closed() {
            let _ = progress_tx.send(IndexEvent::Progress { job_id, files });
        }
    });

    let (next, report) = match built {
        Ok(built) => built,
        Err(err) => {
            tracing::info!(job_id, error = %err, "index job stopped, keeping previous catalog");
            let _ = ctx.tx.send(IndexEvent::Failed {
                job_id,
                message: err.to_string(),
            });
            return Err(err.into());
        }
    };

    let saved = snapshot::save(&next, &ctx.snapshot_path);
    ctx.catalog.replace(next);

    if let Err(err) = saved {
        tracing::warn!(job_id, path = %ctx.snapshot_path.display(), error = %err, "snapshot write failed");
        let _ = ctx.tx.send(IndexEvent::Failed {
            job_id,
            message: err.to_string(),
        });
        return Err(err.into());
    }

    tracing::info!(
        job_id,
        files = report.files,
        names = report.names,
        skipped = report.skipped,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "index job finished"
    );
    let _ = ctx.tx.send(IndexEvent::Done {
        job_id,
        report: report.clone(),
    });
    Ok(report)
}

/// Holds the single indexing slot until dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
