use std::{
    path::Path,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::{run_migrations, schema_version};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(Job),
    Stop,
}

struct Worker {
    jobs: mpsc::Sender<StoreCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(StoreCommand::Stop).is_err() {
            warn!("Analysis store worker already gone at shutdown");
        }
        if let Err(panic) = handle.join() {
            error!("Analysis store worker panicked: {panic:?}");
        }
    }
}

/// Opens the store file, switches it to WAL and upgrades the schema.
fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open analysis store {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Analysis store stays in rollback-journal mode: {err}");
    }
    run_migrations(&mut conn).context("failed to prepare analysis store schema")?;
    Ok(conn)
}

fn serve_jobs(mut conn: Connection, jobs: mpsc::Receiver<StoreCommand>) {
    let mut served = 0u64;
    while let Ok(command) = jobs.recv() {
        match command {
            StoreCommand::Run(job) => {
                job(&mut conn);
                served += 1;
            }
            StoreCommand::Stop => break,
        }
    }
    info!("Analysis store worker stopped after {served} job(s)");
}

/// Handle to the analysis store.
///
/// One thread owns the only SQLite connection and runs jobs one at a time in
/// arrival order. A job that needs several statements to land together (an
/// upload and its eviction) opens a transaction inside the job.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<StoreCommand>();
        let (opened_tx, opened_rx) = mpsc::channel::<Result<()>>();
        let thread_path = db_path.clone();

        let thread = thread::Builder::new()
            .name("chemviz-db".into())
            .spawn(move || match open_store(&thread_path) {
                Ok(conn) => {
                    if opened_tx.send(Ok(())).is_ok() {
                        serve_jobs(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = opened_tx.send(Err(err));
                }
            })
            .context("failed to spawn analysis store worker")?;

        opened_rx
            .recv()
            .context("analysis store worker exited during startup")??;

        info!(
            "Analysis store ready at {} (schema v{})",
            db_path.display(),
            schema_version()
        );

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Run `job` on the store thread and await its result.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Run(Box::new(move |conn| {
            if reply_tx.send(job(conn)).is_err() {
                debug!("Analysis store caller went away before its reply");
            }
        }));

        self.worker
            .jobs
            .send(command)
            .map_err(|_| anyhow!("analysis store worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("analysis store worker dropped the job"))?
    }
}
