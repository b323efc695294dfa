//! SQLite access through a single worker thread.
//!
//! rusqlite connections are not `Sync`, so one thread owns the connection and
//! async callers hand it closures. Each closure's result comes back over a
//! oneshot channel, which keeps the tokio runtime free of blocking I/O.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Close,
}

/// Open `path`, configure it and bring its schema up to date.
fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    // Alert rows cascade with their readings; refuse to run without it.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    let enforced: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    if !enforced {
        bail!("SQLite build does not enforce foreign keys");
    }

    let journal: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !journal.eq_ignore_ascii_case("wal") {
        warn!("WAL unavailable for {}, using {journal} journal", path.display());
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

/// Worker loop: runs jobs in arrival order until closed or orphaned.
fn serve(mut conn: Connection, inbox: mpsc::Receiver<Message>) {
    for message in inbox {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Close => break,
        }
    }
    debug!("Database worker stopped");
}

struct Worker {
    outbox: mpsc::Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // A send error means the worker already exited; joining still reaps it.
        let _ = self.outbox.send(Message::Close);
        if handle.join().is_err() {
            error!("Database worker panicked");
        }
    }
}

/// Cloneable SQLite handle shared by every request.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and start its worker.
    /// Returns once migrations have run, or with the error that stopped them.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create database directory {}", dir.display()))?;
        }

        let (outbox, inbox) = mpsc::channel();
        let (opened_tx, opened_rx) = mpsc::sync_channel(1);
        let worker_path = path.clone();

        let handle = thread::Builder::new()
            .name("glucolog-db".into())
            .spawn(move || match open_connection(&worker_path) {
                Ok(conn) => {
                    if opened_tx.send(Ok(())).is_ok() {
                        serve(conn, inbox);
                    }
                }
                Err(err) => {
                    let _ = opened_tx.send(Err(err));
                }
            })
            .context("failed to spawn database worker")?;

        let worker = Worker {
            outbox,
            handle: Some(handle),
        };
        opened_rx
            .recv()
            .context("database worker exited during startup")??;

        info!("Database ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(worker),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `task` on the worker thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have been cancelled; its result is simply dropped.
            let _ = reply.send(task(conn));
        });

        self.worker
            .outbox
            .send(Message::Run(job))
            .map_err(|_| anyhow!("database worker is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}
