//! Snippet execution: materialize the request in an isolated working tree
//! and stream the processing tool's output back over the event channel.

use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tr_api_types::{first_snippet_id, RunnerResponse};

/// Name of the file the request body is committed as.
const REQUEST_FILE: &str = "runner.xml";

/// Identity used for the working tree's initial commit.
const GIT_AUTHOR_NAME: &str = "Taylored Runner";
const GIT_AUTHOR_EMAIL: &str = "runner@taylored.local";

#[derive(Debug, Error)]
enum SetupError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Executes `tayloredRun` requests. Every run gets a fresh temporary working
/// tree, so concurrent runs on one channel never interfere; the directory is
/// recursively removed on all exit paths by the [`TempDir`] guard.
#[derive(Debug, Clone)]
pub struct SnippetExecutor {
    /// Binary invoked to process the committed snippet file.
    tool: String,
}

impl Default for SnippetExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SnippetExecutor {
    pub fn new() -> Self {
        Self::with_tool("taylored")
    }

    pub fn with_tool(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Run one snippet request. Failures are reported on the channel as
    /// `tayloredRunError`; this never tears down the connection.
    pub async fn run(&self, body: String, tx: mpsc::Sender<RunnerResponse>) {
        if body.trim().is_empty() {
            send(&tx, run_error(None, "Invalid XML data provided.")).await;
            return;
        }

        // The first block's id tags every event this run emits.
        let Some(id) = first_snippet_id(&body) else {
            send(
                &tx,
                run_error(None, "Could not extract snippet ID (number) from XML data."),
            )
            .await;
            return;
        };

        // git2 is synchronous; set the tree up on the blocking pool.
        let workdir = match tokio::task::spawn_blocking(move || prepare_working_tree(&body)).await
        {
            Ok(Ok(dir)) => dir,
            Ok(Err(e)) => {
                send(&tx, run_error(Some(id), format!("Execution failed: {e}"))).await;
                return;
            }
            Err(e) => {
                send(&tx, run_error(Some(id), format!("Execution failed: {e}"))).await;
                return;
            }
        };

        self.spawn_and_stream(id, &workdir, tx).await;
        // `workdir` drops here, recursively removing the tree.
    }

    async fn spawn_and_stream(&self, id: u64, workdir: &TempDir, tx: mpsc::Sender<RunnerResponse>) {
        let mut child = match Command::new(&self.tool)
            .args(["--automatic", "xml", "main"])
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                send(&tx, run_error(Some(id), format!("Execution failed: {e}"))).await;
                return;
            }
        };

        debug!(snippet_id = id, tool = %self.tool, "processing tool spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let out_task = tokio::spawn(pump(stdout, tx.clone(), move |chunk| {
            RunnerResponse::TayloredOutput { id, output: chunk }
        }));
        let err_task = tokio::spawn(pump(stderr, tx.clone(), move |chunk| {
            RunnerResponse::TayloredError { id, error: chunk }
        }));

        let status = child.wait().await;
        let _ = tokio::join!(out_task, err_task);

        // The exit code is observed but never reported as an event.
        match status {
            Ok(status) if status.success() => {
                debug!(snippet_id = id, "processing tool finished");
            }
            Ok(status) => {
                warn!(snippet_id = id, code = ?status.code(), "processing tool exited with failure");
            }
            Err(e) => {
                send(&tx, run_error(Some(id), format!("Execution failed: {e}"))).await;
            }
        }
    }
}

/// Forward raw chunks from one child stream, in read order, as channel events.
async fn pump<R>(
    reader: Option<R>,
    tx: mpsc::Sender<RunnerResponse>,
    to_event: impl Fn(String) -> RunnerResponse,
) where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else { return };
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(to_event(chunk)).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Create a fresh working tree: init a repository on branch `main`, commit
/// the request body as `runner.xml`.
fn prepare_working_tree(body: &str) -> Result<TempDir, SetupError> {
    let dir = tempfile::tempdir()?;

    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = git2::Repository::init_opts(dir.path(), &opts)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", GIT_AUTHOR_NAME)?;
        config.set_str("user.email", GIT_AUTHOR_EMAIL)?;
    }

    std::fs::write(dir.path().join(REQUEST_FILE), body)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(REQUEST_FILE))?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let signature = repo.signature()?;
    repo.commit(Some("HEAD"), &signature, &signature, "Add runner.xml", &tree, &[])?;

    Ok(dir)
}

fn run_error(id: Option<u64>, error: impl Into<String>) -> RunnerResponse {
    RunnerResponse::TayloredRunError {
        id,
        error: error.into(),
    }
}

async fn send(tx: &mpsc::Sender<RunnerResponse>, event: RunnerResponse) {
    if tx.send(event).await.is_err() {
        debug!("event channel closed before event could be delivered");
    }
}
