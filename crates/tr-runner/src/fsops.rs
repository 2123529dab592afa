//! Confined filesystem accessors.
//!
//! Every path a client supplies is resolved against the configured container
//! root before any filesystem call. Resolution is component-wise: `..` may
//! never climb above the root, and the final prefix check is performed on
//! whole path segments, so a root of `/root` does not admit `/rootbypass`.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use tr_api_types::{DirectoryEntry, RunnerResponse};

/// Message sent for any containment violation.
pub const ACCESS_DENIED: &str = "Access denied: Path is outside the allowed directory.";

/// Resolve `requested` against `root`, treating it as rooted at `root`
/// regardless of leading slashes. Returns `None` when the path would escape.
pub fn resolve_within(root: &Path, requested: &str) -> Option<PathBuf> {
    let mut stack: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(requested).components() {
        match component {
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => {
                // Popping an empty stack would climb above the root.
                stack.pop()?;
            }
            Component::Normal(part) => stack.push(part),
        }
    }

    let mut resolved = root.to_path_buf();
    for part in stack {
        resolved.push(part);
    }
    resolved.starts_with(root).then_some(resolved)
}

/// Handle a `listDirectory` request.
pub async fn list_directory(root: &Path, path: Option<String>) -> RunnerResponse {
    let requested = path.unwrap_or_else(|| "/".to_string());
    let Some(resolved) = resolve_within(root, &requested) else {
        debug!(path = %requested, "directory listing denied");
        return run_error(ACCESS_DENIED.to_string());
    };

    let mut reader = match tokio::fs::read_dir(&resolved).await {
        Ok(reader) => reader,
        Err(e) => return run_error(format!("Failed to read directory {requested}: {e}")),
    };

    let mut files = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let is_directory = entry
                    .file_type()
                    .await
                    .map(|file_type| file_type.is_dir())
                    .unwrap_or(false);
                files.push(DirectoryEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_directory,
                });
            }
            Ok(None) => break,
            Err(e) => return run_error(format!("Failed to read directory {requested}: {e}")),
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    RunnerResponse::DirectoryListing {
        path: resolved.display().to_string(),
        files,
    }
}

/// Handle a `downloadFile` request. The response echoes the originally
/// requested path, not the resolved one.
pub async fn download_file(root: &Path, path: String) -> RunnerResponse {
    if path.trim().is_empty() {
        return run_error("A file path is required.".to_string());
    }
    let Some(resolved) = resolve_within(root, &path) else {
        debug!(path = %path, "file download denied");
        return run_error(ACCESS_DENIED.to_string());
    };

    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(e) => return run_error(format!("Failed to read file {path}: {e}")),
    };
    if !metadata.is_file() {
        return run_error(format!("Not a regular file: {path}"));
    }

    match tokio::fs::read(&resolved).await {
        Ok(content) => RunnerResponse::FileContent { path, content },
        Err(e) => run_error(format!("Failed to read file {path}: {e}")),
    }
}

fn run_error(error: String) -> RunnerResponse {
    RunnerResponse::TayloredRunError { id: None, error }
}
