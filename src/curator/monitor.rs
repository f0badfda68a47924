//! Watch mode for the mapping sync: run once at startup, then re-run
//! after each burst of pointer-tree changes. Events are debounced so a
//! bulk copy into the source tree triggers one sync, not hundreds.

use crate::curator::mapping::{self, is_pointer};
use anyhow::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a watch event can affect the pointer tree. Directory events
/// carry extension-less paths and matter too (a removed directory takes
/// its pointers with it); watcher errors force a resync to be safe.
fn is_relevant(result: &notify::Result<Event>) -> bool {
    match result {
        Err(_) => true,
        Ok(event) => event
            .paths
            .iter()
            .any(|p| is_pointer(p) || p.extension().is_none()),
    }
}

fn sync_once(src_root: &Path, dst_root: &Path) {
    match mapping::run(src_root, dst_root) {
        Ok(outcome) => info!(
            written = outcome.files_written,
            deleted = outcome.files_deleted,
            dirs_removed = outcome.dirs_removed,
            errors = outcome.errors,
            "mapping sync complete"
        ),
        Err(err) => warn!(error = %err, "mapping sync failed"),
    }
}

/// Block watching `src_root`, re-syncing after each quiet period of
/// `debounce_secs`. Returns only when the watch channel closes.
pub fn watch(src_root: &Path, dst_root: &Path, debounce_secs: u64) -> Result<()> {
    let debounce = Duration::from_secs(debounce_secs);
    // Startup sync, retried on the debounce interval so a source tree
    // that mounts late does not kill the watcher.
    while let Err(err) = mapping::run(src_root, dst_root) {
        warn!(
            error = %err,
            retry_secs = debounce_secs,
            "initial mapping sync failed, retrying"
        );
        thread::sleep(debounce);
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let _ = tx.send(result);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(src_root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", src_root.display()))?;
    info!(src = %src_root.display(), debounce_secs, "watching pointer tree");

    while let Ok(first) = rx.recv() {
        if !is_relevant(&first) {
            debug!("ignoring unrelated event");
            continue;
        }
        // Drain the burst: keep absorbing events until the tree has been
        // quiet for a full debounce window.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
        sync_once(src_root, dst_root);
    }
    Ok(())
}
