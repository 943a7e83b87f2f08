//! Custom test assertions for install tests

use std::path::Path;
use std::time::Duration;

use modpack_dl::Event;
use tokio::sync::broadcast;

/// Sorted names of the regular files directly inside `dir`
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert `dir` holds exactly `expected` (order-insensitive)
pub fn assert_dir_contents(dir: &Path, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(list_files(dir), expected, "contents of {}", dir.display());
}

/// Collect events until `stop` matches one or `timeout` elapses
pub async fn collect_events_until(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = stop(&event);
                    collected.push(event);
                    if done {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    collected
}
