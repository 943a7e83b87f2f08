//! Tests for the worker pool.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::error::Error;
use crate::test_helpers::ScriptedFetcher;
use crate::types::{ArtifactDescriptor, Event, TaskState};

use super::{BatchLayout, WorkerPool};

fn layout(root: &TempDir) -> BatchLayout {
    let destination_dir = root.path().join("mods");
    let staging_dir = destination_dir.join("downloading");
    std::fs::create_dir_all(&staging_dir).unwrap();
    BatchLayout {
        destination_dir,
        staging_dir,
    }
}

fn artifact(id: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::new(id, id.to_uppercase(), format!("https://cdn.test/{id}"))
}

fn pool(fetcher: ScriptedFetcher, slots: usize) -> (WorkerPool, broadcast::Receiver<Event>) {
    let (tx, rx) = broadcast::channel(1000);
    (WorkerPool::new(Arc::new(fetcher), slots, tx).unwrap(), rx)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_two_artifacts_installed_with_two_slots() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let fetcher = ScriptedFetcher::new()
        .serve("https://cdn.test/a", "a-1.0.jar", b"aaa")
        .serve("https://cdn.test/b", "b-2.0.jar", b"bb");
    let (pool, _rx) = pool(fetcher, 2);

    let state = pool
        .run(vec![artifact("a"), artifact("b")], &layout)
        .await
        .unwrap();

    assert!(state.is_complete());
    assert_eq!(state.installed_count(), 2);
    assert_eq!(state.files.get("a").map(String::as_str), Some("a-1.0.jar"));
    assert_eq!(
        std::fs::read(layout.destination_dir.join("b-2.0.jar")).unwrap(),
        b"bb"
    );
    assert_eq!(std::fs::read_dir(&layout.staging_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_existing_file_skipped_and_left_untouched() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    std::fs::write(layout.destination_dir.join("X.jar"), b"original").unwrap();
    let fetcher = ScriptedFetcher::new().serve("https://cdn.test/x", "X.jar", b"replacement");
    let (pool, mut rx) = pool(fetcher, 3);

    let state = pool.run(vec![artifact("x")], &layout).await.unwrap();

    assert_eq!(state.state_of("x"), Some(TaskState::SkippedExisting));
    assert_eq!(state.files.get("x").map(String::as_str), Some("X.jar"));
    assert_eq!(
        std::fs::read(layout.destination_dir.join("X.jar")).unwrap(),
        b"original"
    );
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::FileResolved { file_name, .. } if file_name == "X.jar"
    )));
}

#[tokio::test]
async fn test_failure_does_not_block_siblings() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let fetcher = ScriptedFetcher::new()
        .status("https://cdn.test/broken", 404)
        .serve("https://cdn.test/ok1", "ok1.jar", b"1")
        .serve("https://cdn.test/ok2", "ok2.jar", b"2");
    let (pool, _rx) = pool(fetcher, 1);

    let state = pool
        .run(
            vec![artifact("broken"), artifact("ok1"), artifact("ok2")],
            &layout,
        )
        .await
        .unwrap();

    assert_eq!(state.state_of("broken"), Some(TaskState::Failed));
    assert_eq!(state.installed_count(), 2);
    assert_eq!(state.failure_summary().as_deref(), Some("1 failed"));
    let failed: Vec<_> = state.failed().collect();
    assert!(failed[0].error.as_deref().unwrap().contains("404"));
    assert!(!state.files.contains_key("broken"));
}

#[tokio::test]
async fn test_outcome_independent_of_slot_count() {
    for slots in [1, 2, 3, 8] {
        let root = TempDir::new().unwrap();
        let layout = layout(&root);
        std::fs::write(layout.destination_dir.join("c.jar"), b"kept").unwrap();
        let fetcher = ScriptedFetcher::new()
            .serve("https://cdn.test/a", "a.jar", b"a")
            .status("https://cdn.test/b", 500)
            .serve("https://cdn.test/c", "c.jar", b"c")
            .serve("https://cdn.test/d", "d.jar", b"d");
        let (pool, _rx) = pool(fetcher, slots);

        let state = pool
            .run(
                vec![artifact("a"), artifact("b"), artifact("c"), artifact("d")],
                &layout,
            )
            .await
            .unwrap();

        let states: Vec<_> = state.tasks.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            [
                TaskState::Installed,
                TaskState::Failed,
                TaskState::SkippedExisting,
                TaskState::Installed,
            ],
            "slots = {slots}"
        );
    }
}

#[tokio::test]
async fn test_shared_file_name_written_once_regardless_of_slots() {
    for slots in [1, 2] {
        let root = TempDir::new().unwrap();
        let layout = layout(&root);
        let fetcher = ScriptedFetcher::new()
            .serve_slowly(
                "https://cdn.test/a",
                "shared.jar",
                b"AAAA",
                Duration::from_millis(50),
            )
            .serve_slowly(
                "https://cdn.test/b",
                "shared.jar",
                b"BBBB",
                Duration::from_millis(50),
            );
        let (pool, _rx) = pool(fetcher, slots);

        let state = pool
            .run(vec![artifact("a"), artifact("b")], &layout)
            .await
            .unwrap();

        let states: Vec<_> = state.tasks.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            [TaskState::Installed, TaskState::SkippedExisting],
            "slots = {slots}"
        );
        assert_eq!(
            std::fs::read(layout.destination_dir.join("shared.jar")).unwrap(),
            b"AAAA",
            "slots = {slots}"
        );
        assert_eq!(std::fs::read_dir(&layout.staging_dir).unwrap().count(), 0);
    }
}

#[tokio::test]
async fn test_concurrency_bounded_by_slots() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let mut fetcher = ScriptedFetcher::new();
    let mut artifacts = Vec::new();
    for i in 0..6 {
        let id = format!("m{i}");
        fetcher = fetcher.serve_slowly(
            &format!("https://cdn.test/{id}"),
            &format!("{id}.jar"),
            b"x",
            Duration::from_millis(30),
        );
        artifacts.push(artifact(&id));
    }
    let fetcher = Arc::new(fetcher);
    let (tx, _rx) = broadcast::channel(1000);
    let pool = WorkerPool::new(fetcher.clone(), 2, tx).unwrap();

    let state = pool.run(artifacts, &layout).await.unwrap();

    assert_eq!(state.installed_count(), 6);
    assert!(fetcher.max_in_flight() <= 2);
    assert_eq!(fetcher.calls().len(), 6);
}

#[tokio::test]
async fn test_completed_count_monotonic_and_reaches_total_once() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let fetcher = ScriptedFetcher::new()
        .serve("https://cdn.test/a", "a.jar", b"a")
        .serve("https://cdn.test/b", "b.jar", b"b")
        .status("https://cdn.test/c", 503)
        .serve("https://cdn.test/d", "d.jar", b"d");
    let (pool, mut rx) = pool(fetcher, 3);

    let state = pool
        .run(
            vec![artifact("a"), artifact("b"), artifact("c"), artifact("d")],
            &layout,
        )
        .await
        .unwrap();

    let counts: Vec<usize> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::TaskFinished {
                completed, total, ..
            } => {
                assert_eq!(total, 4);
                Some(completed)
            }
            _ => None,
        })
        .collect();

    let mut sorted = counts.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, [1, 2, 3, 4]);
    assert_eq!(counts.iter().filter(|&&c| c == 4).count(), 1);
    assert_eq!(state.completed, 4);
}

#[tokio::test]
async fn test_events_bracket_the_batch() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let fetcher = ScriptedFetcher::new().serve("https://cdn.test/a", "a.jar", b"abc");
    let (pool, mut rx) = pool(fetcher, 3);

    pool.run(vec![artifact("a")], &layout).await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(
        events.first(),
        Some(Event::BatchStarted { total: 1, slots: 1 })
    ));
    assert!(matches!(
        events.last(),
        Some(Event::BatchComplete {
            installed: 1,
            skipped: 0,
            failed: 0
        })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Progress { sample, .. } if sample.fraction == Some(1.0)
    )));
}

#[tokio::test]
async fn test_empty_batch_completes_immediately() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let (pool, mut rx) = pool(ScriptedFetcher::new(), 3);

    let state = pool.run(Vec::new(), &layout).await.unwrap();

    assert!(state.is_complete());
    assert_eq!(state.total, 0);
    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [
            Event::BatchStarted { total: 0, .. },
            Event::BatchComplete { .. }
        ]
    ));
}

#[tokio::test]
async fn test_duplicate_ids_rejected() {
    let root = TempDir::new().unwrap();
    let layout = layout(&root);
    let (pool, _rx) = pool(ScriptedFetcher::new(), 2);

    let err = pool
        .run(vec![artifact("a"), artifact("a")], &layout)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Manifest(_)));
}

#[test]
fn test_zero_slots_rejected() {
    let (tx, _rx) = broadcast::channel(16);
    let result = WorkerPool::new(Arc::new(ScriptedFetcher::new()), 0, tx);
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_missing_staging_dir_fails_tasks() {
    let root = TempDir::new().unwrap();
    let destination_dir = root.path().join("mods");
    std::fs::create_dir_all(&destination_dir).unwrap();
    let layout = BatchLayout {
        staging_dir: destination_dir.join("downloading"),
        destination_dir,
    };
    let fetcher = ScriptedFetcher::new().serve("https://cdn.test/a", "a.jar", b"a");
    let (pool, _rx) = pool(fetcher, 1);

    let state = pool.run(vec![artifact("a")], &layout).await.unwrap();

    assert_eq!(state.state_of("a"), Some(TaskState::Failed));
    assert!(state.is_complete());
}
