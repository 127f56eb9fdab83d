//! Live watch sessions on a real temporary directory

use std::sync::Arc;
use std::time::Duration;

use sitesync_core::ports::NoIgnore;
use sitesync_sync::{watch, SessionState, SyncError, TaskQueue, WatchOptions};

use crate::common::{self, Call, RecordingStore};

const SETTLE: Duration = Duration::from_secs(10);

fn options(remove: bool, disable_initial: bool) -> WatchOptions {
    WatchOptions {
        remove,
        disable_initial,
        debounce: Duration::from_millis(50),
        ..WatchOptions::default()
    }
}

#[tokio::test]
async fn test_create_then_delete_mirrors_upload_then_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordingStore::new();
    let handle = watch(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        options(true, true),
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();
    assert!(handle.wait_for(SessionState::Ready).await);

    let file = handle.root().join("a.html");
    std::fs::write(&file, "<html/>").unwrap();
    assert!(
        common::wait_until(SETTLE, || store.upload_attempts("/site/a.html") == 1).await,
        "no upload seen: {:?}",
        store.calls()
    );

    std::fs::remove_file(&file).unwrap();
    let deleted = common::wait_until(SETTLE, || {
        store.calls().contains(&Call::Delete {
            remote: "/site/a.html".into(),
        })
    })
    .await;
    assert!(deleted, "no delete seen: {:?}", store.calls());

    assert_eq!(handle.state(), SessionState::Running);
    handle.stop();
    assert!(handle.wait_for(SessionState::Stopped).await);
    handle.join().await;

    let deletes = store
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Delete { .. }))
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn test_initial_upload_finishes_before_ready() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "index.html", "a");
    common::write_file(dir.path(), "css/site.css", "b");

    let store = RecordingStore::with_latency(Duration::from_millis(20));
    let handle = watch(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        options(false, false),
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();

    assert!(handle.wait_for(SessionState::Ready).await);
    assert_eq!(store.upload_attempts("/site/index.html"), 1);
    assert_eq!(store.upload_attempts("/site/css/site.css"), 1);

    handle.stop();
    handle.join().await;
}

#[tokio::test]
async fn test_disable_initial_skips_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "index.html", "a");

    let store = RecordingStore::new();
    let handle = watch(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        options(false, true),
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();

    assert!(handle.wait_for(SessionState::Ready).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.calls().is_empty());

    handle.stop();
    handle.join().await;
}

#[tokio::test]
async fn test_stop_ends_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let handle = watch(
        RecordingStore::new(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        options(false, true),
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();

    handle.stop();
    assert!(handle.wait_for(SessionState::Stopped).await);
    assert_eq!(handle.state(), SessionState::Stopped);
    handle.join().await;
}

#[tokio::test]
async fn test_watch_rejects_file_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write_file(dir.path(), "a.html", "a");

    let result = watch(
        RecordingStore::new(),
        TaskQueue::new(10),
        &file,
        common::remote("/site"),
        options(false, true),
        Arc::new(NoIgnore),
    )
    .await;
    assert!(matches!(result, Err(SyncError::NotADirectory(_))));
}

#[tokio::test]
async fn test_renames_become_single_moves() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "old.js", "a");
    common::write_file(dir.path(), "old-dir/file.js", "b");

    let store = RecordingStore::new();
    let handle = watch(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        options(true, true),
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();
    assert!(handle.wait_for(SessionState::Ready).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let root = handle.root().to_path_buf();
    let file_move = Call::Move {
        from: "/site/old.js".into(),
        to: "/site/new.js".into(),
    };
    let dir_move = Call::Move {
        from: "/site/old-dir".into(),
        to: "/site/new-dir".into(),
    };

    std::fs::rename(root.join("old.js"), root.join("new.js")).unwrap();
    assert!(
        common::wait_until(SETTLE, || store.calls().contains(&file_move)).await,
        "no file move seen: {:?}",
        store.calls()
    );

    std::fs::rename(root.join("old-dir"), root.join("new-dir")).unwrap();
    assert!(
        common::wait_until(SETTLE, || store.calls().contains(&dir_move)).await,
        "no folder move seen: {:?}",
        store.calls()
    );

    // Anything the renames leak would arrive within a few debounce periods
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.calls(), vec![file_move, dir_move]);

    handle.stop();
    handle.join().await;
}

#[tokio::test]
async fn test_stopped_session_has_written_its_notify_log() {
    let dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let log = logs.path().join("notify.log");

    let store = RecordingStore::with_latency(Duration::from_millis(50));
    let handle = watch(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        WatchOptions {
            notify: Some(log.clone()),
            notify_debounce: Duration::from_secs(60),
            ..options(false, true)
        },
        Arc::new(NoIgnore),
    )
    .await
    .unwrap();
    assert!(handle.wait_for(SessionState::Ready).await);

    std::fs::write(handle.root().join("a.html"), "<html/>").unwrap();
    assert!(
        common::wait_until(SETTLE, || store.upload_attempts("/site/a.html") == 1).await,
        "no upload seen: {:?}",
        store.calls()
    );

    handle.stop();
    assert!(handle.wait_for(SessionState::Stopped).await);

    let contents = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert!(lines.len() >= 2, "unexpected log: {contents}");
    assert!(lines[0].contains("add: "), "unexpected log: {contents}");
    let trailer = format!("sync complete ({} actions)", lines.len() - 1);
    assert!(lines[lines.len() - 1].ends_with(&trailer), "unexpected log: {contents}");

    handle.join().await;
}
