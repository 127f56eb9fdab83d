//! Event dispatch: uploads, deletes, move correlation and suppression

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sitesync_core::domain::newtypes::PublishMode;
use sitesync_core::ports::{IIgnoreFilter, NoIgnore};
use sitesync_sync::dispatcher::{DispatcherOptions, MoveSettled};
use sitesync_sync::notify_log::NotifyLogger;
use sitesync_sync::path::PathTranslator;
use sitesync_sync::watcher::{DebouncedEventQueue, WatchEvent};
use sitesync_sync::{Dispatch, SuppressReason, SyncDispatcher, SyncError, TaskQueue};
use tokio::sync::mpsc;

use crate::common::{self, Call, Failure, RecordingStore};

struct Fixture {
    store: Arc<RecordingStore>,
    queue: TaskQueue,
    dispatcher: SyncDispatcher,
    settled: mpsc::UnboundedReceiver<MoveSettled>,
}

fn fixture_with(
    root: &Path,
    remove: bool,
    ignore: Arc<dyn IIgnoreFilter>,
    notify: NotifyLogger,
) -> Fixture {
    let store = RecordingStore::new();
    let queue = TaskQueue::new(10);
    let (dispatcher, settled) = SyncDispatcher::new(
        store.clone(),
        queue.clone(),
        PathTranslator::new(root, common::remote("/site")),
        ignore,
        DispatcherOptions {
            mode: PublishMode::Live,
            remove,
        },
        notify,
    );
    Fixture {
        store,
        queue,
        dispatcher,
        settled,
    }
}

fn fixture(root: &Path, remove: bool) -> Fixture {
    fixture_with(root, remove, Arc::new(NoIgnore), NotifyLogger::disabled())
}

fn suppressed(dispatch: Result<Dispatch, SyncError>) -> SuppressReason {
    match dispatch.unwrap() {
        Dispatch::Suppressed(reason) => reason,
        other => panic!("expected suppression, got {other:?}"),
    }
}

#[tokio::test]
async fn test_add_and_change_upload() {
    let mut f = fixture(Path::new("/proj"), false);

    f.dispatcher
        .dispatch(WatchEvent::Add("/proj/a.html".into()))
        .unwrap()
        .settled()
        .await;
    f.dispatcher
        .dispatch(WatchEvent::Change("/proj/css/b.css".into()))
        .unwrap()
        .settled()
        .await;

    assert_eq!(
        f.store.calls(),
        vec![
            Call::Upload {
                local: "/proj/a.html".into(),
                remote: "/site/a.html".into(),
                mode: PublishMode::Live,
            },
            Call::Upload {
                local: "/proj/css/b.css".into(),
                remote: "/site/css/b.css".into(),
                mode: PublishMode::Live,
            },
        ]
    );
}

#[tokio::test]
async fn test_unlink_requires_remove() {
    let mut f = fixture(Path::new("/proj"), false);
    assert_eq!(
        suppressed(f.dispatcher.dispatch(WatchEvent::Unlink("/proj/a.html".into()))),
        SuppressReason::RemoveDisabled
    );
    assert_eq!(
        suppressed(f.dispatcher.dispatch(WatchEvent::UnlinkDir("/proj/dir".into()))),
        SuppressReason::RemoveDisabled
    );
    f.queue.idle().await;
    assert!(f.store.calls().is_empty());
}

#[tokio::test]
async fn test_unlink_and_unlink_dir_delete_with_remove() {
    let mut f = fixture(Path::new("/proj"), true);

    f.dispatcher
        .dispatch(WatchEvent::Unlink("/proj/a.html".into()))
        .unwrap()
        .settled()
        .await;
    f.dispatcher
        .dispatch(WatchEvent::UnlinkDir("/proj/assets".into()))
        .unwrap()
        .settled()
        .await;

    assert_eq!(
        f.store.calls(),
        vec![
            Call::Delete {
                remote: "/site/a.html".into()
            },
            Call::Delete {
                remote: "/site/assets".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_ignored_paths_never_reach_the_store() {
    let ignore: Arc<dyn IIgnoreFilter> =
        Arc::new(|p: &Path| p.extension().is_some_and(|e| e == "swp"));
    let mut f = fixture_with(Path::new("/proj"), true, ignore, NotifyLogger::disabled());

    for event in [
        WatchEvent::Add("/proj/a.swp".into()),
        WatchEvent::Change("/proj/a.swp".into()),
        WatchEvent::Unlink("/proj/a.swp".into()),
    ] {
        assert_eq!(suppressed(f.dispatcher.dispatch(event)), SuppressReason::Ignored);
    }

    // A rename is judged by its old path
    assert!(matches!(
        f.dispatcher.dispatch(WatchEvent::Moved("/proj/a.swp".into())).unwrap(),
        Dispatch::Buffered
    ));
    assert_eq!(
        suppressed(f.dispatcher.dispatch(WatchEvent::Moved("/proj/a.html".into()))),
        SuppressReason::Ignored
    );

    f.queue.idle().await;
    assert!(f.store.calls().is_empty());
}

#[tokio::test]
async fn test_move_pair_issues_one_move_and_nothing_else() {
    let mut f = fixture(Path::new("/a"), true);

    let first = f.dispatcher.dispatch(WatchEvent::Moved("/a/old.js".into())).unwrap();
    assert!(matches!(first, Dispatch::Buffered));
    let second = f.dispatcher.dispatch(WatchEvent::Moved("/a/new.js".into())).unwrap();
    assert!(second.is_submitted());

    // Side effects of the same OS rename
    assert_eq!(
        suppressed(f.dispatcher.dispatch(WatchEvent::Unlink("/a/old.js".into()))),
        SuppressReason::InFlightMove
    );
    assert_eq!(
        suppressed(f.dispatcher.dispatch(WatchEvent::Add("/a/new.js".into()))),
        SuppressReason::InFlightMove
    );

    second.settled().await;
    f.queue.idle().await;

    assert_eq!(
        f.store.calls(),
        vec![Call::Move {
            from: "/site/old.js".into(),
            to: "/site/new.js".into(),
        }]
    );
}

#[tokio::test]
async fn test_folder_rename_suppresses_children() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    common::write_file(root, "new-dir/file.js", "x");
    let old_dir = root.join("old-dir");
    let new_dir = root.join("new-dir");

    let mut f = fixture(root, true);
    f.dispatcher.dispatch(WatchEvent::Moved(old_dir.clone())).unwrap();
    let rename = f.dispatcher.dispatch(WatchEvent::Moved(new_dir.clone())).unwrap();
    assert!(rename.is_submitted());

    for event in [
        WatchEvent::Unlink(old_dir.join("file.js")),
        WatchEvent::UnlinkDir(old_dir.clone()),
        WatchEvent::Add(new_dir.join("file.js")),
    ] {
        assert_eq!(
            suppressed(f.dispatcher.dispatch(event)),
            SuppressReason::InFlightMove
        );
    }

    rename.settled().await;
    f.queue.idle().await;
    assert_eq!(
        f.store.calls(),
        vec![Call::Move {
            from: "/site/old-dir".into(),
            to: "/site/new-dir".into(),
        }]
    );
}

#[tokio::test]
async fn test_new_file_under_renamed_folder_stays_suppressed_after_debounce() {
    let mut f = fixture(Path::new("/a"), true);
    f.dispatcher.dispatch(WatchEvent::Moved("/a/old-dir".into())).unwrap();
    let rename = f.dispatcher.dispatch(WatchEvent::Moved("/a/new-dir".into())).unwrap();

    // A freshly written file is reported as a create followed by a write
    let mut debounced = DebouncedEventQueue::new(Duration::ZERO);
    debounced.push(WatchEvent::Add("/a/old-dir/file.js".into()));
    debounced.push(WatchEvent::Change("/a/old-dir/file.js".into()));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let events = debounced.poll();
    assert_eq!(events, vec![WatchEvent::Add("/a/old-dir/file.js".into())]);
    for event in events {
        assert_eq!(
            suppressed(f.dispatcher.dispatch(event)),
            SuppressReason::InFlightMove
        );
    }

    rename.settled().await;
    f.queue.idle().await;
    assert_eq!(
        f.store.calls(),
        vec![Call::Move {
            from: "/site/old-dir".into(),
            to: "/site/new-dir".into(),
        }]
    );
}

#[tokio::test]
async fn test_change_is_never_move_suppressed() {
    let mut f = fixture(Path::new("/a"), false);
    f.dispatcher.dispatch(WatchEvent::Moved("/a/old.js".into())).unwrap();
    f.dispatcher
        .dispatch(WatchEvent::Moved("/a/new.js".into()))
        .unwrap()
        .settled()
        .await;

    f.dispatcher
        .dispatch(WatchEvent::Change("/a/new.js".into()))
        .unwrap()
        .settled()
        .await;

    assert_eq!(f.store.upload_attempts("/site/new.js"), 1);
}

#[tokio::test]
async fn test_settled_move_reports_back() {
    let mut f = fixture(Path::new("/a"), false);
    f.dispatcher.dispatch(WatchEvent::Moved("/a/old.js".into())).unwrap();
    f.dispatcher.dispatch(WatchEvent::Moved("/a/new.js".into())).unwrap();
    assert_eq!(f.dispatcher.correlator().tracked(), 2);

    let settled = tokio::time::timeout(Duration::from_secs(5), f.settled.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        settled,
        MoveSettled {
            old: "/a/old.js".into(),
            new: "/a/new.js".into(),
        }
    );

    f.dispatcher.apply_settled(settled);
    assert_eq!(f.dispatcher.correlator().tracked(), 0);
}

#[tokio::test]
async fn test_upload_retries_once_inline() {
    let mut f = fixture(Path::new("/proj"), false);
    f.store.fail_uploads("/site/a.html", &[Failure::Retryable]);
    f.store.fail_uploads(
        "/site/b.html",
        &[Failure::Retryable, Failure::Retryable, Failure::Retryable],
    );

    for name in ["a.html", "b.html"] {
        f.dispatcher
            .dispatch(WatchEvent::Change(PathBuf::from("/proj").join(name)))
            .unwrap()
            .settled()
            .await;
    }

    assert_eq!(f.store.upload_attempts("/site/a.html"), 2);
    assert_eq!(f.store.upload_attempts("/site/b.html"), 2);
}

#[tokio::test]
async fn test_fatal_upload_is_not_retried_and_session_continues() {
    let mut f = fixture(Path::new("/proj"), false);
    f.store.fail_uploads("/site/a.html", &[Failure::Fatal]);

    f.dispatcher
        .dispatch(WatchEvent::Add("/proj/a.html".into()))
        .unwrap()
        .settled()
        .await;
    f.dispatcher
        .dispatch(WatchEvent::Add("/proj/b.html".into()))
        .unwrap()
        .settled()
        .await;

    assert_eq!(f.store.upload_attempts("/site/a.html"), 1);
    assert_eq!(f.store.upload_attempts("/site/b.html"), 1);
}

#[tokio::test]
async fn test_path_outside_root_is_rejected() {
    let mut f = fixture(Path::new("/proj"), false);
    let result = f.dispatcher.dispatch(WatchEvent::Add("/elsewhere/a.html".into()));
    assert!(matches!(result, Err(SyncError::OutsideRoot { .. })));
}

#[tokio::test]
async fn test_notify_log_batches_settled_operations() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("notify.log");
    let notify = NotifyLogger::new(&log, Duration::from_millis(50));
    let mut f = fixture_with(Path::new("/proj"), true, Arc::new(NoIgnore), notify);

    f.dispatcher.dispatch(WatchEvent::Add("/proj/a.html".into())).unwrap();
    f.dispatcher.dispatch(WatchEvent::Change("/proj/b.css".into())).unwrap();
    f.dispatcher.dispatch(WatchEvent::Unlink("/proj/c.js".into())).unwrap();

    let written = common::wait_until(Duration::from_secs(5), || {
        std::fs::read_to_string(&log)
            .map(|s| s.lines().count() == 4)
            .unwrap_or(false)
    })
    .await;
    assert!(written, "notify log was not written");

    let contents = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert!(lines[0].ends_with("add: /proj/a.html"));
    assert!(lines[1].ends_with("change: /proj/b.css"));
    assert!(lines[2].ends_with("unlink: /proj/c.js"));
    assert!(lines[3].ends_with("sync complete (3 actions)"));
    // Every logged operation had already reached the store
    assert_eq!(f.store.calls().len(), 3);
}
