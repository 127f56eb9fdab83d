//! One-shot folder upload: filtering, the single retry pass, fatal aborts

use std::sync::Arc;

use sitesync_core::domain::newtypes::PublishMode;
use sitesync_core::ports::{IIgnoreFilter, NoIgnore};
use sitesync_sync::{upload_folder, SyncError, TaskQueue, UploadOptions};

use crate::common::{self, Call, Failure, RecordingStore};

fn no_ignore() -> Arc<dyn IIgnoreFilter> {
    Arc::new(NoIgnore)
}

#[tokio::test]
async fn test_uploads_every_file_once_to_translated_path() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "index.html", "<html/>");
    common::write_file(dir.path(), "css/main.css", "body{}");
    common::write_file(dir.path(), "js/lib/app.js", "1");

    let store = RecordingStore::new();
    let report = upload_folder(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        UploadOptions {
            mode: PublishMode::Draft,
            allowed_extensions: Vec::new(),
        },
        no_ignore(),
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 3);
    assert_eq!(report.skipped, 0);
    assert!(report.is_complete());

    let mut remotes: Vec<_> = store
        .calls()
        .into_iter()
        .map(|call| match call {
            Call::Upload { remote, mode, .. } => {
                assert_eq!(mode, PublishMode::Draft);
                remote
            }
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    remotes.sort();
    assert_eq!(
        remotes,
        vec!["/site/css/main.css", "/site/index.html", "/site/js/lib/app.js"]
    );
}

#[tokio::test]
async fn test_allow_list_then_ignore_predicate() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "index.html", "a");
    common::write_file(dir.path(), "notes.txt", "b");
    common::write_file(dir.path(), "drafts/wip.html", "c");

    let ignore: Arc<dyn IIgnoreFilter> =
        Arc::new(|p: &std::path::Path| p.components().any(|c| c.as_os_str() == "drafts"));

    let store = RecordingStore::new();
    let report = upload_folder(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        UploadOptions {
            mode: PublishMode::Live,
            allowed_extensions: vec!["html".into()],
        },
        ignore,
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(store.upload_attempts("/site/index.html"), 1);
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn test_retryable_failure_gets_exactly_one_retry() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "a.html", "a");
    common::write_file(dir.path(), "b.html", "b");

    let store = RecordingStore::new();
    store.fail_uploads("/site/b.html", &[Failure::Retryable]);

    let report = upload_folder(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        UploadOptions::default(),
        no_ignore(),
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 2);
    assert!(report.is_complete());
    assert_eq!(store.upload_attempts("/site/a.html"), 1);
    assert_eq!(store.upload_attempts("/site/b.html"), 2);
}

#[tokio::test]
async fn test_second_failure_is_reported_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let b = common::write_file(dir.path(), "b.html", "b");

    let store = RecordingStore::new();
    store.fail_uploads(
        "/site/b.html",
        &[Failure::Retryable, Failure::Retryable, Failure::Retryable],
    );

    let report = upload_folder(
        store.clone(),
        TaskQueue::new(10),
        dir.path(),
        common::remote("/site"),
        UploadOptions::default(),
        no_ignore(),
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file, b);
    assert_eq!(report.failures[0].remote.as_str(), "/site/b.html");
    assert!(report.failures[0].error.contains("503"));
    assert_eq!(store.upload_attempts("/site/b.html"), 2);
}

#[tokio::test]
async fn test_fatal_error_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "a.html", "a");
    common::write_file(dir.path(), "b.html", "b");
    common::write_file(dir.path(), "c.html", "c");

    let store = RecordingStore::new();
    store.fail_uploads("/site/a.html", &[Failure::Fatal]);

    let result = upload_folder(
        store.clone(),
        TaskQueue::new(1),
        dir.path(),
        common::remote("/site"),
        UploadOptions::default(),
        no_ignore(),
    )
    .await;

    match result {
        Err(SyncError::Fatal { remote, source, .. }) => {
            assert_eq!(remote.as_str(), "/site/a.html");
            assert!(source.is_fatal());
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
    // No retry pass after a fatal error
    assert_eq!(store.upload_attempts("/site/a.html"), 1);
    assert!(store.calls().len() <= 3);
}

#[tokio::test]
async fn test_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = upload_folder(
        RecordingStore::new(),
        TaskQueue::new(2),
        &dir.path().join("absent"),
        common::remote("/site"),
        UploadOptions::default(),
        no_ignore(),
    )
    .await;
    assert!(matches!(result, Err(SyncError::IoError(_))));
}

#[tokio::test]
async fn test_shared_queue_is_reusable_after_run() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(dir.path(), "a.html", "a");

    let queue = TaskQueue::new(10);
    let store = RecordingStore::new();
    for _ in 0..2 {
        upload_folder(
            store.clone(),
            queue.clone(),
            dir.path(),
            common::remote("/site"),
            UploadOptions::default(),
            no_ignore(),
        )
        .await
        .unwrap();
    }
    queue.idle().await;
    assert_eq!(store.upload_attempts("/site/a.html"), 2);
}
