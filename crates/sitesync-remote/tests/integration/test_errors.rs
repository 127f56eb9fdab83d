//! Classification of failed requests into fatal and retryable errors

use sitesync_core::domain::newtypes::PublishMode;
use sitesync_core::ports::{IRemoteStore, RemoteError};
use sitesync_remote::HttpRemoteStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, SITE};

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let (server, store) = common::setup_store().await;
    common::mount_file(&server, "DELETE", "/a.html", 401).await;

    let err = store.delete(&common::remote("/a.html")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_forbidden_is_fatal_and_keeps_body() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/sites/{SITE}/files/a.html")))
        .respond_with(ResponseTemplate::new(403).set_body_string("site is read-only"))
        .mount(&server)
        .await;

    let err = store.delete(&common::remote("/a.html")).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("site is read-only"));
}

#[tokio::test]
async fn test_payload_too_large_is_fatal() {
    let (server, store) = common::setup_store().await;
    let dir = tempfile::tempdir().unwrap();
    let local = common::local_file(dir.path(), "big.bin", b"0123456789");
    common::mount_file(&server, "PUT", "/big.bin", 413).await;

    let err = store
        .upload(&local, &common::remote("/big.bin"), PublishMode::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (server, store) = common::setup_store().await;
    let dir = tempfile::tempdir().unwrap();
    let local = common::local_file(dir.path(), "a.html", b"a");
    common::mount_file(&server, "PUT", "/a.html", 503).await;

    let err = store
        .upload(&local, &common::remote("/a.html"), PublishMode::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Server { status: 503, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_rate_limited_is_retryable() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("POST"))
        .and(path(format!("/sites/{SITE}/move")))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = store
        .move_item(&common::remote("/a"), &common::remote("/b"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::RateLimited(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_not_found_is_retryable() {
    let (server, store) = common::setup_store().await;
    common::mount_file(&server, "DELETE", "/gone.html", 404).await;

    let err = store.delete(&common::remote("/gone.html")).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_missing_local_file_fails_without_request() {
    let (server, store) = common::setup_store().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .upload(&dir.path().join("absent.html"), &common::remote("/absent.html"), PublishMode::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::LocalRead { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on port 1
    let store = HttpRemoteStore::new("http://127.0.0.1:1", SITE, "token").unwrap();
    let err = store.delete(&common::remote("/a.html")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Network(_)));
    assert!(!err.is_fatal());
}
