//! Shared test helpers for remote store integration tests
//!
//! Each helper starts a wiremock server and returns an `HttpRemoteStore`
//! pointing at it.

use std::path::{Path, PathBuf};

use sitesync_core::domain::newtypes::RemotePath;
use sitesync_remote::HttpRemoteStore;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SITE: &str = "my-site";
pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and a store for site [`SITE`]
pub async fn setup_store() -> (MockServer, HttpRemoteStore) {
    let server = MockServer::start().await;
    let store = HttpRemoteStore::new(&server.uri(), SITE, TOKEN).unwrap();
    (server, store)
}

/// Mounts a file endpoint answering `method_name` with `status`
pub async fn mount_file(server: &MockServer, method_name: &str, remote: &str, status: u16) {
    Mock::given(method(method_name))
        .and(path(format!("/sites/{SITE}/files{remote}")))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Writes a local payload file and returns its path
pub fn local_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn remote(path: &str) -> RemotePath {
    RemotePath::new(path).unwrap()
}
