//! Integration tests for sitesync-sync
//!
//! Drive the engine against a recording in-memory remote store: one-shot
//! folder uploads, event dispatch and move correlation, the notify log,
//! and live watch sessions on a real temporary directory.


mod test_dispatcher;
mod test_upload_folder;
mod test_watch;
