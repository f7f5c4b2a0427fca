// Blob Watcher Infrastructure - Record-import REST Adapter
// Implements: BlobStatusSource

pub mod blob_source;

pub use blob_source::{
    HttpBlobStatusSource, HttpSourceConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
};
