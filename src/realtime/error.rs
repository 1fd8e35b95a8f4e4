use crate::fetch::error::FetchError;
use crate::realtime::snapshot::SnapshotId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to parse JSON from '{origin}'")]
    JsonParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No snapshot at {0} (looked in '{1}')")]
    SnapshotNotFound(SnapshotId, PathBuf),

    #[error("Failed to create snapshot directory '{0}'")]
    SnapshotDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to list snapshots in '{0}'")]
    SnapshotList(PathBuf, #[source] std::io::Error),

    #[error("Failed to read snapshot file '{0}'")]
    SnapshotRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write snapshot file '{0}'")]
    SnapshotWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode snapshot file '{0}'")]
    SnapshotEncode(PathBuf, #[source] serde_json::Error),

    #[error("Discovery document has no feeds for language '{0}'")]
    LanguageNotListed(String),

    #[error("Feed '{feed}' is not listed in the discovery document for language '{language}'")]
    FeedNotListed { feed: String, language: String },
}
