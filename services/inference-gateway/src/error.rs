use std::path::PathBuf;
use thiserror::Error;

/// Fatal artifact problems. The process never serves traffic after one of these.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("artifact {} unreadable: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("artifact {} malformed: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("model digest mismatch for {}: expected={expected} got={actual}", .path.display())]
    DigestMismatch { path: PathBuf, expected: String, actual: String },
    #[error("inconsistent artifacts: {0}")]
    Inconsistent(String),
}

impl StartupError {
    pub(crate) fn malformed(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Malformed { path: path.to_path_buf(), reason: reason.to_string() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("category id {0} has no entry in the label table")]
pub struct LookupError(pub usize);

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("expected {expected} features, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("classifier produced an empty distribution")]
    EmptyDistribution,
    #[error("inference failed: {0}")]
    Runtime(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("feature {0} is not a request field")]
    UnknownFeature(String),
}
