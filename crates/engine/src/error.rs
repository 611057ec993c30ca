use coedit_core::HistoryId;
use coedit_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("load rejected: conflicts pending resolution")]
    ConflictsPending,

    #[error("cannot roll back, history record not found: {0}")]
    RollbackNotFound(HistoryId),

    #[error("nothing to export")]
    NothingToExport,

    #[error("{failed} of {total} conflict resolutions failed: {detail}")]
    ResolutionIncomplete {
        failed: usize,
        total: usize,
        detail: String,
    },

    #[error("legacy snapshot unreadable: {0}")]
    LegacySnapshot(String),
}
