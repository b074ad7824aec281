use thiserror::Error;

use crate::infra::storage::StoreError;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("entry id must not be blank")]
    EmptyEntryId,
    #[error("entry `{entry_id}` is the live stored record; save an edited copy instead")]
    AliasedEntry { entry_id: String },
    #[error("background workers are already running")]
    WorkersAlreadyStarted,
    #[error(transparent)]
    Store(#[from] StoreError),
}
