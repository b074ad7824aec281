//! Aggregate file holding every comment on the site.
//!
//! Mirrors the per-day extra files so site-wide comment listings need a
//! single read. It can always be regenerated with [`AllCommentsIndex::rebuild_from`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use super::{codec, error::StoreError};
use crate::{domain::entities::Comment, util::lock::mutex_lock};

const SOURCE: &str = "infra::storage::all_comments";

#[derive(Debug, Default, Serialize, Deserialize)]
struct AllCommentsRecord {
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Debug)]
pub struct AllCommentsIndex {
    path: PathBuf,
    loaded: Mutex<Option<Vec<Comment>>>,
}

impl AllCommentsIndex {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_comments(&self) -> Result<Vec<Comment>, StoreError> {
        self.with_comments("load_comments", |comments| (comments.clone(), false))
    }

    pub fn add(&self, comment: Comment) -> Result<(), StoreError> {
        self.with_comments("add", |comments| {
            comments.push(comment);
            ((), true)
        })
    }

    /// Replaces the comment with the same id. Returns `false` when absent.
    pub fn update(&self, comment: &Comment) -> Result<bool, StoreError> {
        self.with_comments("update", |comments| {
            match comments
                .iter_mut()
                .find(|existing| existing.comment_id == comment.comment_id)
            {
                Some(existing) => {
                    *existing = comment.clone();
                    (true, true)
                }
                None => (false, false),
            }
        })
    }

    pub fn delete(&self, comment_id: &str) -> Result<bool, StoreError> {
        self.with_comments("delete", |comments| {
            let before = comments.len();
            comments.retain(|comment| comment.comment_id != comment_id);
            let removed = comments.len() != before;
            (removed, removed)
        })
    }

    /// Most recent creation or modification time of any comment.
    pub fn last_comment_update(&self) -> Result<Option<OffsetDateTime>, StoreError> {
        self.with_comments("last_comment_update", |comments| {
            let latest = comments
                .iter()
                .map(|comment| comment.modified_utc.max(comment.created_utc))
                .max();
            (latest, false)
        })
    }

    /// Replaces the whole index with `comments`, oldest first.
    pub fn rebuild_from(&self, mut comments: Vec<Comment>) -> Result<usize, StoreError> {
        comments.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        let count = comments.len();
        let mut guard = mutex_lock(&self.loaded, SOURCE, "rebuild_from");
        let record = AllCommentsRecord { comments };
        codec::write_json(&self.path, &record)?;
        *guard = Some(record.comments);
        info!(count, path = %self.path.display(), "All-comments index rebuilt");
        Ok(count)
    }

    /// Runs `f` against the loaded comments; persists when `f` reports a change.
    fn with_comments<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Vec<Comment>) -> (R, bool),
    ) -> Result<R, StoreError> {
        let mut guard = mutex_lock(&self.loaded, SOURCE, op);
        if guard.is_none() {
            let record = codec::read_json::<AllCommentsRecord>(&self.path)?.unwrap_or_default();
            *guard = Some(record.comments);
        }
        let comments = guard.get_or_insert_with(Vec::new);
        let mut working = comments.clone();
        let (result, changed) = f(&mut working);
        if changed {
            let record = AllCommentsRecord { comments: working };
            codec::write_json(&self.path, &record)?;
            *comments = record.comments;
        }
        Ok(result)
    }
}
