use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use super::{ContentError, ContentService};
use crate::{
    domain::{
        entities::Comment,
        notifications::Notification,
        types::CommentOutcome,
    },
    infra::storage::Mutation,
};

impl ContentService {
    /// Attaches `comment` to its target entry.
    ///
    /// Only [`CommentOutcome::Added`] writes anything; mail notifications are
    /// queued only then.
    #[instrument(skip(self, comment, notifications), fields(entry_id = %comment.target_entry_id))]
    pub fn add_comment(
        &self,
        comment: Comment,
        notifications: Vec<Notification>,
    ) -> Result<CommentOutcome, ContentError> {
        if !self.options.comments_enabled {
            debug!("Comments are disabled site-wide");
            return Ok(CommentOutcome::SiteCommentsDisabled);
        }
        let Some(entry) = self
            .live_entry(&comment.target_entry_id)?
            .filter(|entry| entry.is_public)
        else {
            return Ok(CommentOutcome::EntryNotFound);
        };
        if !entry.allow_comments {
            return Ok(CommentOutcome::CommentsDisabled);
        }

        let mut comment = comment;
        comment.target_entry_id = entry.entry_id.clone();
        comment.target_title = entry.title.clone();

        let stored = comment.clone();
        self.data.modify_extra(entry.created_date(), |extra| {
            extra.push_comment(stored);
            Mutation::Changed(())
        })?;
        self.data.all_comments().add(comment.clone())?;
        self.data.record_comment_update(OffsetDateTime::now_utc());

        info!(comment_id = %comment.comment_id, is_public = comment.is_public, "Comment added");
        self.enqueue_notifications(notifications, &entry.title, false);
        Ok(CommentOutcome::Added)
    }

    /// Returns `false` when the entry or comment cannot be found.
    #[instrument(skip(self))]
    pub fn delete_comment(&self, entry_id: &str, comment_id: &str) -> Result<bool, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(false);
        };
        let removed = self.data.modify_extra(entry.created_date(), |extra| {
            match extra.remove_comment(&entry.entry_id, comment_id) {
                Some(_) => Mutation::Changed(true),
                None => Mutation::Unchanged(false),
            }
        })?;
        if removed {
            self.data.all_comments().delete(comment_id)?;
            self.data.record_comment_update(OffsetDateTime::now_utc());
            info!("Comment deleted");
        }
        Ok(removed)
    }

    /// Publishes the comment and marks it as not spam.
    #[instrument(skip(self))]
    pub fn approve_comment(&self, entry_id: &str, comment_id: &str) -> Result<bool, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(false);
        };
        let now = OffsetDateTime::now_utc();
        let approved = self.data.modify_extra(entry.created_date(), |extra| {
            match extra.find_comment_mut(&entry.entry_id, comment_id) {
                Some(comment) => {
                    comment.approve();
                    comment.modified_utc = now;
                    Mutation::Changed(Some(comment.clone()))
                }
                None => Mutation::Unchanged(None),
            }
        })?;
        let Some(approved) = approved else {
            return Ok(false);
        };
        if !self.data.all_comments().update(&approved)? {
            warn!("Approved comment was missing from the all-comments file, re-adding it");
            self.data.all_comments().add(approved)?;
        }
        self.data.record_comment_update(now);
        info!("Comment approved");
        Ok(true)
    }

    pub fn get_comment(&self, entry_id: &str, comment_id: &str) -> Result<Option<Comment>, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(None);
        };
        Ok(self.data.read_extra(entry.created_date(), |extra| {
            extra.find_comment(&entry.entry_id, comment_id).cloned()
        })?)
    }

    /// Comments on the entry, oldest first. Unapproved ones only with
    /// `include_private`.
    pub fn get_comments_for(&self, entry_id: &str, include_private: bool) -> Result<Vec<Comment>, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(Vec::new());
        };
        let mut comments = self.data.read_extra(entry.created_date(), |extra| {
            extra
                .comments_for(&entry.entry_id)
                .filter(|comment| include_private || comment.is_public)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        comments.sort_by(|a, b| a.created_utc.cmp(&b.created_utc));
        Ok(comments)
    }

    /// Every comment on the site, from the all-comments file.
    pub fn get_all_comments(&self) -> Result<Vec<Comment>, ContentError> {
        Ok(self.data.all_comments().load_comments()?)
    }

    /// Regenerates the all-comments file from the per-day feedback files.
    #[instrument(skip(self))]
    pub fn rebuild_comment_index(&self) -> Result<usize, ContentError> {
        let mut comments = Vec::new();
        for date in self.data.extra_dates() {
            let day_comments = self.data.read_extra(date, |extra| extra.comments().to_vec())?;
            comments.extend(day_comments);
        }
        let count = self.data.all_comments().rebuild_from(comments)?;
        self.data.increment_extra_epoch();
        Ok(count)
    }

    /// Time of the last comment change made through this service, else the
    /// newest timestamp in the all-comments file.
    pub fn get_last_comment_update(&self) -> Result<Option<OffsetDateTime>, ContentError> {
        if let Some(at) = self.data.last_comment_update() {
            return Ok(Some(at));
        }
        Ok(self.data.all_comments().last_comment_update()?)
    }
}
