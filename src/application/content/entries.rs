use std::path::PathBuf;
use std::sync::Arc;

use time::{Date, OffsetDateTime};
use tracing::{debug, info, instrument};
use url::Url;

use super::{ContentError, ContentService};
use crate::{
    domain::{
        entities::Entry,
        notifications::Notification,
        slug::compressed_title,
        types::{SaveOutcome, Viewer},
    },
    infra::storage::{Mutation, StoreError},
};

impl ContentService {
    /// Shared handle to the live record. Resolves by entry id, then by title.
    #[instrument(skip(self))]
    pub fn get_entry(&self, entry_id: &str, viewer: Viewer) -> Result<Option<Arc<Entry>>, ContentError> {
        Ok(self
            .live_entry(entry_id)?
            .filter(|entry| viewer.can_see(entry.is_public)))
    }

    /// Owned copy of the record, safe to edit and pass to [`Self::save_entry`].
    #[instrument(skip(self))]
    pub fn get_entry_for_edit(&self, entry_id: &str, viewer: Viewer) -> Result<Option<Entry>, ContentError> {
        Ok(self
            .get_entry(entry_id, viewer)?
            .map(|entry| Entry::clone(&entry)))
    }

    /// Looks up by title through its compressed form only.
    #[instrument(skip(self))]
    pub fn get_entry_by_title(&self, title: &str, viewer: Viewer) -> Result<Option<Arc<Entry>>, ContentError> {
        let Some(compressed) = compressed_title(title) else {
            return Ok(None);
        };
        let Some(date) = self.entries.date_for_compressed_title(&compressed)? else {
            return Ok(None);
        };
        let entry = self
            .data
            .read_existing_day(date, |day| {
                day.entries()
                    .iter()
                    .find(|entry| entry.matches_compressed_title(&compressed))
                    .cloned()
            })?
            .flatten();
        Ok(entry.filter(|entry| viewer.can_see(entry.is_public)))
    }

    /// Filesystem paths of the entry's attachments stored as relative
    /// locations. Absolute and site-rooted URLs are left to the web layer.
    #[instrument(skip(self))]
    pub fn attachment_paths(&self, entry_id: &str, viewer: Viewer) -> Result<Vec<PathBuf>, ContentError> {
        let Some(entry) = self.get_entry(entry_id, viewer)? else {
            return Ok(Vec::new());
        };
        Ok(entry
            .attachments
            .iter()
            .map(|attachment| attachment.url.trim())
            .filter(|location| !location.is_empty() && !location.starts_with('/') && Url::parse(location).is_err())
            .map(|location| self.data.resolve(location))
            .collect())
    }

    /// Stores `entry`, replacing the record with the same id if there is one.
    ///
    /// A changed creation date moves the entry, with its comments and
    /// trackings, to the new day. Notifications are queued and run after
    /// this returns.
    #[instrument(skip(self, entry, notifications), fields(entry_id))]
    pub fn save_entry(
        &self,
        entry: impl Into<Arc<Entry>>,
        notifications: Vec<Notification>,
    ) -> Result<SaveOutcome, ContentError> {
        let entry: Arc<Entry> = entry.into();
        tracing::Span::current().record("entry_id", entry.entry_id.as_str());
        if entry.entry_id.trim().is_empty() {
            return Err(ContentError::EmptyEntryId);
        }

        let snapshot = self.entries.snapshot()?;
        let stored = match snapshot.date_for_entry_id(&entry.entry_id) {
            Some(date) => self
                .data
                .read_existing_day(date, |day| day.find_by_id(&entry.entry_id).cloned())?
                .flatten()
                .map(|current| (date, current)),
            None => None,
        };

        if let Some((_, current)) = &stored
            && Arc::ptr_eq(current, &entry)
        {
            return Err(ContentError::AliasedEntry {
                entry_id: entry.entry_id.clone(),
            });
        }

        let mut record = Arc::unwrap_or_clone(entry);
        if let Some((_, current)) = &stored {
            record.entry_id = current.entry_id.clone();
            record.modified_utc = if record.differs_materially(current) {
                OffsetDateTime::now_utc()
            } else {
                current.modified_utc
            };
        }

        let new_date = record.created_date();
        let title = record.title.clone();
        let is_public = record.is_public;
        let record = Arc::new(record);

        let outcome = match stored {
            Some((old_date, _)) if old_date != new_date => {
                self.move_entry(old_date, new_date, record)?;
                SaveOutcome::Updated
            }
            _ => {
                let replaced = self.data.modify_day(new_date, |day| Mutation::Changed(day.upsert(record)))?;
                if replaced.is_some() {
                    SaveOutcome::Updated
                } else {
                    SaveOutcome::Added
                }
            }
        };

        info!(date = %new_date, ?outcome, "Entry saved");
        self.enqueue_notifications(notifications, &title, is_public);
        Ok(outcome)
    }

    /// Removes the entry. Returns `false` when it cannot be resolved.
    ///
    /// Comments and trackings stay in their feedback file.
    #[instrument(skip(self))]
    pub fn delete_entry(&self, entry_id: &str) -> Result<bool, ContentError> {
        let Some(date) = self.locate(entry_id)? else {
            debug!("Entry not found, nothing to delete");
            return Ok(false);
        };
        let Some(Some(canonical_id)) = self
            .data
            .read_existing_day(date, |day| day.find(entry_id).map(|entry| entry.entry_id.clone()))?
        else {
            return Ok(false);
        };
        let removed = self.data.modify_day(date, |day| match day.remove(&canonical_id) {
            Some(_) => Mutation::Changed(true),
            None => Mutation::Unchanged(false),
        })?;
        if removed {
            info!(date = %date, entry_id = %canonical_id, "Entry deleted");
        }
        Ok(removed)
    }

    /// Insert under the new day before removing from the old one, so a failure
    /// in between leaves a duplicate rather than a lost entry. Feedback is
    /// copied to the new day before it is dropped from the old one.
    fn move_entry(&self, old_date: Date, new_date: Date, record: Arc<Entry>) -> Result<(), StoreError> {
        let entry_id = record.entry_id.clone();
        self.data
            .modify_day(new_date, |day| Mutation::Changed(day.upsert(record)))?;
        self.data.modify_day(old_date, |day| match day.remove(&entry_id) {
            Some(_) => Mutation::Changed(()),
            None => Mutation::Unchanged(()),
        })?;

        let (comments, trackings) = self.data.read_extra(old_date, |extra| {
            (
                extra.comments_for(&entry_id).cloned().collect::<Vec<_>>(),
                extra.trackings_for(&entry_id).cloned().collect::<Vec<_>>(),
            )
        })?;
        let moved_comments = comments.len();
        let moved_trackings = trackings.len();
        if moved_comments + moved_trackings > 0 {
            self.data.modify_extra(new_date, |extra| {
                extra.absorb(comments, trackings);
                Mutation::Changed(())
            })?;
            self.data.modify_extra(old_date, |extra| {
                extra.take_feedback_for(&entry_id);
                Mutation::Changed(())
            })?;
        }

        info!(
            entry_id = %entry_id,
            from = %old_date,
            to = %new_date,
            moved_comments,
            moved_trackings,
            "Entry moved to a new day"
        );
        Ok(())
    }

    /// Owning day of `key`, tried as an entry id, then as a title.
    pub(super) fn locate(&self, key: &str) -> Result<Option<Date>, StoreError> {
        let snapshot = self.entries.snapshot()?;
        Ok(snapshot
            .date_for_entry_id(key)
            .or_else(|| snapshot.date_for_compressed_title(key))
            .or_else(|| {
                compressed_title(key).and_then(|title| snapshot.date_for_compressed_title(&title))
            }))
    }

    /// Live record for `key` regardless of visibility.
    pub(super) fn live_entry(&self, key: &str) -> Result<Option<Arc<Entry>>, StoreError> {
        let Some(date) = self.locate(key)? else {
            return Ok(None);
        };
        Ok(self
            .data
            .read_existing_day(date, |day| day.find(key).cloned())?
            .flatten())
    }
}
