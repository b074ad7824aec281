use tracing::{debug, info, instrument, warn};

use super::{ContentError, ContentService};
use crate::{
    application::jobs::TrackingJob,
    domain::{
        entities::Tracking,
        notifications::Notification,
        types::{TrackingOutcome, TrackingType},
    },
    infra::storage::Mutation,
};

impl ContentService {
    /// Queues the tracking for the background worker and returns at once.
    #[instrument(skip(self, tracking, notifications), fields(entry_id = %tracking.target_entry_id))]
    pub fn add_tracking(&self, tracking: Tracking, notifications: Vec<Notification>) {
        self.enqueue_notifications(notifications, &tracking.target_title, false);
        self.queues.enqueue_tracking(TrackingJob::Record(tracking));
    }

    /// Persists a tracking unless its source is already recorded for the entry.
    ///
    /// Runs on the tracking worker; callers on a request path use
    /// [`Self::add_tracking`].
    #[instrument(skip(self, tracking), fields(entry_id = %tracking.target_entry_id))]
    pub fn record_tracking(&self, tracking: Tracking) -> Result<TrackingOutcome, ContentError> {
        let Some(entry) = self.live_entry(&tracking.target_entry_id)? else {
            warn!(permalink = %tracking.permalink, "Tracking target not found");
            return Ok(TrackingOutcome::EntryNotFound);
        };

        let mut tracking = tracking;
        tracking.target_entry_id = entry.entry_id.clone();
        tracking.target_title = entry.title.clone();
        let permalink = tracking.permalink.clone();
        let tracking_type = tracking.tracking_type;

        let outcome = self.data.modify_extra(entry.created_date(), |extra| {
            if extra.push_tracking(tracking) {
                Mutation::Changed(TrackingOutcome::Recorded)
            } else {
                Mutation::Unchanged(TrackingOutcome::Duplicate)
            }
        })?;

        match outcome {
            TrackingOutcome::Recorded => {
                info!(%permalink, tracking_type = tracking_type.as_str(), "Tracking recorded")
            }
            _ => debug!(%permalink, tracking_type = tracking_type.as_str(), "Tracking already recorded"),
        }
        Ok(outcome)
    }

    /// Removes the matching tracking; permalink compared trimmed and without case.
    #[instrument(skip(self))]
    pub fn delete_tracking(
        &self,
        entry_id: &str,
        permalink: &str,
        tracking_type: TrackingType,
    ) -> Result<bool, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(false);
        };
        let removed = self.data.modify_extra(entry.created_date(), |extra| {
            if extra.remove_tracking(&entry.entry_id, permalink, tracking_type) {
                Mutation::Changed(true)
            } else {
                Mutation::Unchanged(false)
            }
        })?;
        if removed {
            info!("Tracking deleted");
        }
        Ok(removed)
    }

    pub fn get_trackings_for(&self, entry_id: &str) -> Result<Vec<Tracking>, ContentError> {
        let Some(entry) = self.live_entry(entry_id)? else {
            return Ok(Vec::new());
        };
        Ok(self.data.read_extra(entry.created_date(), |extra| {
            extra.trackings_for(&entry.entry_id).cloned().collect()
        })?)
    }
}
