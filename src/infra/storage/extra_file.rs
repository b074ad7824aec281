//! One calendar day's feedback: comments and trackings for entries created
//! that day.

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::Date;

use super::{codec, error::StoreError};
use crate::domain::{
    entities::{Comment, Tracking},
    types::TrackingType,
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraFile {
    #[serde(with = "iso_date")]
    date: Date,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    trackings: Vec<Tracking>,
}

impl ExtraFile {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            comments: Vec::new(),
            trackings: Vec::new(),
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn trackings(&self) -> &[Tracking] {
        &self.trackings
    }

    pub fn comments_for<'a>(&'a self, entry_id: &'a str) -> impl Iterator<Item = &'a Comment> {
        self.comments
            .iter()
            .filter(move |comment| comment.targets(entry_id))
    }

    pub fn trackings_for<'a>(&'a self, entry_id: &'a str) -> impl Iterator<Item = &'a Tracking> {
        self.trackings
            .iter()
            .filter(move |tracking| tracking.targets(entry_id))
    }

    pub fn find_comment(&self, entry_id: &str, comment_id: &str) -> Option<&Comment> {
        self.comments
            .iter()
            .find(|comment| comment.targets(entry_id) && comment.comment_id == comment_id)
    }

    pub fn find_comment_mut(&mut self, entry_id: &str, comment_id: &str) -> Option<&mut Comment> {
        self.comments
            .iter_mut()
            .find(|comment| comment.targets(entry_id) && comment.comment_id == comment_id)
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn remove_comment(&mut self, entry_id: &str, comment_id: &str) -> Option<Comment> {
        let index = self
            .comments
            .iter()
            .position(|comment| comment.targets(entry_id) && comment.comment_id == comment_id)?;
        Some(self.comments.remove(index))
    }

    /// Appends unless a tracking from the same source already exists.
    pub fn push_tracking(&mut self, tracking: Tracking) -> bool {
        if self
            .trackings
            .iter()
            .any(|existing| existing.is_same_source(&tracking))
        {
            return false;
        }
        self.trackings.push(tracking);
        true
    }

    pub fn remove_tracking(
        &mut self,
        entry_id: &str,
        permalink: &str,
        tracking_type: TrackingType,
    ) -> bool {
        let before = self.trackings.len();
        self.trackings.retain(|tracking| {
            !(tracking.targets(entry_id) && tracking.matches_permalink(permalink, tracking_type))
        });
        self.trackings.len() != before
    }

    /// Removes and returns all feedback targeting `entry_id`.
    pub fn take_feedback_for(&mut self, entry_id: &str) -> (Vec<Comment>, Vec<Tracking>) {
        let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.comments)
            .into_iter()
            .partition(|comment| comment.targets(entry_id));
        self.comments = kept;
        let (moved_trackings, kept_trackings): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.trackings)
                .into_iter()
                .partition(|tracking| tracking.targets(entry_id));
        self.trackings = kept_trackings;
        (moved, moved_trackings)
    }

    /// Merges migrated feedback, skipping trackings already present.
    pub fn absorb(&mut self, comments: Vec<Comment>, trackings: Vec<Tracking>) {
        self.comments.extend(comments);
        for tracking in trackings {
            self.push_tracking(tracking);
        }
    }

    pub(crate) fn load(path: &Path, date: Date) -> Result<Option<Self>, StoreError> {
        let loaded = codec::read_json::<ExtraFile>(path)?;
        Ok(loaded.map(|mut extra| {
            extra.date = date;
            extra
        }))
    }

    pub(crate) fn save(&self, path: &Path) -> Result<(), StoreError> {
        codec::write_json(path, self)
    }
}
