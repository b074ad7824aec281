//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamState {
    #[default]
    Unknown,
    NotSpam,
    Spam,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingType {
    Trackback,
    Pingback,
    Referral,
    #[default]
    Unknown,
}

impl TrackingType {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingType::Trackback => "trackback",
            TrackingType::Pingback => "pingback",
            TrackingType::Referral => "referral",
            TrackingType::Unknown => "unknown",
        }
    }
}

/// Who is asking. Non-public entries and categories are only visible to admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Public,
    Admin,
}

impl Viewer {
    pub fn is_admin(self) -> bool {
        matches!(self, Viewer::Admin)
    }

    /// Whether an item with the given visibility flag may be shown.
    pub fn can_see(self, is_public: bool) -> bool {
        is_public || self.is_admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Added,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Added,
    /// The target entry does not exist or is not public.
    EntryNotFound,
    /// The target entry has comments switched off.
    CommentsDisabled,
    /// Comments are switched off for the whole site.
    SiteCommentsDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOutcome {
    Recorded,
    Duplicate,
    EntryNotFound,
}
