//! Domain entities mirrored from the content directory.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::{
    slug::{self, CATEGORY_HIERARCHY_SEPARATOR},
    types::{SpamState, TrackingType},
};
use crate::util::timezone::utc_date;

/// Separator between categories in [`Entry::categories`].
pub const CATEGORY_SEPARATOR: char = ';';

/// Case-folded form of an id or title key. Indexes and record lookups must
/// agree on it.
pub fn fold_key(key: &str) -> String {
    key.to_lowercase()
}

/// Case-insensitive key equality, Unicode aware.
pub fn keys_match(a: &str, b: &str) -> bool {
    a == b || fold_key(a) == fold_key(b)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_utc: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_utc: OffsetDateTime,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: String,
    pub is_public: bool,
    pub syndicated: bool,
    pub allow_comments: bool,
    pub show_on_front_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Entry {
    /// A public, commentable, syndicated entry created (and last modified) at
    /// `created_utc`.
    pub fn new(
        entry_id: impl Into<String>,
        title: impl Into<String>,
        created_utc: OffsetDateTime,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
            content: String::new(),
            description: String::new(),
            created_utc,
            modified_utc: created_utc,
            author: String::new(),
            categories: String::new(),
            is_public: true,
            syndicated: true,
            allow_comments: true,
            show_on_front_page: true,
            language: None,
            link: None,
            latitude: None,
            longitude: None,
            attachments: Vec::new(),
        }
    }

    /// UTC calendar date that decides which day file owns the entry.
    pub fn created_date(&self) -> Date {
        utc_date(self.created_utc)
    }

    pub fn compressed_title(&self) -> Option<String> {
        slug::compressed_title(&self.title)
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn matches_id(&self, entry_id: &str) -> bool {
        keys_match(&self.entry_id, entry_id)
    }

    pub fn matches_compressed_title(&self, compressed: &str) -> bool {
        self.compressed_title()
            .is_some_and(|own| keys_match(&own, compressed))
    }

    /// Category names in declaration order, trimmed, blanks skipped.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories
            .split(CATEGORY_SEPARATOR)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// True when the entry carries `name` or a descendant of it
    /// (`Parent` matches `Parent|Child`). Case-insensitive.
    pub fn is_in_category(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        self.category_names().any(|category| {
            let category = category.to_lowercase();
            category == wanted
                || category
                    .strip_prefix(wanted.as_str())
                    .is_some_and(|rest| rest.starts_with(CATEGORY_HIERARCHY_SEPARATOR))
        })
    }

    /// Copy without body, description or attachments, used by index snapshots.
    pub fn lite(&self) -> Entry {
        Entry {
            content: String::new(),
            description: String::new(),
            attachments: Vec::new(),
            ..self.clone()
        }
    }

    /// Whether any user-visible field differs from `other`.
    ///
    /// `entry_id` and `modified_utc` are not compared.
    pub fn differs_materially(&self, other: &Entry) -> bool {
        self.title != other.title
            || self.content != other.content
            || self.description != other.description
            || self.categories != other.categories
            || self.author != other.author
            || self.is_public != other.is_public
            || self.syndicated != other.syndicated
            || self.allow_comments != other.allow_comments
            || self.show_on_front_page != other.show_on_front_page
            || self.language != other.language
            || self.link != other.link
            || self.latitude != other.latitude
            || self.longitude != other.longitude
            || self.attachments != other.attachments
            || self.created_utc != other.created_utc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub target_entry_id: String,
    #[serde(default)]
    pub target_title: String,
    pub author: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_utc: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_utc: OffsetDateTime,
    #[serde(default)]
    pub spam_state: SpamState,
    pub is_public: bool,
}

impl Comment {
    /// A new, unmoderated comment with a random id.
    pub fn new(
        target_entry_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        created_utc: OffsetDateTime,
    ) -> Self {
        Self {
            comment_id: Uuid::new_v4().to_string(),
            target_entry_id: target_entry_id.into(),
            target_title: String::new(),
            author: author.into(),
            author_email: String::new(),
            author_homepage: None,
            author_ip: None,
            author_user_agent: None,
            referer: None,
            content: content.into(),
            created_utc,
            modified_utc: created_utc,
            spam_state: SpamState::Unknown,
            is_public: false,
        }
    }

    pub fn targets(&self, entry_id: &str) -> bool {
        keys_match(&self.target_entry_id, entry_id)
    }

    pub fn approve(&mut self) {
        self.is_public = true;
        self.spam_state = SpamState::NotSpam;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub target_entry_id: String,
    #[serde(default)]
    pub target_title: String,
    pub tracking_type: TrackingType,
    pub permalink: String,
    #[serde(default)]
    pub referer_title: String,
    #[serde(default)]
    pub referer_excerpt: String,
    #[serde(default)]
    pub referer_blog_name: String,
}

impl Tracking {
    pub fn new(
        target_entry_id: impl Into<String>,
        tracking_type: TrackingType,
        permalink: impl Into<String>,
    ) -> Self {
        Self {
            target_entry_id: target_entry_id.into(),
            target_title: String::new(),
            tracking_type,
            permalink: permalink.into(),
            referer_title: String::new(),
            referer_excerpt: String::new(),
            referer_blog_name: String::new(),
        }
    }

    pub fn targets(&self, entry_id: &str) -> bool {
        keys_match(&self.target_entry_id, entry_id)
    }

    /// Uniqueness key: same permalink, same target entry (any case), same type.
    pub fn is_same_source(&self, other: &Tracking) -> bool {
        self.permalink == other.permalink
            && self.targets(&other.target_entry_id)
            && self.tracking_type == other.tracking_type
    }

    /// Match used by deletion: permalink trimmed and compared without case.
    pub fn matches_permalink(&self, permalink: &str, tracking_type: TrackingType) -> bool {
        self.tracking_type == tracking_type
            && keys_match(self.permalink.trim(), permalink.trim())
    }
}
