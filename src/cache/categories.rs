//! Category index derived from the entry index snapshot.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use metrics::counter;
use time::Date;
use tracing::{debug, info};

use super::entry_index::{EntryIndex, EntryIndexSnapshot};
use crate::{
    domain::{
        entities::{Entry, keys_match},
        slug::{CATEGORY_HIERARCHY_SEPARATOR, url_safe_category},
        types::Viewer,
    },
    infra::storage::{Epoch, StoreError},
    util::lock::mutex_lock,
};

const SOURCE: &str = "cache::categories";
const METRIC_REBUILD_TOTAL: &str = "almanac_category_index_rebuild_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDetail {
    pub entry_id: String,
    pub day: Date,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    /// Full hierarchical name as first seen, e.g. `Tech|Rust`.
    pub name: String,
    /// Last level of the hierarchy.
    pub display_name: String,
    pub url_safe_name: String,
    /// True when at least one public entry carries the category.
    pub is_public: bool,
    pub public_count: usize,
    pub total_count: usize,
    pub details: Vec<CategoryDetail>,
}

impl CategoryEntry {
    fn new(name: &str) -> Self {
        let display_name = name
            .rsplit(CATEGORY_HIERARCHY_SEPARATOR)
            .next()
            .unwrap_or(name)
            .trim()
            .to_string();
        Self {
            name: name.to_string(),
            display_name,
            url_safe_name: url_safe_category(name),
            is_public: false,
            public_count: 0,
            total_count: 0,
            details: Vec::new(),
        }
    }

    fn record(&mut self, entry: &Entry, day: Date) {
        if self
            .details
            .iter()
            .any(|detail| keys_match(&detail.entry_id, &entry.entry_id))
        {
            return;
        }
        self.total_count += 1;
        if entry.is_public {
            self.public_count += 1;
            self.is_public = true;
        }
        self.details.push(CategoryDetail {
            entry_id: entry.entry_id.clone(),
            day,
            is_public: entry.is_public,
        });
    }
}

#[derive(Debug, Default)]
pub struct CategorySnapshot {
    epoch: Epoch,
    /// Keyed by lowercased name; ordered for listings.
    by_name: BTreeMap<String, CategoryEntry>,
    url_safe: HashMap<String, String>,
}

impl CategorySnapshot {
    /// Entry epoch of the entry snapshot this was derived from.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Categories visible to `viewer`, ordered by name.
    pub fn categories(&self, viewer: Viewer) -> Vec<CategoryEntry> {
        self.by_name
            .values()
            .filter(|category| viewer.can_see(category.is_public))
            .cloned()
            .collect()
    }

    /// Looks up by full name or URL-safe name, ignoring case.
    pub fn get(&self, name_or_url_safe: &str) -> Option<&CategoryEntry> {
        let key = name_or_url_safe.trim().to_lowercase();
        self.by_name.get(&key).or_else(|| {
            self.url_safe
                .get(&key)
                .and_then(|name| self.by_name.get(&name.to_lowercase()))
        })
    }

    /// Category name for a URL-safe name; the input itself when unknown.
    pub fn title_for(&self, url_safe: &str) -> String {
        self.url_safe
            .get(&url_safe.trim().to_lowercase())
            .cloned()
            .unwrap_or_else(|| url_safe.to_string())
    }

    fn build(entries: &EntryIndexSnapshot) -> Self {
        let mut snapshot = Self {
            epoch: entries.epoch(),
            ..Self::default()
        };

        for entry in entries.entries() {
            let day = entry.created_date();
            for name in entry.category_names() {
                for path in hierarchy_paths(name) {
                    snapshot
                        .by_name
                        .entry(path.to_lowercase())
                        .or_insert_with(|| CategoryEntry::new(&path))
                        .record(entry, day);
                }
            }
        }

        for category in snapshot.by_name.values() {
            snapshot
                .url_safe
                .entry(category.url_safe_name.to_lowercase())
                .or_insert_with(|| category.name.clone());
        }

        snapshot
    }
}

/// `A|B|C` yields `A`, `A|B`, `A|B|C`.
fn hierarchy_paths(name: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    for segment in name
        .split(CATEGORY_HIERARCHY_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
    {
        if !current.is_empty() {
            current.push(CATEGORY_HIERARCHY_SEPARATOR);
        }
        current.push_str(segment);
        paths.push(current.clone());
    }
    paths
}

#[derive(Debug)]
pub struct CategoryIndex {
    entries: Arc<EntryIndex>,
    current: ArcSwap<CategorySnapshot>,
    rebuild: Mutex<()>,
}

impl CategoryIndex {
    pub fn new(entries: Arc<EntryIndex>) -> Self {
        Self {
            entries,
            current: ArcSwap::from_pointee(CategorySnapshot::default()),
            rebuild: Mutex::new(()),
        }
    }

    /// Current snapshot, rebuilt when the entry snapshot has moved on.
    pub fn snapshot(&self) -> Result<Arc<CategorySnapshot>, StoreError> {
        let entries = self.entries.snapshot()?;
        let current = self.current.load_full();
        if current.epoch == entries.epoch() {
            return Ok(current);
        }

        let _guard = mutex_lock(&self.rebuild, SOURCE, "snapshot");
        let current = self.current.load_full();
        if current.epoch == entries.epoch() {
            debug!(epoch = entries.epoch(), "Category index rebuilt by another caller");
            return Ok(current);
        }

        let fresh = Arc::new(CategorySnapshot::build(&entries));
        self.current.store(Arc::clone(&fresh));
        counter!(METRIC_REBUILD_TOTAL).increment(1);
        info!(
            epoch = fresh.epoch,
            categories = fresh.by_name.len(),
            "Category index rebuilt"
        );
        Ok(fresh)
    }

    pub fn categories(&self, viewer: Viewer) -> Result<Vec<CategoryEntry>, StoreError> {
        Ok(self.snapshot()?.categories(viewer))
    }

    pub fn category(&self, name_or_url_safe: &str) -> Result<Option<CategoryEntry>, StoreError> {
        Ok(self.snapshot()?.get(name_or_url_safe).cloned())
    }

    pub fn category_title(&self, url_safe: &str) -> Result<String, StoreError> {
        Ok(self.snapshot()?.title_for(url_safe))
    }
}
