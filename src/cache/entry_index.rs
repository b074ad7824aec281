//! Entry id index: entry id and compressed title to owning day.
//!
//! Readers load the current snapshot without locking. When the data
//! manager's entry epoch has moved on, one caller rebuilds under the rebuild
//! mutex while the others keep serving the old snapshot until the swap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics::{counter, histogram};
use time::Date;
use tracing::{debug, info};

use crate::{
    domain::entities::{Entry, fold_key},
    infra::storage::{DataManager, Epoch, StoreError},
    util::lock::mutex_lock,
};

const SOURCE: &str = "cache::entry_index";
const METRIC_REBUILD_TOTAL: &str = "almanac_entry_index_rebuild_total";
const METRIC_REBUILD_MS: &str = "almanac_entry_index_rebuild_ms";

/// Immutable view of every entry at one entry epoch.
#[derive(Debug, Default)]
pub struct EntryIndexSnapshot {
    epoch: Epoch,
    /// Lite copies, newest day first, newest entry first within a day.
    entries: Vec<Entry>,
    by_id: HashMap<String, (Date, usize)>,
    by_title: HashMap<String, Date>,
}

impl EntryIndexSnapshot {
    /// The entry epoch read before the scan that produced this snapshot.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn date_for_entry_id(&self, entry_id: &str) -> Option<Date> {
        self.by_id
            .get(&fold_key(entry_id))
            .map(|(date, _)| *date)
    }

    pub fn date_for_compressed_title(&self, compressed_title: &str) -> Option<Date> {
        self.by_title.get(&fold_key(compressed_title)).copied()
    }

    pub fn title_for_entry_id(&self, entry_id: &str) -> Option<&str> {
        self.entry(entry_id).map(|entry| entry.title.as_str())
    }

    /// Lite copy of the entry with `entry_id`.
    pub fn entry(&self, entry_id: &str) -> Option<&Entry> {
        self.by_id
            .get(&fold_key(entry_id))
            .and_then(|(_, index)| self.entries.get(*index))
    }

    fn build(data: &DataManager, epoch: Epoch) -> Result<Self, StoreError> {
        let mut snapshot = Self {
            epoch,
            ..Self::default()
        };

        for date in data.day_dates().into_iter().rev() {
            let Some(day_entries) = data.read_existing_day(date, |day| day.newest_first())? else {
                continue;
            };
            for entry in day_entries {
                let index = snapshot.entries.len();
                snapshot
                    .by_id
                    .entry(fold_key(&entry.entry_id))
                    .or_insert((date, index));
                if let Some(compressed) = entry.compressed_title() {
                    snapshot
                        .by_title
                        .entry(fold_key(&compressed))
                        .or_insert(date);
                }
                snapshot.entries.push(entry.lite());
            }
        }

        Ok(snapshot)
    }
}

#[derive(Debug)]
pub struct EntryIndex {
    data: Arc<DataManager>,
    current: ArcSwap<EntryIndexSnapshot>,
    rebuild: Mutex<()>,
}

impl EntryIndex {
    /// Starts with an empty snapshot at epoch 0, which is always stale.
    pub fn new(data: Arc<DataManager>) -> Self {
        Self {
            data,
            current: ArcSwap::from_pointee(EntryIndexSnapshot::default()),
            rebuild: Mutex::new(()),
        }
    }

    /// Current snapshot, rebuilt first if the entry epoch has changed.
    pub fn snapshot(&self) -> Result<Arc<EntryIndexSnapshot>, StoreError> {
        let current = self.current.load_full();
        if current.epoch == self.data.entry_epoch() {
            return Ok(current);
        }

        let _guard = mutex_lock(&self.rebuild, SOURCE, "snapshot");
        let current = self.current.load_full();
        let epoch = self.data.entry_epoch();
        if current.epoch == epoch {
            debug!(epoch, "Entry index rebuilt by another caller");
            return Ok(current);
        }

        let started_at = Instant::now();
        let fresh = Arc::new(EntryIndexSnapshot::build(&self.data, epoch)?);
        self.current.store(Arc::clone(&fresh));

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        counter!(METRIC_REBUILD_TOTAL).increment(1);
        histogram!(METRIC_REBUILD_MS).record(elapsed_ms);
        info!(
            epoch,
            previous_epoch = current.epoch,
            entries = fresh.len(),
            elapsed_ms,
            "Entry index rebuilt"
        );
        Ok(fresh)
    }

    /// Owned copy of every lite entry, newest first.
    pub fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.snapshot()?.entries.clone())
    }

    pub fn date_for_entry_id(&self, entry_id: &str) -> Result<Option<Date>, StoreError> {
        Ok(self.snapshot()?.date_for_entry_id(entry_id))
    }

    pub fn date_for_compressed_title(&self, compressed_title: &str) -> Result<Option<Date>, StoreError> {
        Ok(self.snapshot()?.date_for_compressed_title(compressed_title))
    }

    pub fn title_for_entry_id(&self, entry_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .snapshot()?
            .title_for_entry_id(entry_id)
            .map(str::to_string))
    }
}
