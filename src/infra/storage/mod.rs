//! Flat-file content storage.
//!
//! The [`DataManager`] owns one lazily loaded slot per calendar day for
//! entries and another for feedback, plus the aggregate comments file and the
//! change epochs that caches key off. Each slot has its own mutex, so writers
//! to different days never contend.

mod all_comments;
mod codec;
mod day_file;
mod epoch;
mod error;
mod extra_file;
pub mod layout;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

pub use all_comments::AllCommentsIndex;
pub use day_file::DayFile;
pub use epoch::{Epoch, Epochs};
pub use error::StoreError;
pub use extra_file::ExtraFile;

use crate::util::lock::{mutex_lock, rw_read, rw_write};
use layout::{ALL_COMMENTS_FILE, FileKind, file_name, parse_file_name};

const SOURCE: &str = "infra::storage";

/// Turns a relative path stored inside a record (an attachment location, for
/// example) into a filesystem path. The store's own files always live
/// directly in the content directory.
pub type PathResolver = Arc<dyn Fn(&str) -> PathBuf + Send + Sync>;

/// Result of a mutation closure passed to [`DataManager::modify_day`] or
/// [`DataManager::modify_extra`]. Only `Changed` persists the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<R> {
    Changed(R),
    Unchanged(R),
}

impl<R> Mutation<R> {
    fn split(self) -> (R, bool) {
        match self {
            Mutation::Changed(value) => (value, true),
            Mutation::Unchanged(value) => (value, false),
        }
    }
}

/// `None` until the file has been read from disk.
struct Slot<T> {
    state: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    fn unloaded() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    fn loaded(value: T) -> Self {
        Self {
            state: Mutex::new(Some(value)),
        }
    }
}

pub struct DataManager {
    content_dir: PathBuf,
    resolver: PathResolver,
    days: RwLock<BTreeMap<Date, Arc<Slot<DayFile>>>>,
    extras: DashMap<Date, Arc<Slot<ExtraFile>>>,
    /// Per-date gates held while a new day file is created.
    creating: DashMap<Date, Arc<Mutex<()>>>,
    all_comments: AllCommentsIndex,
    epochs: Epochs,
    last_entry_update: Mutex<Option<OffsetDateTime>>,
    last_comment_update: Mutex<Option<OffsetDateTime>>,
}

impl fmt::Debug for DataManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataManager")
            .field("content_dir", &self.content_dir)
            .field("days", &rw_read(&self.days, SOURCE, "debug").len())
            .field("extras", &self.extras.len())
            .field("epochs", &self.epochs)
            .finish_non_exhaustive()
    }
}

impl DataManager {
    /// Opens `content_dir`, resolving record paths directly inside it.
    pub fn open(content_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let content_dir = content_dir.into();
        let root = content_dir.clone();
        Self::open_with_resolver(content_dir, Arc::new(move |name| root.join(name)))
    }

    /// Opens `content_dir` and registers every day file found in it.
    /// `resolver` only applies to paths stored inside records.
    pub fn open_with_resolver(
        content_dir: impl Into<PathBuf>,
        resolver: PathResolver,
    ) -> Result<Self, StoreError> {
        let content_dir = content_dir.into();
        if !content_dir.is_dir() {
            return Err(StoreError::MissingContentDir { path: content_dir });
        }

        let mut days = BTreeMap::new();
        let extras = DashMap::new();
        let listing = fs::read_dir(&content_dir).map_err(|err| StoreError::io(&content_dir, err))?;
        for item in listing {
            let item = item.map_err(|err| StoreError::io(&content_dir, err))?;
            let name = item.file_name();
            let Some((date, kind)) = name.to_str().and_then(parse_file_name) else {
                continue;
            };
            match kind {
                FileKind::DayEntry => {
                    days.insert(date, Arc::new(Slot::unloaded()));
                }
                FileKind::DayExtra => {
                    extras.insert(date, Arc::new(Slot::unloaded()));
                }
            }
        }

        info!(
            content_dir = %content_dir.display(),
            days = days.len(),
            extras = extras.len(),
            "Content directory opened"
        );

        let all_comments = AllCommentsIndex::new(content_dir.join(ALL_COMMENTS_FILE));
        Ok(Self {
            content_dir,
            resolver,
            days: RwLock::new(days),
            extras,
            creating: DashMap::new(),
            all_comments,
            epochs: Epochs::new(),
            last_entry_update: Mutex::new(None),
            last_comment_update: Mutex::new(None),
        })
    }

    /// Resolves a relative path found inside a stored record.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        (self.resolver)(relative)
    }

    fn path_for(&self, date: Date, kind: FileKind) -> PathBuf {
        self.content_dir.join(file_name(date, kind))
    }

    pub fn all_comments(&self) -> &AllCommentsIndex {
        &self.all_comments
    }

    pub fn entry_epoch(&self) -> Epoch {
        self.epochs.entry()
    }

    pub fn extra_epoch(&self) -> Epoch {
        self.epochs.extra()
    }

    pub fn increment_entry_epoch(&self) -> Epoch {
        self.epochs.bump_entry()
    }

    pub fn increment_extra_epoch(&self) -> Epoch {
        self.epochs.bump_extra()
    }

    /// Dates with a day entry file, oldest first.
    pub fn day_dates(&self) -> Vec<Date> {
        rw_read(&self.days, SOURCE, "day_dates")
            .keys()
            .copied()
            .collect()
    }

    /// Dates with a feedback file, in no particular order.
    pub fn extra_dates(&self) -> Vec<Date> {
        self.extras.iter().map(|item| *item.key()).collect()
    }

    pub fn last_entry_update(&self) -> Option<OffsetDateTime> {
        *mutex_lock(&self.last_entry_update, SOURCE, "last_entry_update")
    }

    pub fn last_comment_update(&self) -> Option<OffsetDateTime> {
        *mutex_lock(&self.last_comment_update, SOURCE, "last_comment_update")
    }

    pub fn record_comment_update(&self, at: OffsetDateTime) {
        *mutex_lock(&self.last_comment_update, SOURCE, "record_comment_update") = Some(at);
    }

    /// Runs `f` on the day file for `date`, creating and persisting an empty
    /// one when the day is not registered yet.
    pub fn read_day<R>(&self, date: Date, f: impl FnOnce(&DayFile) -> R) -> Result<R, StoreError> {
        let slot = self.day_slot_or_create(date)?;
        let mut state = mutex_lock(&slot.state, SOURCE, "read_day");
        let day = self.ensure_day_loaded(date, &mut state, true)?;
        Ok(f(day))
    }

    /// Runs `f` on the day file for `date` if one is registered.
    pub fn read_existing_day<R>(
        &self,
        date: Date,
        f: impl FnOnce(&DayFile) -> R,
    ) -> Result<Option<R>, StoreError> {
        let Some(slot) = self.day_slot(date) else {
            return Ok(None);
        };
        let mut state = mutex_lock(&slot.state, SOURCE, "read_existing_day");
        let day = self.ensure_day_loaded(date, &mut state, false)?;
        Ok(Some(f(day)))
    }

    /// Applies `f` to the day file for `date`, creating the day if needed.
    ///
    /// A `Changed` result is saved before the entry epoch advances, so any
    /// cache that observes the new epoch also observes the new file.
    pub fn modify_day<R>(
        &self,
        date: Date,
        f: impl FnOnce(&mut DayFile) -> Mutation<R>,
    ) -> Result<R, StoreError> {
        let slot = self.day_slot_or_create(date)?;
        let mut state = mutex_lock(&slot.state, SOURCE, "modify_day");
        let day = self.ensure_day_loaded(date, &mut state, true)?;

        let mut working = day.clone();
        let (result, changed) = f(&mut working).split();
        if changed {
            working.save(&self.path_for(date, FileKind::DayEntry))?;
            *day = working;
            drop(state);
            let epoch = self.epochs.bump_entry();
            *mutex_lock(&self.last_entry_update, SOURCE, "modify_day") =
                Some(OffsetDateTime::now_utc());
            debug!(%date, epoch, "Day file saved");
        }
        Ok(result)
    }

    /// Runs `f` on the feedback for `date`. Unregistered days read as empty
    /// and nothing is written.
    pub fn read_extra<R>(&self, date: Date, f: impl FnOnce(&ExtraFile) -> R) -> Result<R, StoreError> {
        let Some(slot) = self.extras.get(&date).map(|item| Arc::clone(item.value())) else {
            return Ok(f(&ExtraFile::new(date)));
        };
        let mut state = mutex_lock(&slot.state, SOURCE, "read_extra");
        let extra = self.ensure_extra_loaded(date, &mut state)?;
        Ok(f(extra))
    }

    /// Applies `f` to the feedback for `date`; a `Changed` result is saved and
    /// advances the extra epoch.
    pub fn modify_extra<R>(
        &self,
        date: Date,
        f: impl FnOnce(&mut ExtraFile) -> Mutation<R>,
    ) -> Result<R, StoreError> {
        let slot = Arc::clone(
            self.extras
                .entry(date)
                .or_insert_with(|| Arc::new(Slot::unloaded()))
                .value(),
        );
        let mut state = mutex_lock(&slot.state, SOURCE, "modify_extra");
        let extra = self.ensure_extra_loaded(date, &mut state)?;

        let mut working = extra.clone();
        let (result, changed) = f(&mut working).split();
        if changed {
            working.save(&self.path_for(date, FileKind::DayExtra))?;
            *extra = working;
            drop(state);
            let epoch = self.epochs.bump_extra();
            debug!(%date, epoch, "Feedback file saved");
        }
        Ok(result)
    }

    fn day_slot(&self, date: Date) -> Option<Arc<Slot<DayFile>>> {
        rw_read(&self.days, SOURCE, "day_slot").get(&date).cloned()
    }

    /// Registers a new day with its file already on disk, so a registered
    /// slot always has a file behind it.
    ///
    /// Creation is serialized per date; the day map is only write-locked for
    /// the insert, never across file I/O.
    fn day_slot_or_create(&self, date: Date) -> Result<Arc<Slot<DayFile>>, StoreError> {
        if let Some(slot) = self.day_slot(date) {
            return Ok(slot);
        }
        let gate = Arc::clone(
            self.creating
                .entry(date)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _creating = mutex_lock(&gate, SOURCE, "day_slot_or_create");
        if let Some(slot) = self.day_slot(date) {
            return Ok(slot);
        }

        let path = self.path_for(date, FileKind::DayEntry);
        let day = match DayFile::load(&path, date)? {
            Some(day) => day,
            None => {
                let day = DayFile::new(date);
                day.save(&path)?;
                info!(%date, path = %path.display(), "Day file created");
                day
            }
        };
        let slot = Arc::new(Slot::loaded(day));
        rw_write(&self.days, SOURCE, "day_slot_or_create").insert(date, Arc::clone(&slot));
        self.creating.remove(&date);
        Ok(slot)
    }

    fn ensure_day_loaded<'a>(
        &self,
        date: Date,
        state: &'a mut Option<DayFile>,
        recreate: bool,
    ) -> Result<&'a mut DayFile, StoreError> {
        if state.is_none() {
            let path = self.path_for(date, FileKind::DayEntry);
            let day = match DayFile::load(&path, date)? {
                Some(day) => day,
                None if recreate => {
                    warn!(%date, path = %path.display(), "Day file vanished, recreating it empty");
                    let day = DayFile::new(date);
                    day.save(&path)?;
                    day
                }
                None => return Err(StoreError::VanishedDay { date, path }),
            };
            *state = Some(day);
        }
        Ok(state.get_or_insert_with(|| DayFile::new(date)))
    }

    fn ensure_extra_loaded<'a>(
        &self,
        date: Date,
        state: &'a mut Option<ExtraFile>,
    ) -> Result<&'a mut ExtraFile, StoreError> {
        if state.is_none() {
            let path = self.path_for(date, FileKind::DayExtra);
            *state = Some(ExtraFile::load(&path, date)?.unwrap_or_else(|| ExtraFile::new(date)));
        }
        Ok(state.get_or_insert_with(|| ExtraFile::new(date)))
    }
}
