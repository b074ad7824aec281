//! Content service: the single entry point the web layer talks to.
//!
//! Composes the data manager, the entry and category indexes, and the
//! background queues. Reads go through the indexes, which rebuild on epoch
//! change; writes go to the day files and bump the epochs; side effects are
//! queued for the workers.

mod comments;
mod entries;
mod error;
mod queries;
mod trackings;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use url::Url;

pub use error::ContentError;

use crate::{
    application::jobs::{
        JobQueues, QueueReceivers, TrackingJob, job_queues, run_mail_worker, run_tracking_worker,
    },
    cache::{CategoryIndex, EntryIndex, EntryIndexSnapshot},
    config::Settings,
    domain::notifications::Notification,
    infra::{
        mail::Mailer,
        storage::{DataManager, PathResolver},
        trackback::TrackbackSender,
    },
    util::lock::mutex_lock,
};

const SOURCE: &str = "application::content";

/// Turns a site-relative path such as `post/E1` into a link.
pub type LinkResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct ContentOptions {
    /// Site-wide comment switch.
    pub comments_enabled: bool,
    pub link_resolver: LinkResolver,
    /// Fills `source_blog_name` on pings that leave it blank.
    pub blog_name: String,
}

impl fmt::Debug for ContentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentOptions")
            .field("comments_enabled", &self.comments_enabled)
            .field("blog_name", &self.blog_name)
            .finish_non_exhaustive()
    }
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            comments_enabled: true,
            link_resolver: Arc::new(|path| format!("/{}", path.trim_start_matches('/'))),
            blog_name: String::new(),
        }
    }
}

impl ContentOptions {
    /// Links resolve against `root`, which should end with `/`.
    pub fn with_root_url(mut self, root: Url) -> Self {
        self.link_resolver = Arc::new(move |path| {
            root.join(path.trim_start_matches('/'))
                .map(String::from)
                .unwrap_or_else(|_| format!("{root}{path}"))
        });
        self
    }

    pub fn with_comments_enabled(mut self, enabled: bool) -> Self {
        self.comments_enabled = enabled;
        self
    }

    pub fn with_blog_name(mut self, name: impl Into<String>) -> Self {
        self.blog_name = name.into();
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::default()
            .with_root_url(settings.site.root_url.clone())
            .with_comments_enabled(settings.comments.enabled)
            .with_blog_name(settings.site.blog_name.clone())
    }
}

/// Join handles of the two worker tasks. Both end once the service is dropped.
#[derive(Debug)]
pub struct WorkerHandles {
    pub tracking: JoinHandle<()>,
    pub mail: JoinHandle<()>,
}

pub struct ContentService {
    data: Arc<DataManager>,
    entries: Arc<EntryIndex>,
    categories: CategoryIndex,
    options: ContentOptions,
    queues: JobQueues,
    receivers: Mutex<Option<QueueReceivers>>,
}

impl fmt::Debug for ContentService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentService")
            .field("data", &self.data)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ContentService {
    pub fn new(data: Arc<DataManager>, options: ContentOptions) -> Arc<Self> {
        let entries = Arc::new(EntryIndex::new(Arc::clone(&data)));
        let categories = CategoryIndex::new(Arc::clone(&entries));
        let (queues, receivers) = job_queues();
        Arc::new(Self {
            data,
            entries,
            categories,
            options,
            queues,
            receivers: Mutex::new(Some(receivers)),
        })
    }

    /// Opens the content directory with the default file layout.
    pub fn open(
        content_dir: impl Into<PathBuf>,
        options: ContentOptions,
    ) -> Result<Arc<Self>, ContentError> {
        let data = Arc::new(DataManager::open(content_dir)?);
        Ok(Self::new(data, options))
    }

    /// Opens the content directory, resolving relative paths stored in
    /// records through `resolver`.
    pub fn open_with_resolver(
        content_dir: impl Into<PathBuf>,
        resolver: PathResolver,
        options: ContentOptions,
    ) -> Result<Arc<Self>, ContentError> {
        let data = Arc::new(DataManager::open_with_resolver(content_dir, resolver)?);
        Ok(Self::new(data, options))
    }

    /// Spawns the tracking and mail workers on the current tokio runtime.
    ///
    /// Workers keep only a weak reference to the service; dropping the last
    /// `Arc` closes both queues and the tasks finish after draining them.
    pub fn start_workers(
        self: &Arc<Self>,
        sender: Arc<dyn TrackbackSender>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<WorkerHandles, ContentError> {
        let receivers = mutex_lock(&self.receivers, SOURCE, "start_workers")
            .take()
            .ok_or(ContentError::WorkersAlreadyStarted)?;
        let QueueReceivers {
            tracking,
            mail,
            tracking_depth,
            mail_depth,
        } = receivers;

        let tracking = tokio::spawn(run_tracking_worker(
            Arc::downgrade(self),
            tracking,
            tracking_depth,
            sender,
        ));
        let mail = tokio::spawn(run_mail_worker(mail, mail_depth, mailer));
        info!("Content workers started");
        Ok(WorkerHandles { tracking, mail })
    }

    pub fn data(&self) -> &DataManager {
        &self.data
    }

    pub fn entry_index(&self) -> &EntryIndex {
        &self.entries
    }

    pub fn queues(&self) -> &JobQueues {
        &self.queues
    }

    /// Current entry index snapshot, rebuilt first when stale.
    pub fn snapshot(&self) -> Result<Arc<EntryIndexSnapshot>, ContentError> {
        Ok(self.entries.snapshot()?)
    }

    pub fn get_last_entry_update(&self) -> Option<OffsetDateTime> {
        self.data.last_entry_update()
    }

    /// Forces both indexes to rebuild on their next read.
    #[instrument(skip(self))]
    pub fn reset_caches(&self) {
        let entry = self.data.increment_entry_epoch();
        let extra = self.data.increment_extra_epoch();
        info!(entry_epoch = entry, extra_epoch = extra, "Caches reset");
    }

    fn link(&self, path: &str) -> String {
        (self.options.link_resolver)(path)
    }

    /// Mail is always queued; trackback pings only for public entries.
    fn enqueue_notifications(&self, notifications: Vec<Notification>, entry_title: &str, public: bool) {
        for notification in notifications {
            match notification {
                Notification::Mail(message) => {
                    self.queues.enqueue_mail(message);
                }
                Notification::Trackback(mut ping) if public => {
                    if ping.source_blog_name.trim().is_empty() {
                        ping.source_blog_name = self.options.blog_name.clone();
                    }
                    self.queues.enqueue_tracking(TrackingJob::Ping {
                        entry_title: entry_title.to_string(),
                        ping,
                    });
                }
                Notification::Trackback(_) => {}
            }
        }
    }
}
