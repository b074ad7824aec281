use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use metrics::gauge;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Instant, sleep};
use tracing::warn;

use super::tracking::TrackingJob;
use crate::domain::notifications::MailMessage;

const METRIC_QUEUE_LEN: &str = "almanac_worker_queue_len";
const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) const TRACKING_QUEUE: &str = "tracking";
pub(crate) const MAIL_QUEUE: &str = "mail";

/// Pending job count for one queue, mirrored into a gauge.
#[derive(Debug, Clone)]
pub(crate) struct QueueDepth {
    queue: &'static str,
    pending: Arc<AtomicI64>,
}

impl QueueDepth {
    fn new(queue: &'static str) -> Self {
        Self {
            queue,
            pending: Arc::new(AtomicI64::new(0)),
        }
    }

    fn add(&self, delta: i64) {
        let pending = self.pending.fetch_add(delta, Ordering::SeqCst) + delta;
        gauge!(METRIC_QUEUE_LEN, "queue" => self.queue).set(pending as f64);
    }

    pub(crate) fn pushed(&self) {
        self.add(1);
    }

    pub(crate) fn popped(&self) {
        self.add(-1);
    }

    pub(crate) fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Sending halves of the background queues. Enqueueing never blocks and
/// works from synchronous code.
#[derive(Debug)]
pub struct JobQueues {
    tracking: UnboundedSender<TrackingJob>,
    mail: UnboundedSender<MailMessage>,
    tracking_depth: QueueDepth,
    mail_depth: QueueDepth,
}

/// Receiving halves, handed to the workers once.
#[derive(Debug)]
pub(crate) struct QueueReceivers {
    pub(crate) tracking: UnboundedReceiver<TrackingJob>,
    pub(crate) mail: UnboundedReceiver<MailMessage>,
    pub(crate) tracking_depth: QueueDepth,
    pub(crate) mail_depth: QueueDepth,
}

pub(crate) fn job_queues() -> (JobQueues, QueueReceivers) {
    let (tracking_tx, tracking_rx) = unbounded_channel();
    let (mail_tx, mail_rx) = unbounded_channel();
    let tracking_depth = QueueDepth::new(TRACKING_QUEUE);
    let mail_depth = QueueDepth::new(MAIL_QUEUE);
    (
        JobQueues {
            tracking: tracking_tx,
            mail: mail_tx,
            tracking_depth: tracking_depth.clone(),
            mail_depth: mail_depth.clone(),
        },
        QueueReceivers {
            tracking: tracking_rx,
            mail: mail_rx,
            tracking_depth,
            mail_depth,
        },
    )
}

impl JobQueues {
    /// Returns `false` when the tracking worker has gone away.
    pub fn enqueue_tracking(&self, job: TrackingJob) -> bool {
        self.tracking_depth.pushed();
        if let Err(err) = self.tracking.send(job) {
            self.tracking_depth.popped();
            warn!(queue = TRACKING_QUEUE, job = ?err.0, "Tracking queue closed, job dropped");
            return false;
        }
        true
    }

    /// Returns `false` when the mail worker has gone away.
    pub fn enqueue_mail(&self, message: MailMessage) -> bool {
        self.mail_depth.pushed();
        if let Err(err) = self.mail.send(message) {
            self.mail_depth.popped();
            warn!(queue = MAIL_QUEUE, subject = %err.0.subject, "Mail queue closed, message dropped");
            return false;
        }
        true
    }

    /// Jobs enqueued but not yet picked up, as `(tracking, mail)`.
    pub fn pending(&self) -> (i64, i64) {
        (self.tracking_depth.pending(), self.mail_depth.pending())
    }
}

/// Poll `condition` until it holds or `timeout` elapses. Returns whether it held.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;

    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(DEFAULT_WAIT_POLL_INTERVAL).await;
    }
}
