use std::sync::{Arc, Weak};

use metrics::counter;
use tokio::task;
use tracing::{debug, error, info, warn};

use super::queue::{QueueDepth, TRACKING_QUEUE};
use crate::{
    application::content::ContentService,
    domain::{entities::Tracking, notifications::TrackbackPing, types::TrackingOutcome},
    infra::trackback::TrackbackSender,
};

const METRIC_JOBS_TOTAL: &str = "almanac_worker_jobs_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingJob {
    /// Persist an inbound trackback, pingback or referral.
    Record(Tracking),
    /// Announce one of our entries to a remote trackback endpoint.
    Ping {
        entry_title: String,
        ping: TrackbackPing,
    },
}

pub(crate) async fn run_tracking_worker(
    service: Weak<ContentService>,
    mut jobs: tokio::sync::mpsc::UnboundedReceiver<TrackingJob>,
    depth: QueueDepth,
    sender: Arc<dyn TrackbackSender>,
) {
    info!(queue = TRACKING_QUEUE, "Worker started");
    while let Some(job) = jobs.recv().await {
        depth.popped();
        let result = match job {
            TrackingJob::Record(tracking) => record(&service, tracking).await,
            TrackingJob::Ping { entry_title, ping } => deliver(sender.as_ref(), &entry_title, &ping).await,
        };
        counter!(METRIC_JOBS_TOTAL, "queue" => TRACKING_QUEUE, "result" => result).increment(1);
    }
    info!(queue = TRACKING_QUEUE, "Worker stopped");
}

async fn record(service: &Weak<ContentService>, tracking: Tracking) -> &'static str {
    let Some(service) = service.upgrade() else {
        debug!(entry_id = %tracking.target_entry_id, "Content service gone, tracking skipped");
        return "skipped";
    };
    let entry_id = tracking.target_entry_id.clone();
    match task::spawn_blocking(move || service.record_tracking(tracking)).await {
        Ok(Ok(TrackingOutcome::Recorded)) => "ok",
        Ok(Ok(TrackingOutcome::Duplicate | TrackingOutcome::EntryNotFound)) => "skipped",
        Ok(Err(err)) => {
            error!(entry_id = %entry_id, error = %err, "Failed to record tracking");
            "failed"
        }
        Err(err) => {
            error!(entry_id = %entry_id, error = %err, "Tracking task aborted");
            "failed"
        }
    }
}

async fn deliver(sender: &dyn TrackbackSender, entry_title: &str, ping: &TrackbackPing) -> &'static str {
    if ping.target_url.trim().is_empty() {
        return "skipped";
    }
    match sender.send(ping).await {
        Ok(()) => {
            info!(
                entry_title,
                source_url = %ping.source_url,
                target_url = %ping.target_url,
                "Trackback sent"
            );
            "ok"
        }
        Err(err) => {
            warn!(
                entry_title,
                source_url = %ping.source_url,
                target_url = %ping.target_url,
                error = %err,
                "Trackback failed"
            );
            "failed"
        }
    }
}
