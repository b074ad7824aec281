use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use super::queue::{MAIL_QUEUE, QueueDepth};
use crate::{domain::notifications::MailMessage, infra::mail::Mailer};

const METRIC_JOBS_TOTAL: &str = "almanac_worker_jobs_total";

pub(crate) async fn run_mail_worker(
    mut messages: UnboundedReceiver<MailMessage>,
    depth: QueueDepth,
    mailer: Arc<dyn Mailer>,
) {
    info!(queue = MAIL_QUEUE, "Worker started");
    while let Some(message) = messages.recv().await {
        depth.popped();
        let result = match mailer.send(&message).await {
            Ok(()) => "ok",
            Err(err) => {
                warn!(subject = %message.subject, to = ?message.to, error = %err, "Mail delivery failed");
                "failed"
            }
        };
        counter!(METRIC_JOBS_TOTAL, "queue" => MAIL_QUEUE, "result" => result).increment(1);
    }
    info!(queue = MAIL_QUEUE, "Worker stopped");
}
