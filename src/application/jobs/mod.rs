//! Background queues for side effects that must not run on a request path.
//!
//! Two unbounded channels each feed one tokio task: tracking work (inbound
//! persistence and outbound trackback pings) and outbound mail. Workers log
//! and count every failure, then move on to the next job.

mod mail;
mod queue;
mod tracking;

pub(crate) use mail::run_mail_worker;
pub use queue::{JobQueues, wait_until};
pub(crate) use queue::{QueueReceivers, job_queues};
pub use tracking::TrackingJob;
pub(crate) use tracking::run_tracking_worker;
