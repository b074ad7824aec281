use std::sync::{Arc, Mutex};
use std::time::Duration;

use almanac::application::content::{ContentError, ContentOptions, ContentService};
use almanac::application::jobs::wait_until;
use almanac::domain::entities::{Comment, Entry, Tracking};
use almanac::domain::notifications::{MailMessage, Notification, TrackbackPing};
use almanac::domain::types::TrackingType;
use almanac::infra::mail::{MailError, Mailer};
use almanac::infra::trackback::{TrackbackError, TrackbackSender};
use async_trait::async_trait;
use time::macros::datetime;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingSender {
    pings: Mutex<Vec<TrackbackPing>>,
    fail: bool,
}

impl RecordingSender {
    fn count(&self) -> usize {
        self.pings.lock().expect("pings lock").len()
    }
}

#[async_trait]
impl TrackbackSender for RecordingSender {
    async fn send(&self, ping: &TrackbackPing) -> Result<(), TrackbackError> {
        self.pings.lock().expect("pings lock").push(ping.clone());
        if self.fail {
            return Err(TrackbackError::Status { status: 500 });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMailer {
    messages: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    fn subjects(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("messages lock")
            .iter()
            .map(|message| message.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.messages.lock().expect("messages lock").push(message.clone());
        Ok(())
    }
}

fn ping(target: &str) -> TrackbackPing {
    TrackbackPing {
        target_url: target.to_string(),
        source_url: "http://localhost/post/E1".to_string(),
        source_title: "First post".to_string(),
        source_excerpt: "An excerpt".to_string(),
        source_blog_name: "almanac".to_string(),
    }
}

fn mail(subject: &str) -> Notification {
    Notification::Mail(MailMessage::new("owner@example.com", subject, "body"))
}

#[tokio::test]
async fn notifications_run_after_save_returns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ContentService::open(dir.path(), ContentOptions::default()).expect("open");
    let sender = Arc::new(RecordingSender::default());
    let mailer = Arc::new(RecordingMailer::default());
    let handles = service
        .start_workers(sender.clone(), mailer.clone())
        .expect("start workers");

    service
        .save_entry(
            Entry::new("E1", "First post", datetime!(2024-01-05 10:00 UTC)),
            vec![
                Notification::Trackback(ping("https://remote.example/trackback")),
                mail("saved"),
            ],
        )
        .expect("save");
    assert!(wait_until(WAIT, || sender.count() == 1).await);
    assert!(wait_until(WAIT, || mailer.subjects() == ["saved"]).await);

    let mut draft = Entry::new("E2", "Draft", datetime!(2024-01-06 10:00 UTC));
    draft.is_public = false;
    service
        .save_entry(
            draft,
            vec![
                Notification::Trackback(ping("https://remote.example/other")),
                mail("draft saved"),
            ],
        )
        .expect("save draft");
    assert_eq!(service.queues().pending().0, 0, "drafts never ping");
    assert!(wait_until(WAIT, || mailer.subjects().len() == 2).await);
    assert_eq!(sender.count(), 1);

    let comment = Comment::new("E1", "bob", "hi", datetime!(2024-01-07 09:00 UTC));
    service
        .add_comment(comment, vec![mail("new comment")])
        .expect("comment");
    assert!(wait_until(WAIT, || mailer.subjects().len() == 3).await);

    drop(service);
    tokio::time::timeout(WAIT, handles.tracking)
        .await
        .expect("tracking worker stops")
        .expect("tracking worker joins");
    tokio::time::timeout(WAIT, handles.mail)
        .await
        .expect("mail worker stops")
        .expect("mail worker joins");
}

#[tokio::test]
async fn trackings_are_recorded_in_the_background() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ContentService::open(dir.path(), ContentOptions::default()).expect("open");
    let sender = Arc::new(RecordingSender::default());
    let mailer = Arc::new(RecordingMailer::default());
    let _handles = service
        .start_workers(sender.clone(), mailer.clone())
        .expect("start workers");

    service
        .save_entry(
            Entry::new("E1", "First post", datetime!(2024-01-05 10:00 UTC)),
            Vec::new(),
        )
        .expect("save");

    let tracking = Tracking::new("E1", TrackingType::Trackback, "https://remote.example/p");
    service.add_tracking(tracking.clone(), vec![mail("tracked")]);
    service.add_tracking(tracking, Vec::new());
    service.add_tracking(
        Tracking::new("missing", TrackingType::Referral, "https://remote.example/q"),
        Vec::new(),
    );

    assert!(wait_until(WAIT, || service.queues().pending() == (0, 0)).await);
    assert!(
        wait_until(WAIT, || {
            service
                .get_trackings_for("E1")
                .map(|trackings| trackings.len() == 1)
                .unwrap_or(false)
        })
        .await
    );
    let stored = service.get_trackings_for("E1").expect("trackings");
    assert_eq!(stored[0].target_title, "First post");
    assert!(wait_until(WAIT, || mailer.subjects() == ["tracked"]).await);
}

#[tokio::test]
async fn failed_pings_do_not_stop_the_worker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ContentService::open(dir.path(), ContentOptions::default()).expect("open");
    let sender = Arc::new(RecordingSender {
        fail: true,
        ..Default::default()
    });
    let mailer = Arc::new(RecordingMailer::default());
    let _handles = service
        .start_workers(sender.clone(), mailer)
        .expect("start workers");

    let posts = [
        ("E1", datetime!(2024-01-05 10:00 UTC)),
        ("E2", datetime!(2024-01-06 10:00 UTC)),
    ];
    for (id, created) in posts {
        service
            .save_entry(
                Entry::new(id, format!("Post {id}"), created),
                vec![Notification::Trackback(ping("https://remote.example/tb"))],
            )
            .expect("save");
    }
    assert!(wait_until(WAIT, || sender.count() == 2).await);

    let again = service.start_workers(sender, Arc::new(RecordingMailer::default()));
    assert!(matches!(again, Err(ContentError::WorkersAlreadyStarted)));
}

#[tokio::test]
async fn pings_without_a_blog_name_use_the_site_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = ContentOptions::default().with_blog_name("Field Notes");
    let service = ContentService::open(dir.path(), options).expect("open");
    let sender = Arc::new(RecordingSender::default());
    let _handles = service
        .start_workers(sender.clone(), Arc::new(RecordingMailer::default()))
        .expect("start workers");

    let mut unnamed = ping("https://remote.example/tb");
    unnamed.source_blog_name.clear();
    service
        .save_entry(
            Entry::new("E1", "First post", datetime!(2024-01-05 10:00 UTC)),
            vec![
                Notification::Trackback(unnamed),
                Notification::Trackback(ping("https://remote.example/other")),
            ],
        )
        .expect("save");

    assert!(wait_until(WAIT, || sender.count() == 2).await);
    let names: Vec<String> = sender
        .pings
        .lock()
        .expect("pings lock")
        .iter()
        .map(|ping| ping.source_blog_name.clone())
        .collect();
    assert_eq!(names, ["Field Notes", "almanac"]);
}
