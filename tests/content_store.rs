use std::sync::Arc;

use almanac::application::content::{ContentError, ContentOptions, ContentService};
use almanac::domain::entities::{Attachment, Comment, Entry, Tracking};
use almanac::domain::filters::{any_day, any_entry};
use almanac::domain::types::{CommentOutcome, SaveOutcome, TrackingOutcome, TrackingType, Viewer};
use tempfile::TempDir;
use time::macros::{date, datetime, offset};
use time::{Month, OffsetDateTime};

fn open_store() -> (TempDir, Arc<ContentService>) {
    open_store_with(ContentOptions::default())
}

fn open_store_with(options: ContentOptions) -> (TempDir, Arc<ContentService>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ContentService::open(dir.path(), options).expect("open content dir");
    (dir, service)
}

fn entry(id: &str, title: &str, created: OffsetDateTime) -> Entry {
    let mut entry = Entry::new(id, title, created);
    entry.content = format!("<p>{title}</p>");
    entry.author = "ann".to_string();
    entry
}

fn ids(entries: &[Arc<Entry>]) -> Vec<&str> {
    entries.iter().map(|entry| entry.entry_id.as_str()).collect()
}

#[test]
fn opening_a_missing_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope");
    let err = ContentService::open(&missing, ContentOptions::default()).expect_err("missing dir");
    assert!(matches!(err, ContentError::Store(_)), "{err}");
}

#[test]
fn saving_and_commenting_invalidate_snapshots() {
    let (_dir, service) = open_store();
    let before = service.snapshot().expect("snapshot");
    assert!(before.is_empty());

    let outcome = service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    assert_eq!(outcome, SaveOutcome::Added);

    let after_save = service.snapshot().expect("snapshot");
    assert!(after_save.epoch() > before.epoch());
    assert_eq!(after_save.len(), 1);
    assert_eq!(after_save.date_for_entry_id("e1"), Some(date!(2024 - 01 - 05)));

    let extra_before = service.data().extra_epoch();
    let comment = Comment::new("E1", "bob", "nice", datetime!(2024-01-06 09:00 UTC));
    let comment_id = comment.comment_id.clone();
    let outcome = service.add_comment(comment, Vec::new()).expect("comment");
    assert_eq!(outcome, CommentOutcome::Added);
    let after_add = service.data().extra_epoch();
    assert!(after_add > extra_before);

    assert!(service.approve_comment("E1", &comment_id).expect("approve"));
    let after_approve = service.data().extra_epoch();
    assert!(after_approve > after_add);

    assert!(service.delete_comment("E1", &comment_id).expect("delete"));
    assert!(service.data().extra_epoch() > after_approve);
    assert!(service.get_all_comments().expect("all comments").is_empty());
}

#[test]
fn held_snapshot_survives_a_rebuild() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    let held = service.snapshot().expect("snapshot");

    service
        .save_entry(entry("E2", "Second post", datetime!(2024-01-07 10:00 UTC)), Vec::new())
        .expect("save");
    let fresh = service.snapshot().expect("snapshot");

    assert_eq!(held.len(), 1);
    assert!(held.date_for_entry_id("E2").is_none());
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh.entries()[0].entry_id, "E2");
}

#[test]
fn held_snapshots_stay_consistent_under_concurrent_saves() {
    let (_dir, service) = open_store();
    let saves = 24;

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for n in 0..saves {
                let created = datetime!(2024-01-01 10:00 UTC) + time::Duration::days(n);
                service
                    .save_entry(entry(&format!("E{n}"), &format!("Post {n}"), created), Vec::new())
                    .expect("save");
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut last_epoch = 0;
                    let mut last_len = 0;
                    for _ in 0..200 {
                        let held = service.snapshot().expect("snapshot");
                        let (epoch, len) = (held.epoch(), held.len());
                        assert!(epoch >= last_epoch);
                        assert!(len >= last_len);
                        for lite in held.entries() {
                            assert!(held.date_for_entry_id(&lite.entry_id).is_some());
                            std::thread::yield_now();
                        }
                        assert_eq!((held.epoch(), held.len()), (epoch, len));
                        assert_eq!(held.entries().len(), len);
                        (last_epoch, last_len) = (epoch, len);
                    }
                })
            })
            .collect();

        writer.join().expect("writer");
        for reader in readers {
            reader.join().expect("reader");
        }
    });

    assert_eq!(service.snapshot().expect("snapshot").len(), saves as usize);
}

#[test]
fn non_ascii_ids_resolve_without_case() {
    let (_dir, service) = open_store();
    let outcome = service
        .save_entry(entry("Ärger", "Trouble", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    assert_eq!(outcome, SaveOutcome::Added);

    let found = service.get_entry("ärger", Viewer::Admin).expect("get").expect("found");
    assert_eq!(found.entry_id, "Ärger");

    let mut edited = entry("ärger", "Trouble again", datetime!(2024-01-05 10:00 UTC));
    edited.content = "<p>edited</p>".to_string();
    let outcome = service.save_entry(edited, Vec::new()).expect("resave");
    assert_eq!(outcome, SaveOutcome::Updated);
    assert_eq!(service.lite_entries().expect("lite").len(), 1);

    let comment = Comment::new("ÄRGER", "bob", "hi", datetime!(2024-01-06 09:00 UTC));
    assert_eq!(service.add_comment(comment, Vec::new()).expect("comment"), CommentOutcome::Added);
    assert_eq!(service.get_comments_for("ärger", true).expect("comments").len(), 1);
}

#[test]
fn custom_resolver_keeps_entries_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media = dir.path().join("media");
    let target = media.clone();
    let resolver: Arc<dyn Fn(&str) -> std::path::PathBuf + Send + Sync> =
        Arc::new(move |name| target.join(name));

    let service =
        ContentService::open_with_resolver(dir.path(), Arc::clone(&resolver), ContentOptions::default())
            .expect("open");
    let mut post = entry("E1", "With files", datetime!(2024-01-05 10:00 UTC));
    for (name, url) in [("a", "files/a.png"), ("b", "/static/b.png"), ("c", "https://cdn.example/c.png")] {
        post.attachments.push(Attachment {
            name: name.to_string(),
            url: url.to_string(),
            mime_type: "image/png".to_string(),
            length: 1,
        });
    }
    service.save_entry(post, Vec::new()).expect("save");
    drop(service);

    let reopened =
        ContentService::open_with_resolver(dir.path(), resolver, ContentOptions::default()).expect("reopen");
    assert!(reopened.get_entry("E1", Viewer::Public).expect("get").is_some());
    assert_eq!(
        reopened.attachment_paths("E1", Viewer::Public).expect("paths"),
        vec![media.join("files/a.png")]
    );
}

#[test]
fn reading_a_day_twice_never_clobbers_it() {
    let (dir, service) = open_store();
    let day = date!(2024 - 03 - 01);
    service
        .save_entry(entry("E1", "Spring", datetime!(2024-03-01 08:00 UTC)), Vec::new())
        .expect("save");

    // A second handle over the same directory must load, not recreate.
    let reopened = ContentService::open(dir.path(), ContentOptions::default()).expect("reopen");
    let first = reopened.data().read_day(day, |day| day.entries().len()).expect("read");
    let second = reopened.data().read_day(day, |day| day.entries().len()).expect("read");
    assert_eq!((first, second), (1, 1));

    let empty = date!(2024 - 03 - 02);
    assert!(reopened.get_day(empty).expect("get day").is_none());
    reopened.data().read_day(empty, |_| ()).expect("create");
    reopened.data().read_day(empty, |_| ()).expect("create again");
    let day_file = reopened.get_day(empty).expect("get day").expect("created");
    assert!(day_file.is_empty());
    assert!(dir.path().join("2024-03-02.dayentry.json").exists());
}

#[test]
fn saving_the_live_record_is_rejected() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");

    let live = service.get_entry("E1", Viewer::Admin).expect("get").expect("entry");
    let err = service.save_entry(Arc::clone(&live), Vec::new()).expect_err("aliased");
    assert!(matches!(err, ContentError::AliasedEntry { .. }));

    let mut copy = service
        .get_entry_for_edit("E1", Viewer::Admin)
        .expect("get")
        .expect("entry");
    copy.title = "First post, edited".to_string();
    assert_eq!(service.save_entry(copy, Vec::new()).expect("save copy"), SaveOutcome::Updated);

    let blank = Entry::new("  ", "Nothing", datetime!(2024-01-05 11:00 UTC));
    assert!(matches!(
        service.save_entry(blank, Vec::new()),
        Err(ContentError::EmptyEntryId)
    ));
}

#[test]
fn unchanged_save_keeps_modified_time() {
    let (_dir, service) = open_store();
    let created = datetime!(2024-01-05 10:00 UTC);
    service
        .save_entry(entry("E1", "First post", created), Vec::new())
        .expect("save");

    let copy = service.get_entry_for_edit("E1", Viewer::Admin).expect("get").expect("entry");
    service.save_entry(copy, Vec::new()).expect("resave");
    let stored = service.get_entry("E1", Viewer::Admin).expect("get").expect("entry");
    assert_eq!(stored.modified_utc, created);

    let mut edited = Entry::clone(&stored);
    edited.content = "<p>changed</p>".to_string();
    service.save_entry(edited, Vec::new()).expect("save edit");
    let stored = service.get_entry("E1", Viewer::Admin).expect("get").expect("entry");
    assert!(stored.modified_utc > created);
}

#[test]
fn comments_are_gated() {
    let (_dir, closed) = open_store_with(ContentOptions::default().with_comments_enabled(false));
    closed
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    let comment = Comment::new("E1", "bob", "hi", datetime!(2024-01-06 09:00 UTC));
    assert_eq!(
        closed.add_comment(comment, Vec::new()).expect("comment"),
        CommentOutcome::SiteCommentsDisabled
    );

    let (_dir, service) = open_store();
    let mut locked = entry("E2", "Locked", datetime!(2024-01-05 11:00 UTC));
    locked.allow_comments = false;
    let mut draft = entry("E3", "Draft", datetime!(2024-01-05 12:00 UTC));
    draft.is_public = false;
    service.save_entry(locked, Vec::new()).expect("save");
    service.save_entry(draft, Vec::new()).expect("save");
    let extra_epoch = service.data().extra_epoch();

    let outcome = |target: &str| {
        let comment = Comment::new(target, "bob", "hi", datetime!(2024-01-06 09:00 UTC));
        service.add_comment(comment, Vec::new()).expect("comment")
    };
    assert_eq!(outcome("missing"), CommentOutcome::EntryNotFound);
    assert_eq!(outcome("E2"), CommentOutcome::CommentsDisabled);
    assert_eq!(outcome("E3"), CommentOutcome::EntryNotFound);
    assert_eq!(service.data().extra_epoch(), extra_epoch);
    assert!(service.get_all_comments().expect("all").is_empty());
}

#[test]
fn new_comments_await_approval() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    let comment = Comment::new("e1", "bob", "hi", datetime!(2024-01-06 09:00 UTC));
    let comment_id = comment.comment_id.clone();
    service.add_comment(comment, Vec::new()).expect("comment");

    assert!(service.get_comments_for("E1", false).expect("public").is_empty());
    let all = service.get_comments_for("E1", true).expect("all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].target_entry_id, "E1");
    assert_eq!(all[0].target_title, "First post");

    service.approve_comment("E1", &comment_id).expect("approve");
    let approved = service
        .get_comment("E1", &comment_id)
        .expect("get")
        .expect("comment");
    assert!(approved.is_public);
    let mirrored = service.get_all_comments().expect("all");
    assert_eq!(mirrored.len(), 1);
    assert!(mirrored[0].is_public);
    assert!(service.get_last_comment_update().expect("last").is_some());
}

#[test]
fn trackings_are_deduplicated() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");

    let tracking = Tracking::new("E1", TrackingType::Pingback, "https://remote.example/post");
    assert_eq!(
        service.record_tracking(tracking.clone()).expect("record"),
        TrackingOutcome::Recorded
    );
    let epoch = service.data().extra_epoch();
    assert_eq!(
        service.record_tracking(tracking).expect("record"),
        TrackingOutcome::Duplicate
    );
    assert_eq!(service.data().extra_epoch(), epoch);

    let orphan = Tracking::new("E9", TrackingType::Referral, "https://remote.example/");
    assert_eq!(
        service.record_tracking(orphan).expect("record"),
        TrackingOutcome::EntryNotFound
    );

    let stored = service.get_trackings_for("E1").expect("trackings");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].target_title, "First post");

    assert!(
        service
            .delete_tracking("E1", "  HTTPS://remote.example/post ", TrackingType::Pingback)
            .expect("delete")
    );
    assert!(service.get_trackings_for("E1").expect("trackings").is_empty());
}

#[test]
fn changing_the_date_moves_entry_and_feedback() {
    let (dir, service) = open_store();
    let old_day = date!(2024 - 01 - 05);
    let new_day = date!(2024 - 02 - 10);
    service
        .save_entry(entry("E1", "Moving post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    let comment = Comment::new("E1", "bob", "follow me", datetime!(2024-01-06 09:00 UTC));
    service.add_comment(comment, Vec::new()).expect("comment");
    service
        .record_tracking(Tracking::new("E1", TrackingType::Trackback, "https://remote.example/a"))
        .expect("tracking");

    let mut moved = service
        .get_entry_for_edit("E1", Viewer::Admin)
        .expect("get")
        .expect("entry");
    moved.created_utc = datetime!(2024-02-10 10:00 UTC);
    assert_eq!(service.save_entry(moved, Vec::new()).expect("move"), SaveOutcome::Updated);

    let old = service.get_day(old_day).expect("old day").expect("old file");
    assert!(old.find_by_id("E1").is_none());
    let new = service.get_day(new_day).expect("new day").expect("new file");
    assert!(new.find_by_id("E1").is_some());
    assert_eq!(service.snapshot().expect("snapshot").date_for_entry_id("E1"), Some(new_day));

    let comments = service.get_comments_for("E1", true).expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "follow me");
    assert_eq!(service.get_trackings_for("E1").expect("trackings").len(), 1);
    assert!(dir.path().join("2024-02-10.dayfeedback.json").exists());

    let old_feedback = service
        .data()
        .read_extra(old_day, |extra| (extra.comments().len(), extra.trackings().len()))
        .expect("old extra");
    assert_eq!(old_feedback, (0, 0));
}

#[test]
fn max_days_counts_only_existing_day_files() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("A", "January first", datetime!(2024-01-01 10:00 UTC)), Vec::new())
        .expect("save");
    service
        .save_entry(entry("B", "January tenth", datetime!(2024-01-10 10:00 UTC)), Vec::new())
        .expect("save");

    let found = service
        .get_entries_for_day(date!(2024 - 01 - 10), Viewer::Public, 2, 10, None)
        .expect("query");
    assert_eq!(ids(&found), ["B", "A"]);

    // An existing empty day file still uses up one day.
    service
        .data()
        .read_day(date!(2024 - 01 - 05), |_| ())
        .expect("create empty day");
    let found = service
        .get_entries_for_day(date!(2024 - 01 - 10), Viewer::Public, 2, 10, None)
        .expect("query");
    assert_eq!(ids(&found), ["B"]);

    let capped = service
        .get_entries(any_day(), any_entry(), usize::MAX, 1)
        .expect("query");
    assert_eq!(ids(&capped), ["B"]);
}

#[test]
fn untitled_entries_fold_into_a_day_entry() {
    let (_dir, service) = open_store();
    let mut micro = Entry::new("M1", "", datetime!(2024-04-02 08:00 UTC));
    micro.content = "short thought".to_string();
    service.save_entry(micro, Vec::new()).expect("save");
    service
        .save_entry(entry("T1", "Titled", datetime!(2024-04-02 09:00 UTC)), Vec::new())
        .expect("save");

    let found = service
        .get_entries_for_day(date!(2024 - 04 - 02), Viewer::Public, 1, 10, None)
        .expect("query");
    assert_eq!(ids(&found), ["T1", "day-20240402"]);

    let day_entry = &found[1];
    assert_eq!(day_entry.title, "2024-04-02");
    assert!(day_entry.is_public);
    assert!(!day_entry.allow_comments);
    assert_eq!(
        day_entry.content,
        "<div class=\"dayentry\"><a href=\"/post/M1\">#</a>short thought</div>"
    );

    let same = service
        .get_virtual_entry_for_day(date!(2024 - 04 - 02), Viewer::Public)
        .expect("virtual")
        .expect("has untitled entries");
    assert_eq!(same.content, day_entry.content);
}

#[test]
fn visibility_hides_drafts_from_the_public() {
    let (_dir, service) = open_store();
    let mut draft = entry("D1", "Draft", datetime!(2024-05-01 10:00 UTC));
    draft.is_public = false;
    draft.categories = "Secret".to_string();
    service.save_entry(draft, Vec::new()).expect("save");

    assert!(service.get_entry("D1", Viewer::Public).expect("get").is_none());
    assert!(service.get_entry("D1", Viewer::Admin).expect("get").is_some());
    assert!(
        service
            .get_entries_for_day(date!(2024 - 05 - 01), Viewer::Public, 5, 5, None)
            .expect("query")
            .is_empty()
    );
    assert!(service.get_categories(Viewer::Public).expect("categories").is_empty());
    assert_eq!(service.get_categories(Viewer::Admin).expect("categories").len(), 1);
    assert!(service.get_days_with_entries(offset!(UTC)).expect("days").is_empty());
}

#[test]
fn category_month_and_author_queries() {
    let (_dir, service) = open_store();
    let mut rust = entry("E1", "Ownership", datetime!(2024-02-01 00:30 UTC));
    rust.categories = "Tech|Rust;Life".to_string();
    let mut go = entry("E2", "Goroutines", datetime!(2024-02-15 12:00 UTC));
    go.categories = "Tech|Go".to_string();
    go.author = "cy".to_string();
    let mut march = entry("E3", "Spring", datetime!(2024-03-01 12:00 UTC));
    march.categories = "Life".to_string();
    for item in [rust, go, march] {
        service.save_entry(item, Vec::new()).expect("save");
    }

    let tech = service.get_entries_for_category("tech", Viewer::Public).expect("tech");
    assert_eq!(ids(&tech), ["E2", "E1"]);
    let rust_only = service
        .get_entries_for_category("tech-rust", Viewer::Public)
        .expect("url-safe name");
    assert_eq!(ids(&rust_only), ["E1"]);
    assert_eq!(service.get_category_title("tech-rust").expect("title"), "Tech|Rust");
    assert_eq!(service.get_category_title("unknown").expect("title"), "unknown");

    let february = service
        .get_entries_for_month(2024, Month::February, offset!(UTC), Viewer::Public)
        .expect("month");
    assert_eq!(ids(&february), ["E2", "E1"]);
    // 00:30 UTC on Feb 1 is still January one hour west.
    let shifted = service
        .get_entries_for_month(2024, Month::January, offset!(-1), Viewer::Public)
        .expect("month");
    assert_eq!(ids(&shifted), ["E1"]);

    let by_cy = service.get_entries_for_user("CY", Viewer::Public).expect("user");
    assert_eq!(ids(&by_cy), ["E2"]);

    let days = service.get_days_with_entries(offset!(UTC)).expect("days");
    assert_eq!(
        days,
        [date!(2024 - 03 - 01), date!(2024 - 02 - 15), date!(2024 - 02 - 01)]
    );
}

#[test]
fn entries_resolve_by_title_and_delete() {
    let (_dir, service) = open_store();
    service
        .save_entry(entry("E1", "Hello World", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");

    let by_title = service
        .get_entry_by_title("Hello World", Viewer::Public)
        .expect("by title")
        .expect("entry");
    assert_eq!(by_title.entry_id, "E1");
    assert_eq!(
        service.title_for_entry_id("e1").expect("title").as_deref(),
        Some("Hello World")
    );

    assert!(!service.delete_entry("missing").expect("delete missing"));
    assert!(service.delete_entry("E1").expect("delete"));
    assert!(service.get_entry("E1", Viewer::Admin).expect("get").is_none());
    assert!(service.lite_entries().expect("lite").is_empty());
}

#[test]
fn comment_index_rebuilds_from_feedback_files() {
    let (dir, service) = open_store();
    service
        .save_entry(entry("E1", "First post", datetime!(2024-01-05 10:00 UTC)), Vec::new())
        .expect("save");
    for text in ["one", "two"] {
        let comment = Comment::new("E1", "bob", text, datetime!(2024-01-06 09:00 UTC));
        service.add_comment(comment, Vec::new()).expect("comment");
    }
    std::fs::remove_file(dir.path().join("allcomments.json")).expect("drop index");

    let reopened = ContentService::open(dir.path(), ContentOptions::default()).expect("reopen");
    assert!(reopened.get_all_comments().expect("all").is_empty());
    assert_eq!(reopened.rebuild_comment_index().expect("rebuild"), 2);
    assert_eq!(reopened.get_all_comments().expect("all").len(), 2);
}
