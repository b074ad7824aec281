use std::{io::Write, process, sync::Arc};

use almanac::{
    application::{
        content::{ContentOptions, ContentService},
        error::AppError,
    },
    config::{self, Command, CommentsArgs, EntriesArgs, Settings, ShowArgs},
    domain::types::Viewer,
    infra::{mail::LogMailer, telemetry, trackback::HttpTrackbackSender},
    util::timezone::local_date,
};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    info!(
        target = "almanac::cli",
        content_dir = %settings.storage.content_dir.display(),
        "Opening content store"
    );
    let service = ContentService::open(
        settings.storage.content_dir.clone(),
        ContentOptions::from_settings(&settings),
    )?;
    let sender = HttpTrackbackSender::from_settings(&settings.workers)
        .map_err(|err| AppError::unexpected(format!("failed to build trackback client: {err}")))?;
    let workers = service.start_workers(Arc::new(sender), Arc::new(LogMailer))?;

    let result = run_command(&service, &settings, cli_args.command);

    // Closing the queues lets the workers drain what is left and exit.
    drop(service);
    for handle in [workers.tracking, workers.mail] {
        if let Err(err) = handle.await {
            error!(target = "almanac::cli", error = %err, "Worker did not shut down cleanly");
        }
    }
    result
}

fn run_command(service: &ContentService, settings: &Settings, command: Command) -> Result<(), AppError> {
    match command {
        Command::Entries(args) => run_entries(service, settings, args),
        Command::Show(args) => run_show(service, args),
        Command::Categories(args) => {
            let categories = service.get_categories(viewer(args.admin))?;
            let rows: Vec<_> = categories
                .iter()
                .map(|category| {
                    json!({
                        "name": category.name,
                        "url_safe_name": category.url_safe_name,
                        "is_public": category.is_public,
                        "public_count": category.public_count,
                        "total_count": category.total_count,
                    })
                })
                .collect();
            print_json(&rows)
        }
        Command::Comments(args) => run_comments(service, args),
        Command::Reindex => {
            let count = service.rebuild_comment_index()?;
            service.reset_caches();
            info!(target = "almanac::cli", count, "All-comments index rebuilt");
            print_json(&json!({ "comments": count }))
        }
        Command::Days => {
            let days = service.get_days_with_entries(settings.site.utc_offset)?;
            let days: Vec<String> = days.iter().map(ToString::to_string).collect();
            print_json(&days)
        }
    }
}

fn run_entries(service: &ContentService, settings: &Settings, args: EntriesArgs) -> Result<(), AppError> {
    let viewer = viewer(args.visibility.admin);
    let entries = match args.author.as_deref() {
        Some(author) => {
            let mut entries = service.get_entries_for_user(author, viewer)?;
            entries.truncate(args.max_entries);
            entries
        }
        None => {
            let today = local_date(OffsetDateTime::now_utc(), settings.site.utc_offset);
            service.get_entries_for_day(
                today,
                viewer,
                args.days,
                args.max_entries,
                args.category.as_deref(),
            )?
        }
    };
    debug!(target = "almanac::cli", count = entries.len(), "Entries loaded");
    let lite: Vec<_> = entries.iter().map(|entry| entry.lite()).collect();
    print_json(&lite)
}

fn run_show(service: &ContentService, args: ShowArgs) -> Result<(), AppError> {
    let viewer = viewer(args.visibility.admin);
    let entry = match service.get_entry(&args.id, viewer)? {
        Some(entry) => Some(entry),
        None => service.get_entry_by_title(&args.id, viewer)?,
    };
    let entry = entry.ok_or(AppError::NotFound)?;
    print_json(entry.as_ref())
}

fn run_comments(service: &ContentService, args: CommentsArgs) -> Result<(), AppError> {
    let comments = match args.entry_id.as_deref() {
        Some(entry_id) => service.get_comments_for(entry_id, args.all)?,
        None => service
            .get_all_comments()?
            .into_iter()
            .filter(|comment| args.all || comment.is_public)
            .collect(),
    };
    print_json(&comments)
}

fn viewer(admin: bool) -> Viewer {
    if admin { Viewer::Admin } else { Viewer::Public }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")
        .map_err(|err| AppError::unexpected(format!("failed to write output: {err}")))
}
