//! Weekly digest
//!
//! Every Saturday at the configured hour (evaluated at a fixed UTC offset),
//! the most commented posts published in the preceding seven days are
//! emailed to every user with an address. View counts are included when the
//! counter store answers.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, TimeZone, Utc, Weekday};
use sqlx::PgPool;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::post_link;
use crate::config::DigestConfig;
use crate::db::{post_repo, user_repo, PostFilter, PostOrder, PostQuery, PostQueryOptions};
use crate::metrics::jobs::{record_email, DIGEST_RUNS_TOTAL};
use crate::models::Post;
use crate::services::email::EmailService;
use crate::services::view_counter::ViewCounter;

pub const DIGEST_SUBJECT: &str = "You might find this interesting";
const DIGEST_WINDOW_DAYS: i64 = 7;

/// Next Saturday `hour`:00 strictly after `now`, in the zone `utc_offset_hours` east of UTC.
pub fn next_run_after(
    now: DateTime<Utc>,
    utc_offset_hours: i32,
    hour: u32,
) -> Option<DateTime<Utc>> {
    let tz = FixedOffset::east_opt(utc_offset_hours * 3600)?;
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    (0..=7)
        .map(|days| today + ChronoDuration::days(days))
        .filter(|date| date.weekday() == Weekday::Sat)
        .filter_map(|date| date.and_hms_opt(hour, 0, 0))
        .filter_map(|naive| tz.from_local_datetime(&naive).single())
        .find(|candidate| *candidate > local_now)
        .map(|candidate| candidate.with_timezone(&Utc))
}

/// One digest line per post: `<title>: <link>` plus the view count when known.
pub fn compose_digest(posts: &[(Post, Option<i64>)], base_url: &str) -> String {
    let mut message = String::from("Most discussed posts of the past week:\n");
    for (post, views) in posts {
        message.push_str(&post.title);
        message.push_str(": ");
        message.push_str(&post_link(base_url, &post.slug));
        if let Some(views) = views {
            message.push_str(&format!(" ({} views)", views));
        }
        message.push('\n');
    }
    message
}

pub async fn start_weekly_digest(
    db: PgPool,
    views: ViewCounter,
    mailer: EmailService,
    config: DigestConfig,
    base_url: String,
) {
    if !config.enabled {
        info!("Weekly digest disabled");
        return;
    }

    info!(
        hour = config.hour,
        utc_offset_hours = config.utc_offset_hours,
        top_posts = config.top_posts,
        "Starting weekly digest job"
    );

    loop {
        let now = Utc::now();
        let Some(next) = next_run_after(now, config.utc_offset_hours, config.hour) else {
            error!("could not compute next digest run; stopping job");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "weekly digest scheduled");
        sleep(wait).await;

        let started = Instant::now();
        match send_digest(&db, &views, &mailer, &config, &base_url).await {
            Ok(sent) => {
                DIGEST_RUNS_TOTAL.with_label_values(&["success"]).inc();
                info!(
                    recipients = sent,
                    duration_ms = started.elapsed().as_millis(),
                    "weekly digest sent"
                );
            }
            Err(e) => {
                DIGEST_RUNS_TOTAL.with_label_values(&["error"]).inc();
                error!(
                    error = %e,
                    duration_ms = started.elapsed().as_millis(),
                    "weekly digest failed"
                );
            }
        }
    }
}

async fn send_digest(
    db: &PgPool,
    views: &ViewCounter,
    mailer: &EmailService,
    config: &DigestConfig,
    base_url: &str,
) -> Result<usize, sqlx::Error> {
    let since = Utc::now() - ChronoDuration::days(DIGEST_WINDOW_DAYS);
    let query = PostQuery::new(PostQueryOptions::list())
        .filter(PostFilter::PublishedAfter(since))
        .order_by(PostOrder::MostCommented)
        .paginate(config.top_posts, 0);
    let posts = post_repo::find_posts(db, &query).await?;
    if posts.is_empty() {
        info!("no posts published this week; skipping digest");
        return Ok(0);
    }

    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let counts = views.display_views_many(&ids).await;
    let entries: Vec<(Post, Option<i64>)> = posts
        .into_iter()
        .map(|post| {
            let count = counts.get(&post.id).copied();
            (post, count)
        })
        .collect();
    let message = compose_digest(&entries, base_url);

    let recipients = user_repo::list_recipients(db).await?;
    let mut sent = 0;
    for recipient in &recipients {
        let result = mailer.send_text(&recipient.email, DIGEST_SUBJECT, &message).await;
        record_email("digest", result.is_ok());
        match result {
            Ok(()) => sent += 1,
            Err(e) => warn!(user = %recipient.username, error = %e, "failed to send digest"),
        }
    }

    Ok(sent)
}
