//! New post notifications
//!
//! Post creation enqueues the post id; a single worker task drains the queue,
//! loads the post and emails each follower of its author. Request handling
//! never waits on SMTP.

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::post_link;
use crate::db::{follow_repo, post_repo, PostQueryOptions};
use crate::metrics::jobs::{record_email, NOTIFY_QUEUE_DEPTH};
use crate::models::Post;
use crate::services::email::EmailService;

pub const NEW_POST_SUBJECT: &str = "New post";

/// Handle used by the post service to schedule notifications.
#[derive(Clone)]
pub struct NewPostNotifier {
    tx: mpsc::Sender<i64>,
}

impl NewPostNotifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<i64>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a notification. Never blocks; a full or closed queue drops it.
    pub fn notify(&self, post_id: i64) {
        match self.tx.try_send(post_id) {
            Ok(()) => NOTIFY_QUEUE_DEPTH.inc(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(post_id, "notification queue full; dropping new post notification")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(post_id, "notification worker stopped; dropping new post notification")
            }
        }
    }
}

pub fn compose_new_post_message(post: &Post, base_url: &str) -> String {
    let author = post.author_username.as_deref().unwrap_or("An author you follow");
    format!(
        "{} published a new post.\nRead {}",
        author,
        post_link(base_url, &post.slug)
    )
}

pub async fn start_new_post_notifier(
    mut rx: mpsc::Receiver<i64>,
    db: PgPool,
    mailer: EmailService,
    base_url: String,
) {
    info!("Starting new post notifier");

    while let Some(post_id) = rx.recv().await {
        NOTIFY_QUEUE_DEPTH.dec();
        if let Err(e) = notify_followers(&db, &mailer, &base_url, post_id).await {
            error!(post_id, error = %e, "new post notification failed");
        }
    }

    info!("New post notifier stopped");
}

async fn notify_followers(
    db: &PgPool,
    mailer: &EmailService,
    base_url: &str,
    post_id: i64,
) -> Result<(), sqlx::Error> {
    let Some(post) = post_repo::find_post_by_id(db, post_id, PostQueryOptions::list()).await? else {
        debug!(post_id, "post removed before notification was sent");
        return Ok(());
    };
    if !post.is_published() {
        debug!(post_id, "post is a draft; skipping notification");
        return Ok(());
    }

    let followers = follow_repo::find_follower_recipients(db, post.author_id).await?;
    let message = compose_new_post_message(&post, base_url);

    for follower in &followers {
        let result = mailer
            .send_text(&follower.email, NEW_POST_SUBJECT, &message)
            .await;
        record_email("new_post", result.is_ok());
        if let Err(e) = result {
            warn!(post_id, follower = %follower.username, error = %e, "failed to email follower");
        }
    }

    info!(post_id, recipients = followers.len(), "new post notification processed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post() -> Post {
        let now = Utc::now();
        Post {
            id: 4,
            title: "Ownership".into(),
            slug: "ownership".into(),
            body: None,
            author_id: 2,
            author_username: Some("bob".into()),
            category_id: None,
            category_title: None,
            category_slug: None,
            title_image: None,
            status: "published".into(),
            publish: now,
            created_at: now,
            updated_at: now,
            comment_count: Some(0),
        }
    }

    #[test]
    fn message_names_author_and_links_post() {
        let msg = compose_new_post_message(&post(), "http://webdev.com/");
        assert_eq!(
            msg,
            "bob published a new post.\nRead http://webdev.com/posts/ownership"
        );
    }

    #[tokio::test]
    async fn notify_enqueues_without_blocking() {
        let (notifier, mut rx) = NewPostNotifier::channel(1);
        notifier.notify(1);
        // Second send hits a full queue and is dropped.
        notifier.notify(2);

        assert_eq!(rx.recv().await, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_after_worker_exit_is_harmless() {
        let (notifier, rx) = NewPostNotifier::channel(4);
        drop(rx);
        notifier.notify(1);
    }
}
