//! Background jobs
//!
//! - `new_post_notifier`: emails an author's followers when a post is published
//! - `weekly_digest`: emails every user the most discussed posts of the week
pub mod new_post_notifier;
pub mod weekly_digest;

pub use new_post_notifier::{start_new_post_notifier, NewPostNotifier};
pub use weekly_digest::start_weekly_digest;

/// Public link to a post.
pub fn post_link(base_url: &str, slug: &str) -> String {
    format!("{}/posts/{}", base_url.trim_end_matches('/'), slug)
}
