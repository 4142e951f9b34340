/// Business logic for blog-service
///
/// Services own a `PgPool` and the collaborators they need, apply the
/// authorization gates, and assemble API responses.
pub mod accounts;
pub mod comments;
pub mod email;
pub mod follows;
pub mod posts;
pub mod slug;
pub mod taxonomy;
pub mod view_counter;

pub use accounts::AccountService;
pub use comments::CommentService;
pub use email::EmailService;
pub use follows::FollowService;
pub use posts::PostService;
pub use taxonomy::TaxonomyService;
pub use view_counter::{
    CounterError, CounterStore, InMemoryCounterStore, RedisCounterStore, ViewCounter,
};

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Pages past this one are clamped; the offset stays well inside `i64`.
pub const MAX_PAGE: i64 = 1_000_000;

/// `?page=&page_size=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    /// (page, page_size, offset) with defaults applied and bounds clamped.
    pub fn resolve(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, page_size, (page - 1) * page_size)
    }
}
