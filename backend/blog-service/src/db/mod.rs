/// Database access layer
///
/// Repository functions take a `&PgPool` (or an open transaction) and return
/// `sqlx::Error`; services convert to `AppError`.
pub mod comment_repo;
pub mod follow_repo;
pub mod post_repo;
pub mod query;
pub mod taxonomy_repo;
pub mod user_repo;

pub use query::{PostFilter, PostOrder, PostQuery, PostQueryOptions};
