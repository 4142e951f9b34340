/// Data models for blog-service
///
/// - Post: authored content with a category, tags and a publish status
/// - Comment: a user's comment on a post
/// - User: account record (password hash never serialized)
/// - Category / Tag: post taxonomy
///
/// View counts are not part of any row; they are attached from the counter
/// store when a response is assembled.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

/// Post row as loaded through [`crate::db::query::PostQuery`].
///
/// Joined and projected columns are optional: they are `None` when the query
/// options did not request them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub author_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_slug: Option<String>,
    pub title_image: Option<String>,
    pub status: String,
    pub publish: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
}

impl Post {
    pub fn author(&self) -> UserId {
        UserId(self.author_id)
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published.as_str()
    }
}

/// Post as returned by the API, with relations and the view count attached.
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Rendered as `"<username>: <body>"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
    /// Omitted when the counter store is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<i64>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            post,
            tags: None,
            comments: None,
            views: None,
        }
    }
}

/// Lightweight post reference used in profiles and digests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub publish: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub post_title: String,
    pub author_id: i64,
    pub author_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn author(&self) -> UserId {
        UserId(self.author_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

/// Recipient of an outbound notification.
#[derive(Debug, Clone, FromRow)]
pub struct Recipient {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Category or tag with the titles of its published posts.
#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyDetail<T> {
    #[serde(flatten)]
    pub item: T,
    pub posts: Vec<String>,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}
