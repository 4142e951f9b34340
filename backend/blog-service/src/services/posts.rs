use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{info, warn};
use validator::Validate;

use crate::cache::ProfileCache;
use crate::db::post_repo::SlugMode;
use crate::db::{comment_repo, post_repo, taxonomy_repo, PostFilter, PostQuery, PostQueryOptions};
use crate::error::{AppError, Result};
use crate::jobs::NewPostNotifier;
use crate::middleware::permissions::{
    check_post_modification, require_authenticated, require_permission, Identity, Permission,
};
use crate::models::{Page, Post, PostResponse, PostStatus, UserId};
use crate::services::slug::slugify;
use crate::services::view_counter::ViewCounter;
use crate::services::Pagination;

/// Inserts with a `-<id>` slug tried after the plain slug is taken.
const SLUG_ID_ATTEMPTS: u32 = 3;

/// Slug used when a title has nothing transliterable.
const FALLBACK_SLUG: &str = "post";

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    #[validate(length(min = 1, max = 250))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[validate(length(max = 500))]
    pub title_image: Option<String>,
    pub status: Option<PostStatus>,
    pub publish: Option<DateTime<Utc>>,
}

/// Partial update. `category_id: null` clears the category.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePost {
    #[validate(length(min = 1, max = 250))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    pub tags: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500))]
    pub title_image: Option<Option<String>>,
    pub status: Option<PostStatus>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostListParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub author: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PostListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    pool: PgPool,
    views: ViewCounter,
    notifier: NewPostNotifier,
    profile_cache: Option<ProfileCache>,
}

impl PostService {
    pub fn new(
        pool: PgPool,
        views: ViewCounter,
        notifier: NewPostNotifier,
        profile_cache: Option<ProfileCache>,
    ) -> Self {
        Self {
            pool,
            views,
            notifier,
            profile_cache,
        }
    }

    /// Published posts, newest first, with author, category, comment count and views.
    pub async fn list(&self, params: &PostListParams) -> Result<Page<PostResponse>> {
        let mut query = PostQuery::new(PostQueryOptions::list());
        if let Some(category) = params.category.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(PostFilter::CategorySlug(category.to_string()));
        }
        if let Some(tag) = params.tag.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(PostFilter::TagSlug(tag.to_string()));
        }
        if let Some(terms) = params.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(PostFilter::Search(terms.to_string()));
        }
        if let Some(author) = params.author {
            query = query.filter(PostFilter::Author(author));
        }

        self.fetch_page(query, params.pagination()).await
    }

    /// Published posts by authors the caller follows.
    pub async fn following_feed(
        &self,
        actor: &Identity,
        pagination: Pagination,
    ) -> Result<Page<PostResponse>> {
        let principal = require_authenticated(actor)?;
        let query = PostQuery::new(PostQueryOptions::list())
            .filter(PostFilter::FollowedBy(principal.id.0));

        self.fetch_page(query, pagination).await
    }

    async fn fetch_page(
        &self,
        query: PostQuery,
        pagination: Pagination,
    ) -> Result<Page<PostResponse>> {
        let (page, page_size, offset) = pagination.resolve();
        let count = post_repo::count_posts(&self.pool, &query).await?;
        let query = query.paginate(page_size, offset);
        let posts = post_repo::find_posts(&self.pool, &query).await?;

        let results = self.assemble(posts, query.options, true).await?;
        Ok(Page {
            count,
            page,
            page_size,
            results,
        })
    }

    /// Published post by id. Counts as a view.
    pub async fn get_by_id(&self, post_id: i64) -> Result<PostResponse> {
        self.get_and_record(PostFilter::Id(post_id)).await
    }

    /// Published post by slug. Counts as a view.
    pub async fn get_by_slug(&self, slug: &str) -> Result<PostResponse> {
        self.get_and_record(PostFilter::Slug(slug.to_string())).await
    }

    async fn get_and_record(&self, filter: PostFilter) -> Result<PostResponse> {
        let options = PostQueryOptions::detail();
        let post = post_repo::find_one(&self.pool, PostQuery::new(options).filter(filter))
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        self.record_and_assemble(post, options).await
    }

    /// Count a view, then build the response. The count includes this view
    /// unless the store is unavailable, in which case `views` is omitted.
    async fn record_and_assemble(
        &self,
        post: Post,
        options: PostQueryOptions,
    ) -> Result<PostResponse> {
        self.views.record_view(post.id).await;

        let mut responses = self.assemble(vec![post], options, true).await?;
        responses
            .pop()
            .ok_or_else(|| AppError::Internal("post vanished during assembly".to_string()))
    }

    pub async fn create(&self, actor: &Identity, input: CreatePost) -> Result<PostResponse> {
        input.validate()?;
        let principal = require_permission(actor, Permission::AddPost)?;
        let tags = self.checked_tags(&input.tags).await?;

        let slug_base = base_slug(&input.title);
        let status = input.status.unwrap_or(PostStatus::Published);

        let new_post = post_repo::NewPost {
            title: input.title.trim(),
            slug: &slug_base,
            body: &input.body,
            author_id: principal.id.0,
            category_id: input.category_id,
            title_image: input.title_image.as_deref(),
            status: status.as_str(),
            publish: input.publish.unwrap_or_else(Utc::now),
        };

        let mut tx = self.pool.begin().await?;
        let (post_id, slug) = insert_with_unique_slug(&mut tx, &new_post).await?;
        post_repo::set_post_tags(&mut tx, post_id, &tags).await?;
        tx.commit().await?;

        info!(post_id, author_id = principal.id.0, slug = %slug, "post created");

        if status == PostStatus::Published {
            self.notifier.notify(post_id);
        }
        self.invalidate_profile(principal.id).await;

        self.load_for_write(post_id).await
    }

    pub async fn update(
        &self,
        actor: &Identity,
        post_id: i64,
        input: UpdatePost,
    ) -> Result<PostResponse> {
        input.validate()?;
        let existing = self.load_any(post_id).await?;
        check_post_modification(actor, &existing, Permission::ChangePost)?;

        let tags = match &input.tags {
            Some(tags) => Some(self.checked_tags(tags).await?),
            None => None,
        };

        let changes = post_repo::PostChanges {
            title: input.title.as_deref().map(str::trim),
            body: input.body.as_deref(),
            category_id: input.category_id,
            title_image: input.title_image.as_ref().map(|v| v.as_deref()),
            status: input.status.map(|s| s.as_str()),
        };

        let mut tx = self.pool.begin().await?;
        post_repo::update_post(&mut tx, post_id, &changes).await?;
        if let Some(tags) = &tags {
            post_repo::set_post_tags(&mut tx, post_id, tags).await?;
        }
        tx.commit().await?;

        info!(post_id, "post updated");

        let became_published =
            !existing.is_published() && input.status == Some(PostStatus::Published);
        if became_published {
            self.notifier.notify(post_id);
        }
        self.invalidate_profile(existing.author()).await;

        self.load_for_write(post_id).await
    }

    /// Delete a post with its comments. Its view counter is left in the store.
    pub async fn delete(&self, actor: &Identity, post_id: i64) -> Result<()> {
        let existing = self.load_any(post_id).await?;
        check_post_modification(actor, &existing, Permission::DeletePost)?;

        if !post_repo::delete_post(&self.pool, post_id).await? {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        info!(post_id, "post deleted");
        self.invalidate_profile(existing.author()).await;
        Ok(())
    }

    async fn load_any(&self, post_id: i64) -> Result<Post> {
        post_repo::find_post_by_id(&self.pool, post_id, PostQueryOptions::bare())
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn load_for_write(&self, post_id: i64) -> Result<PostResponse> {
        let options = PostQueryOptions::write();
        let post = post_repo::find_post_by_id(&self.pool, post_id, options)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        let mut responses = self.assemble(vec![post], options, false).await?;
        responses
            .pop()
            .ok_or_else(|| AppError::Internal("post vanished during assembly".to_string()))
    }

    /// Attach prefetched relations and, when `with_views`, view counts.
    async fn assemble(
        &self,
        posts: Vec<Post>,
        options: PostQueryOptions,
        with_views: bool,
    ) -> Result<Vec<PostResponse>> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

        let mut tags = if options.prefetch_tags {
            post_repo::find_tags_for_posts(&self.pool, &ids).await?
        } else {
            HashMap::new()
        };

        let mut comments: HashMap<i64, Vec<String>> = HashMap::new();
        if options.prefetch_comments {
            for id in &ids {
                let rendered = comment_repo::list_for_post(&self.pool, *id)
                    .await?
                    .into_iter()
                    .map(|c| format!("{}: {}", c.author_username, c.body))
                    .collect();
                comments.insert(*id, rendered);
            }
        }

        // One MGET for the page; a store failure leaves views out.
        let (views, views_ok) = if with_views {
            match self.views.read_many(&ids).await {
                Ok(counts) => (counts, true),
                Err(e) => {
                    warn!(error = %e, "view counts unavailable");
                    (HashMap::new(), false)
                }
            }
        } else {
            (HashMap::new(), false)
        };

        Ok(posts
            .into_iter()
            .map(|post| {
                let id = post.id;
                PostResponse {
                    post,
                    tags: options
                        .prefetch_tags
                        .then(|| tags.remove(&id).unwrap_or_default()),
                    comments: options
                        .prefetch_comments
                        .then(|| comments.remove(&id).unwrap_or_default()),
                    views: views_ok.then(|| views.get(&id).copied().unwrap_or(0)),
                }
            })
            .collect())
    }

    async fn checked_tags(&self, tags: &[i64]) -> Result<Vec<i64>> {
        let mut ids = tags.to_vec();
        ids.sort_unstable();
        ids.dedup();

        if !ids.is_empty() {
            let found = taxonomy_repo::count_existing_tags(&self.pool, &ids).await?;
            if found != ids.len() as i64 {
                return Err(AppError::BadRequest("Unknown tag id".to_string()));
            }
        }
        Ok(ids)
    }

    async fn invalidate_profile(&self, author: UserId) {
        if let Some(cache) = &self.profile_cache {
            if let Err(e) = cache.invalidate(author).await {
                warn!(user_id = %author, error = %e, "failed to invalidate profile cache");
            }
        }
    }
}

fn base_slug(title: &str) -> String {
    match slugify(title) {
        s if s.is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    }
}

/// Insert under the plain slug, or `<slug>-<id>` when it is taken.
async fn insert_with_unique_slug(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    post: &post_repo::NewPost<'_>,
) -> Result<(i64, String)> {
    if let Some(inserted) = post_repo::insert_post(tx, post, SlugMode::Exact).await? {
        return Ok(inserted);
    }
    for _ in 0..SLUG_ID_ATTEMPTS {
        if let Some(inserted) = post_repo::insert_post(tx, post, SlugMode::WithId).await? {
            return Ok(inserted);
        }
    }

    Err(AppError::Conflict(format!(
        "could not derive a unique slug from '{}'",
        post.title
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::view_counter::test_support::DownStore;
    use crate::services::{CounterStore, InMemoryCounterStore};
    use std::sync::Arc;

    fn offline_service(store: Arc<dyn CounterStore>) -> PostService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let (notifier, _rx) = NewPostNotifier::channel(1);
        PostService::new(pool, ViewCounter::new(store), notifier, None)
    }

    fn post(id: i64) -> Post {
        let now = Utc::now();
        Post {
            id,
            title: format!("Post {}", id),
            slug: format!("post-{}", id),
            body: None,
            author_id: 1,
            author_username: Some("alice".into()),
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

    #[tokio::test]
    async fn list_omits_views_when_store_is_down() {
        let store = Arc::new(DownStore::default());
        let service = offline_service(store.clone());

        let responses = service
            .assemble(vec![post(1), post(2)], PostQueryOptions::list(), true)
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.views.is_none()));
        assert_eq!(responses[0].post.slug, "post-1");
        // one MGET for the whole page
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn list_attaches_views_from_one_batch() {
        let store = Arc::new(InMemoryCounterStore::new());
        let service = offline_service(store);
        service.views.increment(1).await.unwrap();
        service.views.increment(1).await.unwrap();

        let responses = service
            .assemble(vec![post(1), post(2)], PostQueryOptions::list(), true)
            .await
            .unwrap();

        assert_eq!(responses[0].views, Some(2));
        assert_eq!(responses[1].views, Some(0));
        assert!(responses[0].tags.is_none());
    }

    #[tokio::test]
    async fn detail_survives_store_outage() {
        let store = Arc::new(DownStore::default());
        let service = offline_service(store.clone());

        let response = service
            .record_and_assemble(post(7), PostQueryOptions::list())
            .await
            .unwrap();

        assert_eq!(response.post.id, 7);
        assert_eq!(response.views, None);
        // INCR attempted, then the read
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn detail_counts_the_current_view() {
        let service = offline_service(Arc::new(InMemoryCounterStore::new()));

        let first = service
            .record_and_assemble(post(7), PostQueryOptions::list())
            .await
            .unwrap();
        let second = service
            .record_and_assemble(post(7), PostQueryOptions::list())
            .await
            .unwrap();

        assert_eq!(first.views, Some(1));
        assert_eq!(second.views, Some(2));
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let absent: UpdatePost = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        assert_eq!(absent.category_id, None);

        let cleared: UpdatePost = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let set: UpdatePost = serde_json::from_str(r#"{"category_id":4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(4)));
    }

    #[test]
    fn untransliterable_titles_fall_back() {
        assert_eq!(base_slug("Hello World"), "hello-world");
        assert_eq!(base_slug("🎉🎉"), FALLBACK_SLUG);
    }

    #[test]
    fn create_validation() {
        let input: CreatePost =
            serde_json::from_str(r#"{"title":"","body":"text","tags":[1,2]}"#).unwrap();
        assert!(input.validate().is_err());

        let input: CreatePost =
            serde_json::from_str(r#"{"title":"Hi","body":"text","status":"draft"}"#).unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.status, Some(PostStatus::Draft));
        assert!(input.tags.is_empty());
    }
}
