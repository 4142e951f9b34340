/// Post query construction.
///
/// [`PostQueryOptions`] states which related data a context needs (author,
/// category, tags, comment count, body). The list, detail and write presets
/// cover the API's three contexts. Joins and aggregate projections are added
/// only when requested; related collections (tags, comments) are fetched in
/// one batched query each after the posts are loaded.
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostQueryOptions {
    pub join_author: bool,
    pub join_category: bool,
    pub prefetch_tags: bool,
    pub prefetch_comments: bool,
    pub count_comments: bool,
    pub include_body: bool,
}

impl PostQueryOptions {
    /// Listing: author, category and comment count, no body.
    pub const fn list() -> Self {
        Self {
            join_author: true,
            join_category: true,
            prefetch_tags: false,
            prefetch_comments: false,
            count_comments: true,
            include_body: false,
        }
    }

    /// Single post: everything.
    pub const fn detail() -> Self {
        Self {
            join_author: true,
            join_category: true,
            prefetch_tags: true,
            prefetch_comments: true,
            count_comments: true,
            include_body: true,
        }
    }

    /// Create/update responses: relations and body, no aggregates.
    pub const fn write() -> Self {
        Self {
            join_author: true,
            join_category: true,
            prefetch_tags: true,
            prefetch_comments: false,
            count_comments: false,
            include_body: true,
        }
    }

    /// Columns of the post table only.
    pub const fn bare() -> Self {
        Self {
            join_author: false,
            join_category: false,
            prefetch_tags: false,
            prefetch_comments: false,
            count_comments: false,
            include_body: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    Id(i64),
    Slug(String),
    Author(i64),
    CategorySlug(String),
    TagSlug(String),
    /// Posts by authors the given user follows
    FollowedBy(i64),
    /// Full-text match over title and body
    Search(String),
    PublishedAfter(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrder {
    /// Latest `publish` first
    #[default]
    Newest,
    /// Highest comment count first, then newest. Requires `count_comments`.
    MostCommented,
}

#[derive(Debug, Clone)]
pub struct PostQuery {
    pub options: PostQueryOptions,
    pub filters: Vec<PostFilter>,
    pub order: PostOrder,
    pub published_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PostQuery {
    pub fn new(options: PostQueryOptions) -> Self {
        Self {
            options,
            filters: Vec::new(),
            order: PostOrder::Newest,
            published_only: true,
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, filter: PostFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: PostOrder) -> Self {
        self.order = order;
        self
    }

    /// Include drafts.
    pub fn any_status(mut self) -> Self {
        self.published_only = false;
        self
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// `SELECT` returning rows shaped as [`crate::models::Post`].
    pub fn build_select(&self) -> QueryBuilder<'static, Postgres> {
        let opts = &self.options;
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.title, p.slug, p.author_id, p.category_id, p.title_image, \
             p.status, p.publish, p.created_at, p.updated_at, ",
        );

        qb.push(if opts.include_body {
            "p.body, "
        } else {
            "NULL::text AS body, "
        });
        qb.push(if opts.join_author {
            "u.username AS author_username, "
        } else {
            "NULL::text AS author_username, "
        });
        qb.push(if opts.join_category {
            "c.title AS category_title, c.slug AS category_slug, "
        } else {
            "NULL::text AS category_title, NULL::text AS category_slug, "
        });
        qb.push(if opts.count_comments {
            "(SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count "
        } else {
            "NULL::bigint AS comment_count "
        });

        qb.push("FROM posts p ");
        if opts.join_author {
            qb.push("JOIN users u ON u.id = p.author_id ");
        }
        if opts.join_category {
            qb.push("LEFT JOIN categories c ON c.id = p.category_id ");
        }

        self.push_where(&mut qb);
        qb.push(match self.order {
            PostOrder::Newest => " ORDER BY p.publish DESC, p.id DESC",
            PostOrder::MostCommented => " ORDER BY comment_count DESC, p.publish DESC, p.id DESC",
        });

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = self.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }

        qb
    }

    /// `SELECT COUNT(*)` over the same filters, ignoring pagination.
    pub fn build_count(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p ");
        self.push_where(&mut qb);
        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push("WHERE TRUE");
        if self.published_only {
            qb.push(" AND p.status = 'published'");
        }

        for filter in &self.filters {
            match filter {
                PostFilter::Id(id) => {
                    qb.push(" AND p.id = ").push_bind(*id);
                }
                PostFilter::Slug(slug) => {
                    qb.push(" AND p.slug = ").push_bind(slug.clone());
                }
                PostFilter::Author(author_id) => {
                    qb.push(" AND p.author_id = ").push_bind(*author_id);
                }
                PostFilter::CategorySlug(slug) => {
                    qb.push(" AND p.category_id = (SELECT id FROM categories WHERE slug = ")
                        .push_bind(slug.clone())
                        .push(")");
                }
                PostFilter::TagSlug(slug) => {
                    qb.push(
                        " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                         WHERE pt.post_id = p.id AND t.slug = ",
                    )
                    .push_bind(slug.clone())
                    .push(")");
                }
                PostFilter::FollowedBy(user_id) => {
                    qb.push(
                        " AND p.author_id IN \
                         (SELECT following_id FROM follows WHERE follower_id = ",
                    )
                    .push_bind(*user_id)
                    .push(")");
                }
                PostFilter::Search(terms) => {
                    qb.push(
                        " AND to_tsvector('simple', p.title || ' ' || p.body) \
                         @@ plainto_tsquery('simple', ",
                    )
                    .push_bind(terms.clone())
                    .push(")");
                }
                PostFilter::PublishedAfter(ts) => {
                    qb.push(" AND p.publish > ").push_bind(*ts);
                }
            }
        }
    }
}
