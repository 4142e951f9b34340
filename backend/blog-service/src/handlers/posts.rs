/// Post handlers - HTTP endpoints for post operations
use crate::error::Result;
use crate::middleware::Identity;
use crate::services::posts::{CreatePost, PostListParams, UpdatePost};
use crate::services::{Pagination, PostService};
use actix_web::{web, HttpResponse};

/// List published posts (`?category=&tag=&q=&author=&page=&page_size=`)
pub async fn list_posts(
    service: web::Data<PostService>,
    query: web::Query<PostListParams>,
) -> Result<HttpResponse> {
    let page = service.list(&query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Posts by authors the caller follows
pub async fn following_feed(
    service: web::Data<PostService>,
    identity: Identity,
    query: web::Query<Pagination>,
) -> Result<HttpResponse> {
    let page = service.following_feed(&identity, *query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Get a published post by id and record a view
pub async fn get_post(
    service: web::Data<PostService>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = service.get_by_id(*post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Get a published post by slug and record a view
pub async fn get_post_by_slug(
    service: web::Data<PostService>,
    slug: web::Path<String>,
) -> Result<HttpResponse> {
    let post = service.get_by_slug(&slug).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn create_post(
    service: web::Data<PostService>,
    identity: Identity,
    req: web::Json<CreatePost>,
) -> Result<HttpResponse> {
    let post = service.create(&identity, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post(
    service: web::Data<PostService>,
    identity: Identity,
    post_id: web::Path<i64>,
    req: web::Json<UpdatePost>,
) -> Result<HttpResponse> {
    let post = service
        .update(&identity, *post_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    service: web::Data<PostService>,
    identity: Identity,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete(&identity, *post_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
