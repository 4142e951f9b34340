/// Comment handlers - HTTP endpoints for comment operations
use crate::error::Result;
use crate::middleware::Identity;
use crate::services::comments::{CommentListParams, CreateComment, UpdateComment};
use crate::services::CommentService;
use actix_web::{web, HttpResponse};

/// List comments on published posts (`?post=&page=&page_size=`)
pub async fn list_comments(
    service: web::Data<CommentService>,
    query: web::Query<CommentListParams>,
) -> Result<HttpResponse> {
    let page = service.list(&query).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_comment(
    service: web::Data<CommentService>,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let comment = service.get(*comment_id).await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn create_comment(
    service: web::Data<CommentService>,
    identity: Identity,
    req: web::Json<CreateComment>,
) -> Result<HttpResponse> {
    let comment = service.create(&identity, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn update_comment(
    service: web::Data<CommentService>,
    identity: Identity,
    comment_id: web::Path<i64>,
    req: web::Json<UpdateComment>,
) -> Result<HttpResponse> {
    let comment = service
        .update(&identity, *comment_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn delete_comment(
    service: web::Data<CommentService>,
    identity: Identity,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete(&identity, *comment_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
