/// Account handlers: registration, login, profiles and follows
use crate::error::Result;
use crate::middleware::Identity;
use crate::models::UserId;
use crate::services::accounts::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::services::{AccountService, FollowService, Pagination};
use actix_web::{web, HttpResponse};

pub async fn register(
    service: web::Data<AccountService>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let auth = service.register(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(auth))
}

pub async fn login(
    service: web::Data<AccountService>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let auth = service.login(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(auth))
}

pub async fn list_users(
    service: web::Data<AccountService>,
    identity: Identity,
    query: web::Query<Pagination>,
) -> Result<HttpResponse> {
    let page = service.list_users(&identity, *query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Public profile with recent posts and comments
pub async fn get_profile(
    service: web::Data<AccountService>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let profile = service.profile(UserId(*user_id)).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_profile(
    service: web::Data<AccountService>,
    identity: Identity,
    user_id: web::Path<i64>,
    req: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    let user = service
        .update_profile(&identity, UserId(*user_id), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn delete_account(
    service: web::Data<AccountService>,
    identity: Identity,
    user_id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete_account(&identity, UserId(*user_id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn change_password(
    service: web::Data<AccountService>,
    identity: Identity,
    user_id: web::Path<i64>,
    req: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    service
        .change_password(&identity, UserId(*user_id), req.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Follow or unfollow a user; responds with the resulting state
pub async fn toggle_follow(
    service: web::Data<FollowService>,
    identity: Identity,
    user_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let following = service.toggle(&identity, UserId(*user_id)).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "following": following })))
}
