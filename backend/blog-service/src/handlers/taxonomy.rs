/// Category and tag handlers
use crate::error::Result;
use crate::middleware::Identity;
use crate::services::taxonomy::{CategoryInput, TagInput};
use crate::services::TaxonomyService;
use actix_web::{web, HttpResponse};

pub async fn list_categories(service: web::Data<TaxonomyService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.list_categories().await?))
}

pub async fn get_category(
    service: web::Data<TaxonomyService>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.category_detail(*id).await?))
}

pub async fn create_category(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    req: web::Json<CategoryInput>,
) -> Result<HttpResponse> {
    let category = service.create_category(&identity, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(category))
}

pub async fn update_category(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    id: web::Path<i64>,
    req: web::Json<CategoryInput>,
) -> Result<HttpResponse> {
    let category = service
        .update_category(&identity, *id, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(category))
}

pub async fn delete_category(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete_category(&identity, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_tags(service: web::Data<TaxonomyService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.list_tags().await?))
}

pub async fn get_tag(
    service: web::Data<TaxonomyService>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(service.tag_detail(*id).await?))
}

pub async fn create_tag(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    req: web::Json<TagInput>,
) -> Result<HttpResponse> {
    let tag = service.create_tag(&identity, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(tag))
}

pub async fn update_tag(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    id: web::Path<i64>,
    req: web::Json<TagInput>,
) -> Result<HttpResponse> {
    let tag = service.update_tag(&identity, *id, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tag))
}

pub async fn delete_tag(
    service: web::Data<TaxonomyService>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete_tag(&identity, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
