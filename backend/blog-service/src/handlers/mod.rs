/// HTTP handlers for blog endpoints
///
/// - accounts: registration, login, users, profiles and follows
/// - posts: list, detail (counts a view), create, update, delete
/// - comments: CRUD on comments
/// - taxonomy: categories and tags
/// - health: liveness and readiness
pub mod accounts;
pub mod comments;
pub mod health;
pub mod posts;
pub mod taxonomy;

use actix_web::web;

/// Register every `/api/v1` route on `cfg`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(accounts::register))
            .route("/login", web::post().to(accounts::login)),
    )
    .service(
        web::scope("/users")
            .route("", web::get().to(accounts::list_users))
            .route("/{id}", web::get().to(accounts::get_profile))
            .route("/{id}", web::patch().to(accounts::update_profile))
            .route("/{id}", web::put().to(accounts::update_profile))
            .route("/{id}", web::delete().to(accounts::delete_account))
            .route("/{id}/password", web::post().to(accounts::change_password)),
    )
    .route("/follow/{id}", web::post().to(accounts::toggle_follow))
    .service(
        web::scope("/posts")
            .route("", web::get().to(posts::list_posts))
            .route("", web::post().to(posts::create_post))
            .route("/feed", web::get().to(posts::following_feed))
            .route("/slug/{slug}", web::get().to(posts::get_post_by_slug))
            .route("/{id}", web::get().to(posts::get_post))
            .route("/{id}", web::patch().to(posts::update_post))
            .route("/{id}", web::put().to(posts::update_post))
            .route("/{id}", web::delete().to(posts::delete_post)),
    )
    .service(
        web::scope("/comments")
            .route("", web::get().to(comments::list_comments))
            .route("", web::post().to(comments::create_comment))
            .route("/{id}", web::get().to(comments::get_comment))
            .route("/{id}", web::patch().to(comments::update_comment))
            .route("/{id}", web::put().to(comments::update_comment))
            .route("/{id}", web::delete().to(comments::delete_comment)),
    )
    .service(
        web::scope("/cats")
            .route("", web::get().to(taxonomy::list_categories))
            .route("", web::post().to(taxonomy::create_category))
            .route("/{id}", web::get().to(taxonomy::get_category))
            .route("/{id}", web::patch().to(taxonomy::update_category))
            .route("/{id}", web::put().to(taxonomy::update_category))
            .route("/{id}", web::delete().to(taxonomy::delete_category)),
    )
    .service(
        web::scope("/tags")
            .route("", web::get().to(taxonomy::list_tags))
            .route("", web::post().to(taxonomy::create_tag))
            .route("/{id}", web::get().to(taxonomy::get_tag))
            .route("/{id}", web::patch().to(taxonomy::update_tag))
            .route("/{id}", web::put().to(taxonomy::update_tag))
            .route("/{id}", web::delete().to(taxonomy::delete_tag)),
    )
    .service(
        web::scope("/health")
            .route("", web::get().to(health::health))
            .route("/ready", web::get().to(health::ready)),
    );
}
