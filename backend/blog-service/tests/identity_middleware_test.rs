//! IdentityMiddleware: optional Bearer authentication in front of the API scope.

use actix_web::{http::StatusCode, test, web, App, HttpResponse};
use std::collections::HashSet;
use std::sync::Arc;

use blog_service::middleware::{Identity, IdentityMiddleware, Permission, Principal};
use blog_service::models::UserId;
use blog_service::security::JwtKeys;

const SECRET: &str = "integration-test-secret";

async fn whoami(identity: Identity) -> HttpResponse {
    match identity.principal() {
        Some(p) => HttpResponse::Ok().body(format!(
            "{}:{}:{}",
            p.id,
            p.username,
            p.has_perm(Permission::AddPost)
        )),
        None => HttpResponse::Ok().body("anonymous"),
    }
}

fn principal() -> Principal {
    Principal {
        id: UserId(42),
        username: "alice".to_string(),
        is_superuser: false,
        permissions: HashSet::from([Permission::AddPost, Permission::AddComment]),
    }
}

macro_rules! app {
    ($keys:expr) => {
        test::init_service(
            App::new().service(
                web::scope("/api/v1")
                    .wrap(IdentityMiddleware::new($keys))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn missing_header_is_anonymous() {
    let app = app!(Arc::new(JwtKeys::new(SECRET, 3600)));

    let req = test::TestRequest::get().uri("/api/v1/whoami").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert_eq!(body, "anonymous");
}

#[actix_web::test]
async fn valid_token_resolves_principal() {
    let keys = Arc::new(JwtKeys::new(SECRET, 3600));
    let token = keys.issue(&principal()).unwrap();
    let app = app!(keys);

    let req = test::TestRequest::get()
        .uri("/api/v1/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert_eq!(body, "42:alice:true");
}

#[actix_web::test]
async fn invalid_token_is_rejected() {
    let app = app!(Arc::new(JwtKeys::new(SECRET, 3600)));

    let req = test::TestRequest::get()
        .uri("/api/v1/whoami")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::try_call_service(&app, req).await;
    let status = match resp {
        Ok(resp) => resp.status(),
        Err(e) => e.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_signed_with_other_secret_is_rejected() {
    let other = JwtKeys::new("some-other-secret", 3600);
    let token = other.issue(&principal()).unwrap();
    let app = app!(Arc::new(JwtKeys::new(SECRET, 3600)));

    let req = test::TestRequest::get()
        .uri("/api/v1/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::try_call_service(&app, req).await;
    let status = match resp {
        Ok(resp) => resp.status(),
        Err(e) => e.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn non_bearer_scheme_is_rejected() {
    let app = app!(Arc::new(JwtKeys::new(SECRET, 3600)));

    let req = test::TestRequest::get()
        .uri("/api/v1/whoami")
        .insert_header(("Authorization", "Basic YWxpY2U6c2VjcmV0"))
        .to_request();
    let resp = test::try_call_service(&app, req).await;
    let status = match resp {
        Ok(resp) => resp.status(),
        Err(e) => e.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
