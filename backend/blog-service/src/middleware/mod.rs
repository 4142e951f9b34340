/// HTTP middleware for blog-service
///
/// `IdentityMiddleware` resolves the caller from an optional Bearer token.
/// A request without an `Authorization` header proceeds as
/// [`Identity::Anonymous`]; a malformed or invalid token is rejected with 401.
pub mod permissions;

pub use permissions::*;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::security::JwtKeys;

pub struct IdentityMiddleware {
    keys: Arc<JwtKeys>,
}

impl IdentityMiddleware {
    pub fn new(keys: Arc<JwtKeys>) -> Self {
        Self { keys }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

pub struct IdentityMiddlewareService<S> {
    service: Rc<S>,
    keys: Arc<JwtKeys>,
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let keys = self.keys.clone();

        Box::pin(async move {
            let identity = match req.headers().get("Authorization") {
                None => Identity::Anonymous,
                Some(value) => {
                    let header = value
                        .to_str()
                        .map_err(|_| ErrorUnauthorized("Invalid Authorization header"))?;
                    let token = header
                        .strip_prefix("Bearer ")
                        .ok_or_else(|| ErrorUnauthorized("Invalid Authorization scheme"))?;
                    let principal = keys
                        .verify(token.trim())
                        .map_err(|_| ErrorUnauthorized("Invalid or expired token"))?;
                    Identity::User(principal)
                }
            };

            req.extensions_mut().insert(identity);

            service.call(req).await
        })
    }
}

/// Handlers outside the middleware see an anonymous caller.
impl FromRequest for Identity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(req
            .extensions()
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous)))
    }
}
