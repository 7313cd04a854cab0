// api-server/src/middleware/auth.rs
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use common::models::session::Session;

use crate::error::ApiError;
use crate::session::SessionManager;

/// Guard for protected routes. Requests without a cookie that maps to a live
/// session are answered with 401 before the inner service runs; for everyone
/// else the resolved session is attached to the request, and handlers read it
/// back through the `SessionContext` extractor instead of re-parsing
/// credentials themselves.
pub struct RequireSession;

impl<S, B> Transform<S, ServiceRequest> for RequireSession
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireSessionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireSessionMiddleware { service }))
    }
}

pub struct RequireSessionMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequireSessionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let sessions = match req.app_data::<web::Data<SessionManager>>() {
            Some(data) => data.clone(),
            None => {
                tracing::error!("Session manager missing from app data");
                let (request, _) = req.into_parts();
                let response = ApiError::Internal("session manager unavailable".to_string())
                    .error_response()
                    .map_into_right_body();
                return Box::pin(async move { Ok(ServiceResponse::new(request, response)) });
            }
        };

        match sessions.is_authenticated(req.request()) {
            Some(session) => {
                req.extensions_mut().insert(SessionContext(session));
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            None => {
                tracing::warn!("Rejected unauthenticated request: {}", req.path());
                let (request, _) = req.into_parts();
                let response = ApiError::Unauthorized.error_response().map_into_right_body();
                Box::pin(async move { Ok(ServiceResponse::new(request, response)) })
            }
        }
    }
}

/// Typed handle to the session the gate resolved for this request
#[derive(Debug, Clone)]
pub struct SessionContext(pub Session);

impl FromRequest for SessionContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let found = req.extensions().get::<SessionContext>().cloned();
        ready(found.ok_or_else(|| ApiError::Unauthorized.into()))
    }
}
