use crate::{
    auth::{bearer_token, Identity},
    ctx::Ctx,
    error::ApiError,
    session::SessionKey,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderValue,
    },
    response::Response,
};
use std::convert::Infallible;

fn resolve_identity(parts: &Parts, ctx: &Ctx) -> Option<Identity> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = bearer_token(header)?;
    ctx.identity_resolver().resolve(token)
}

/// Caller identity if a valid bearer token was sent, anonymous otherwise.
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<Ctx> for MaybeIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, ctx: &Ctx) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(resolve_identity(parts, ctx)))
    }
}

/// Rejects the request with 401 unless a valid bearer token was sent.
pub struct RequireIdentity(pub Identity);

#[async_trait]
impl FromRequestParts<Ctx> for RequireIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &Ctx) -> Result<Self, Self::Rejection> {
        resolve_identity(parts, ctx)
            .map(RequireIdentity)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Session carried in the signed session cookie. A missing or tampered cookie
/// starts a fresh session.
pub struct GuestSession {
    pub id: String,
    pub is_new: bool,
}

impl GuestSession {
    /// Set the session cookie on `response` if the session was just created.
    pub fn attach(&self, key: &SessionKey, mut response: Response) -> Response {
        if !self.is_new {
            return response;
        }
        match HeaderValue::from_str(&key.set_cookie_header(&self.id)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("invalid session cookie header: {}", e),
        }
        response
    }
}

#[async_trait]
impl FromRequestParts<Ctx> for GuestSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, ctx: &Ctx) -> Result<Self, Self::Rejection> {
        let existing = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| ctx.session_key().from_cookie_header(header));

        Ok(match existing {
            Some(id) => GuestSession { id, is_new: false },
            None => GuestSession {
                id: SessionKey::new_session_id(),
                is_new: true,
            },
        })
    }
}
