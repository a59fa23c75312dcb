use axum::{
    async_trait, debug_handler,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    routing::get,
    Json,
};
use cuevote_collab::{SessionData, UserData};

use crate::{
    serialized::{ToSerialized, User},
    Router, ServerContext,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> &UserData {
        &self.0.user
    }
}

/// Extracts the token out of an `Authorization: Bearer <token>` header value
fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_ascii_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let token = bearer_token(header)
            .ok_or((StatusCode::BAD_REQUEST, "Authorization must be Bearer"))?;

        let session = context
            .collab
            .auth
            .validate(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    get,
    path = "/v1/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 401, description = "Request refused because of missing authorization")
    )
)]
#[debug_handler(state = ServerContext)]
pub(crate) async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new().route("/user", get(user))
}
