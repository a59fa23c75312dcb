use axum::{extract::Query, routing::get, Json};
use cuevote_core::Identity;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{CreateRoomSchema, ListRoomsQuery, ValidatedJson},
    serialized::{Room, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    params(ListRoomsQuery),
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>),
        (status = 401, description = "Private listings require a session")
    )
)]
pub(crate) async fn list_rooms(
    session: Option<Session>,
    context: ServerContext,
    Query(query): Query<ListRoomsQuery>,
) -> ServerResult<Json<Vec<Room>>> {
    let viewer = session
        .map(|s| s.user().identity())
        .unwrap_or_else(|| Identity::guest("anonymous"));

    let rooms = context
        .collab
        .rooms
        .list(query.visibility.unwrap_or_default(), &viewer)
        .await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = CreateRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 400, description = "Request body is invalid")
    )
)]
pub(crate) async fn create_room(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<CreateRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(&session.user().identity(), body.into())
        .await?;

    Ok(Json(room.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/", get(list_rooms).post(create_room))
}
