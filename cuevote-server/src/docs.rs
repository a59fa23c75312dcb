use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth, rooms,
    schemas::CreateRoomSchema,
    serialized::{HistoryTrack, Room, Track, User},
};

#[derive(OpenApi)]
#[openapi(
    paths(auth::user, rooms::list_rooms, rooms::create_room),
    components(schemas(User, Room, Track, HistoryTrack, CreateRoomSchema)),
    modifiers(&Security),
    info(
        description = "cuevote-server exposes endpoints to interact with this cuevote instance. Room interaction happens over the /v1/gateway websocket."
    ))
]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
