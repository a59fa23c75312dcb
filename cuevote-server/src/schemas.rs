use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use cuevote_collab::{NewRoomSpec, Visibility};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Default, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoomSchema {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: String,
    #[validate(length(max = 64))]
    pub color: String,
    pub is_private: bool,
    #[validate(length(max = 128))]
    pub password: Option<String>,
    pub music_only: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRoomsQuery {
    /// One of public, private, or mine
    #[param(value_type = Option<String>)]
    pub visibility: Option<Visibility>,
}

impl From<CreateRoomSchema> for NewRoomSpec {
    fn from(schema: CreateRoomSchema) -> Self {
        NewRoomSpec {
            name: schema.name,
            description: schema.description,
            color: schema.color,
            is_private: schema.is_private,
            password: schema.password,
            music_only: schema.music_only,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_room_defaults() {
        let schema: CreateRoomSchema = serde_json::from_value(json!({
            "name": "Friday",
            "isPrivate": true
        }))
        .unwrap();

        assert!(schema.validate().is_ok());
        assert!(schema.is_private);
        assert!(!schema.music_only);
        assert_eq!(schema.password, None);
    }

    #[test]
    fn test_create_room_limits() {
        let empty = CreateRoomSchema::default();
        assert!(empty.validate().is_err());

        let long = CreateRoomSchema {
            name: "x".repeat(65),
            ..Default::default()
        };
        assert!(long.validate().is_err());
    }
}
