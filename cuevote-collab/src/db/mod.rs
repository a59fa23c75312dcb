use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store and fetch cuevote data.
///
/// Writes are per entity, no operation spans more than one room.
#[async_trait]
pub trait Database: Send + Sync {
    /// Inserts the user, or refreshes the profile fields if they already exist.
    /// The role of an existing user is never changed by this.
    async fn upsert_user(&self, user: NewUser) -> Result<UserData>;
    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    /// Deletes a user along with their sessions and the rooms they own
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    /// Public rooms active at or after `active_since`, most recently active first
    async fn list_public_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>>;
    /// Private rooms active at or after `active_since`, most recently active first
    async fn list_private_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>>;
    async fn list_user_rooms(&self, owner_id: &str) -> Result<Vec<RoomData>>;
    async fn update_room_activity(&self, room_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn upsert_video(&self, video: VideoData) -> Result<()>;
    async fn video_by_id(&self, video_id: &str) -> Result<VideoData>;
    async fn cache_search_term(&self, term: &str, video_id: &str) -> Result<()>;
    /// Returns the video a normalized search term resolved to last time
    async fn search_term_video(&self, term: &str) -> Result<VideoData>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub id: String,
    pub name: String,
    pub description: String,
    /// The owner of the new room
    pub owner_id: String,
    pub is_public: bool,
    /// An argon2 hash, if the room is password protected
    pub password_hash: Option<String>,
    pub color: String,
    pub music_only: bool,
}
