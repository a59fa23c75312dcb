use chrono::{DateTime, Utc};
use cuevote_core::{ContentMetadata, Identity, Role};

/// A cuevote account, created from a verified identity provider profile
#[derive(Debug, Clone)]
pub struct UserData {
    /// The id issued by the identity provider
    pub id: String,
    pub email: String,
    pub name: String,
    /// Avatar url
    pub picture: String,
    pub role: Role,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// The durable record of a room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub is_public: bool,
    pub password_hash: Option<String>,
    /// A theme tag interpreted by clients
    pub color: String,
    /// If true, only content in a music category may be suggested
    pub music_only: bool,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A cached content lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoData {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    /// Length in seconds, zero for live content
    pub duration: u32,
    pub category_id: String,
    pub fetched_at: DateTime<Utc>,
}

impl UserData {
    /// The name shown to others, falling back to the email if the profile has none
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::User {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            role: self.role,
        }
    }
}

impl SessionData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl RoomData {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

impl VideoData {
    pub fn is_live(&self) -> bool {
        self.duration == 0
    }
}

impl From<VideoData> for ContentMetadata {
    fn from(video: VideoData) -> Self {
        ContentMetadata {
            content_id: video.id,
            title: video.title,
            artist: video.artist,
            thumbnail: video.thumbnail,
            duration: video.duration,
            category: video.category_id,
        }
    }
}
